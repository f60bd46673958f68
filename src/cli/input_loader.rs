use experience_classifier::ClassifierError;
use std::path::Path;

/// Interpret `\n`, `\t`, `\r` and `\\` escapes typed on the command line
///
/// # Example
///
/// ```ignore
/// assert_eq!(unescape_separator(r"\n---\n"), "\n---\n");
/// ```
pub fn unescape_separator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Load survey responses from a UTF-8 text file
///
/// The content is split on `separator`; items are trimmed and empty ones
/// dropped. Windows line endings are normalized first so the default newline
/// separator does not leave stray `\r` characters.
pub fn load_responses(path: &Path, separator: &str) -> Result<Vec<String>, ClassifierError> {
    if separator.is_empty() {
        return Err(ClassifierError::InvalidArguments(
            "Response separator must not be empty".to_string(),
        ));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ClassifierError::FileNotFound(format!(
            "Failed to read responses file '{}': {e}",
            path.display()
        ))
    })?;
    let content = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    let responses: Vec<String> = content
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    log::debug!(
        "Loaded {} responses from {}",
        responses.len(),
        path.display()
    );

    Ok(responses)
}
