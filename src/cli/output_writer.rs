use experience_classifier::ClassificationReport;
use std::{
    fs,
    io::{self, Write},
    path::Path,
};
use tempfile::NamedTempFile;

/// Print the report as pretty JSON, or write it to `path`
///
/// File output goes through a temp file in the target directory that is then
/// persisted over the destination, so a crashed run never leaves half a report.
pub fn write_report(report: &ClassificationReport, path: Option<&Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let Some(path) = path else {
        println!("{json}");
        return Ok(());
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            parent
        }
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    writeln!(staged, "{json}")?;
    staged.flush()?;
    staged.persist(path)?;

    log::info!(
        "Wrote {} classified responses to {}",
        report.results.as_ref().map_or(0, Vec::len),
        path.display()
    );
    Ok(())
}
