use serde::Serialize;

/// Longest body excerpt written to the debug log
const MAX_LOGGED_CHARS: usize = 2000;

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(MAX_LOGGED_CHARS).collect();
    if text.chars().count() > MAX_LOGGED_CHARS {
        out.push_str("...[truncated]");
    }
    out
}

/// Log an outgoing request body at debug level
///
/// Request structs never carry the API key, so the body is safe to print.
pub(crate) fn log_request<T: Serialize>(request: &T) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match serde_json::to_string(request) {
        Ok(body) => log::debug!("LLM request: {}", excerpt(&body)),
        Err(e) => log::debug!("LLM request could not be serialized for logging: {e}"),
    }
}

/// Log a raw response body at debug level
pub(crate) fn log_response(body: &str) {
    log::debug!("LLM response ({} bytes): {}", body.len(), excerpt(body));
}
