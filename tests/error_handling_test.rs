// Error handling tests
//
// Every error variant needs a descriptive message, a stable code for JSON
// output and a distinct process exit code.

use experience_classifier::ClassifierError;
use std::collections::HashSet;

fn all_errors() -> Vec<ClassifierError> {
    vec![
        ClassifierError::FileNotFound("responses.txt".to_string()),
        ClassifierError::InvalidArguments("--input is required".to_string()),
        ClassifierError::Configuration("Taxonomy defines no categories".to_string()),
        ClassifierError::AuthenticationFailed("HTTP 401: invalid or missing API key".to_string()),
        ClassifierError::Service("HTTP 503 Service Unavailable: overloaded".to_string()),
        ClassifierError::InvalidResponse("No choices in response".to_string()),
        ClassifierError::Timeout(120),
    ]
}

#[test]
fn test_all_error_variants_have_non_empty_messages() {
    for error in all_errors() {
        let msg = error.to_string();
        assert!(
            msg.len() > 10,
            "Error message should be descriptive for {error:?}"
        );
    }
}

#[test]
fn test_error_display_includes_context() {
    let err = ClassifierError::FileNotFound("missing.txt".to_string());
    assert!(err.to_string().contains("missing.txt"));

    let err = ClassifierError::Timeout(45);
    assert!(err.to_string().contains("45s"));

    let err = ClassifierError::Service("HTTP 500 Internal Server Error: boom".to_string());
    assert!(err.to_string().contains("boom"));
}

#[test]
fn test_codes_and_exit_codes_are_unique() {
    let errors = all_errors();
    let codes: HashSet<_> = errors.iter().map(ClassifierError::code).collect();
    let exit_codes: HashSet<_> = errors.iter().map(ClassifierError::exit_code).collect();

    assert_eq!(codes.len(), errors.len());
    assert_eq!(exit_codes.len(), errors.len());
    // 0 is success and 1 is reserved for panics
    assert!(exit_codes.iter().all(|&c| c >= 2));
}

#[test]
fn test_configuration_error_code() {
    let err = ClassifierError::Configuration(
        "An API key is required for the gemini endpoint".to_string(),
    );
    assert_eq!(err.code(), "CONFIGURATION_ERROR");
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_timeout_code() {
    let err = ClassifierError::Timeout(30);
    assert_eq!(err.code(), "TIMEOUT");
    assert_eq!(err.exit_code(), 9);
}
