use thiserror::Error;

/// An environment variable required by the application is not set (or is blank).
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Values consisting only of whitespace are treated as missing, so an exported
/// but empty `OPENAI_API_KEY=` fails here instead of at the first HTTP call.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn reads_present_variable() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_VAR", "value") };
        assert_eq!(get_env_var("SHARED_UTILS_TEST_VAR").unwrap(), "value");
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_VAR") };
    }

    #[test]
    #[serial]
    fn blank_variable_counts_as_missing() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_VAR", "   ") };
        let err = get_env_var("SHARED_UTILS_TEST_VAR").unwrap_err();
        assert_eq!(err.0, "SHARED_UTILS_TEST_VAR");
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_VAR") };
    }

    #[test]
    #[serial]
    fn missing_variable_reports_its_name() {
        unsafe { std::env::remove_var("SHARED_UTILS_SURELY_UNSET") };
        let err = get_env_var("SHARED_UTILS_SURELY_UNSET").unwrap_err();
        assert_eq!(err.to_string(), "Missing environment variable: SHARED_UTILS_SURELY_UNSET");
    }
}
