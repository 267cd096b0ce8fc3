use std::str::FromStr;

use crate::error::ConfigError;

/// Read an environment variable, treating unset as `None`.
pub fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode {
            key: key.to_string(),
        }),
    }
}

/// Parse `value` as `T`, naming `key` in the error.
pub fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{value}': {e}"),
    })
}

/// Parse an optional raw value, falling back to `default` when absent or empty.
pub fn parse_optional<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value.filter(|v| !v.trim().is_empty()) {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

/// Parse a boolean flag, accepting `true/false`, `1/0`, `yes/no`, `on/off`.
pub fn parse_bool(key: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be 'true' or 'false', got '{value}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_optional_defaults() {
        assert_eq!(parse_optional::<u16>("K", None, 7).unwrap(), 7);
        assert_eq!(parse_optional::<u16>("K", Some("  ".into()), 7).unwrap(), 7);
        assert_eq!(parse_optional::<u16>("K", Some("42".into()), 7).unwrap(), 42);
    }

    #[test]
    fn test_parse_optional_names_key_on_error() {
        let err = parse_optional::<u16>("DLOG_X", Some("nope".into()), 7).unwrap_err();
        assert!(err.to_string().contains("DLOG_X"), "{err}");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("K", Some("yes".into()), false).unwrap());
        assert!(parse_bool("K", Some("TRUE".into()), false).unwrap());
        assert!(!parse_bool("K", Some("0".into()), true).unwrap());
        assert!(parse_bool("K", None, true).unwrap());
        assert!(matches!(
            parse_bool("K", Some("maybe".into()), true),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_optional_env_missing_is_none() {
        assert_eq!(optional_env("DLOG_TEST_SURELY_UNSET_VARIABLE").unwrap(), None);
    }
}
