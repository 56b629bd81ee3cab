use crate::error::{HeliosError, Result};
use tracing::Level;

/// Parse a case-insensitive level name; `WARNING` is accepted as `WARN`
pub fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(HeliosError::config(format!(
            "Invalid log level: {}",
            level_str
        ))),
    }
}

const fn level_rank(level: Level) -> u8 {
    match level {
        Level::TRACE => 0,
        Level::DEBUG => 1,
        Level::INFO => 2,
        Level::WARN => 3,
        _ => 4,
    }
}

/// The more verbose of two levels
pub fn min_level(a: Level, b: Level) -> Level {
    if level_rank(a) <= level_rank(b) { a } else { b }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("Warning").unwrap(), Level::WARN);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_min_level_prefers_verbose() {
        assert_eq!(min_level(Level::INFO, Level::DEBUG), Level::DEBUG);
        assert_eq!(min_level(Level::ERROR, Level::WARN), Level::WARN);
    }
}
