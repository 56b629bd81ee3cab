use std::collections::BTreeMap;
use tracing::Level;

/// Fields attached to every event a component logger emits
#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub vin: Option<String>,
    /// Free-form fields, rendered in key order
    pub extra_fields: BTreeMap<String, String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            vin: None,
            extra_fields: BTreeMap::new(),
        }
    }

    /// Empty VINs are ignored
    pub fn with_vin(mut self, vin: &str) -> Self {
        if !vin.is_empty() {
            self.vin = Some(vin.to_string());
        }
        self
    }

    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

macro_rules! emit {
    ($level:ident, $logger:ident, $message:ident) => {
        tracing::event!(
            Level::$level,
            component = $logger.context.component.as_str(),
            vin = $logger.context.vin.as_deref().unwrap_or("-"),
            extra = $logger.extras.as_str(),
            "{}",
            $message
        )
    };
}

/// Component logger emitting `component`, `vin` and `extra` as tracing fields
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    context: LogContext,
    extras: String,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        let extras = context
            .extra_fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",");
        Self { context, extras }
    }

    pub fn component(&self) -> &str {
        &self.context.component
    }

    pub fn error(&self, message: &str) {
        emit!(ERROR, self, message);
    }

    pub fn warn(&self, message: &str) {
        emit!(WARN, self, message);
    }

    pub fn info(&self, message: &str) {
        emit!(INFO, self, message);
    }

    pub fn debug(&self, message: &str) {
        emit!(DEBUG, self, message);
    }

    pub fn trace(&self, message: &str) {
        emit!(TRACE, self, message);
    }
}

/// Logger tagged with just a component name
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context() {
        let context = LogContext::new("driver")
            .with_vin("5YJ3E7EB0KF000000")
            .with_field("adapter", "tesla-motors.0".to_string());

        assert_eq!(context.component, "driver");
        assert_eq!(context.vin.as_deref(), Some("5YJ3E7EB0KF000000"));
        assert_eq!(
            context.extra_fields.get("adapter").map(String::as_str),
            Some("tesla-motors.0")
        );
    }

    #[test]
    fn test_empty_vin_is_dropped() {
        let context = LogContext::new("driver").with_vin("");
        assert!(context.vin.is_none());
    }

    #[test]
    fn test_extras_rendered_in_key_order() {
        let logger = get_logger_with_context(
            LogContext::new("store")
                .with_field("b", "2".to_string())
                .with_field("a", "1".to_string()),
        );
        assert_eq!(logger.extras, "a=1,b=2");
        assert_eq!(logger.component(), "store");
        assert!(get_logger("web").extras.is_empty());
    }
}
