//! Severity-tagged statuses produced by diagnostic lines

use serde::{Deserialize, Serialize};

/// How serious a protocol status is.
///
/// Ordered so that the worst of several statuses is their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Why a status was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    /// Conflicts were reported during the update or merge
    Conflict,
    /// The requested tag does not exist; retry against the default branch
    NoSuchTag,
    /// An unrecognized diagnostic under the server prefix
    ServerError,
    /// The server aborted the command
    ServerAborted,
    /// A diagnostic line outside every known prefix
    Unclassified,
}

/// A status raised while parsing server output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStatus {
    pub severity: Severity,
    pub code: StatusCode,
    /// The full diagnostic line
    pub message: String,
}

impl ProtocolStatus {
    pub fn info(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    /// Whether a caller should consider aborting the refresh.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ProtocolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        write!(f, "{} {:?}: {}", level, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }

    #[test]
    fn test_display_contains_level_and_line() {
        let status = ProtocolStatus::warning(StatusCode::NoSuchTag, "cvs [server aborted]: no such tag v1");
        let display = status.to_string();
        assert!(display.starts_with("WARNING"));
        assert!(display.contains("no such tag v1"));
    }
}
