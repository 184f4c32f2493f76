//! Error types and handlers for registry and image tool operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// Registry API unreachable, timed out or answered with an unexpected status
    #[error("Network error: {0}")]
    Network(String),
    /// Credentials rejected by the registry or its token service
    #[error("Authentication error: {0}")]
    Auth(String),
    /// Repository or tag absent
    #[error("Not found: {0}")]
    NotFound(String),
    /// Backend lacks the requested capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// Local image tool exited non-zero
    #[error("{command} failed: {reason}")]
    ToolInvocation {
        command: String,
        reason: String,
        stdout: String,
        stderr: String,
    },
    /// Malformed owner pattern or configuration value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl SyncError {
    /// Diagnostic text captured from the image tool, if any
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            SyncError::ToolInvocation { stdout, stderr, .. } => {
                if stderr.trim().is_empty() {
                    Some(stdout.trim())
                } else {
                    Some(stderr.trim())
                }
            }
            _ => None,
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "registry request")
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidArgument(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for SyncError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        SyncError::Parse(format!("UTF-8 conversion error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_diagnostics_prefers_stderr() {
        let err = SyncError::ToolInvocation {
            command: "docker push".to_string(),
            reason: "exit status: 1".to_string(),
            stdout: "The push refers to repository".to_string(),
            stderr: "denied: requested access to the resource is denied\n".to_string(),
        };
        assert_eq!(
            err.diagnostics(),
            Some("denied: requested access to the resource is denied")
        );

        let quiet = SyncError::ToolInvocation {
            command: "docker rmi".to_string(),
            reason: "exit status: 1".to_string(),
            stdout: "no such image".to_string(),
            stderr: "  ".to_string(),
        };
        assert_eq!(quiet.diagnostics(), Some("no such image"));
        assert_eq!(SyncError::NotFound("x".into()).diagnostics(), None);
    }
}
