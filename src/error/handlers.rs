//! Standardized mapping of HTTP and transport failures onto [`SyncError`]

use crate::error::SyncError;

/// Maps registry HTTP statuses to error kinds
pub struct HttpErrorHandler;

impl HttpErrorHandler {
    /// Handle registry-related HTTP errors for a listing operation
    pub fn handle_registry_error(status: u16, error_text: &str, operation: &str) -> SyncError {
        let error_text = error_text.trim();
        match status {
            401 => SyncError::Auth(format!(
                "Unauthorized to perform {}: {}",
                operation, error_text
            )),
            403 => SyncError::Auth(format!(
                "Forbidden: insufficient permissions for {}: {}",
                operation, error_text
            )),
            404 => SyncError::NotFound(format!("Resource not found for {}: {}", operation, error_text)),
            405 | 501 => SyncError::Unsupported(format!(
                "Registry does not support {}: {}",
                operation, error_text
            )),
            429 => SyncError::Network(format!("Rate limited during {}: {}", operation, error_text)),
            500 => SyncError::Network(format!(
                "Registry server error during {}: {}",
                operation, error_text
            )),
            502 | 503 => SyncError::Network(format!(
                "Registry unavailable for {}: {}",
                operation, error_text
            )),
            _ => SyncError::Network(format!(
                "{} failed (status {}): {}",
                operation, status, error_text
            )),
        }
    }

    /// Handle token service failures
    pub fn handle_auth_error(status: u16, error_text: &str) -> SyncError {
        let error_msg = match status {
            400 => "Invalid token request parameters".to_string(),
            401 => "Invalid credentials provided".to_string(),
            403 => "Access denied - insufficient permissions".to_string(),
            404 => "Authentication endpoint not found".to_string(),
            _ => format!("Authentication failed (status {}): {}", status, error_text.trim()),
        };

        SyncError::Auth(error_msg)
    }
}

/// Maps reqwest transport errors to error kinds
pub struct NetworkErrorHandler;

impl NetworkErrorHandler {
    pub fn handle_network_error(err: &reqwest::Error, context: &str) -> SyncError {
        let msg = if err.is_timeout() {
            format!("Timeout during {}: {}", context, err)
        } else if err.is_connect() {
            format!("Connection failed during {}: {}", context, err)
        } else if err.is_decode() {
            return SyncError::Parse(format!("Invalid response during {}: {}", context, err));
        } else {
            format!("Request failed during {}: {}", context, err)
        };
        SyncError::Network(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            HttpErrorHandler::handle_registry_error(401, "", "tag listing"),
            SyncError::Auth(_)
        ));
        assert!(matches!(
            HttpErrorHandler::handle_registry_error(403, "denied", "tag listing"),
            SyncError::Auth(_)
        ));
        assert!(matches!(
            HttpErrorHandler::handle_registry_error(404, "{}", "tag listing"),
            SyncError::NotFound(_)
        ));
        assert!(matches!(
            HttpErrorHandler::handle_registry_error(503, "", "search"),
            SyncError::Network(_)
        ));
        assert!(matches!(
            HttpErrorHandler::handle_auth_error(401, ""),
            SyncError::Auth(msg) if msg == "Invalid credentials provided"
        ));
    }
}
