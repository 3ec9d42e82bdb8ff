//! Error types shared by the tool and both transports.

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Failure of a tool invocation, carrying an HTTP-style status code.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A required argument is missing or empty.
    #[error("{0}")]
    Validation(String),

    /// The server is not configured to reach the upstream service.
    #[error("{0}")]
    Configuration(String),

    /// The config service answered with a non-success status.
    #[error("Apollo Config Service responded with status {status}")]
    Upstream {
        status: u16,
        details: Option<serde_json::Value>,
    },

    /// The request could not be sent or its body could not be read.
    #[error("Request to Apollo Config Service failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A result could not be converted to JSON.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ToolError {
    /// Status code reported to callers.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Upstream { status, .. } => *status,
            Self::Configuration(_) | Self::Request(_) | Self::Serialization(_) => 500,
        }
    }

    /// Extra payload attached to the error, if any.
    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Upstream { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ToolError::Validation("x".into()).code(), 400);
        assert_eq!(ToolError::Configuration("x".into()).code(), 500);

        let err = ToolError::Upstream {
            status: 404,
            details: Some(serde_json::json!({"message": "not found"})),
        };
        assert_eq!(err.code(), 404);
        assert_eq!(err.details().unwrap()["message"], "not found");
        assert_eq!(err.to_string(), "Apollo Config Service responded with status 404");
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err = ToolError::Validation("Missing required arguments".into());
        assert_eq!(err.to_string(), "Missing required arguments");
        assert!(err.details().is_none());
    }
}
