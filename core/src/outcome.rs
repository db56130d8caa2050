//! The `(payload, metadata, error)` triple every remote operation produces,
//! and its single conversion into a tool result.

use serde::Serialize;

use crate::error::ToolError;

/// Transport-level facts about a completed remote call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseMetadata {
    pub status: u16,
}

/// Error reported by the remote side of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub message: String,
    pub status: Option<u16>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOutcome<T> {
    pub payload: Option<T>,
    pub metadata: Option<ResponseMetadata>,
    pub error: Option<RemoteError>,
}

impl<T> RemoteOutcome<T> {
    pub fn ok(payload: T) -> Self {
        Self {
            payload: Some(payload),
            metadata: None,
            error: None,
        }
    }

    pub fn failed(error: RemoteError) -> Self {
        Self {
            payload: None,
            metadata: None,
            error: Some(error),
        }
    }

    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// A present error always wins, even alongside a payload. A missing
    /// payload without an error is still a failure.
    pub fn into_result(self, action: &str, target: Option<&str>) -> Result<T, ToolError> {
        if let Some(error) = self.error {
            tracing::warn!(action, resource = ?target, remote_status = ?error.status, error = %error, "remote operation failed");
            let mut err = ToolError::remote(action, target, &error.message);
            if let (Some(status), Some(details)) = (error.status, err.details.as_mut()) {
                details["status"] = status.into();
            }
            return Err(err);
        }
        match self.payload {
            Some(payload) => Ok(payload),
            None => {
                tracing::warn!(action, resource = ?target, "remote operation returned no payload");
                Err(ToolError::remote(action, target, "remote returned no result"))
            }
        }
    }

    /// For operations whose success carries no useful payload (deletes).
    pub fn into_status(self, action: &str, target: Option<&str>) -> Result<(), ToolError> {
        if let Some(error) = self.error {
            return RemoteOutcome::<()>::failed(error).into_result(action, target);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_without_error_is_returned() {
        let outcome = RemoteOutcome::ok(vec![1, 2]).with_metadata(ResponseMetadata { status: 200 });
        assert_eq!(outcome.into_result("list things", None).unwrap(), vec![1, 2]);
    }

    #[test]
    fn error_wins_over_payload() {
        let outcome = RemoteOutcome {
            payload: Some("partial"),
            metadata: None,
            error: Some(RemoteError::new("DUPLICATE_ITEM").with_status(409)),
        };
        let err = outcome
            .into_result("create network service", None)
            .expect_err("error must surface");
        assert_eq!(err.message, "Failed to create network service: DUPLICATE_ITEM");
        assert_eq!(err.details.unwrap()["status"], 409);
    }

    #[test]
    fn empty_outcome_is_a_failure() {
        let outcome: RemoteOutcome<String> = RemoteOutcome {
            payload: None,
            metadata: Some(ResponseMetadata { status: 200 }),
            error: None,
        };
        assert!(outcome.into_result("get URL category", Some("CUSTOM_01")).is_err());
    }

    #[test]
    fn delete_status_ignores_empty_payload() {
        let outcome: RemoteOutcome<()> = RemoteOutcome {
            payload: None,
            metadata: Some(ResponseMetadata { status: 204 }),
            error: None,
        };
        assert!(outcome.into_status("delete network service 7", Some("7")).is_ok());

        let failed: RemoteOutcome<()> = RemoteOutcome::failed(RemoteError::new("NOT_FOUND"));
        let err = failed
            .into_status("delete network service 7", Some("7"))
            .expect_err("remote error surfaces");
        assert_eq!(err.message, "Failed to delete network service 7: NOT_FOUND");
    }
}
