//! Wire types for the workout tool-server control channel.
//!
//! One request maps to exactly one response, correlated by `id`. Everything
//! on the channel is one of these two shapes; anything else is a framing
//! defect handled by the transport, not by this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool names accepted by the dispatcher. The registry is fixed: a request
/// naming any other tool is rejected with `invalid_argument`.
pub const TOOL_SEARCH_EXERCISES: &str = "search_exercises";
pub const TOOL_GET_EXERCISE_BY_NAME: &str = "get_exercise_by_name";
pub const TOOL_DOWNLOAD_DATASET: &str = "download_dataset";

pub const TOOL_NAMES: &[&str] = &[
    TOOL_SEARCH_EXERCISES,
    TOOL_GET_EXERCISE_BY_NAME,
    TOOL_DOWNLOAD_DATASET,
];

/// A single tool invocation from the orchestrating caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub id: String,
    pub tool: String,
    /// Tool arguments. Missing arguments deserialize as `Null`; the
    /// dispatcher treats that the same as an empty object.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolRequest {
    pub fn new(id: impl Into<String>, tool: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            arguments,
        }
    }
}

/// Stable machine-readable error codes carried in failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    DatasetUnavailable,
    NoPriorSession,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::NotFound => "not_found",
            ErrorCode::DatasetUnavailable => "dataset_unavailable",
            ErrorCode::NoPriorSession => "no_prior_session",
            ErrorCode::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error payload of a failure response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ToolError {
    pub code: ErrorCode,
    pub message: String,
}

impl ToolError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Response to a [`ToolRequest`]. Exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl ToolResponse {
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(ToolError::new(code, message)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn request_without_arguments_defaults_to_null() {
        let req: ToolRequest =
            serde_json::from_str(r#"{"id":"r1","tool":"download_dataset"}"#).unwrap();
        assert_eq!(req.id, "r1");
        assert_eq!(req.tool, TOOL_DOWNLOAD_DATASET);
        assert!(req.arguments.is_null());
    }

    #[test]
    fn error_codes_serialize_snake_case() {
        for (code, expected) in [
            (ErrorCode::InvalidArgument, "\"invalid_argument\""),
            (ErrorCode::NotFound, "\"not_found\""),
            (ErrorCode::DatasetUnavailable, "\"dataset_unavailable\""),
            (ErrorCode::NoPriorSession, "\"no_prior_session\""),
            (ErrorCode::Internal, "\"internal\""),
        ] {
            assert_eq!(serde_json::to_string(&code).unwrap(), expected);
            assert_eq!(format!("\"{code}\""), expected);
        }
    }

    #[test]
    fn success_response_omits_error_field() {
        let resp = ToolResponse::success("r2", json!({"count": 3}));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value, json!({"id": "r2", "result": {"count": 3}}));
    }

    #[test]
    fn failure_response_round_trips() {
        let resp = ToolResponse::failure("r3", ErrorCode::NotFound, "no such exercise");
        let text = serde_json::to_string(&resp).unwrap();
        let back: ToolResponse = serde_json::from_str(&text).unwrap();
        assert!(back.is_error());
        assert_eq!(back, resp);
    }
}
