use serde::Serialize;

/// Status payload for user-facing flows (registration, email verification).
///
/// These report outcomes in the body with HTTP 200 rather than through the
/// status code.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResponseModel {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl ResponseModel {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            error: None,
        }
    }

    pub fn fail(message: impl Into<String>, error: Option<&'static str>) -> Self {
        Self {
            status: "fail",
            message: message.into(),
            error,
        }
    }
}
