//! JSON response envelope shared by all API routes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// `{status, statusCode, message, data?}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status: &'static str,
    pub status_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn success(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: "success",
            status_code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: "error",
            status_code: status.as_u16(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_omits_missing_data() {
        let body = serde_json::to_value(ApiResponse::success(StatusCode::OK, "Email added successfully")).unwrap();
        assert_eq!(
            body,
            json!({"status": "success", "statusCode": 200, "message": "Email added successfully"})
        );
    }

    #[test]
    fn test_success_envelope_with_data() {
        let body = serde_json::to_value(ApiResponse::success(StatusCode::OK, "Count").with_data(3)).unwrap();
        assert_eq!(body["data"], json!(3));
    }

    #[test]
    fn test_failure_envelope() {
        let response = ApiResponse::failure(StatusCode::BAD_REQUEST, "Email already exists");
        assert_eq!(response.status, "error");
        assert_eq!(response.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
