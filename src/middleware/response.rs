use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// `{success, request_id, data}` envelope for the informational endpoints.
/// The request id is echoed in `x-request-id` so support can match logs.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub request_id: Uuid,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            request_id: Uuid::new_v4(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let request_id = self.request_id.to_string();

        let (status, body) = match serde_json::to_value(&self.data) {
            Ok(data) => (
                StatusCode::OK,
                json!({ "success": true, "request_id": request_id, "data": data }),
            ),
            Err(e) => {
                tracing::error!(request_id = %request_id, "Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "request_id": request_id, "error": "Failed to serialize response data" }),
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[tokio::test]
    async fn envelope_carries_request_id_in_body_and_header() {
        let response = ApiResponse::success(json!({"status": "ok"})).into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
        assert_eq!(body["request_id"], header.as_str());
        assert!(Uuid::parse_str(&header).is_ok());
    }
}
