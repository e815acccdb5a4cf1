use serde::Serialize;
pub(crate) mod health_check_controller;
pub(crate) mod notification_controller;

/// JSON envelope shared by every non-streaming endpoint.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    status_code: u16,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(status_code: u16, data: T) -> Self {
        Self { status_code, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::sse::BroadcastReport;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_serialize_api_response() {
        let response = ApiResponse::new(StatusCode::OK.into(), 23);
        let serialized = serde_json::to_string(&response).unwrap();

        // Serializing and then deserializing because the string output from serde_json::to_string is
        // non-deterministic as far as the order of the JSON keys. This ensures the test won't be flaky
        let deserialized_value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized_value, json!({"data": 23, "status_code": 200}));
    }

    #[test]
    fn test_serialize_api_response_with_broadcast_report() {
        let report = BroadcastReport {
            delivered: 2,
            dropped: 1,
            ..Default::default()
        };
        let response = ApiResponse::new(StatusCode::OK.into(), report);

        assert_eq!(
            serde_json::to_value(&response).unwrap()["data"],
            json!({"delivered": 2, "dropped": 1, "disconnected": 0, "closed": 0, "failed": 0})
        );
    }
}
