//! Response decoding for the lab API.
//!
//! Success bodies are wrapped as `{"success": true, "statusCode": 200, "data": ...}`;
//! failures carry `{"error": "..."}`. Decoding is strict: whatever reaches a
//! caller has been checked against its schema.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::GatewayError;

/// Standard success wrapper around an API payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// The server's own explanation from an error body, or a generic one.
pub fn error_message(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .error
        .or(parsed.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Request failed with status {status}"))
}

/// Map a non-2xx status and its body to a typed error.
pub fn error_from_status(status: u16, body: &str) -> GatewayError {
    let message = error_message(status, body);
    match status {
        401 | 403 => GatewayError::Unauthorized,
        404 => GatewayError::NotFound(message),
        _ => GatewayError::Server { status, message },
    }
}

/// Check the status, then decode the whole body as `T`.
pub fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, GatewayError> {
    if !(200..300).contains(&status) {
        return Err(error_from_status(status, body));
    }
    serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Decode an envelope and its `data` payload.
///
/// `Ok(None)` when the server acknowledged without returning data.
/// A `success: false` envelope is a server error even on a 2xx status.
pub fn decode_data<T: DeserializeOwned>(status: u16, body: &str) -> Result<Option<T>, GatewayError> {
    let envelope: Envelope = decode_body(status, body)?;

    if !envelope.success {
        let message = envelope
            .error
            .or(envelope.message)
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(GatewayError::Server {
            status: envelope.status_code.unwrap_or(status),
            message,
        });
    }

    match envelope.data {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| GatewayError::Decode(e.to_string())),
    }
}

/// Decode an envelope whose `data` must be present.
pub fn decode_required<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, GatewayError> {
    decode_data(status, body)?
        .ok_or_else(|| GatewayError::Decode("response has no data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabTestRequest, RequestStatus};

    const RECORD: &str = r#"{"id":"a1","requestId":"R-1001","priority":"URGENT","status":"SENDING_LAB"}"#;

    #[test]
    fn decodes_record_envelope() {
        let body = format!(r#"{{"success":true,"statusCode":200,"data":{RECORD}}}"#);
        let record: LabTestRequest = decode_required(200, &body).unwrap();
        assert_eq!(record.request_id, "R-1001");
        assert_eq!(record.status, RequestStatus::SendingLab);
    }

    #[test]
    fn decodes_list_envelope() {
        let body = format!(r#"{{"success":true,"statusCode":200,"data":[{RECORD},{RECORD}]}}"#);
        let records: Vec<LabTestRequest> = decode_required(200, &body).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn missing_data_is_none() {
        let none: Option<LabTestRequest> =
            decode_data(200, r#"{"success":true,"statusCode":200}"#).unwrap();
        assert!(none.is_none());
        let null: Option<LabTestRequest> =
            decode_data(200, r#"{"success":true,"data":null}"#).unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn required_data_missing_is_decode_error() {
        let err = decode_required::<LabTestRequest>(200, r#"{"success":true}"#).unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn schema_mismatch_is_decode_error() {
        let body = r#"{"success":true,"data":{"id":"a1","priority":"URGENT","status":"PENDING"}}"#;
        let err = decode_required::<LabTestRequest>(200, body).unwrap_err();
        match err {
            GatewayError::Decode(msg) => assert!(msg.contains("requestId")),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_decode_error() {
        let err = decode_required::<LabTestRequest>(200, "<html>oops</html>").unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
    }

    #[test]
    fn unsuccessful_envelope_is_server_error() {
        let err = decode_data::<LabTestRequest>(
            200,
            r#"{"success":false,"statusCode":409,"error":"Result already recorded"}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Server {
                status: 409,
                message: "Result already recorded".into()
            }
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(error_from_status(401, ""), GatewayError::Unauthorized);
        assert_eq!(error_from_status(403, r#"{"error":"Forbidden"}"#), GatewayError::Unauthorized);
        assert_eq!(
            error_from_status(404, r#"{"error":"Lab test request not found"}"#),
            GatewayError::NotFound("Lab test request not found".into())
        );
        assert_eq!(
            error_from_status(502, ""),
            GatewayError::Server {
                status: 502,
                message: "Request failed with status 502".into()
            }
        );
        assert_eq!(
            error_from_status(500, r#"{"message":"AI service failed"}"#),
            GatewayError::Server {
                status: 500,
                message: "AI service failed".into()
            }
        );
    }

    #[test]
    fn error_message_prefers_server_text() {
        assert_eq!(
            error_message(401, r#"{"error":"Invalid email or password"}"#),
            "Invalid email or password"
        );
        assert_eq!(error_message(401, "  "), "Request failed with status 401");
    }

    #[test]
    fn error_status_short_circuits_decode() {
        let err = decode_required::<LabTestRequest>(500, r#"{"error":"boom"}"#).unwrap_err();
        assert_eq!(
            err,
            GatewayError::Server {
                status: 500,
                message: "boom".into()
            }
        );
    }
}
