//! JSON-RPC 2.0 envelope types and wire codec.
//!
//! A message occupies the connection's entire payload: there is no length
//! prefix or delimiter. The decode helpers therefore operate on whatever
//! bytes have accumulated so far; [`decode_response`] reports "incomplete"
//! until the accumulated bytes parse as a full envelope, while
//! [`decode_request`] judges a drained batch in one shot and recovers the
//! request id for the error response where it can.

use crate::config::MAX_MESSAGE_SIZE;
use crate::error::IpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol version literal required in every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl Request {
    /// Create a request for `method` with positional arguments and a fresh
    /// millisecond-timestamp id.
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(Value::Array(params)),
            id: Some(timestamp_id()),
        }
    }
}

/// JSON-RPC 2.0 response; exactly one of `result`/`error` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
    pub id: Option<Value>,
}

impl Response {
    /// Create a success response correlated to `id`.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response correlated to `id`.
    pub fn failure(id: Option<Value>, code: i32, message: String, data: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(ErrorObject {
                code,
                message,
                data,
            }),
            id,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Current UNIX time in milliseconds as a JSON number, used as a generated
/// request id.
fn timestamp_id() -> Value {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    Value::from(millis)
}

/// Decode and validate one request from a drained batch of bytes.
///
/// On failure the recovered request id (when the payload was at least valid
/// JSON) rides along so the caller can still correlate the error response.
pub fn decode_request(bytes: &[u8]) -> std::result::Result<Request, (Option<Value>, IpcError)> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err((
            None,
            IpcError::Parse(format!(
                "message size {} exceeds maximum {}",
                bytes.len(),
                MAX_MESSAGE_SIZE
            )),
        ));
    }

    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| (None, IpcError::Parse(e.to_string())))?;
    let id = value.get("id").cloned();

    let request: Request = serde_json::from_value(value)
        .map_err(|e| (id.clone(), IpcError::InvalidRequest(e.to_string())))?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err((
            request.id.clone(),
            IpcError::InvalidRequest(format!("expected jsonrpc {JSONRPC_VERSION}")),
        ));
    }

    Ok(request)
}

/// Try to decode a complete response from the bytes accumulated so far.
///
/// Returns `None` while the accumulated bytes do not yet parse as a valid
/// response envelope; the caller keeps reading.
pub fn decode_response(bytes: &[u8]) -> Option<Response> {
    let response: Response = serde_json::from_slice(bytes).ok()?;
    (response.jsonrpc == JSONRPC_VERSION).then_some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_roundtrip() {
        let request = Request::new("math.double", vec![json!(21)]);
        let encoded = serde_json::to_vec(&request).unwrap();
        let decoded = decode_request(&encoded).unwrap();

        assert_eq!(decoded.jsonrpc, "2.0");
        assert_eq!(decoded.method, "math.double");
        assert_eq!(decoded.params, Some(json!([21])));
        assert_eq!(decoded.id, request.id);
    }

    #[test]
    fn test_response_result_values_survive_roundtrip() {
        // JSON-representable values must come back unchanged, including the
        // falsy ones.
        for value in [
            json!("text"),
            json!(42),
            json!(false),
            json!([1, 2, 3]),
            json!({"nested": {"deep": true}}),
            Value::Null,
        ] {
            let response = Response::success(Some(json!(1)), value.clone());
            let encoded = serde_json::to_vec(&response).unwrap();
            let decoded = decode_response(&encoded).expect("complete response");
            assert_eq!(decoded.result, Some(value));
        }
    }

    #[test]
    fn test_success_response_omits_error_field() {
        let response = Response::success(Some(json!(1)), json!("ok"));
        let encoded = serde_json::to_string(&response).unwrap();

        assert!(encoded.contains("\"result\""));
        assert!(!encoded.contains("\"error\""));
    }

    #[test]
    fn test_error_response_omits_result_field() {
        let response = Response::failure(Some(json!(1)), -32601, "nope".into(), None);
        let encoded = serde_json::to_string(&response).unwrap();

        assert!(!encoded.contains("\"result\""));
        assert!(encoded.contains("\"error\""));
        assert!(encoded.contains("-32601"));
    }

    #[test]
    fn test_decode_request_rejects_invalid_json() {
        let (id, err) = decode_request(b"not valid json").unwrap_err();
        assert!(id.is_none());
        assert_eq!(err.code(), -32700);
    }

    #[test]
    fn test_decode_request_recovers_id_from_bad_envelope() {
        let payload = serde_json::to_vec(&json!({"id": 9, "jsonrpc": "1.0", "method": "x"})).unwrap();
        let (id, err) = decode_request(&payload).unwrap_err();
        assert_eq!(id, Some(json!(9)));
        assert_eq!(err.code(), -32600);
    }

    #[test]
    fn test_decode_request_rejects_oversized_payload() {
        let padding = "x".repeat(MAX_MESSAGE_SIZE);
        let payload = serde_json::to_vec(&json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": "pad",
            "params": [padding],
        }))
        .unwrap();

        let (_, err) = decode_request(&payload).unwrap_err();
        assert_eq!(err.code(), -32700);
    }

    #[test]
    fn test_decode_response_incomplete_bytes_return_none() {
        let response = Response::success(Some(json!(1)), json!({"big": "payload"}));
        let encoded = serde_json::to_vec(&response).unwrap();

        // Every strict prefix is incomplete.
        assert!(decode_response(&encoded[..encoded.len() - 1]).is_none());
        assert!(decode_response(&encoded[..4]).is_none());
        assert!(decode_response(b"").is_none());

        assert!(decode_response(&encoded).is_some());
    }

    #[test]
    fn test_decode_response_rejects_wrong_version() {
        let payload = serde_json::to_vec(&json!({"id": 1, "jsonrpc": "1.0", "result": 5})).unwrap();
        assert!(decode_response(&payload).is_none());
    }

    #[test]
    fn test_request_without_params_deserializes() {
        let payload = serde_json::to_vec(&json!({"id": 1, "jsonrpc": "2.0", "method": "ping"})).unwrap();
        let request = decode_request(&payload).unwrap();
        assert!(request.params.is_none());
    }
}
