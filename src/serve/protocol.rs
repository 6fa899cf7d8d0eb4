//! Wire types of the JSON-lines protocol.
//!
//! One request object per line in, one response object per line out:
//!
//! ```text
//! {"id":1,"op":"manage_mock","command":"start","spec":"openapi: 3.0.0 ...","port":9000}
//! {"id":1,"ok":true,"result":{"status":"started","server":{"port":9000,...}}}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request line. `id` is opaque and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    RunTest {
        spec: String,
        #[serde(default)]
        format: Option<String>,
        base_url: String,
        #[serde(default)]
        resiliency: bool,
    },
    ManageMock {
        command: String,
        #[serde(default)]
        spec: Option<String>,
        #[serde(default)]
        format: Option<String>,
        #[serde(default)]
        port: Option<u16>,
    },
    CheckCompatibility {
        #[serde(default)]
        target_path: Option<String>,
        #[serde(default)]
        base_branch: Option<String>,
        #[serde(default)]
        repo_dir: Option<PathBuf>,
    },
    Capabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_decoding() {
        let env: Envelope =
            serde_json::from_str(r#"{"id":7,"op":"run_test","spec":"x: 1","base_url":"http://h"}"#).unwrap();
        assert_eq!(env.id, Some(Value::from(7)));
        assert_eq!(
            env.request,
            Request::RunTest {
                spec: "x: 1".into(),
                format: None,
                base_url: "http://h".into(),
                resiliency: false
            }
        );

        let env: Envelope = serde_json::from_str(r#"{"op":"capabilities"}"#).unwrap();
        assert_eq!(env.id, None);
        assert_eq!(env.request, Request::Capabilities);
    }

    #[test]
    fn test_missing_field_is_reported_by_name() {
        let err = serde_json::from_str::<Envelope>(r#"{"op":"run_test","spec":"x: 1"}"#).unwrap_err();
        assert!(err.to_string().contains("base_url"), "{err}");
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(Response::success(None, Value::from("x"))).unwrap();
        assert_eq!(ok, serde_json::json!({"ok": true, "result": "x"}));

        let err = serde_json::to_value(Response::failure(Some(Value::from(1)), "not_running", "gone")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({"id": 1, "ok": false, "error": {"code": "not_running", "message": "gone"}})
        );
    }
}
