//! Request dispatch and the stdio loop.

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::compat::CompatibilityRequest;
use crate::error::{PilotError, PilotResult};
use crate::orchestrator::{MockCommand, Orchestrator, TestRequest, parse_format};
use crate::serve::protocol::{Envelope, Request, Response};

/// Serves the orchestrator over a line-oriented reader/writer pair.
#[derive(Debug, Clone)]
pub struct StdioServer {
    orchestrator: Orchestrator,
}

impl StdioServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Answer requests until `reader` hits EOF, then stop every mock server still running.
    ///
    /// Each request runs as its own task, so a long test run does not hold up a mock `stop`. Responses are
    /// written as they complete; callers correlate them by `id`. EOF waits for in-flight requests.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let result = self.pump(reader, &mut writer).await;
        tracing::info!("input closed; shutting down");
        self.orchestrator.shutdown().await;
        result
    }

    async fn pump<R, W>(&self, reader: R, writer: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let server = self.clone();

        let read_side = async move {
            let mut lines = reader.lines();
            let mut in_flight = JoinSet::new();
            while let Some(line) = lines.next_line().await? {
                if line.trim().is_empty() {
                    continue;
                }
                let server = server.clone();
                let tx = tx.clone();
                in_flight.spawn(async move {
                    let response = server.handle_line(&line).await;
                    match serde_json::to_string(&response) {
                        Ok(mut encoded) => {
                            encoded.push('\n');
                            let _ = tx.send(encoded);
                        }
                        Err(e) => tracing::error!(error = %e, "could not encode response"),
                    }
                });
            }
            while in_flight.join_next().await.is_some() {}
            Ok::<(), std::io::Error>(())
        };

        let write_side = async {
            while let Some(encoded) = rx.recv().await {
                writer.write_all(encoded.as_bytes()).await?;
                writer.flush().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (read, written) = tokio::join!(read_side, write_side);
        read.and(written)
    }

    /// Decode, dispatch, and encode one request line. Never fails: every problem becomes an error response.
    pub async fn handle_line(&self, line: &str) -> Response {
        let envelope: Envelope = match serde_json::from_str(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = %e, "rejected request line");
                return Response::failure(None, "invalid_request", e.to_string());
            }
        };
        let id = envelope.id;
        match self.dispatch(envelope.request).await {
            Ok(result) => Response::success(id, result),
            Err(e) => {
                tracing::warn!(code = e.code(), error = %e, "request failed");
                Response::failure(id, e.code(), e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: Request) -> PilotResult<Value> {
        match request {
            Request::RunTest {
                spec,
                format,
                base_url,
                resiliency,
            } => {
                let report = self
                    .orchestrator
                    .run_test(TestRequest {
                        spec_content: spec,
                        format: parse_format(format.as_deref())?,
                        base_url,
                        boundary: resiliency,
                    })
                    .await?;
                to_value(&report)
            }
            Request::ManageMock {
                command,
                spec,
                format,
                port,
            } => {
                let command = MockCommand::from_parts(&command, spec, format.as_deref(), port)?;
                to_value(&self.orchestrator.manage_mock(command).await?)
            }
            Request::CheckCompatibility {
                target_path,
                base_branch,
                repo_dir,
            } => {
                let report = self
                    .orchestrator
                    .check_compatibility(CompatibilityRequest {
                        target_path,
                        base_branch,
                        repo_dir,
                    })
                    .await?;
                to_value(&report)
            }
            Request::Capabilities => to_value(&self.orchestrator.capabilities()),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> PilotResult<Value> {
    serde_json::to_value(value).map_err(|e| PilotError::invalid(format!("unserializable result: {e}")))
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;

    use super::*;
    use crate::config::PilotConfig;

    fn server() -> StdioServer {
        StdioServer::new(Orchestrator::new(PilotConfig::new()).unwrap())
    }

    #[tokio::test]
    async fn test_garbage_line_is_an_error_response() {
        let response = server().handle_line("not json").await;
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "invalid_request");
    }

    #[tokio::test]
    async fn test_missing_field_names_the_field() {
        let response = server().handle_line(r#"{"op":"manage_mock"}"#).await;
        assert!(!response.ok);
        assert!(response.error.unwrap().message.contains("command"));
    }

    #[tokio::test]
    async fn test_stop_unknown_port_reports_not_running() {
        let response = server()
            .handle_line(r#"{"id":"a","op":"manage_mock","command":"stop","port":9000}"#)
            .await;
        assert_eq!(response.id, Some(Value::from("a")));
        let error = response.error.unwrap();
        assert_eq!(error.code, "not_running");
        assert_eq!(error.message, "no server running on port 9000");
    }

    #[tokio::test]
    async fn test_invalid_base_url_is_rejected_before_running() {
        let response = server()
            .handle_line(r#"{"op":"run_test","spec":"x: 1","base_url":"localhost"}"#)
            .await;
        assert_eq!(response.error.unwrap().code, "invalid_input");
    }

    fn response_lines(out: Vec<u8>) -> Vec<Value> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_serve_answers_each_line() {
        let input = b"{\"id\":1,\"op\":\"capabilities\"}\n\n{\"id\":2,\"op\":\"manage_mock\",\"command\":\"list\"}\n";
        let mut out = Vec::new();
        server().serve(BufReader::new(&input[..]), &mut out).await.unwrap();

        let lines = response_lines(out);
        assert_eq!(lines.len(), 2);
        let by_id = |id: u64| lines.iter().find(|l| l["id"] == id).unwrap();
        assert_eq!(
            by_id(1)["result"],
            serde_json::json!(["contract_test", "resiliency_test", "mock_server"])
        );
        assert_eq!(by_id(2)["result"], serde_json::json!({"status": "listing", "servers": []}));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_run_does_not_hold_up_later_requests() {
        let root = tempfile::tempdir().unwrap();
        let config = PilotConfig::new()
            .with_engine_command(vec!["sh".into(), "-c".into(), "sleep 2".into(), "sh".into()])
            .with_report_root(root.path().join("reports"))
            .with_staging_root(root.path().join("staging"));
        let server = StdioServer::new(Orchestrator::new(config).unwrap());

        let input = concat!(
            r#"{"id":"slow","op":"run_test","spec":"openapi: 3.0.0","base_url":"http://localhost:8080"}"#,
            "\n",
            r#"{"id":"fast","op":"capabilities"}"#,
            "\n",
        );
        let mut out = Vec::new();
        server.serve(BufReader::new(input.as_bytes()), &mut out).await.unwrap();

        let lines = response_lines(out);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], "fast");
        assert_eq!(lines[1]["id"], "slow");
        assert_eq!(lines[1]["ok"], true);
    }
}
