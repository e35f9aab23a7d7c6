//! Scenario runner.
//!
//! A scenario is one JSON-RPC request plus a check on its response. Every
//! scenario is isolated: a transport error or a failed check is recorded in
//! the [`SuiteReport`] and the next scenario still runs.

pub mod http;
pub mod stdio;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::models::jsonrpc::{Request, Response};
use crate::AppError;

/// Client identity sent in every `initialize` request.
pub const CLIENT_NAME: &str = "test-client";

/// Client version sent in every `initialize` request.
pub const CLIENT_VERSION: &str = "1.0.0";

/// Number of tool entries logged from a `tools/list` result.
pub const TOOLS_PREVIEW: usize = 3;

/// Response shape a scenario expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// `id` echoes the request and a `result` is present.
    Initialize,
    /// `result.tools` is a sequence.
    ToolsList,
    /// A `result` is present; its first text content is logged.
    ToolCall,
}

/// One request to issue and how to judge its response.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Human-readable label.
    pub name: String,
    /// Request to send.
    pub request: Request,
    /// Expected response shape.
    pub check: Check,
}

impl Scenario {
    /// `initialize` with the given protocol version.
    #[must_use]
    pub fn initialize(id: i64, protocol_version: &str) -> Self {
        Self {
            name: "initialize".into(),
            request: Request::new(
                id,
                "initialize",
                Some(json!({
                    "protocolVersion": protocol_version,
                    "capabilities": {},
                    "clientInfo": {"name": CLIENT_NAME, "version": CLIENT_VERSION},
                })),
            ),
            check: Check::Initialize,
        }
    }

    /// `tools/list` with no params.
    #[must_use]
    pub fn tools_list(id: i64) -> Self {
        Self {
            name: "tools/list".into(),
            request: Request::new(id, "tools/list", None),
            check: Check::ToolsList,
        }
    }

    /// `tools/call` for `tool` with `arguments`.
    #[must_use]
    pub fn tool_call(id: i64, tool: &str, arguments: Value) -> Self {
        Self {
            name: format!("tools/call {tool}"),
            request: Request::new(
                id,
                "tools/call",
                Some(json!({"name": tool, "arguments": arguments})),
            ),
            check: Check::ToolCall,
        }
    }

    /// Judge the result of sending this scenario's request.
    #[must_use]
    pub fn evaluate(&self, result: crate::Result<Response>) -> ScenarioOutcome {
        let status = match result {
            Err(err) => {
                error!(scenario = %self.name, %err, "scenario failed");
                Status::Errored(err)
            }
            Ok(response) => match self.verify(&response) {
                Ok(()) => {
                    info!(scenario = %self.name, "scenario passed");
                    Status::Passed(response)
                }
                Err(reason) => {
                    warn!(scenario = %self.name, %reason, %response, "unexpected response");
                    Status::CheckFailed { response, reason }
                }
            },
        };

        ScenarioOutcome {
            name: self.name.clone(),
            status,
        }
    }

    fn verify(&self, response: &Response) -> std::result::Result<(), String> {
        if let Some(err) = response.error() {
            return Err(format!("server returned error: {err}"));
        }
        let result = response
            .result()
            .ok_or_else(|| "response has no result".to_owned())?;

        match self.check {
            Check::Initialize => {
                self.expect_id_echo(response)?;
                if let Some(server) = result.get("serverInfo") {
                    let name = server.get("name").and_then(Value::as_str).unwrap_or("?");
                    let version = server.get("version").and_then(Value::as_str).unwrap_or("?");
                    let protocol = result
                        .get("protocolVersion")
                        .and_then(Value::as_str)
                        .unwrap_or("?");
                    info!(server = name, version, protocol, "initialize: server identified");
                }
                Ok(())
            }
            Check::ToolsList => {
                self.expect_id_echo(response)?;
                let tools = result
                    .get("tools")
                    .and_then(Value::as_array)
                    .ok_or_else(|| "result.tools is not a sequence".to_owned())?;
                info!(count = tools.len(), "tools/list: tools found");
                for tool in tools.iter().take(TOOLS_PREVIEW) {
                    let name = tool.get("name").and_then(Value::as_str).unwrap_or("?");
                    let description = tool
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("N/A");
                    info!(name, description, "tools/list: tool");
                }
                Ok(())
            }
            Check::ToolCall => {
                let text = result
                    .pointer("/content/0/text")
                    .and_then(Value::as_str)
                    .unwrap_or("No result");
                info!(scenario = %self.name, result = text, "tools/call: result");
                Ok(())
            }
        }
    }

    fn expect_id_echo(&self, response: &Response) -> std::result::Result<(), String> {
        if response.id().as_ref() == Some(&self.request.id) {
            return Ok(());
        }
        let got = response.as_value().get("id").cloned().unwrap_or(Value::Null);
        Err(format!("expected id {}, got {got}", self.request.id))
    }
}

/// Result classification for one scenario.
#[derive(Debug)]
pub enum Status {
    /// Response arrived and matched the expected shape.
    Passed(Response),
    /// Response arrived but did not match the expected shape.
    CheckFailed {
        /// The response as received.
        response: Response,
        /// Why the check failed.
        reason: String,
    },
    /// The transport produced no usable response.
    Errored(AppError),
}

/// Named outcome of one scenario.
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Scenario label.
    pub name: String,
    /// What happened.
    pub status: Status,
}

impl ScenarioOutcome {
    /// Outcome for a phase that failed before any request was sent.
    #[must_use]
    pub fn errored(name: impl Into<String>, err: AppError) -> Self {
        let name = name.into();
        error!(scenario = %name, %err, "phase failed");
        Self {
            name,
            status: Status::Errored(err),
        }
    }

    /// `true` if the scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self.status, Status::Passed(_))
    }

    /// The response, if one arrived.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        match &self.status {
            Status::Passed(response) | Status::CheckFailed { response, .. } => Some(response),
            Status::Errored(_) => None,
        }
    }
}

/// Collected outcomes for one transport.
#[derive(Debug)]
pub struct SuiteReport {
    /// Transport label (`stdio` or `http`).
    pub transport: &'static str,
    /// Outcomes in execution order.
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// Empty report for `transport`.
    #[must_use]
    pub fn new(transport: &'static str) -> Self {
        Self {
            transport,
            outcomes: Vec::new(),
        }
    }

    /// Append an outcome.
    pub fn record(&mut self, outcome: ScenarioOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of passed scenarios.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of scenarios that did not pass.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    /// `true` if at least one scenario ran and none failed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == 0
    }

    /// Emit a one-line summary.
    pub fn log_summary(&self) {
        info!(
            transport = self.transport,
            passed = self.passed(),
            failed = self.failed(),
            "suite complete"
        );
    }
}
