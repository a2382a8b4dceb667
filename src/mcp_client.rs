//! MCP (Model Context Protocol) client for browser automation
//!
//! Talks JSON-RPC 2.0 over stdio to a playwright-mcp server so pages can be
//! rendered in a real browser before their text is extracted.

use crate::SummarizeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, instrument, trace};

const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP client configuration
#[derive(Clone, Debug)]
pub struct McpConfig {
    /// Command to start MCP server
    pub server_command: Vec<String>,
    /// Browser operation timeout in seconds
    pub browser_timeout: u64,
    /// Seconds to let the page settle after navigation
    pub settle_time: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            server_command: vec![
                "npx".to_string(),
                "-y".to_string(),
                "@playwright/mcp@latest".to_string(),
                "--headless".to_string(),
            ],
            browser_timeout: 30,
            settle_time: 2,
        }
    }
}

/// MCP tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
struct McpRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
}

impl McpRequest {
    fn call(method: &str, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: Some(id),
        }
    }

    fn notification(method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.to_string(),
            params: Value::Object(serde_json::Map::new()),
            id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct McpResponse {
    #[serde(flatten)]
    result: McpResult,
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum McpResult {
    Success { result: Value },
    Error { error: McpError },
}

#[derive(Debug, Deserialize)]
struct McpError {
    #[allow(dead_code)]
    code: i32,
    message: String,
}

struct McpProcess {
    // spawned with kill_on_drop
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

fn mcp_error(message: impl Into<String>) -> SummarizeError {
    SummarizeError::ExternalServiceError {
        service: "MCP".to_string(),
        message: message.into(),
    }
}

/// MCP client for browser automation
pub struct McpClient {
    config: McpConfig,
    process: Arc<Mutex<Option<McpProcess>>>,
    request_id: AtomicU64,
    tools: Arc<Mutex<HashMap<String, McpTool>>>,
    /// Held across spawn and handshake; true once the server is usable.
    ready: Mutex<bool>,
}

impl McpClient {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            process: Arc::new(Mutex::new(None)),
            request_id: AtomicU64::new(0),
            tools: Arc::new(Mutex::new(HashMap::new())),
            ready: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        self.process.lock().await.is_some()
    }

    /// Start the MCP server (no-op when it is already running)
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SummarizeError> {
        let mut ready = self.ready.lock().await;
        if *ready {
            return Ok(());
        }

        {
            let mut process_guard = self.process.lock().await;

            let (program, args) = self
                .config
                .server_command
                .split_first()
                .ok_or_else(|| SummarizeError::InvalidConfiguration("empty MCP server command".into()))?;

            debug!("Starting MCP server with command: {:?}", self.config.server_command);

            let mut child = Command::new(program)
                .args(args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| mcp_error(format!("Failed to start MCP server: {e}")))?;

            if let Some(stderr) = child.stderr.take() {
                tokio::spawn(async move {
                    let mut stderr_reader = BufReader::new(stderr);
                    let mut line = String::new();
                    while let Ok(n) = stderr_reader.read_line(&mut line).await {
                        if n == 0 {
                            break;
                        }
                        debug!("MCP stderr: {}", line.trim());
                        line.clear();
                    }
                });
            }

            let stdin = child.stdin.take().ok_or_else(|| mcp_error("No stdin available"))?;
            let stdout = child.stdout.take().ok_or_else(|| mcp_error("No stdout available"))?;

            *process_guard = Some(McpProcess {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            });
        }

        if let Err(e) = self.initialize().await {
            self.kill().await;
            return Err(e);
        }

        *ready = true;
        Ok(())
    }

    /// Stop the MCP server
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), SummarizeError> {
        let mut ready = self.ready.lock().await;
        self.kill().await;
        *ready = false;
        Ok(())
    }

    async fn kill(&self) {
        let mut process_guard = self.process.lock().await;
        if let Some(mut process) = process_guard.take() {
            debug!("Stopping MCP server");
            let _ = process.child.kill().await;
        }
        self.tools.lock().await.clear();
    }

    /// Handshake and tool discovery
    async fn initialize(&self) -> Result<(), SummarizeError> {
        let init = McpRequest::call(
            "initialize",
            serde_json::json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
            self.next_request_id(),
        );
        Self::into_result(self.send_request(init).await?)?;

        self.send(&McpRequest::notification("notifications/initialized"))
            .await?;

        let tools_request = McpRequest::call(
            "tools/list",
            Value::Object(serde_json::Map::new()),
            self.next_request_id(),
        );
        let result = Self::into_result(self.send_request(tools_request).await?)?;

        if let Some(tools) = result.get("tools").and_then(|t| t.as_array()) {
            let mut tools_map = self.tools.lock().await;
            for tool in tools {
                if let Ok(mcp_tool) = serde_json::from_value::<McpTool>(tool.clone()) {
                    tools_map.insert(mcp_tool.name.clone(), mcp_tool);
                }
            }
            debug!("Discovered {} MCP tools", tools_map.len());
        }

        Ok(())
    }

    pub async fn has_tool(&self, name: &str) -> bool {
        self.tools.lock().await.contains_key(name)
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn into_result(response: McpResponse) -> Result<Value, SummarizeError> {
        match response.result {
            McpResult::Success { result } => Ok(result),
            McpResult::Error { error } => Err(mcp_error(error.message)),
        }
    }

    async fn write_line(process: &mut McpProcess, request: &McpRequest) -> Result<u64, SummarizeError> {
        let request_str = serde_json::to_string(request)?;
        trace!("Sending MCP message: {}", request_str);

        process
            .stdin
            .write_all(request_str.as_bytes())
            .await
            .map_err(|e| mcp_error(format!("Failed to write to stdin: {e}")))?;
        process
            .stdin
            .write_all(b"\n")
            .await
            .map_err(|e| mcp_error(format!("Failed to write newline: {e}")))?;
        process
            .stdin
            .flush()
            .await
            .map_err(|e| mcp_error(format!("Failed to flush stdin: {e}")))?;

        Ok(request.id.unwrap_or_default())
    }

    /// Send a message without waiting for a response
    async fn send(&self, request: &McpRequest) -> Result<(), SummarizeError> {
        let mut process_guard = self.process.lock().await;
        let process = process_guard
            .as_mut()
            .ok_or_else(|| mcp_error("MCP server not started"))?;
        Self::write_line(process, request).await?;
        Ok(())
    }

    /// Send a request and wait for the response carrying the same id
    async fn send_request(&self, request: McpRequest) -> Result<McpResponse, SummarizeError> {
        let mut process_guard = self.process.lock().await;
        let process = process_guard
            .as_mut()
            .ok_or_else(|| mcp_error("MCP server not started"))?;

        let id = Self::write_line(process, &request).await?;
        let timeout_secs = self.config.browser_timeout;

        timeout(Duration::from_secs(timeout_secs), async {
            let mut line = String::new();
            loop {
                line.clear();
                let n = process
                    .stdout
                    .read_line(&mut line)
                    .await
                    .map_err(|e| mcp_error(format!("Failed to read from stdout: {e}")))?;
                if n == 0 {
                    return Err(mcp_error("MCP server closed connection"));
                }

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                trace!("Received MCP message: {}", trimmed);

                // Server notifications and responses to other ids are skipped
                if let Ok(response) = serde_json::from_str::<McpResponse>(trimmed) {
                    if response.id == id {
                        return Ok(response);
                    }
                }
            }
        })
        .await
        .map_err(|_| mcp_error(format!("Request timed out after {timeout_secs} seconds")))?
    }

    /// Invoke an MCP tool and return its raw result
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, SummarizeError> {
        let request = McpRequest::call(
            "tools/call",
            serde_json::json!({ "name": name, "arguments": arguments }),
            self.next_request_id(),
        );
        let result = Self::into_result(self.send_request(request).await?)?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            let message = first_text(&result).unwrap_or_else(|| format!("tool {name} failed"));
            return Err(mcp_error(message));
        }
        Ok(result)
    }

    /// Navigate to a URL using the browser
    #[instrument(skip(self))]
    pub async fn navigate(&self, url: &str) -> Result<(), SummarizeError> {
        self.call_tool("browser_navigate", serde_json::json!({ "url": url }))
            .await?;
        Ok(())
    }

    /// Give the page time to finish client-side rendering
    pub async fn wait_for_load(&self) -> Result<(), SummarizeError> {
        self.call_tool(
            "browser_wait_for",
            serde_json::json!({ "time": self.config.settle_time }),
        )
        .await?;
        Ok(())
    }

    /// Evaluate JavaScript in the browser
    #[instrument(skip(self, script))]
    pub async fn evaluate(&self, script: &str) -> Result<Value, SummarizeError> {
        let result = self
            .call_tool("browser_evaluate", serde_json::json!({ "function": script }))
            .await?;

        match first_text(&result) {
            Some(text) => Ok(parse_evaluation(&text)),
            None => Ok(result),
        }
    }

    /// Remove every element matching one of `selectors` from the live page
    pub async fn remove_elements(&self, selectors: &[String]) -> Result<(), SummarizeError> {
        if selectors.is_empty() {
            return Ok(());
        }
        let script = removal_script(selectors)?;
        self.evaluate(&script).await?;
        Ok(())
    }

    /// Get the page content as text
    pub async fn get_page_text(&self) -> Result<String, SummarizeError> {
        let result = self.evaluate("() => document.body.innerText").await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SummarizeError::ExtractError("Failed to extract page text".to_string()))
    }

    /// Get the page HTML
    pub async fn get_page_html(&self) -> Result<String, SummarizeError> {
        let result = self
            .evaluate("() => document.documentElement.outerHTML")
            .await?;

        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| SummarizeError::ExtractError("Failed to extract page HTML".to_string()))
    }
}

/// First `text` item of a tool result's `content` array.
fn first_text(result: &Value) -> Option<String> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .and_then(|item| item.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// playwright-mcp wraps evaluation results in a markdown report; pull the value out.
fn parse_evaluation(text: &str) -> Value {
    let body = match text.find("### Result") {
        Some(start) => {
            let rest = &text[start + "### Result".len()..];
            let end = rest.find("\n###").unwrap_or(rest.len());
            rest[..end].trim()
        }
        None => text.trim(),
    };

    serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

fn removal_script(selectors: &[String]) -> Result<String, SummarizeError> {
    let selectors = serde_json::to_string(selectors)?;
    Ok(format!(
        "() => {{ let removed = 0; for (const s of {selectors}) {{ \
         document.querySelectorAll(s).forEach(el => {{ el.remove(); removed++; }}); }} \
         return removed; }}"
    ))
}
