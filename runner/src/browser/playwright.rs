//! # Backend Playwright
//!
//! Implementa [`Page`] conversando com um processo Node que carrega o
//! Playwright. O protocolo é uma linha JSON por mensagem:
//!
//! ```text
//! -> {"id": 3, "op": "fill", "target": {...}, "value": "alice", "options": null}
//! <- {"id": 3, "ok": true, "value": null}
//! <- {"id": 4, "ok": false, "error": "...", "notFound": true}
//! ```
//!
//! O script da ponte vem embutido no binário (`driver/playwright-bridge.js`)
//! e é executado com `node -e`, então `require('playwright')` resolve a
//! partir do diretório atual. `RUNNER_BRIDGE_SCRIPT` aponta para um script
//! alternativo em disco.
//!
//! ## Variáveis de ambiente:
//!
//! | Variável               | Padrão     |
//! |------------------------|------------|
//! | `RUNNER_BROWSER`       | chromium   |
//! | `RUNNER_HEADLESS`      | true       |
//! | `RUNNER_BASE_URL`      | (nenhuma)  |
//! | `RUNNER_NODE_BIN`      | node       |
//! | `RUNNER_BRIDGE_SCRIPT` | (embutido) |

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{FilePayload, Page, PageError, PageFactory};
use crate::config::parse_flag;
use crate::selector::Target;

const BRIDGE_SCRIPT: &str = include_str!("../../driver/playwright-bridge.js");

pub const DEFAULT_BROWSER: &str = "chromium";
pub const DEFAULT_NODE_BIN: &str = "node";

/// Tempo que `close` espera o processo da ponte encerrar.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// CONFIGURAÇÃO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaywrightConfig {
    /// `chromium`, `firefox` ou `webkit`.
    pub browser: String,
    pub headless: bool,
    /// Base para caminhos relativos de `goto`.
    pub base_url: Option<String>,
    pub node_bin: String,
    pub bridge_script: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: DEFAULT_BROWSER.to_string(),
            headless: true,
            base_url: None,
            node_bin: DEFAULT_NODE_BIN.to_string(),
            bridge_script: None,
        }
    }
}

impl PlaywrightConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(browser) = non_empty("RUNNER_BROWSER") {
            config.browser = browser.trim().to_ascii_lowercase();
        }
        if let Some(flag) = non_empty("RUNNER_HEADLESS").as_deref().and_then(parse_flag) {
            config.headless = flag;
        }
        config.base_url = non_empty("RUNNER_BASE_URL");
        if let Some(node) = non_empty("RUNNER_NODE_BIN") {
            config.node_bin = node;
        }
        config.bridge_script = non_empty("RUNNER_BRIDGE_SCRIPT").map(PathBuf::from);

        config
    }
}

// ============================================================================
// PÁGINA
// ============================================================================

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    not_found: bool,
}

/// Uma página de navegador real, servida pela ponte Node.
pub struct PlaywrightPage {
    bridge: Mutex<Bridge>,
    next_id: AtomicU64,
}

impl PlaywrightPage {
    /// Inicia a ponte, abre o navegador e cria uma página nova.
    #[instrument(skip_all, fields(browser = %config.browser, headless = config.headless))]
    pub async fn launch(config: &PlaywrightConfig) -> Result<Self, PageError> {
        let mut command = Command::new(&config.node_bin);
        match &config.bridge_script {
            Some(path) => command.arg(path),
            None => command.arg("-e").arg(BRIDGE_SCRIPT),
        };
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PageError::Protocol("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PageError::Protocol("bridge stdout unavailable".into()))?;

        let page = Self {
            bridge: Mutex::new(Bridge {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
            next_id: AtomicU64::new(1),
        };

        page.call(
            "launch",
            json!({
                "browser": config.browser,
                "headless": config.headless,
                "baseUrl": config.base_url,
            }),
        )
        .await?;

        info!("🌐 Navegador {} iniciado", config.browser);
        Ok(page)
    }

    /// Envia uma operação e aguarda a resposta de mesmo id.
    ///
    /// Respostas com id menor pertencem a chamadas canceladas (por exemplo,
    /// por timeout de ação) e são descartadas.
    async fn call(&self, op: &str, args: Value) -> Result<Value, PageError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = request_line(id, op, args)?;

        let mut bridge = self.bridge.lock().await;
        bridge.stdin.write_all(line.as_bytes()).await?;
        bridge.stdin.flush().await?;

        loop {
            let mut raw = String::new();
            if bridge.stdout.read_line(&mut raw).await? == 0 {
                return Err(PageError::Closed);
            }
            let reply: Reply = serde_json::from_str(raw.trim_end())
                .map_err(|e| PageError::Protocol(format!("invalid reply to '{}': {}", op, e)))?;

            if reply.id < id {
                debug!(stale = reply.id, "Descartando resposta atrasada");
                continue;
            }
            if reply.id != id {
                return Err(PageError::Protocol(format!(
                    "expected reply {} for '{}', got {}",
                    id, op, reply.id
                )));
            }
            return reply.into_result();
        }
    }

    async fn call_target(&self, op: &str, target: &Target, mut args: Value) -> Result<Value, PageError> {
        if let Value::Object(map) = &mut args {
            map.insert("target".into(), target_json(target)?);
        }
        self.call(op, args).await
    }
}

impl Reply {
    fn into_result(self) -> Result<Value, PageError> {
        if self.ok {
            return Ok(self.value.unwrap_or(Value::Null));
        }
        let message = self.error.unwrap_or_else(|| "unknown bridge error".into());
        if self.not_found {
            Err(PageError::NotFound(message))
        } else {
            Err(PageError::Automation(message))
        }
    }
}

fn request_line(id: u64, op: &str, args: Value) -> Result<String, PageError> {
    let mut request = serde_json::Map::new();
    request.insert("id".into(), json!(id));
    request.insert("op".into(), json!(op));
    if let Value::Object(extra) = args {
        request.extend(extra);
    }
    let mut line = serde_json::to_string(&Value::Object(request))
        .map_err(|e| PageError::Protocol(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

fn target_json(target: &Target) -> Result<Value, PageError> {
    serde_json::to_value(target).map_err(|e| PageError::Protocol(e.to_string()))
}

fn file_json(file: &FilePayload) -> Value {
    match file {
        FilePayload::Path(path) => json!({ "path": path.to_string_lossy() }),
        FilePayload::Buffer {
            name,
            mime_type,
            bytes,
        } => json!({
            "name": name,
            "mimeType": mime_type,
            "buffer": STANDARD.encode(bytes),
        }),
    }
}

fn expect_string(op: &str, value: Value) -> Result<String, PageError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(PageError::Protocol(format!("'{}' returned {}", op, other))),
    }
}

fn optional_string(op: &str, value: Value) -> Result<Option<String>, PageError> {
    match value {
        Value::Null => Ok(None),
        other => expect_string(op, other).map(Some),
    }
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, url: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.call("goto", json!({ "url": url, "options": options })).await?;
        Ok(())
    }

    async fn count(&self, target: &Target) -> Result<usize, PageError> {
        let value = self.call_target("count", target, json!({})).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| PageError::Protocol(format!("'count' returned {}", value)))
    }

    async fn fill(&self, target: &Target, value: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.call_target("fill", target, json!({ "value": value, "options": options }))
            .await?;
        Ok(())
    }

    async fn type_text(&self, target: &Target, text: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.call_target("type", target, json!({ "text": text, "options": options }))
            .await?;
        Ok(())
    }

    async fn click(&self, target: &Target, options: Option<&Value>) -> Result<(), PageError> {
        self.call_target("click", target, json!({ "options": options })).await?;
        Ok(())
    }

    async fn hover(&self, target: &Target, options: Option<&Value>) -> Result<(), PageError> {
        self.call_target("hover", target, json!({ "options": options })).await?;
        Ok(())
    }

    async fn press(&self, target: &Target, key: &str, options: Option<&Value>) -> Result<(), PageError> {
        self.call_target("press", target, json!({ "key": key, "options": options }))
            .await?;
        Ok(())
    }

    async fn set_input_files(&self, target: &Target, files: &[FilePayload]) -> Result<(), PageError> {
        let files: Vec<Value> = files.iter().map(file_json).collect();
        self.call_target("setInputFiles", target, json!({ "files": files }))
            .await?;
        Ok(())
    }

    async fn wait_for_timeout(&self, ms: u64) -> Result<(), PageError> {
        self.call("waitForTimeout", json!({ "ms": ms })).await?;
        Ok(())
    }

    async fn title(&self) -> Result<String, PageError> {
        let value = self.call("title", json!({})).await?;
        expect_string("title", value)
    }

    async fn url(&self) -> Result<String, PageError> {
        let value = self.call("url", json!({})).await?;
        expect_string("url", value)
    }

    async fn content(&self) -> Result<String, PageError> {
        let value = self.call("content", json!({})).await?;
        expect_string("content", value)
    }

    async fn is_visible(&self, target: &Target) -> Result<bool, PageError> {
        let value = self.call_target("isVisible", target, json!({})).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(&self, target: &Target) -> Result<Option<String>, PageError> {
        let value = self.call_target("textContent", target, json!({})).await?;
        optional_string("textContent", value)
    }

    async fn input_value(&self, target: &Target) -> Result<String, PageError> {
        let value = self.call_target("inputValue", target, json!({})).await?;
        expect_string("inputValue", value)
    }

    async fn get_attribute(&self, target: &Target, name: &str) -> Result<Option<String>, PageError> {
        let value = self
            .call_target("getAttribute", target, json!({ "name": name }))
            .await?;
        optional_string("getAttribute", value)
    }

    async fn computed_style(&self, target: &Target, property: &str) -> Result<String, PageError> {
        let value = self
            .call_target("computedStyle", target, json!({ "property": property }))
            .await?;
        expect_string("computedStyle", value)
    }

    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, PageError> {
        self.call("evaluate", json!({ "script": script, "arg": arg })).await
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), PageError> {
        self.call("mouse.move", json!({ "x": x, "y": y })).await?;
        Ok(())
    }

    async fn mouse_down(&self) -> Result<(), PageError> {
        self.call("mouse.down", json!({})).await?;
        Ok(())
    }

    async fn mouse_up(&self) -> Result<(), PageError> {
        self.call("mouse.up", json!({})).await?;
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64, click_count: u32) -> Result<(), PageError> {
        self.call("mouse.click", json!({ "x": x, "y": y, "clickCount": click_count }))
            .await?;
        Ok(())
    }

    async fn keyboard_press(&self, key: &str) -> Result<(), PageError> {
        self.call("keyboard.press", json!({ "key": key })).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), PageError> {
        let closed = self.call("close", json!({})).await;
        let mut bridge = self.bridge.lock().await;
        match tokio::time::timeout(CLOSE_GRACE, bridge.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(?status, "Ponte encerrada");
            }
            Err(_) => {
                warn!("⚠️ Ponte não encerrou em {:?}, finalizando processo", CLOSE_GRACE);
                bridge.child.kill().await?;
            }
        }
        closed.map(|_| ())
    }
}

// ============================================================================
// FÁBRICA
// ============================================================================

/// Abre uma página (e um navegador) novos a cada chamada.
#[derive(Debug, Clone, Default)]
pub struct PlaywrightLauncher {
    pub config: PlaywrightConfig,
}

impl PlaywrightLauncher {
    pub fn new(config: PlaywrightConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PageFactory for PlaywrightLauncher {
    async fn open(&self) -> anyhow::Result<Box<dyn Page>> {
        let page = PlaywrightPage::launch(&self.config)
            .await
            .with_context(|| {
                format!(
                    "Failed to start {} through '{}'",
                    self.config.browser, self.config.node_bin
                )
            })?;
        Ok(Box::new(page))
    }
}

// ============================================================================
// TESTES
// ============================================================================
