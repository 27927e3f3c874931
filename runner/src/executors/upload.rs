//! # Executor de Upload
//!
//! Preenche um `<input type="file">` com um ou mais arquivos.
//!
//! ## Origem dos arquivos (ordem de precedência):
//!
//! 1. `files`: cada entrada é `contentBase64` (vira buffer em memória,
//!    nome padrão `upload.bin`) ou `path`
//! 2. `data`: string ou lista de strings com caminhos
//!
//! Caminhos relativos são resolvidos contra o diretório de trabalho quando
//! `resolveFrom` é `cwd` (padrão); com `none` são usados como vieram.
//!
//! ## Exemplo:
//!
//! ```json
//! {
//!   "action": "upload",
//!   "selector": "input[type=file]",
//!   "clearFirst": true,
//!   "files": [{ "contentBase64": "aGVsbG8=", "name": "a.txt", "mimeType": "text/plain" }]
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use tracing::info;

use crate::browser::{FilePayload, Page};
use crate::context::Context;
use crate::errors::EngineError;
use crate::protocol::{ResolveFrom, TestStep};
use crate::selector::Target;

use super::ActionExecutor;

/// Nome usado para buffers sem `name`.
pub const DEFAULT_UPLOAD_NAME: &str = "upload.bin";

/// Executor da action `upload`.
///
/// `cwd` fica fixo na construção para que a resolução de caminhos seja
/// determinística dentro de uma run.
#[derive(Debug, Clone)]
pub struct UploadExecutor {
    cwd: PathBuf,
}

impl Default for UploadExecutor {
    fn default() -> Self {
        Self::with_cwd(std::env::current_dir().unwrap_or_default())
    }
}

impl UploadExecutor {
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Monta a lista de arquivos do step.
    pub fn collect_payloads(&self, step: &TestStep) -> Result<Vec<FilePayload>, EngineError> {
        let mut payloads = Vec::with_capacity(step.files.len());

        for file in &step.files {
            if let Some(encoded) = file.content_base64.as_deref() {
                let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
                    EngineError::action(step.action.as_str(), format!("invalid contentBase64: {}", e))
                })?;
                payloads.push(FilePayload::Buffer {
                    name: file
                        .name
                        .clone()
                        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string()),
                    mime_type: file.mime_type.clone(),
                    bytes,
                });
            } else if let Some(path) = file.path.as_deref().filter(|p| !p.is_empty()) {
                payloads.push(FilePayload::Path(self.resolve_path(path, step.resolve_from)));
            }
        }

        if payloads.is_empty() {
            let paths: Vec<&str> = match &step.data {
                Some(Value::String(path)) => vec![path.as_str()],
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
                _ => Vec::new(),
            };
            payloads.extend(
                paths
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .map(|p| FilePayload::Path(self.resolve_path(p, step.resolve_from))),
            );
        }

        if payloads.is_empty() {
            return Err(EngineError::NoUploadSource);
        }
        Ok(payloads)
    }

    fn resolve_path(&self, raw: &str, resolve_from: ResolveFrom) -> PathBuf {
        match resolve_from {
            ResolveFrom::None => PathBuf::from(raw),
            ResolveFrom::Cwd if is_rooted(raw) => PathBuf::from(raw),
            ResolveFrom::Cwd => self.cwd.join(raw),
        }
    }
}

/// Absoluto no host, ou com letra de drive (`C:\`, `C:/`) em qualquer host.
fn is_rooted(raw: &str) -> bool {
    if Path::new(raw).is_absolute() {
        return true;
    }
    let bytes = raw.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

#[async_trait]
impl ActionExecutor for UploadExecutor {
    async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        target: Option<&Target>,
        _context: &mut Context,
    ) -> Result<(), EngineError> {
        let target = target.ok_or(EngineError::UploadTargetMissing)?;
        let payloads = self.collect_payloads(step)?;
        info!(target = %target, files = payloads.len(), clear_first = step.clear_first, "📎 Upload");

        if step.clear_first {
            page.set_input_files(target, &[])
                .await
                .map_err(|e| EngineError::action(step.action.as_str(), e))?;
        }
        page.set_input_files(target, &payloads)
            .await
            .map_err(|e| EngineError::action(step.action.as_str(), e))
    }
}

// ============================================================================
// TESTES
// ============================================================================
