// Module: Browser
// The page handle the engine drives. The engine never creates or destroys
// a page: callers inject one per run (or share one across a batch).

pub mod playwright;

#[cfg(test)]
pub(crate) mod fake;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::selector::Target;

#[derive(Debug, Error)]
pub enum PageError {
    #[error("no element matches '{0}'")]
    NotFound(String),

    #[error("{0}")]
    Automation(String),

    #[error("browser bridge closed")]
    Closed,

    #[error("browser bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser bridge protocol error: {0}")]
    Protocol(String),
}

/// One file handed to a file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    Path(PathBuf),
    Buffer {
        name: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Automation-layer session: navigation, element location, mouse/keyboard
/// primitives, file inputs, timed waits and the reads assertions poll on.
///
/// Element operations act on the first element of the target's match set
/// (or its `nth` element) and fail with [`PageError::NotFound`] when the
/// set is empty.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, options: Option<&Value>) -> Result<(), PageError>;

    /// Number of elements currently matching `target`.
    async fn count(&self, target: &Target) -> Result<usize, PageError>;

    async fn fill(&self, target: &Target, value: &str, options: Option<&Value>)
        -> Result<(), PageError>;

    /// Keystroke-by-keystroke entry.
    async fn type_text(&self, target: &Target, text: &str, options: Option<&Value>)
        -> Result<(), PageError>;

    async fn click(&self, target: &Target, options: Option<&Value>) -> Result<(), PageError>;

    async fn hover(&self, target: &Target, options: Option<&Value>) -> Result<(), PageError>;

    async fn press(&self, target: &Target, key: &str, options: Option<&Value>)
        -> Result<(), PageError>;

    /// Replaces the file list of a file input; an empty slice clears it.
    async fn set_input_files(&self, target: &Target, files: &[FilePayload])
        -> Result<(), PageError>;

    async fn wait_for_timeout(&self, ms: u64) -> Result<(), PageError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    async fn title(&self) -> Result<String, PageError>;

    async fn url(&self) -> Result<String, PageError>;

    /// Full HTML of the page.
    async fn content(&self) -> Result<String, PageError>;

    /// `false` when nothing matches.
    async fn is_visible(&self, target: &Target) -> Result<bool, PageError>;

    async fn text_content(&self, target: &Target) -> Result<Option<String>, PageError>;

    async fn input_value(&self, target: &Target) -> Result<String, PageError>;

    async fn get_attribute(&self, target: &Target, name: &str)
        -> Result<Option<String>, PageError>;

    async fn computed_style(&self, target: &Target, property: &str) -> Result<String, PageError>;

    /// Runs a page-side function `script` with a JSON argument.
    async fn evaluate(&self, script: &str, arg: Value) -> Result<Value, PageError>;

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), PageError>;

    async fn mouse_down(&self) -> Result<(), PageError>;

    async fn mouse_up(&self) -> Result<(), PageError>;

    async fn mouse_click(&self, x: f64, y: f64, click_count: u32) -> Result<(), PageError>;

    async fn keyboard_press(&self, key: &str) -> Result<(), PageError>;

    /// Releases the underlying session. Only hosts call this, never the engine.
    async fn close(&self) -> Result<(), PageError> {
        Ok(())
    }
}

/// Opens fresh pages for hosts that run several test cases.
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn open(&self) -> anyhow::Result<Box<dyn Page>>;
}
