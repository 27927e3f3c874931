//! Handlers shipped with the runner.

use anyhow::{anyhow, bail, Context as _};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{CustomAction, CustomValidation, Registry, ValidationScope};
use crate::assertions::expect::Check;
use crate::browser::{Page, PageError};
use crate::context::Context;
use crate::protocol::{js_string, SelectorStrategy, TestStep, ValidationStep};
use crate::selector::resolve;

pub(super) fn register(registry: &mut Registry) {
    registry
        .register_action("selectWord", SelectWord)
        .register_action("queryResponse", QueryResponse)
        .register_validation("containsText", ContainsText);
}

// ============================================================================
// selectWord
// ============================================================================

/// Page-side lookup of the `nth` occurrence of `word` (optionally inside
/// `selector`). Returns its client rects or `null`.
const WORD_BOX_SCRIPT: &str = r#"({ word, selector, nth }) => {
  const root = (selector && document.querySelector(selector)) || document;
  const walker = document.createTreeWalker(root, NodeFilter.SHOW_TEXT);
  let count = 0;
  let node;
  while ((node = walker.nextNode())) {
    const text = node.data;
    let from = 0;
    for (;;) {
      const idx = text.indexOf(word, from);
      if (idx === -1) break;
      if (count === nth) {
        const range = document.createRange();
        range.setStart(node, idx);
        range.setEnd(node, idx + word.length);
        const rects = range.getClientRects();
        const first = rects[0];
        const last = rects[rects.length - 1];
        const b = range.getBoundingClientRect();
        return {
          startX: first ? first.left : b.left,
          startY: first ? first.top : b.top,
          endX: last ? last.right : b.right,
          endY: last ? last.bottom : b.bottom,
          centerX: b.left + b.width / 2,
          centerY: b.top + b.height / 2,
        };
      }
      count++;
      from = idx + word.length;
    }
  }
  return null;
}"#;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SelectMode {
    #[default]
    Mouse,
    Keyboard,
    Auto,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MouseMethod {
    #[default]
    Double,
    Drag,
}

#[derive(Debug, Deserialize)]
struct SelectWordData {
    word: String,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    nth: u64,
    #[serde(default)]
    mode: SelectMode,
    #[serde(default)]
    method: MouseMethod,
    #[serde(default)]
    wordwise: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WordBox {
    start_x: f64,
    start_y: f64,
    end_x: f64,
    end_y: f64,
    center_x: f64,
    center_y: f64,
}

/// Word-wise "extend selection right" chord for the host OS.
fn wordwise_chord(os: &str) -> &'static str {
    match os {
        "windows" => "Control+Shift+ArrowRight",
        _ => "Alt+Shift+ArrowRight",
    }
}

/// Selects one occurrence of a word on the page, with the mouse (double
/// click or drag) or with the keyboard.
pub struct SelectWord;

#[async_trait]
impl CustomAction for SelectWord {
    async fn run(&self, page: &dyn Page, step: &TestStep, _context: &mut Context) -> anyhow::Result<()> {
        let has_word = step
            .data
            .as_ref()
            .and_then(|d| d.get("word"))
            .filter(|w| !w.is_null())
            .map(|w| !js_string(w).is_empty())
            .unwrap_or(false);
        if !has_word {
            bail!("Step data must include a 'word' property.");
        }
        let data: SelectWordData = serde_json::from_value(step.data.clone().unwrap_or_default())
            .context("invalid selectWord data")?;
        info!(word = %data.word, mode = ?data.mode, "🖱️ selectWord");

        let found = page
            .evaluate(
                WORD_BOX_SCRIPT,
                json!({ "word": data.word, "selector": data.selector, "nth": data.nth }),
            )
            .await?;
        if found.is_null() {
            let within = data
                .selector
                .as_deref()
                .map(|s| format!(" within '{}'", s))
                .unwrap_or_default();
            bail!("Word '{}' not found{}.", data.word, within);
        }
        let b: WordBox = serde_json::from_value(found).context("unexpected word box shape")?;

        page.mouse_move(b.center_x, b.center_y).await?;

        if matches!(data.mode, SelectMode::Mouse | SelectMode::Auto) {
            match data.method {
                MouseMethod::Double => page.mouse_click(b.center_x, b.center_y, 2).await?,
                MouseMethod::Drag => {
                    page.mouse_move(b.start_x, b.start_y).await?;
                    page.mouse_down().await?;
                    page.mouse_move(b.end_x, b.end_y).await?;
                    page.mouse_up().await?;
                }
            }
            return Ok(());
        }

        page.mouse_click(b.start_x, b.start_y, 1).await?;
        if data.wordwise {
            page.keyboard_press(wordwise_chord(std::env::consts::OS)).await?;
        } else {
            for _ in data.word.chars() {
                page.keyboard_press("Shift+ArrowRight").await?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// queryResponse
// ============================================================================

/// Types a response into a text box and confirms it.
///
/// `data`: `{ "selector": { "fillResponse": css, "clickDone": css }, "responseText": "..." }`.
/// Each element is used only when it is present on the page.
pub struct QueryResponse;

#[async_trait]
impl CustomAction for QueryResponse {
    async fn run(&self, page: &dyn Page, step: &TestStep, _context: &mut Context) -> anyhow::Result<()> {
        let data = step.data.as_ref().unwrap_or(&Value::Null);
        let selectors = data
            .get("selector")
            .filter(|s| s.is_object())
            .ok_or_else(|| anyhow!("queryResponse requires 'data.selector'"))?;
        let text = data.get("responseText").map(js_string).unwrap_or_default();

        if let Some(css) = selectors.get("fillResponse").and_then(Value::as_str) {
            let target = resolve(css, &SelectorStrategy::Css)?;
            if page.count(&target).await? > 0 {
                page.fill(&target, &text, None).await?;
            } else {
                debug!(selector = css, "response box not present");
            }
        }

        if let Some(css) = selectors.get("clickDone").and_then(Value::as_str) {
            let target = resolve(css, &SelectorStrategy::Css)?;
            if page.count(&target).await? > 0 {
                page.click(&target, None).await?;
            } else {
                debug!(selector = css, "done button not present");
            }
        }
        Ok(())
    }
}

// ============================================================================
// containsText
// ============================================================================

/// Passes when the target's text (or the page HTML, without a target)
/// contains `data`.
pub struct ContainsText;

#[async_trait]
impl CustomValidation for ContainsText {
    async fn check(
        &self,
        page: &dyn Page,
        validation: &ValidationStep,
        scope: ValidationScope<'_>,
    ) -> anyhow::Result<()> {
        let needle = validation.data_string();
        if needle.is_empty() {
            bail!("Custom validation 'containsText' requires 'data' with expected substring");
        }
        let needle = needle.as_str();
        let target = scope.target;

        let outcome = scope
            .expect
            .poll(move || async move {
                let haystack = match target {
                    Some(t) => page.text_content(t).await?.unwrap_or_default(),
                    None => page.content().await?,
                };
                Ok::<_, PageError>(Check::from_bool(haystack.contains(needle), haystack))
            })
            .await;

        outcome.map_err(|_| {
            anyhow!(validation
                .message
                .clone()
                .unwrap_or_else(|| format!("Expected text to include: {}", needle)))
        })
    }
}
