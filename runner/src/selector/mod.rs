// Module: Selector
// Turns a selector + strategy into a Target the page can act on.
// Resolution is pure: it never touches the page, so zero matches only
// surface when an action or assertion is evaluated against the target.

use std::fmt;

use serde::Serialize;

use crate::errors::EngineError;
use crate::protocol::{SelectorStrategy, TestStep, ValidationStep};

/// How the automation layer should locate the element(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Locator {
    /// A selector string for the layer's selector engine (`#id`, `xpath=...`, `text=...`, css).
    Selector(String),
    /// Test-id attribute lookup.
    TestId(String),
}

/// A resolved handle referring to zero, one or many elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub locator: Locator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nth: Option<usize>,
}

impl Target {
    pub fn new(locator: Locator) -> Self {
        Self { locator, nth: None }
    }

    /// Narrows the match set to the element at `index` (0-based).
    pub fn narrowed(mut self, index: Option<usize>) -> Self {
        if index.is_some() {
            self.nth = index;
        }
        self
    }

    /// The element at `index` of this target's match set. A target already
    /// narrowed to one element only has index 0, which is itself.
    pub fn element(&self, index: usize) -> Target {
        match self.nth {
            Some(_) => self.clone(),
            None => Target {
                locator: self.locator.clone(),
                nth: Some(index),
            },
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.locator {
            Locator::Selector(selector) => write!(f, "{}", selector)?,
            Locator::TestId(id) => write!(f, "testId={}", id)?,
        }
        if let Some(nth) = self.nth {
            write!(f, " >> nth={}", nth)?;
        }
        Ok(())
    }
}

/// Maps `selector` through `strategy`.
pub fn resolve(selector: &str, strategy: &SelectorStrategy) -> Result<Target, EngineError> {
    let locator = match strategy {
        SelectorStrategy::Css => Locator::Selector(selector.to_string()),
        SelectorStrategy::Xpath => Locator::Selector(format!("xpath={}", selector)),
        SelectorStrategy::Id => Locator::Selector(format!("#{}", selector)),
        SelectorStrategy::Text => Locator::Selector(format!("text={}", selector)),
        SelectorStrategy::TestId => Locator::TestId(selector.to_string()),
        SelectorStrategy::Unsupported(name) => {
            return Err(EngineError::UnsupportedSelectorType(name.clone()))
        }
    };
    Ok(Target::new(locator))
}

/// Target of a step, `None` when the step has no selector.
pub fn resolve_step(step: &TestStep) -> Result<Option<Target>, EngineError> {
    resolve_optional(
        step.selector.as_deref(),
        step.selector_type.as_ref(),
        step.nth_index(),
    )
}

/// Target named by the validation itself, `None` when it has no selector.
pub fn resolve_validation(validation: &ValidationStep) -> Result<Option<Target>, EngineError> {
    resolve_optional(
        validation.selector.as_deref(),
        validation.selector_type.as_ref(),
        validation.nth_index(),
    )
}

fn resolve_optional(
    selector: Option<&str>,
    strategy: Option<&SelectorStrategy>,
    nth: Option<usize>,
) -> Result<Option<Target>, EngineError> {
    let Some(selector) = selector.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let strategy = strategy.unwrap_or(&SelectorStrategy::Css);
    Ok(Some(resolve(selector, strategy)?.narrowed(nth)))
}
