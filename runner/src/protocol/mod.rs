// Module: Protocol
// Test-case documents consumed by the engine and the run report it produces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// TEST CASE DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_order: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    pub test_steps: Vec<TestStep>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_type: Option<SelectorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_time: Option<u64>,
    #[serde(default)]
    pub iterate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_options: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<UploadFile>,
    #[serde(default)]
    pub resolve_from: ResolveFrom,
    #[serde(default)]
    pub clear_first: bool,
    #[serde(default)]
    pub validations: Vec<ValidationStep>,
}

impl TestStep {
    /// Builds a bare step for `action` with every optional field unset.
    pub fn new(action: Action) -> Self {
        Self {
            step_name: None,
            action,
            selector: None,
            selector_type: None,
            path: None,
            data: None,
            nth: None,
            wait_time: None,
            iterate: false,
            custom_name: None,
            action_options: None,
            files: Vec::new(),
            resolve_from: ResolveFrom::default(),
            clear_first: false,
            validations: Vec::new(),
        }
    }

    /// `data` rendered the way a JavaScript `String(data)` call would.
    /// Absent data renders as an empty string.
    pub fn data_string(&self) -> String {
        self.data.as_ref().map(js_string).unwrap_or_default()
    }

    /// Index narrowing, ignoring negative values.
    pub fn nth_index(&self) -> Option<usize> {
        self.nth.and_then(|n| usize::try_from(n).ok())
    }

    /// Title used in the run report.
    pub fn title(&self, index: usize) -> String {
        match &self.step_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("Step {}: {}", index + 1, self.action),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveFrom {
    #[default]
    Cwd,
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStep {
    #[serde(rename = "type")]
    pub kind: ValidationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_type: Option<SelectorStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nth: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub soft: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_options: Option<Value>,
}

impl ValidationStep {
    pub fn new(kind: ValidationKind) -> Self {
        Self {
            kind,
            selector: None,
            selector_type: None,
            nth: None,
            data: None,
            message: None,
            soft: false,
            attribute: None,
            css_property: None,
            custom_name: None,
            expect_options: None,
        }
    }

    pub fn data_string(&self) -> String {
        self.data.as_ref().map(js_string).unwrap_or_default()
    }

    pub fn nth_index(&self) -> Option<usize> {
        self.nth.and_then(|n| usize::try_from(n).ok())
    }
}

// ============================================================================
// INSTRUCTION SET
// ============================================================================
// Unknown names are kept instead of rejected at parse time: the engine
// reports them when (and only if) the step is reached.

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Goto,
    Fill,
    Type,
    Click,
    Hover,
    Press,
    Upload,
    WaitForTimeout,
    Custom,
    Unsupported(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Goto => "goto",
            Self::Fill => "fill",
            Self::Type => "type",
            Self::Click => "click",
            Self::Hover => "hover",
            Self::Press => "press",
            Self::Upload => "upload",
            Self::WaitForTimeout => "waitForTimeout",
            Self::Custom => "custom",
            Self::Unsupported(name) => name,
        }
    }

    /// Actions that operate on an element rather than the page.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            Self::Fill | Self::Type | Self::Click | Self::Hover | Self::Press | Self::Upload
        )
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "goto" => Self::Goto,
            "fill" => Self::Fill,
            "type" => Self::Type,
            "click" => Self::Click,
            "hover" => Self::Hover,
            "press" => Self::Press,
            "upload" => Self::Upload,
            "waitForTimeout" => Self::WaitForTimeout,
            "custom" => Self::Custom,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum SelectorStrategy {
    Css,
    Xpath,
    Id,
    Text,
    TestId,
    Unsupported(String),
}

impl SelectorStrategy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Css => "css",
            Self::Xpath => "xpath",
            Self::Id => "id",
            Self::Text => "text",
            Self::TestId => "testId",
            Self::Unsupported(name) => name,
        }
    }
}

impl From<String> for SelectorStrategy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "css" => Self::Css,
            "xpath" => Self::Xpath,
            "id" => Self::Id,
            "text" => Self::Text,
            "testId" => Self::TestId,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<SelectorStrategy> for String {
    fn from(value: SelectorStrategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SelectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum ValidationKind {
    ToBeVisible,
    ToBeHidden,
    ToHaveTitle,
    ToHaveUrl,
    ToHaveText,
    ToHaveValue,
    ToHaveAttribute,
    ToHaveCss,
    ToHaveClass,
    Custom,
    Unsupported(String),
}

impl ValidationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ToBeVisible => "toBeVisible",
            Self::ToBeHidden => "toBeHidden",
            Self::ToHaveTitle => "toHaveTitle",
            Self::ToHaveUrl => "toHaveURL",
            Self::ToHaveText => "toHaveText",
            Self::ToHaveValue => "toHaveValue",
            Self::ToHaveAttribute => "toHaveAttribute",
            Self::ToHaveCss => "toHaveCSS",
            Self::ToHaveClass => "toHaveClass",
            Self::Custom => "custom",
            Self::Unsupported(name) => name,
        }
    }

    /// Kinds that assert on an element and therefore need a target.
    pub fn needs_target(&self) -> bool {
        !matches!(
            self,
            Self::ToHaveTitle | Self::ToHaveUrl | Self::Custom | Self::Unsupported(_)
        )
    }
}

impl From<String> for ValidationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "toBeVisible" => Self::ToBeVisible,
            "toBeHidden" => Self::ToBeHidden,
            "toHaveTitle" => Self::ToHaveTitle,
            "toHaveURL" => Self::ToHaveUrl,
            "toHaveText" => Self::ToHaveText,
            "toHaveValue" => Self::ToHaveValue,
            "toHaveAttribute" => Self::ToHaveAttribute,
            "toHaveCSS" => Self::ToHaveCss,
            "toHaveClass" => Self::ToHaveClass,
            "custom" => Self::Custom,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<ValidationKind> for String {
    fn from(value: ValidationKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a JSON value like JavaScript's `String(value)`.
pub fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SoftFailure {
    pub validation: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IterationResult {
    pub index: usize,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soft_failures: Vec<SoftFailure>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StepResult {
    pub title: String,
    pub action: String,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub soft_failures: Vec<SoftFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iterations: Vec<IterationResult>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub test_case: String,
    pub status: StepStatus,
    pub outcome: RunOutcome,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}
