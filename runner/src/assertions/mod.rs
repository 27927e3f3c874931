//! # Módulo de Validações (Assertions)
//!
//! Avalia as `validations` de um step contra a página.
//!
//! ## Alvo da validação
//!
//! 1. O próprio `selector` da validação (resolvido na hora, com seu `nth`)
//! 2. Senão, o alvo herdado do step (elemento da ação ou da iteração)
//!
//! ## Hard x Soft
//!
//! Falhas de asserção com `soft: true` viram [`Verdict::SoftFailed`] e a run
//! continua. Erros de configuração (sem selector, sem `attribute`, custom
//! não registrado) são sempre fatais, mesmo em validações soft.
//!
//! ## Auto-retry
//!
//! Todas as asserções sobre a página fazem polling até passar ou até o
//! timeout (`expect_timeout`, ou `expectOptions.timeout` por validação).

pub mod expect;

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::browser::{Page, PageError};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::custom::{Registry, ValidationScope};
use crate::errors::EngineError;
use crate::protocol::{SoftFailure, ValidationKind, ValidationStep};
use crate::selector::{resolve_validation, Target};

use expect::{Check, Expect};

/// Resultado de uma validação que não abortou a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Passed,
    SoftFailed(SoftFailure),
}

/// Colapsa espaços como o matcher de texto do Playwright.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compile(kind: &ValidationKind, pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|e| {
        EngineError::validation(kind.as_str(), format!("invalid regular expression /{}/: {}", pattern, e))
    })
}

// ============================================================================
// EVALUATOR
// ============================================================================

pub struct ValidationEvaluator<'a> {
    registry: &'a Registry,
    config: &'a EngineConfig,
}

impl<'a> ValidationEvaluator<'a> {
    pub fn new(registry: &'a Registry, config: &'a EngineConfig) -> Self {
        Self { registry, config }
    }

    /// Avalia uma validação.
    ///
    /// ## Retorno:
    /// - `Ok(Verdict::Passed)` quando passou (ou tipo desconhecido em modo leniente)
    /// - `Ok(Verdict::SoftFailed)` quando falhou mas é `soft`
    /// - `Err` para falhas hard e erros de configuração
    #[instrument(skip_all, fields(validation = %validation.kind))]
    pub async fn evaluate(
        &self,
        page: &dyn Page,
        validation: &ValidationStep,
        scope: Option<&Target>,
        context: &mut Context,
    ) -> Result<Verdict, EngineError> {
        let own = resolve_validation(validation)?;
        let target = own.as_ref().or(scope);
        let expect = Expect::from_config(self.config).with_options(validation.expect_options.as_ref());

        match self.check(page, validation, target, expect, context).await {
            Ok(()) => {
                debug!("✅ validation passed");
                Ok(Verdict::Passed)
            }
            Err(err) if validation.soft && err.is_assertion_failure() => {
                warn!(error = %err, "⚠️ soft validation failed");
                Ok(Verdict::SoftFailed(SoftFailure {
                    validation: validation.kind.to_string(),
                    message: err.user_message(),
                }))
            }
            Err(err) => Err(err),
        }
    }

    async fn check(
        &self,
        page: &dyn Page,
        validation: &ValidationStep,
        target: Option<&Target>,
        expect: Expect,
        context: &mut Context,
    ) -> Result<(), EngineError> {
        let kind = &validation.kind;
        let expected = validation.data_string();
        let expected = expected.as_str();

        match kind {
            ValidationKind::ToBeVisible => {
                let t = require_target(kind, target)?;
                let result = expect
                    .poll(move || async move {
                        Ok::<_, PageError>(Check::from_bool(page.is_visible(t).await?, "hidden or absent"))
                    })
                    .await;
                settle(validation, result, || format!("expected {} to be visible", t))
            }

            ValidationKind::ToBeHidden => {
                let t = require_target(kind, target)?;
                let result = expect
                    .poll(move || async move {
                        Ok::<_, PageError>(Check::from_bool(!page.is_visible(t).await?, "visible"))
                    })
                    .await;
                settle(validation, result, || format!("expected {} to be hidden", t))
            }

            ValidationKind::ToHaveTitle => {
                let wanted = normalize_whitespace(expected);
                let wanted = wanted.as_str();
                let result = expect
                    .poll(move || async move {
                        let title = page.title().await?;
                        Ok::<_, PageError>(Check::from_bool(normalize_whitespace(&title) == wanted, title))
                    })
                    .await;
                settle(validation, result, || format!("expected page title to be \"{}\"", expected))
            }

            ValidationKind::ToHaveUrl => {
                let re = compile(kind, expected)?;
                let re = &re;
                let result = expect
                    .poll(move || async move {
                        let url = page.url().await?;
                        Ok::<_, PageError>(Check::from_bool(re.is_match(&url), url))
                    })
                    .await;
                settle(validation, result, || format!("expected URL to match /{}/", expected))
            }

            ValidationKind::ToHaveText => {
                let t = require_target(kind, target)?;
                let wanted = normalize_whitespace(expected);
                let wanted = wanted.as_str();
                let result = expect
                    .poll(move || async move {
                        let text = page.text_content(t).await?.unwrap_or_default();
                        Ok::<_, PageError>(Check::from_bool(normalize_whitespace(&text) == wanted, text))
                    })
                    .await;
                settle(validation, result, || format!("expected {} to have text \"{}\"", t, expected))
            }

            ValidationKind::ToHaveValue => {
                let t = require_target(kind, target)?;
                let result = expect
                    .poll(move || async move {
                        let value = page.input_value(t).await?;
                        Ok::<_, PageError>(Check::from_bool(value == expected, value))
                    })
                    .await;
                settle(validation, result, || format!("expected {} to have value \"{}\"", t, expected))
            }

            ValidationKind::ToHaveAttribute => {
                let name = validation
                    .attribute
                    .as_deref()
                    .filter(|a| !a.is_empty())
                    .ok_or(EngineError::MissingAttributeKey)?;
                let t = require_target(kind, target)?;
                let result = expect
                    .poll(move || async move {
                        let value = page.get_attribute(t, name).await?;
                        let actual = value.clone().unwrap_or_else(|| "<absent>".to_string());
                        Ok::<_, PageError>(Check::from_bool(value.as_deref() == Some(expected), actual))
                    })
                    .await;
                settle(validation, result, || {
                    format!("expected {} to have attribute {}=\"{}\"", t, name, expected)
                })
            }

            ValidationKind::ToHaveCss => {
                let property = validation
                    .css_property
                    .as_deref()
                    .filter(|p| !p.is_empty())
                    .ok_or(EngineError::MissingCssPropertyKey)?;
                let t = require_target(kind, target)?;
                let result = expect
                    .poll(move || async move {
                        let value = page.computed_style(t, property).await?;
                        Ok::<_, PageError>(Check::from_bool(value == expected, value))
                    })
                    .await;
                settle(validation, result, || {
                    format!("expected {} to have CSS {}: {}", t, property, expected)
                })
            }

            ValidationKind::ToHaveClass => {
                let t = require_target(kind, target)?;
                let re = compile(kind, expected)?;
                let re = &re;
                let result = expect
                    .poll(move || async move {
                        let class = page.get_attribute(t, "class").await?.unwrap_or_default();
                        Ok::<_, PageError>(Check::from_bool(re.is_match(&class), class))
                    })
                    .await;
                settle(validation, result, || format!("expected {} to have class /{}/", t, expected))
            }

            ValidationKind::Custom => {
                let name = validation.custom_name.as_deref().unwrap_or_default();
                let handler = self
                    .registry
                    .validation(name)
                    .ok_or_else(|| EngineError::CustomValidationNotFound(name.to_string()))?;
                let scope = ValidationScope {
                    target,
                    expect,
                    context,
                };
                handler
                    .check(page, validation, scope)
                    .await
                    .map_err(|e| EngineError::validation(format!("custom:{}", name), format!("{:#}", e)))
            }

            ValidationKind::Unsupported(name) => {
                if self.config.strict_validation_types {
                    return Err(EngineError::UnsupportedValidationType(name.clone()));
                }
                warn!(validation = %name, "⚠️ Unsupported validation type, skipping");
                Ok(())
            }
        }
    }
}

fn require_target<'t>(kind: &ValidationKind, target: Option<&'t Target>) -> Result<&'t Target, EngineError> {
    target.ok_or_else(|| EngineError::MissingSelector {
        validation: kind.to_string(),
    })
}

/// Converte o resultado do polling em erro de asserção, prefixando a
/// `message` do autor quando houver.
fn settle(
    validation: &ValidationStep,
    result: Result<(), String>,
    describe: impl FnOnce() -> String,
) -> Result<(), EngineError> {
    result.map_err(|actual| {
        let detail = format!("{}, received \"{}\"", describe(), actual);
        let message = match &validation.message {
            Some(m) if !m.is_empty() => format!("{} ({})", m, detail),
            _ => detail,
        };
        EngineError::validation(validation.kind.as_str(), message)
    })
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakePage, BASE_URL};
    use crate::protocol::SelectorStrategy;
    use crate::selector::resolve;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> EngineConfig {
        EngineConfig {
            expect_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(5),
            ..EngineConfig::default()
        }
    }

    fn validation(value: serde_json::Value) -> ValidationStep {
        serde_json::from_value(value).unwrap()
    }

    fn css(selector: &str) -> Target {
        resolve(selector, &SelectorStrategy::Css).unwrap()
    }

    async fn eval(
        page: &FakePage,
        v: &ValidationStep,
        scope: Option<&Target>,
    ) -> Result<Verdict, EngineError> {
        let registry = Registry::with_builtins();
        let config = config();
        ValidationEvaluator::new(&registry, &config)
            .evaluate(page, v, scope, &mut Context::new())
            .await
    }

    fn sample_page() -> FakePage {
        FakePage::new()
            .with(FakeElement::new("#banner").text("  Hello \n world "))
            .with(FakeElement::new("#spinner").hidden())
            .with(FakeElement::new("#email").value("a@b.c").attr("class", "input is-valid"))
            .with(FakeElement::new("a.home").attr("href", "/home").style("color", "rgb(255, 0, 0)"))
            .with_title("/dashboard", "Dashboard")
    }

    #[tokio::test]
    async fn test_element_assertions_pass() {
        let page = sample_page();
        let cases = [
            json!({ "type": "toBeVisible", "selector": "#banner" }),
            json!({ "type": "toBeHidden", "selector": "#spinner" }),
            json!({ "type": "toBeHidden", "selector": "#never-rendered" }),
            json!({ "type": "toHaveText", "selector": "#banner", "data": "Hello world" }),
            json!({ "type": "toHaveValue", "selector": "#email", "data": "a@b.c" }),
            json!({ "type": "toHaveClass", "selector": "#email", "data": "is-valid" }),
            json!({ "type": "toHaveAttribute", "selector": "a.home", "attribute": "href", "data": "/home" }),
            json!({ "type": "toHaveCSS", "selector": "a.home", "cssProperty": "color", "data": "rgb(255, 0, 0)" }),
        ];
        for case in cases {
            let v = validation(case.clone());
            assert_eq!(eval(&page, &v, None).await.unwrap(), Verdict::Passed, "{}", case);
        }
    }

    #[tokio::test]
    async fn test_page_assertions() {
        let page = sample_page();
        page.goto("/dashboard", None).await.unwrap();

        let v = validation(json!({ "type": "toHaveTitle", "data": "Dashboard" }));
        assert_eq!(eval(&page, &v, None).await.unwrap(), Verdict::Passed);

        let v = validation(json!({ "type": "toHaveURL", "data": "/dashboard$" }));
        assert_eq!(eval(&page, &v, None).await.unwrap(), Verdict::Passed);

        let v = validation(json!({ "type": "toHaveURL", "data": "/login" }));
        let err = eval(&page, &v, None).await.unwrap_err();
        assert!(err.is_assertion_failure());
        assert!(err.to_string().contains(&format!("{}/dashboard", BASE_URL)));
    }

    #[tokio::test]
    async fn test_scope_target_is_inherited() {
        let page = sample_page();
        let v = validation(json!({ "type": "toHaveText", "data": "Hello world" }));
        let scope = css("#banner");
        assert_eq!(eval(&page, &v, Some(&scope)).await.unwrap(), Verdict::Passed);
    }

    #[tokio::test]
    async fn test_own_selector_wins_over_scope() {
        let page = sample_page();
        let v = validation(json!({ "type": "toHaveValue", "selector": "#email", "data": "a@b.c" }));
        let scope = css("#banner");
        assert_eq!(eval(&page, &v, Some(&scope)).await.unwrap(), Verdict::Passed);
    }

    #[tokio::test]
    async fn test_missing_selector_is_hard_even_when_soft() {
        let page = sample_page();
        let v = validation(json!({ "type": "toBeVisible", "soft": true }));
        let err = eval(&page, &v, None).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingSelector { .. }));
    }

    #[tokio::test]
    async fn test_missing_attribute_key_before_target_check() {
        let page = sample_page();
        let v = validation(json!({ "type": "toHaveAttribute", "data": "x", "soft": true }));
        let err = eval(&page, &v, None).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingAttributeKey));

        let v = validation(json!({ "type": "toHaveCSS", "selector": "a.home", "data": "red" }));
        let err = eval(&page, &v, None).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingCssPropertyKey));
    }

    #[tokio::test]
    async fn test_soft_failure_is_recorded_not_raised() {
        let page = sample_page();
        let v = validation(json!({
            "type": "toHaveText", "selector": "#banner", "data": "Goodbye",
            "soft": true, "message": "greeting changed"
        }));
        match eval(&page, &v, None).await.unwrap() {
            Verdict::SoftFailed(failure) => {
                assert_eq!(failure.validation, "toHaveText");
                assert!(failure.message.starts_with("[E3001]"));
                assert!(failure.message.contains("greeting changed"));
            }
            other => panic!("expected soft failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_text_comparison_is_exact_after_normalizing() {
        let page = sample_page();
        let v = validation(json!({ "type": "toHaveText", "selector": "#banner", "data": "Hello" }));
        assert!(eval(&page, &v, None).await.is_err());
    }

    #[tokio::test]
    async fn test_absent_element_fails_after_timeout() {
        let page = sample_page();
        let v = validation(json!({
            "type": "toBeVisible", "selector": "#ghost", "expectOptions": { "timeout": 0 }
        }));
        let err = eval(&page, &v, None).await.unwrap_err();
        assert!(err.to_string().contains("expected #ghost to be visible"));
    }

    #[tokio::test]
    async fn test_unsupported_type_passes_unless_strict() {
        let page = sample_page();
        let v = validation(json!({ "type": "toBeChecked", "selector": "#email" }));
        assert_eq!(eval(&page, &v, None).await.unwrap(), Verdict::Passed);

        let registry = Registry::new();
        let strict = EngineConfig {
            strict_validation_types: true,
            ..config()
        };
        let err = ValidationEvaluator::new(&registry, &strict)
            .evaluate(&page, &v, None, &mut Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedValidationType(ref n) if n == "toBeChecked"));
    }

    #[tokio::test]
    async fn test_custom_validation_lookup_and_soft() {
        let page = sample_page();
        let v = validation(json!({ "type": "custom", "customName": "nope", "soft": true }));
        let err = eval(&page, &v, None).await.unwrap_err();
        assert!(matches!(err, EngineError::CustomValidationNotFound(ref n) if n == "nope"));

        let v = validation(json!({
            "type": "custom", "customName": "containsText", "selector": "#banner",
            "data": "Goodbye", "soft": true
        }));
        match eval(&page, &v, None).await.unwrap() {
            Verdict::SoftFailed(f) => assert!(f.message.contains("Expected text to include: Goodbye")),
            other => panic!("expected soft failure, got {:?}", other),
        }

        let v = validation(json!({
            "type": "custom", "customName": "containsText", "selector": "#banner", "data": "world"
        }));
        assert_eq!(eval(&page, &v, None).await.unwrap(), Verdict::Passed);
    }

    #[tokio::test]
    async fn test_unsupported_selector_type_in_validation() {
        let page = sample_page();
        let v = validation(json!({ "type": "toBeVisible", "selector": "x", "selectorType": "role" }));
        assert!(matches!(
            eval(&page, &v, None).await.unwrap_err(),
            EngineError::UnsupportedSelectorType(_)
        ));
    }
}
