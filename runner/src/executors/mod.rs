// Module: Executors
// One executor per family of page actions. The dispatcher maps every Action
// variant to exactly one of them.

pub mod custom;
pub mod interaction;
pub mod navigation;
pub mod upload;
pub mod wait;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::browser::Page;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::custom::Registry;
use crate::errors::EngineError;
use crate::protocol::{Action, TestStep};
use crate::selector::Target;

use self::custom::CustomActionExecutor;
use self::interaction::InteractionExecutor;
use self::navigation::NavigationExecutor;
use self::upload::UploadExecutor;
use self::wait::WaitExecutor;

/// Contract for anything that can perform a step's action on a page.
///
/// `target` is the element the action should act on: the step's resolved
/// selector, or one matched element during an iterated step.
/// Requires Send + Sync so runs can be spawned onto the tokio runtime.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        target: Option<&Target>,
        context: &mut Context,
    ) -> Result<(), EngineError>;
}

/// Routes a step to its executor and bounds it by `action_timeout`.
pub struct ActionDispatcher {
    navigation: NavigationExecutor,
    interaction: InteractionExecutor,
    upload: UploadExecutor,
    wait: WaitExecutor,
    custom: CustomActionExecutor,
    config: EngineConfig,
}

impl ActionDispatcher {
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> Self {
        Self {
            navigation: NavigationExecutor,
            interaction: InteractionExecutor,
            upload: UploadExecutor::default(),
            wait: WaitExecutor,
            custom: CustomActionExecutor::new(registry),
            config,
        }
    }

    fn executor_for(&self, action: &Action) -> Result<&dyn ActionExecutor, EngineError> {
        Ok(match action {
            Action::Goto => &self.navigation,
            Action::Fill | Action::Type | Action::Click | Action::Hover | Action::Press => {
                &self.interaction
            }
            Action::Upload => &self.upload,
            Action::WaitForTimeout => &self.wait,
            Action::Custom => &self.custom,
            Action::Unsupported(name) => return Err(EngineError::UnsupportedAction(name.clone())),
        })
    }

    #[instrument(skip_all, fields(action = %step.action, target = ?target.map(|t| t.to_string())))]
    pub async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        target: Option<&Target>,
        context: &mut Context,
    ) -> Result<(), EngineError> {
        let executor = self.executor_for(&step.action)?;

        if target.is_none()
            && step.action.needs_target()
            && step.action != Action::Upload
            && self.config.strict_targets
        {
            return Err(EngineError::TargetRequired {
                action: step.action.to_string(),
            });
        }

        // The only action whose duration is the point.
        if step.action == Action::WaitForTimeout {
            return executor.execute(page, step, target, context).await;
        }

        let timeout = self.config.action_timeout;
        match tokio::time::timeout(timeout, executor.execute(page, step, target, context)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "⏱️ action timed out");
                Err(EngineError::ActionTimeout {
                    action: step.action.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakePage};
    use crate::protocol::SelectorStrategy;
    use crate::selector::resolve;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn dispatcher(config: EngineConfig) -> ActionDispatcher {
        ActionDispatcher::new(Arc::new(Registry::with_builtins()), config)
    }

    fn step(value: Value) -> TestStep {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_unsupported_action() {
        let page = FakePage::new();
        let err = dispatcher(EngineConfig::default())
            .execute(&page, &step(json!({ "action": "doubleClick" })), None, &mut Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedAction(ref a) if a == "doubleClick"));
        assert!(page.log().is_empty());
    }

    #[tokio::test]
    async fn test_strict_targets_rejects_missing_selector() {
        let page = FakePage::new();
        let strict = EngineConfig {
            strict_targets: true,
            ..EngineConfig::default()
        };
        let err = dispatcher(strict)
            .execute(&page, &step(json!({ "action": "click" })), None, &mut Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::TargetRequired { ref action } if action == "click"));

        dispatcher(EngineConfig::default())
            .execute(&page, &step(json!({ "action": "click" })), None, &mut Context::new())
            .await
            .unwrap();
        assert!(page.log().is_empty());
    }

    #[tokio::test]
    async fn test_page_errors_become_action_errors() {
        let page = FakePage::new()
            .with(FakeElement::new("#go"))
            .fail_on("click", "element is detached");
        let target = resolve("#go", &SelectorStrategy::Css).unwrap();
        let err = dispatcher(EngineConfig::default())
            .execute(&page, &step(json!({ "action": "click" })), Some(&target), &mut Context::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Action 'click' failed: element is detached");
    }

    struct Stalled;

    #[async_trait]
    impl crate::custom::CustomAction for Stalled {
        async fn run(&self, _page: &dyn Page, _step: &TestStep, _context: &mut Context) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_action_timeout() {
        let mut registry = Registry::new();
        registry.register_action("stall", Stalled);
        let config = EngineConfig {
            action_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let page = FakePage::new();
        let err = ActionDispatcher::new(Arc::new(registry), config)
            .execute(
                &page,
                &step(json!({ "action": "custom", "customName": "stall" })),
                None,
                &mut Context::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ActionTimeout { timeout_ms: 20, .. }));
    }

    #[tokio::test]
    async fn test_wait_for_timeout_is_not_bounded_by_action_timeout() {
        let config = EngineConfig {
            action_timeout: Duration::from_millis(1),
            ..EngineConfig::default()
        };
        let page = FakePage::new();
        dispatcher(config)
            .execute(
                &page,
                &step(json!({ "action": "waitForTimeout", "waitTime": 1500 })),
                None,
                &mut Context::new(),
            )
            .await
            .unwrap();
        assert_eq!(page.log(), vec!["wait 1500".to_string()]);
    }
}
