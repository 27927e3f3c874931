// Module: Custom action executor
// Looks the step's customName up in the registry and runs the handler.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::browser::Page;
use crate::context::Context;
use crate::custom::Registry;
use crate::errors::EngineError;
use crate::protocol::TestStep;
use crate::selector::Target;

use super::ActionExecutor;

pub struct CustomActionExecutor {
    registry: Arc<Registry>,
}

impl CustomActionExecutor {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ActionExecutor for CustomActionExecutor {
    async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        _target: Option<&Target>,
        context: &mut Context,
    ) -> Result<(), EngineError> {
        let name = step.custom_name.as_deref().unwrap_or_default();
        let handler = self
            .registry
            .action(name)
            .ok_or_else(|| EngineError::CustomActionNotFound(name.to_string()))?;

        info!(custom_name = name, "🧩 Executando action custom");
        handler
            .run(page, step, context)
            .await
            .map_err(|e| EngineError::action(format!("custom:{}", name), format!("{:#}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakePage;
    use crate::custom::CustomAction;
    use crate::protocol::Action;
    use serde_json::json;

    struct Capture;

    #[async_trait]
    impl CustomAction for Capture {
        async fn run(&self, page: &dyn Page, _step: &TestStep, context: &mut Context) -> anyhow::Result<()> {
            let previous = context.get_str("visits").and_then(|v| v.parse::<u32>().ok()).unwrap_or(0);
            context.set("visits", json!(previous + 1));
            context.set("url", json!(page.url().await?));
            Ok(())
        }
    }

    fn custom_step(name: Option<&str>) -> TestStep {
        let mut step = TestStep::new(Action::Custom);
        step.custom_name = name.map(str::to_string);
        step
    }

    #[tokio::test]
    async fn test_custom_action_shares_context() {
        let mut registry = Registry::new();
        registry.register_action("capture", Capture);
        let executor = CustomActionExecutor::new(Arc::new(registry));
        let page = FakePage::new();
        let mut context = Context::new();

        executor.execute(&page, &custom_step(Some("capture")), None, &mut context).await.unwrap();
        executor.execute(&page, &custom_step(Some("capture")), None, &mut context).await.unwrap();

        assert_eq!(context.get("visits"), Some(&json!(2)));
        assert_eq!(context.get_str("url").as_deref(), Some("about:blank"));
    }

    #[tokio::test]
    async fn test_unknown_or_missing_name() {
        let executor = CustomActionExecutor::new(Arc::new(Registry::new()));
        let page = FakePage::new();

        let err = executor
            .execute(&page, &custom_step(Some("ghost")), None, &mut Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CustomActionNotFound(ref n) if n == "ghost"));

        let err = executor
            .execute(&page, &custom_step(None), None, &mut Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CustomActionNotFound(ref n) if n.is_empty()));
    }

    #[tokio::test]
    async fn test_handler_error_is_action_error() {
        let executor = CustomActionExecutor::new(Arc::new(Registry::with_builtins()));
        let page = FakePage::new();
        let err = executor
            .execute(&page, &custom_step(Some("selectWord")), None, &mut Context::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Action 'custom:selectWord' failed: Step data must include a 'word' property."
        );
    }
}
