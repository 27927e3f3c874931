// Module: Interaction
// fill / type / click / hover / press on a single element.
// Without a target these are skipped (see ActionDispatcher for strict mode).

use async_trait::async_trait;
use tracing::{debug, info};

use crate::browser::Page;
use crate::context::Context;
use crate::errors::EngineError;
use crate::protocol::{Action, TestStep};
use crate::selector::Target;

use super::ActionExecutor;

pub struct InteractionExecutor;

#[async_trait]
impl ActionExecutor for InteractionExecutor {
    async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        target: Option<&Target>,
        _context: &mut Context,
    ) -> Result<(), EngineError> {
        let Some(target) = target else {
            debug!(action = %step.action, "no target, skipping");
            return Ok(());
        };
        let options = step.action_options.as_ref();
        let data = step.data_string();
        info!(action = %step.action, target = %target, "👆 Interagindo");

        let result = match &step.action {
            Action::Fill => page.fill(target, &data, options).await,
            Action::Type => page.type_text(target, &data, options).await,
            Action::Click => page.click(target, options).await,
            Action::Hover => page.hover(target, options).await,
            Action::Press => page.press(target, &data, options).await,
            other => return Err(EngineError::UnsupportedAction(other.to_string())),
        };
        result.map_err(|e| EngineError::action(step.action.as_str(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakePage};
    use crate::protocol::SelectorStrategy;
    use crate::selector::resolve;
    use serde_json::json;

    fn css(selector: &str) -> Target {
        resolve(selector, &SelectorStrategy::Css).unwrap()
    }

    fn step(action: Action, data: Option<serde_json::Value>) -> TestStep {
        let mut step = TestStep::new(action);
        step.data = data;
        step
    }

    #[tokio::test]
    async fn test_each_interaction_reaches_the_page() {
        let page = FakePage::new()
            .with(FakeElement::new("#user"))
            .with(FakeElement::new("#submit"));
        let mut ctx = Context::new();
        let user = css("#user");
        let submit = css("#submit");

        InteractionExecutor.execute(&page, &step(Action::Fill, Some(json!("alice"))), Some(&user), &mut ctx).await.unwrap();
        InteractionExecutor.execute(&page, &step(Action::Type, Some(json!(42))), Some(&user), &mut ctx).await.unwrap();
        InteractionExecutor.execute(&page, &step(Action::Hover, None), Some(&submit), &mut ctx).await.unwrap();
        InteractionExecutor.execute(&page, &step(Action::Press, Some(json!("Enter"))), Some(&submit), &mut ctx).await.unwrap();
        InteractionExecutor.execute(&page, &step(Action::Click, None), Some(&submit), &mut ctx).await.unwrap();

        assert_eq!(
            page.log(),
            vec!["fill #user alice", "type #user 42", "hover #submit", "press #submit Enter", "click #submit"]
        );
        assert_eq!(page.value_of("#user", 0).as_deref(), Some("alice42"));
    }

    #[tokio::test]
    async fn test_action_options_reach_the_page() {
        let page = FakePage::new().with(FakeElement::new("#user"));
        let user = css("#user");
        let mut ctx = Context::new();
        for (action, options) in [
            (Action::Fill, json!({ "force": true })),
            (Action::Click, json!({ "button": "right", "clickCount": 2 })),
            (Action::Press, json!({ "delay": 50 })),
        ] {
            let mut step = step(action, Some(json!("x")));
            step.action_options = Some(options);
            InteractionExecutor.execute(&page, &step, Some(&user), &mut ctx).await.unwrap();
        }
        InteractionExecutor
            .execute(&page, &step(Action::Hover, None), Some(&user), &mut ctx)
            .await
            .unwrap();

        assert_eq!(
            page.options_log(),
            vec![
                ("fill #user".to_string(), json!({ "force": true })),
                ("click #user".to_string(), json!({ "button": "right", "clickCount": 2 })),
                ("press #user".to_string(), json!({ "delay": 50 })),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_target_is_skipped_silently() {
        let page = FakePage::new();
        for action in [Action::Fill, Action::Type, Action::Click, Action::Hover, Action::Press] {
            InteractionExecutor
                .execute(&page, &step(action, Some(json!("x"))), None, &mut Context::new())
                .await
                .unwrap();
        }
        assert!(page.log().is_empty());
    }

    #[tokio::test]
    async fn test_fill_without_data_uses_empty_string() {
        let page = FakePage::new().with(FakeElement::new("#q").value("old"));
        InteractionExecutor
            .execute(&page, &step(Action::Fill, None), Some(&css("#q")), &mut Context::new())
            .await
            .unwrap();
        assert_eq!(page.value_of("#q", 0).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unmatched_target_fails() {
        let page = FakePage::new();
        let err = InteractionExecutor
            .execute(&page, &step(Action::Click, None), Some(&css("#ghost")), &mut Context::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no element matches '#ghost'"));
    }
}
