//! Executor da action `goto`.

use async_trait::async_trait;
use tracing::info;

use crate::browser::Page;
use crate::context::Context;
use crate::errors::EngineError;
use crate::protocol::TestStep;
use crate::selector::Target;

use super::ActionExecutor;

/// Navega para `path` (padrão `/`), repassando `actionOptions` como opções
/// de navegação. URLs relativas são resolvidas pela página contra a base URL.
pub struct NavigationExecutor;

#[async_trait]
impl ActionExecutor for NavigationExecutor {
    async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        _target: Option<&Target>,
        _context: &mut Context,
    ) -> Result<(), EngineError> {
        let path = step
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("/");
        info!(path, "🌐 Navegando");
        page.goto(path, step.action_options.as_ref())
            .await
            .map_err(|e| EngineError::action(step.action.as_str(), e))
    }
}
