//! # Executor Wait - Pausas
//!
//! Implementa a action `waitForTimeout`: suspende o step por exatamente
//! `waitTime` milissegundos. Sem `waitTime` (ou com 0) não faz nada.
//!
//! ## Exemplo:
//!
//! ```json
//! { "action": "waitForTimeout", "waitTime": 1500 }
//! ```
//!
//! A pausa é feita pela própria página (`Page::wait_for_timeout`) para que
//! backends possam registrá-la; o padrão é um `tokio::time::sleep`.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{info, instrument};

use crate::browser::Page;
use crate::context::Context;
use crate::errors::EngineError;
use crate::protocol::TestStep;
use crate::selector::Target;

use super::ActionExecutor;

/// Executor sem estado; pode ser compartilhado entre runs paralelas.
pub struct WaitExecutor;

/// Aplica `waitTime` se for maior que zero.
///
/// Usado tanto pela action `waitForTimeout` quanto pelo orquestrador para a
/// espera pós-ação de cada step.
pub async fn pause(page: &dyn Page, step: &TestStep) -> Result<(), EngineError> {
    let Some(ms) = step.wait_time.filter(|ms| *ms > 0) else {
        return Ok(());
    };
    let start = Instant::now();
    info!(duration_ms = ms, "⏳ Aguardando...");
    page.wait_for_timeout(ms)
        .await
        .map_err(|e| EngineError::action(step.action.as_str(), e))?;
    info!(actual_duration_ms = start.elapsed().as_millis() as u64, "✅ Wait concluído");
    Ok(())
}

#[async_trait]
impl ActionExecutor for WaitExecutor {
    #[instrument(skip_all, fields(duration_ms = step.wait_time.unwrap_or(0)))]
    async fn execute(
        &self,
        page: &dyn Page,
        step: &TestStep,
        _target: Option<&Target>,
        _context: &mut Context,
    ) -> Result<(), EngineError> {
        pause(page, step).await
    }
}

// ============================================================================
// TESTES
// ============================================================================
