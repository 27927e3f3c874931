//! # Módulo Engine (Orquestrador de Steps)
//!
//! Executa um test case do início ao fim contra uma página injetada e
//! produz o [`RunReport`].
//!
//! ## Máquina de estados por run
//!
//! ```text
//! Pending ──► Running ──► Completed   (todos os steps executados)
//!                    └──► Aborted     (falha hard em algum step)
//! ```
//!
//! ## Ciclo de um step
//!
//! 1. Resolve o alvo (`selector` + `selectorType` + `nth`)
//! 2. Despacha a action (com fan-out por elemento quando `iterate: true`)
//! 3. Aplica `waitTime`
//! 4. Avalia as validações com o alvo do step (ou da iteração) como escopo
//!
//! Steps e iterações rodam estritamente em sequência: iterações posteriores
//! podem depender do estado da página alterado pelas anteriores.
//!
//! ## Falhas
//!
//! - **Hard** (action ou validação não-soft): o step é gravado como falho e
//!   nenhum step seguinte executa.
//! - **Soft**: o step é gravado como falho, com a falha em `soft_failures`,
//!   e a run continua.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, info_span, instrument, Instrument, Span};
use uuid::Uuid;

use crate::assertions::{ValidationEvaluator, Verdict};
use crate::browser::Page;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::custom::Registry;
use crate::errors::EngineError;
use crate::executors::wait::pause;
use crate::executors::ActionDispatcher;
use crate::protocol::{
    Action, IterationResult, RunOutcome, RunReport, SoftFailure, StepResult, StepStatus,
    TestCase, TestStep,
};
use crate::selector::{resolve_step, Target};

// ============================================================================
// ESTADO DA RUN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(from = ?*self, to = ?next, "run state");
        *self = next;
    }

    fn outcome(self) -> RunOutcome {
        match self {
            Self::Aborted => RunOutcome::Aborted,
            _ => RunOutcome::Completed,
        }
    }
}

/// Resultado de um step e se ele abortou a run.
struct StepRun {
    result: StepResult,
    aborted: bool,
}

// ============================================================================
// ENGINE
// ============================================================================

/// Interpretador de test cases.
///
/// Não cria nem fecha páginas: o host injeta uma por run. Uma instância
/// pode ser compartilhada (via `Arc`) entre runs concorrentes desde que
/// cada run use sua própria página.
pub struct Engine {
    registry: Arc<Registry>,
    config: EngineConfig,
    dispatcher: ActionDispatcher,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, config: EngineConfig) -> Self {
        let dispatcher = ActionDispatcher::new(Arc::clone(&registry), config.clone());
        Self {
            registry,
            config,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executa `case` com um contexto novo.
    ///
    /// Só retorna `Err` para test case sem steps; qualquer outra falha fica
    /// registrada no relatório.
    pub async fn run(&self, page: &dyn Page, case: &TestCase) -> Result<RunReport, EngineError> {
        let mut context = Context::new();
        self.run_with_context(page, case, &mut context).await
    }

    /// Como [`Engine::run`], com um contexto fornecido pelo host (por
    /// exemplo, pré-populado com valores da sessão).
    #[instrument(skip_all, fields(test_case = %case.description, run_id = tracing::field::Empty))]
    pub async fn run_with_context(
        &self,
        page: &dyn Page,
        case: &TestCase,
        context: &mut Context,
    ) -> Result<RunReport, EngineError> {
        if case.test_steps.is_empty() {
            return Err(EngineError::EmptyTestCase(case.description.clone()));
        }

        let run_id = Uuid::new_v4();
        Span::current().record("run_id", tracing::field::display(run_id));

        let mut state = RunState::Pending;
        let start_time = Utc::now();
        let clock = Instant::now();
        let mut steps = Vec::with_capacity(case.test_steps.len());

        state.advance(RunState::Running);
        info!(steps = case.test_steps.len(), "🚀 Iniciando test case");

        for (index, step) in case.test_steps.iter().enumerate() {
            let span = info_span!("step", index, action = %step.action);
            let StepRun { result, aborted } =
                self.execute_step(page, step, index, context).instrument(span).await;
            steps.push(result);
            if aborted {
                state.advance(RunState::Aborted);
                break;
            }
        }
        if !state.is_terminal() {
            state.advance(RunState::Completed);
        }

        let status = if steps.iter().all(|s| s.status == StepStatus::Passed) {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        };
        let duration_ms = clock.elapsed().as_millis() as u64;
        info!(status = ?status, outcome = ?state, duration_ms, "🏁 Test case finalizado");

        Ok(RunReport {
            run_id,
            test_case: case.description.clone(),
            status,
            outcome: state.outcome(),
            start_time,
            end_time: Utc::now(),
            duration_ms,
            steps,
        })
    }

    async fn execute_step(
        &self,
        page: &dyn Page,
        step: &TestStep,
        index: usize,
        context: &mut Context,
    ) -> StepRun {
        let title = step.title(index);
        let start_time = Utc::now();
        let clock = Instant::now();
        let mut soft_failures = Vec::new();
        let mut iterations = Vec::new();

        let outcome = self
            .drive_step(page, step, context, &mut soft_failures, &mut iterations)
            .await;

        let failed = outcome.is_err()
            || !soft_failures.is_empty()
            || iterations
                .iter()
                .any(|i: &IterationResult| i.status == StepStatus::Failed);
        let error = match &outcome {
            Ok(()) => None,
            Err(e) => {
                error!(step = %title, error = %e, "❌ Step falhou");
                Some(e.user_message())
            }
        };
        if outcome.is_ok() {
            info!(step = %title, failed, "✅ Step concluído");
        }

        StepRun {
            result: StepResult {
                title,
                action: step.action.to_string(),
                status: if failed {
                    StepStatus::Failed
                } else {
                    StepStatus::Passed
                },
                start_time,
                end_time: Utc::now(),
                duration_ms: clock.elapsed().as_millis() as u64,
                error,
                soft_failures,
                iterations,
            },
            aborted: outcome.is_err(),
        }
    }

    async fn drive_step(
        &self,
        page: &dyn Page,
        step: &TestStep,
        context: &mut Context,
        soft_failures: &mut Vec<SoftFailure>,
        iterations: &mut Vec<IterationResult>,
    ) -> Result<(), EngineError> {
        let target = resolve_step(step)?;

        let base = match target {
            Some(base) if step.iterate => base,
            target => {
                return self
                    .run_unit(page, step, target.as_ref(), context, soft_failures)
                    .await
            }
        };

        let count = page
            .count(&base)
            .await
            .map_err(|e| EngineError::action(step.action.as_str(), e))?;
        info!(target = %base, count, "🔁 Iterando sobre elementos");

        for i in 0..count {
            let element = base.element(i);
            let mut iteration_soft = Vec::new();
            let result = self
                .run_unit(page, step, Some(&element), context, &mut iteration_soft)
                .instrument(info_span!("iteration", index = i))
                .await;

            let failed = result.is_err() || !iteration_soft.is_empty();
            iterations.push(IterationResult {
                index: i,
                status: if failed {
                    StepStatus::Failed
                } else {
                    StepStatus::Passed
                },
                error: result.as_ref().err().map(EngineError::user_message),
                soft_failures: iteration_soft,
            });
            result?;
        }
        Ok(())
    }

    /// Action + espera + validações para um alvo (o do step ou o de uma
    /// iteração).
    async fn run_unit(
        &self,
        page: &dyn Page,
        step: &TestStep,
        target: Option<&Target>,
        context: &mut Context,
        soft_failures: &mut Vec<SoftFailure>,
    ) -> Result<(), EngineError> {
        self.dispatcher.execute(page, step, target, context).await?;

        // waitForTimeout já consumiu o waitTime.
        if step.action != Action::WaitForTimeout {
            pause(page, step).await?;
        }

        let evaluator = ValidationEvaluator::new(&self.registry, &self.config);
        for validation in &step.validations {
            if let Verdict::SoftFailed(failure) =
                evaluator.evaluate(page, validation, target, context).await?
            {
                soft_failures.push(failure);
            }
        }
        Ok(())
    }
}

// ============================================================================
// TESTES
// ============================================================================
