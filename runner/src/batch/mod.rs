//! # Módulo de Execução em Lote
//!
//! Roda vários test cases com o mesmo [`Engine`].
//!
//! ## Modos
//!
//! - **Isolado** (padrão): cada test case recebe uma página nova, aberta
//!   pela [`PageFactory`]. Até `max_parallel` runs executam ao mesmo tempo.
//! - **Página compartilhada**: uma única página para todos, em sequência,
//!   na ordem de entrada (os cenários podem depender do estado deixado pelo
//!   anterior, como um login).
//!
//! Dentro de uma run nada muda: steps e iterações continuam sequenciais. O
//! paralelismo é só entre runs, cada uma com sua página e seu contexto.
//!
//! ```text
//!   semáforo (max_parallel = 2)
//!   ┌──────────┐ ┌──────────┐
//!   │ case A   │ │ case B   │   ← rodando
//!   └──────────┘ └──────────┘
//!   ┌──────────┐
//!   │ case C   │                 ← aguardando permit
//!   └──────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::browser::{Page, PageFactory};
use crate::engine::Engine;
use crate::errors::ErrorCode;
use crate::protocol::{RunOutcome, RunReport, StepResult, StepStatus, TestCase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Runs simultâneas no modo isolado (0 = uma por test case).
    pub max_parallel: usize,
    pub shared_page: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_parallel: 1,
            shared_page: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub status: StepStatus,
    /// Na mesma ordem dos test cases de entrada.
    pub runs: Vec<RunReport>,
}

impl BatchReport {
    fn from_runs(runs: Vec<RunReport>) -> Self {
        let status = if runs.iter().all(RunReport::passed) {
            StepStatus::Passed
        } else {
            StepStatus::Failed
        };
        Self { status, runs }
    }

    pub fn passed(&self) -> bool {
        self.status == StepStatus::Passed
    }
}

/// Relatório de uma run que nem chegou a executar steps.
fn setup_failure(case: &TestCase, title: &str, message: String) -> RunReport {
    let now = Utc::now();
    RunReport {
        run_id: Uuid::new_v4(),
        test_case: case.description.clone(),
        status: StepStatus::Failed,
        outcome: RunOutcome::Aborted,
        start_time: now,
        end_time: now,
        duration_ms: 0,
        steps: vec![StepResult {
            title: title.to_string(),
            action: "setup".to_string(),
            status: StepStatus::Failed,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            error: Some(message),
            soft_failures: Vec::new(),
            iterations: Vec::new(),
        }],
    }
}

async fn run_one(engine: &Engine, page: &dyn Page, case: &TestCase) -> RunReport {
    match engine.run(page, case).await {
        Ok(report) => report,
        Err(e) => setup_failure(case, "Validate test case", e.user_message()),
    }
}

/// Executa `cases` e devolve um relatório por caso, na ordem de entrada.
#[instrument(skip_all, fields(cases = cases.len(), max_parallel = options.max_parallel, shared_page = options.shared_page))]
pub async fn run_batch(
    engine: Arc<Engine>,
    cases: Vec<TestCase>,
    factory: Arc<dyn PageFactory>,
    options: BatchOptions,
) -> BatchReport {
    if cases.is_empty() {
        return BatchReport::from_runs(Vec::new());
    }
    if options.shared_page {
        run_shared(&engine, &cases, factory.as_ref()).await
    } else {
        run_isolated(engine, cases, factory, options.max_parallel).await
    }
}

async fn run_shared(engine: &Engine, cases: &[TestCase], factory: &dyn PageFactory) -> BatchReport {
    let page = match factory.open().await {
        Ok(page) => page,
        Err(e) => {
            error!(error = %e, "❌ Falha ao abrir página compartilhada");
            let message = format!("[{}] {:#}", ErrorCode::BROWSER_BRIDGE_ERROR, e);
            return BatchReport::from_runs(
                cases
                    .iter()
                    .map(|case| setup_failure(case, "Open page", message.clone()))
                    .collect(),
            );
        }
    };

    let mut runs = Vec::with_capacity(cases.len());
    for case in cases {
        runs.push(run_one(engine, page.as_ref(), case).await);
    }
    if let Err(e) = page.close().await {
        warn!(error = %e, "falha ao fechar página");
    }
    BatchReport::from_runs(runs)
}

async fn run_isolated(
    engine: Arc<Engine>,
    cases: Vec<TestCase>,
    factory: Arc<dyn PageFactory>,
    max_parallel: usize,
) -> BatchReport {
    let max_parallel = if max_parallel > 0 { max_parallel } else { cases.len() };
    let semaphore = Arc::new(Semaphore::new(max_parallel));
    info!(max_parallel, "Batch iniciado com limite de concorrência");

    let originals: Vec<TestCase> = cases.clone();
    let mut join_set = JoinSet::new();

    for (index, case) in cases.into_iter().enumerate() {
        let engine = Arc::clone(&engine);
        let factory = Arc::clone(&factory);
        let semaphore = Arc::clone(&semaphore);

        join_set.spawn(async move {
            let report = match semaphore.acquire_owned().await {
                Ok(_permit) => match factory.open().await {
                    Ok(page) => {
                        let report = run_one(&engine, page.as_ref(), &case).await;
                        if let Err(e) = page.close().await {
                            warn!(error = %e, "falha ao fechar página");
                        }
                        report
                    }
                    Err(e) => setup_failure(
                        &case,
                        "Open page",
                        format!("[{}] {:#}", ErrorCode::BROWSER_BRIDGE_ERROR, e),
                    ),
                },
                Err(e) => setup_failure(
                    &case,
                    "Acquire slot",
                    format!("[{}] {}", ErrorCode::INTERNAL_ERROR, e),
                ),
            };
            (index, report)
        });
    }

    let mut slots: Vec<Option<RunReport>> = vec![None; originals.len()];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, report)) => {
                info!(test_case = %report.test_case, status = ?report.status, "Run concluída");
                slots[index] = Some(report);
            }
            Err(e) => error!(error = %e, "❌ Task de run abortou"),
        }
    }

    let runs = slots
        .into_iter()
        .zip(&originals)
        .map(|(slot, case)| {
            slot.unwrap_or_else(|| {
                setup_failure(case, "Run task", format!("[{}] run task panicked", ErrorCode::INTERNAL_ERROR))
            })
        })
        .collect();
    BatchReport::from_runs(runs)
}

// ============================================================================
// TESTES
// ============================================================================
