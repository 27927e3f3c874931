//! # Módulo de Lógica Customizada
//!
//! Registro de handlers nomeados que estendem o conjunto fixo de actions e
//! validações. O host monta o [`Registry`] na inicialização e o entrega ao
//! engine; o conteúdo do test case nunca registra nada.
//!
//! ## Dois namespaces independentes:
//!
//! - **actions**: `{"action": "custom", "customName": "selectWord"}`
//! - **validações**: `{"type": "custom", "customName": "containsText"}`
//!
//! Um handler de validação sinaliza falha retornando `Err`; `Ok(())` é pass.
//!
//! ## Exemplo:
//!
//! ```ignore
//! let mut registry = Registry::with_builtins();
//! registry.register_action("acceptCookies", AcceptCookies);
//! let engine = Engine::new(Arc::new(registry), EngineConfig::from_env());
//! ```

pub mod builtin;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::assertions::expect::Expect;
use crate::browser::Page;
use crate::context::Context;
use crate::protocol::{TestStep, ValidationStep};
use crate::selector::Target;

// ============================================================================
// CONTRATOS DOS HANDLERS
// ============================================================================

/// Handler de action customizada.
///
/// Recebe a página, o step completo (incluindo `data` e `actionOptions`) e o
/// contexto da run, onde pode gravar valores para os steps seguintes.
#[async_trait]
pub trait CustomAction: Send + Sync {
    async fn run(&self, page: &dyn Page, step: &TestStep, context: &mut Context)
        -> anyhow::Result<()>;
}

/// Escopo entregue a uma validação customizada.
pub struct ValidationScope<'a> {
    /// Alvo da validação (o próprio selector ou o herdado do step).
    pub target: Option<&'a Target>,
    /// Helper de asserção com auto-retry, já com o timeout efetivo.
    pub expect: Expect,
    pub context: &'a mut Context,
}

/// Handler de validação customizada. `Err` = falha da asserção.
#[async_trait]
pub trait CustomValidation: Send + Sync {
    async fn check(
        &self,
        page: &dyn Page,
        validation: &ValidationStep,
        scope: ValidationScope<'_>,
    ) -> anyhow::Result<()>;
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Mapeamento nome → handler, em dois namespaces.
#[derive(Default)]
pub struct Registry {
    actions: HashMap<String, Box<dyn CustomAction>>,
    validations: HashMap<String, Box<dyn CustomValidation>>,
}

impl Registry {
    /// Registry vazio.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry com os handlers embutidos (`selectWord`, `queryResponse`,
    /// `containsText`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Registra (ou substitui) uma action.
    pub fn register_action(
        &mut self,
        name: impl Into<String>,
        handler: impl CustomAction + 'static,
    ) -> &mut Self {
        self.actions.insert(name.into(), Box::new(handler));
        self
    }

    /// Registra (ou substitui) uma validação.
    pub fn register_validation(
        &mut self,
        name: impl Into<String>,
        handler: impl CustomValidation + 'static,
    ) -> &mut Self {
        self.validations.insert(name.into(), Box::new(handler));
        self
    }

    pub fn action(&self, name: &str) -> Option<&dyn CustomAction> {
        self.actions.get(name).map(|h| h.as_ref())
    }

    pub fn validation(&self, name: &str) -> Option<&dyn CustomValidation> {
        self.validations.get(name).map(|h| h.as_ref())
    }

    /// Nomes das actions registradas, ordenados.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Nomes das validações registradas, ordenados.
    pub fn validation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.validations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("actions", &self.action_names())
            .field("validations", &self.validation_names())
            .finish()
    }
}

// ============================================================================
// TESTES
// ============================================================================
