//! # Módulo de Carregamento - Leitura de Test Cases
//!
//! Lê documentos de test case (JSON) do disco.
//!
//! ## O que este módulo faz?
//!
//! 1. [`load_test_case`]: lê e parseia um único arquivo
//! 2. [`load_scenarios`]: lê um diretório inteiro de cenários, mantém só os
//!    habilitados, substitui placeholders `${NOME}` nos paths de `goto` e
//!    ordena por `testOrder`
//!
//! ## Placeholders
//!
//! Um path como `/reset?token=${TOKEN}` é expandido a partir de um mapa
//! explícito e, em seguida, das variáveis de ambiente. Placeholder sem
//! valor é erro (`E4001`): melhor falhar no carregamento do que navegar
//! para uma URL quebrada.
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! let scenarios = load_scenarios("./data/ui-scenarios", &Placeholders::from_env())?;
//! for case in &scenarios {
//!     println!("{} ({} steps)", case.description, case.test_steps.len());
//! }
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::errors::ErrorCode;
use crate::protocol::{Action, TestCase};

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.:-]+)\}").expect("valid placeholder regex")
});

// ============================================================================
// PLACEHOLDERS
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("[{code}] Variable '{name}' referenced as ${{{name}}} is not defined", code = ErrorCode::ENV_VAR_NOT_FOUND)]
    Missing { name: String },
}

/// Valores para os placeholders `${NOME}`.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    values: HashMap<String, String>,
    use_env: bool,
}

impl Placeholders {
    /// Só valores explícitos (útil em testes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Valores explícitos com fallback para variáveis de ambiente.
    pub fn from_env() -> Self {
        Self {
            values: HashMap::new(),
            use_env: true,
        }
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    fn lookup(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| self.use_env.then(|| std::env::var(name).ok()).flatten())
    }

    /// Substitui todos os `${NOME}` de `input`.
    pub fn expand(&self, input: &str) -> Result<String, PlaceholderError> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(input) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = self
                .lookup(name.as_str())
                .ok_or_else(|| PlaceholderError::Missing {
                    name: name.as_str().to_string(),
                })?;
            out.push_str(&input[last..whole.start()]);
            out.push_str(&value);
            last = whole.end();
        }
        out.push_str(&input[last..]);
        Ok(out)
    }

    /// Expande os paths dos steps `goto` de um test case.
    pub fn apply(&self, case: &mut TestCase) -> Result<(), PlaceholderError> {
        for step in case.test_steps.iter_mut().filter(|s| s.action == Action::Goto) {
            if let Some(path) = step.path.as_deref() {
                step.path = Some(self.expand(path)?);
            }
        }
        Ok(())
    }
}

// ============================================================================
// CARREGAMENTO
// ============================================================================

/// Carrega um test case de um arquivo JSON.
///
/// ## Exemplos de erro:
/// - "Failed to read test case file" → Arquivo não existe ou sem permissão
/// - "Failed to parse test case JSON" → JSON malformado ou estrutura inválida
pub fn load_test_case<P: AsRef<Path>>(path: P) -> Result<TestCase> {
    let path_ref = path.as_ref();

    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read test case file {:?}", path_ref))?;

    let case = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test case JSON {:?}", path_ref))?;

    Ok(case)
}

/// Carrega todos os cenários habilitados de um diretório.
///
/// ## Regras:
/// - Só arquivos `*.json` (em ordem alfabética)
/// - Arquivo que não parseia: aviso no log e segue
/// - `enabled: false` (ou ausente): ignorado
/// - Placeholders expandidos nos paths de `goto`
/// - Ordenação estável: quem tem `testOrder` primeiro (crescente), depois
///   os demais na ordem dos arquivos
pub fn load_scenarios<P: AsRef<Path>>(dir: P, placeholders: &Placeholders) -> Result<Vec<TestCase>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        bail!(
            "[{}] Scenario directory not found: {:?}",
            ErrorCode::SCENARIO_FILE_NOT_FOUND,
            dir
        );
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list scenario directory {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut scenarios = Vec::new();
    for file in &files {
        let mut case = match load_test_case(file) {
            Ok(case) => case,
            Err(e) => {
                warn!(file = ?file, error = %format!("{:#}", e), "⚠️ Ignorando cenário inválido");
                continue;
            }
        };
        if !case.enabled {
            continue;
        }
        placeholders
            .apply(&mut case)
            .with_context(|| format!("Failed to expand placeholders in {:?}", file))?;
        scenarios.push(case);
    }

    scenarios.sort_by(|a, b| match (a.test_order, b.test_order) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    info!(dir = ?dir, files = files.len(), enabled = scenarios.len(), "📂 Cenários carregados");
    Ok(scenarios)
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("scenario-runner-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn scenario(description: &str, enabled: bool, order: Option<f64>) -> serde_json::Value {
        let mut value = json!({
            "description": description,
            "enabled": enabled,
            "testSteps": [{ "action": "goto", "path": "/reset?token=${TOKEN}" }]
        });
        if let Some(order) = order {
            value["testOrder"] = json!(order);
        }
        value
    }

    #[test]
    fn test_expand_placeholders() {
        let placeholders = Placeholders::new().set("TOKEN", "abc").set("user.id", "7");
        assert_eq!(
            placeholders.expand("/u/${user.id}?t=${TOKEN}&again=${TOKEN}").unwrap(),
            "/u/7?t=abc&again=abc"
        );
        assert_eq!(placeholders.expand("/plain").unwrap(), "/plain");
        assert_eq!(
            placeholders.expand("/x/${MISSING}").unwrap_err(),
            PlaceholderError::Missing { name: "MISSING".to_string() }
        );
    }

    #[test]
    fn test_missing_placeholder_message_has_code() {
        let err = Placeholders::new().expand("${TOKEN}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[E4001] Variable 'TOKEN' referenced as ${TOKEN} is not defined"
        );
    }

    #[test]
    fn test_load_test_case_errors_have_context() {
        let dir = scratch_dir();
        fs::write(dir.join("broken.json"), "{ not json").unwrap();

        let err = load_test_case(dir.join("broken.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse test case JSON"));

        let err = load_test_case(dir.join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read test case file"));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_scenarios_filters_substitutes_and_sorts() {
        let dir = scratch_dir();
        write(&dir, "a.json", scenario("unordered-a", true, None));
        write(&dir, "b.json", scenario("second", true, Some(2.0)));
        write(&dir, "c.json", scenario("disabled", false, Some(0.0)));
        write(&dir, "d.json", scenario("first", true, Some(1.0)));
        write(&dir, "e.json", scenario("unordered-e", true, None));
        fs::write(dir.join("f.json"), "garbage").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let placeholders = Placeholders::new().set("TOKEN", "t0k");
        let scenarios = load_scenarios(&dir, &placeholders).unwrap();

        let names: Vec<&str> = scenarios.iter().map(|c| c.description.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "unordered-a", "unordered-e"]);
        assert_eq!(
            scenarios[0].test_steps[0].path.as_deref(),
            Some("/reset?token=t0k")
        );
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_only_goto_paths_are_substituted() {
        let mut case: TestCase = serde_json::from_value(json!({
            "description": "x",
            "testSteps": [
                { "action": "goto", "path": "/${TOKEN}" },
                { "action": "fill", "selector": "#t", "data": "${TOKEN}", "path": "${TOKEN}" }
            ]
        }))
        .unwrap();
        Placeholders::new().set("TOKEN", "v").apply(&mut case).unwrap();
        assert_eq!(case.test_steps[0].path.as_deref(), Some("/v"));
        assert_eq!(case.test_steps[1].path.as_deref(), Some("${TOKEN}"));
        assert_eq!(case.test_steps[1].data, Some(json!("${TOKEN}")));
    }

    #[test]
    fn test_missing_directory() {
        let err = load_scenarios("/definitely/not/here", &Placeholders::new()).unwrap_err();
        assert!(err.to_string().starts_with("[E4002]"));
    }
}
