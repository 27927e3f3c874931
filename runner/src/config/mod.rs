//! # Módulo de Configuração do Engine
//!
//! Tempos de espera, timeouts e chaves de compatibilidade usados durante a
//! execução de um test case.
//!
//! ## Valores configuráveis:
//!
//! | Campo                    | Padrão  | Variável de ambiente               |
//! |--------------------------|---------|------------------------------------|
//! | expect_timeout           | 5000 ms | `RUNNER_EXPECT_TIMEOUT_MS`         |
//! | poll_interval            | 100 ms  | `RUNNER_POLL_INTERVAL_MS`          |
//! | action_timeout           | 30 s    | `RUNNER_ACTION_TIMEOUT_MS`         |
//! | strict_targets           | false   | `RUNNER_STRICT_TARGETS`            |
//! | strict_validation_types  | false   | `RUNNER_STRICT_VALIDATION_TYPES`   |
//! | max_steps                | 200     | `RUNNER_MAX_STEPS`                 |

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// VALORES PADRÃO (CONSTANTES)
// ============================================================================

/// Quanto tempo uma asserção continua tentando antes de falhar.
pub const DEFAULT_EXPECT_TIMEOUT_MS: u64 = 5_000;

/// Intervalo entre tentativas de uma asserção.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Limite de tempo para uma única ação (exceto `waitForTimeout`).
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 30_000;

/// Máximo de steps aceitos pela validação prévia.
pub const DEFAULT_MAX_STEPS: usize = 200;

// ============================================================================
// ESTRUTURA DE CONFIGURAÇÃO
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Janela de auto-retry das asserções.
    /// Pode ser sobrescrita por validação via `expectOptions.timeout`.
    pub expect_timeout: Duration,

    /// Intervalo entre tentativas dentro da janela acima.
    pub poll_interval: Duration,

    /// Tempo máximo de uma ação; ao estourar, a ação falha e a run é abortada.
    pub action_timeout: Duration,

    /// Ações que exigem alvo falham (em vez de serem puladas) quando o step
    /// não tem selector.
    pub strict_targets: bool,

    /// Tipos de validação desconhecidos falham (em vez de apenas logar aviso).
    pub strict_validation_types: bool,

    /// Limite de steps por test case (checado na validação prévia).
    pub max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expect_timeout: Duration::from_millis(DEFAULT_EXPECT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            action_timeout: Duration::from_millis(DEFAULT_ACTION_TIMEOUT_MS),
            strict_targets: false,
            strict_validation_types: false,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl EngineConfig {
    /// Cria a configuração a partir de variáveis de ambiente, partindo dos
    /// valores padrão. Valores que não fazem parse são ignorados.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_parse::<u64>("RUNNER_EXPECT_TIMEOUT_MS") {
            config.expect_timeout = Duration::from_millis(ms);
        }

        if let Some(ms) = env_parse::<u64>("RUNNER_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }

        if let Some(ms) = env_parse::<u64>("RUNNER_ACTION_TIMEOUT_MS") {
            config.action_timeout = Duration::from_millis(ms);
        }

        if let Some(flag) = env_flag("RUNNER_STRICT_TARGETS") {
            config.strict_targets = flag;
        }

        if let Some(flag) = env_flag("RUNNER_STRICT_VALIDATION_TYPES") {
            config.strict_validation_types = flag;
        }

        if let Some(n) = env_parse::<usize>("RUNNER_MAX_STEPS") {
            config.max_steps = n;
        }

        config
    }

    /// Liga os dois modos estritos.
    pub fn strict() -> Self {
        Self {
            strict_targets: true,
            strict_validation_types: true,
            ..Self::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Interpreta `1/true/yes/on` e `0/false/no/off`.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub(crate) fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().as_deref().and_then(parse_flag)
}

// ============================================================================
// TESTES
// ============================================================================
