//! # Módulo de Códigos de Erro Estruturados
//!
//! Define a taxonomia de erros do engine e os códigos estáveis que
//! aparecem nas mensagens do relatório de execução.
//!
//! ## Categorias de Erro
//!
//! | Faixa  | Categoria       | Descrição                              |
//! |--------|-----------------|----------------------------------------|
//! | E1xxx  | Documento       | Problema no test case (JSON)           |
//! | E2xxx  | Ação            | Falha ao executar uma ação na página   |
//! | E3xxx  | Assertion       | Validação não passou                   |
//! | E4xxx  | Configuração    | Ambiente, variáveis, arquivos          |
//! | E5xxx  | Interno         | Bridge do navegador / bug do Runner    |
//!
//! ## Exemplo:
//!
//! ```text
//! [E3001] toHaveURL failed: expected URL to match /dashboard, received http://app.local/login
//! ```

use std::fmt;

use thiserror::Error;

// ============================================================================
// CÓDIGO DE ERRO
// ============================================================================

/// Código de erro estruturado com categoria e número.
///
/// Primeiro dígito: categoria (1-5). Últimos 3 dígitos: erro específico.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // ========================================================================
    // E1xxx: Documento
    // ========================================================================

    /// Test case sem steps.
    pub const EMPTY_TEST_CASE: Self = Self(1001);

    /// Action fora do conjunto suportado.
    pub const UNSUPPORTED_ACTION: Self = Self(1002);

    /// selectorType fora de css/xpath/id/text/testId.
    pub const UNSUPPORTED_SELECTOR_TYPE: Self = Self(1003);

    /// Tipo de validação desconhecido (só é erro em modo estrito).
    pub const UNSUPPORTED_VALIDATION_TYPE: Self = Self(1004);

    /// toHaveAttribute sem `attribute`.
    pub const MISSING_ATTRIBUTE_KEY: Self = Self(1005);

    /// toHaveCSS sem `cssProperty`.
    pub const MISSING_CSS_PROPERTY_KEY: Self = Self(1006);

    /// action/type `custom` sem `customName`.
    pub const MISSING_CUSTOM_NAME: Self = Self(1007);

    /// Mais steps do que `max_steps`.
    pub const TOO_MANY_STEPS: Self = Self(1008);

    /// Campo usado fora do contexto esperado (ex.: `files` fora de upload).
    pub const MISPLACED_FIELD: Self = Self(1009);

    // ========================================================================
    // E2xxx: Execução de ações
    // ========================================================================

    /// A camada de automação rejeitou a ação.
    pub const ACTION_FAILED: Self = Self(2001);

    /// A ação excedeu `action_timeout`.
    pub const ACTION_TIMEOUT: Self = Self(2002);

    /// Upload sem elemento alvo.
    pub const UPLOAD_TARGET_MISSING: Self = Self(2003);

    /// Upload sem `files` nem `data`.
    pub const NO_UPLOAD_SOURCE: Self = Self(2004);

    /// customName não registrado no namespace de ações.
    pub const CUSTOM_ACTION_NOT_FOUND: Self = Self(2005);

    /// Ação que exige alvo sem selector (modo `strict_targets`).
    pub const TARGET_REQUIRED: Self = Self(2006);

    // ========================================================================
    // E3xxx: Assertions
    // ========================================================================

    /// A asserção não se confirmou dentro do timeout.
    pub const ASSERTION_FAILED: Self = Self(3001);

    /// Validação que depende de elemento sem alvo resolvido.
    pub const MISSING_SELECTOR: Self = Self(3002);

    /// customName não registrado no namespace de validações.
    pub const CUSTOM_VALIDATION_NOT_FOUND: Self = Self(3003);

    // ========================================================================
    // E4xxx: Configuração/Ambiente
    // ========================================================================

    /// Placeholder `${NOME}` sem variável correspondente.
    pub const ENV_VAR_NOT_FOUND: Self = Self(4001);

    /// Arquivo ou diretório de cenários não encontrado.
    pub const SCENARIO_FILE_NOT_FOUND: Self = Self(4002);

    // ========================================================================
    // E5xxx: Erros Internos
    // ========================================================================

    pub const INTERNAL_ERROR: Self = Self(5001);

    /// Processo bridge do navegador encerrou ou respondeu lixo.
    pub const BROWSER_BRIDGE_ERROR: Self = Self(5002);

    // ========================================================================
    // MÉTODOS
    // ========================================================================

    pub fn code(&self) -> u16 {
        self.0
    }

    /// Formato `E####`.
    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Document,
            2 => ErrorCategory::Action,
            3 => ErrorCategory::Assertion,
            4 => ErrorCategory::Configuration,
            5 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self.0 {
            1001 => "Test case vazio",
            1002 => "Action não suportada",
            1003 => "Tipo de selector não suportado",
            1004 => "Tipo de validação não suportado",
            1005 => "Chave 'attribute' ausente",
            1006 => "Chave 'cssProperty' ausente",
            1007 => "customName ausente",
            1008 => "Limite de steps excedido",
            1009 => "Campo fora de contexto",
            2001 => "Falha na ação",
            2002 => "Timeout da ação",
            2003 => "Upload sem alvo",
            2004 => "Upload sem origem de arquivos",
            2005 => "Ação custom não encontrada",
            2006 => "Ação exige selector",
            3001 => "Assertion falhou",
            3002 => "Validação sem selector",
            3003 => "Validação custom não encontrada",
            4001 => "Variável de ambiente não definida",
            4002 => "Arquivo de cenário não encontrado",
            5001 => "Erro interno",
            5002 => "Erro no bridge do navegador",
            _ => "Erro desconhecido",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

// ============================================================================
// CATEGORIA DE ERRO
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Document,
    Action,
    Assertion,
    Configuration,
    Internal,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "Documento"),
            Self::Action => write!(f, "Ação"),
            Self::Assertion => write!(f, "Assertion"),
            Self::Configuration => write!(f, "Configuração"),
            Self::Internal => write!(f, "Interno"),
            Self::Unknown => write!(f, "Desconhecido"),
        }
    }
}

// ============================================================================
// ERROS DO ENGINE
// ============================================================================

/// Erros produzidos durante a execução de um test case.
///
/// Toda falha de ação ou validação "hard" vira um destes e aborta a run;
/// a mensagem (com o código) é gravada no último StepResult.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Test case '{0}' has no steps")]
    EmptyTestCase(String),

    #[error("Unsupported selector type: {0}")]
    UnsupportedSelectorType(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Unsupported validation type: {0}")]
    UnsupportedValidationType(String),

    #[error("Validation '{validation}' requires a selector but no target was resolved")]
    MissingSelector { validation: String },

    #[error("Validation type 'toHaveAttribute' requires an 'attribute' key.")]
    MissingAttributeKey,

    #[error("Validation type 'toHaveCSS' requires a 'cssProperty' key.")]
    MissingCssPropertyKey,

    #[error("Custom action '{0}' not found in registry")]
    CustomActionNotFound(String),

    #[error("Custom validation '{0}' not found in registry")]
    CustomValidationNotFound(String),

    #[error("Upload requires a target file input")]
    UploadTargetMissing,

    #[error("Upload has no source: provide 'files' or file paths in 'data'")]
    NoUploadSource,

    #[error("Action '{action}' requires a selector")]
    TargetRequired { action: String },

    #[error("Action '{action}' failed: {reason}")]
    Action { action: String, reason: String },

    #[error("Action '{action}' timed out after {timeout_ms}ms")]
    ActionTimeout { action: String, timeout_ms: u64 },

    #[error("{kind} failed: {message}")]
    ValidationFailure { kind: String, message: String },
}

impl EngineError {
    pub fn action(action: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Action {
            action: action.into(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyTestCase(_) => ErrorCode::EMPTY_TEST_CASE,
            Self::UnsupportedSelectorType(_) => ErrorCode::UNSUPPORTED_SELECTOR_TYPE,
            Self::UnsupportedAction(_) => ErrorCode::UNSUPPORTED_ACTION,
            Self::UnsupportedValidationType(_) => ErrorCode::UNSUPPORTED_VALIDATION_TYPE,
            Self::MissingSelector { .. } => ErrorCode::MISSING_SELECTOR,
            Self::MissingAttributeKey => ErrorCode::MISSING_ATTRIBUTE_KEY,
            Self::MissingCssPropertyKey => ErrorCode::MISSING_CSS_PROPERTY_KEY,
            Self::CustomActionNotFound(_) => ErrorCode::CUSTOM_ACTION_NOT_FOUND,
            Self::CustomValidationNotFound(_) => ErrorCode::CUSTOM_VALIDATION_NOT_FOUND,
            Self::UploadTargetMissing => ErrorCode::UPLOAD_TARGET_MISSING,
            Self::NoUploadSource => ErrorCode::NO_UPLOAD_SOURCE,
            Self::TargetRequired { .. } => ErrorCode::TARGET_REQUIRED,
            Self::Action { .. } => ErrorCode::ACTION_FAILED,
            Self::ActionTimeout { .. } => ErrorCode::ACTION_TIMEOUT,
            Self::ValidationFailure { .. } => ErrorCode::ASSERTION_FAILED,
        }
    }

    /// Mensagem exibida no relatório: `[E####] <mensagem>`.
    pub fn user_message(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }

    /// Falhas de asserção (as únicas que `soft: true` rebaixa para aviso).
    pub fn is_assertion_failure(&self) -> bool {
        matches!(self, Self::ValidationFailure { .. })
    }
}

// ============================================================================
// TESTES
// ============================================================================
