//! # Módulo de Validação de Test Cases
//!
//! Checagem prévia de um documento de test case, antes de qualquer
//! navegação. O engine em si é leniente (nomes desconhecidos só falham
//! quando o step é alcançado); esta checagem encontra esses problemas de
//! uma vez só, sem abrir o navegador.
//!
//! ## Validações realizadas:
//!
//! 1. **Test case não vazio** e dentro do limite de steps
//! 2. **Actions, selectorTypes e tipos de validação conhecidos**
//! 3. **Custom registrados**: `customName` presente e existente no registry
//! 4. **Chaves obrigatórias**: `attribute` (toHaveAttribute), `cssProperty` (toHaveCSS)
//! 5. **Upload com origem e alvo**: `files` ou `data` com caminhos, e `selector`
//! 6. **Campos fora de contexto**: `files` em step que não é upload
//! 7. **Regex válidas** em toHaveURL / toHaveClass
//! 8. **Alvo das validações**: tipos que inspecionam um elemento precisam de
//!    `selector` próprio ou de um step com `selector`
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! match validate_test_case(&case, &registry, &config) {
//!     Ok(()) => println!("Test case válido!"),
//!     Err(errors) => {
//!         for err in errors {
//!             eprintln!("[{}] {}", err.code(), err);
//!         }
//!     }
//! }
//! ```

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::custom::Registry;
use crate::errors::ErrorCode;
use crate::protocol::{Action, SelectorStrategy, TestCase, TestStep, ValidationKind, ValidationStep};

// ============================================================================
// TIPOS DE ERRO
// ============================================================================

/// Problemas encontrados num documento. `step` é 1-based.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Test case vazio: nenhum step definido")]
    EmptyTestCase,

    #[error("Test case com {count} steps excede o limite de {max}")]
    TooManySteps { count: usize, max: usize },

    #[error("Step {step}: action '{action}' não é conhecida. Ações válidas: goto, fill, type, click, hover, press, upload, waitForTimeout, custom")]
    UnknownAction { step: usize, action: String },

    #[error("Step {step}: selectorType '{selector_type}' não suportado. Tipos válidos: css, xpath, id, text, testId")]
    UnknownSelectorType { step: usize, selector_type: String },

    #[error("Step {step}: action custom sem 'customName'")]
    MissingCustomActionName { step: usize },

    #[error("Step {step}: action custom '{name}' não está registrada")]
    UnknownCustomAction { step: usize, name: String },

    #[error("Step {step}: upload sem 'files' nem caminhos em 'data'")]
    MissingUploadSource { step: usize },

    #[error("Step {step}: upload exige 'selector' apontando para o input de arquivo")]
    UploadWithoutSelector { step: usize },

    #[error("Step {step}: 'files' só é usado pela action upload (action atual: {action})")]
    FilesOnNonUpload { step: usize, action: String },

    #[error("Step {step}, validação {validation}: tipo '{kind}' não é conhecido")]
    UnknownValidationType { step: usize, validation: usize, kind: String },

    #[error("Step {step}, validação {validation}: toHaveAttribute exige 'attribute'")]
    MissingAttributeKey { step: usize, validation: usize },

    #[error("Step {step}, validação {validation}: toHaveCSS exige 'cssProperty'")]
    MissingCssPropertyKey { step: usize, validation: usize },

    #[error("Step {step}, validação {validation}: validação custom sem 'customName'")]
    MissingCustomValidationName { step: usize, validation: usize },

    #[error("Step {step}, validação {validation}: validação custom '{name}' não está registrada")]
    UnknownCustomValidation { step: usize, validation: usize, name: String },

    #[error("Step {step}, validação {validation}: {kind} exige 'selector' (na validação ou no step)")]
    ValidationWithoutSelector { step: usize, validation: usize, kind: String },

    #[error("Step {step}, validação {validation}: regex inválida '{pattern}'")]
    InvalidPattern { step: usize, validation: usize, pattern: String },
}

impl DocumentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyTestCase => ErrorCode::EMPTY_TEST_CASE,
            Self::TooManySteps { .. } => ErrorCode::TOO_MANY_STEPS,
            Self::UnknownAction { .. } => ErrorCode::UNSUPPORTED_ACTION,
            Self::UnknownSelectorType { .. } => ErrorCode::UNSUPPORTED_SELECTOR_TYPE,
            Self::MissingCustomActionName { .. } | Self::MissingCustomValidationName { .. } => {
                ErrorCode::MISSING_CUSTOM_NAME
            }
            Self::UnknownCustomAction { .. } => ErrorCode::CUSTOM_ACTION_NOT_FOUND,
            Self::MissingUploadSource { .. } => ErrorCode::NO_UPLOAD_SOURCE,
            Self::UploadWithoutSelector { .. } => ErrorCode::UPLOAD_TARGET_MISSING,
            Self::ValidationWithoutSelector { .. } => ErrorCode::MISSING_SELECTOR,
            Self::FilesOnNonUpload { .. } => ErrorCode::MISPLACED_FIELD,
            Self::UnknownValidationType { .. } => ErrorCode::UNSUPPORTED_VALIDATION_TYPE,
            Self::MissingAttributeKey { .. } => ErrorCode::MISSING_ATTRIBUTE_KEY,
            Self::MissingCssPropertyKey { .. } => ErrorCode::MISSING_CSS_PROPERTY_KEY,
            Self::UnknownCustomValidation { .. } => ErrorCode::CUSTOM_VALIDATION_NOT_FOUND,
            Self::InvalidPattern { .. } => ErrorCode::ASSERTION_FAILED,
        }
    }
}

pub type ValidationResult = Result<(), Vec<DocumentError>>;

// ============================================================================
// FUNÇÃO PRINCIPAL DE VALIDAÇÃO
// ============================================================================

/// Valida um test case e coleta TODOS os problemas (não para no primeiro).
pub fn validate_test_case(case: &TestCase, registry: &Registry, config: &EngineConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if case.test_steps.is_empty() {
        return Err(vec![DocumentError::EmptyTestCase]);
    }
    if case.test_steps.len() > config.max_steps {
        errors.push(DocumentError::TooManySteps {
            count: case.test_steps.len(),
            max: config.max_steps,
        });
    }

    for (index, step) in case.test_steps.iter().enumerate() {
        validate_step(index + 1, step, registry, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// VALIDAÇÃO DE STEP INDIVIDUAL
// ============================================================================

fn validate_step(n: usize, step: &TestStep, registry: &Registry, errors: &mut Vec<DocumentError>) {
    match &step.action {
        Action::Unsupported(action) => errors.push(DocumentError::UnknownAction {
            step: n,
            action: action.clone(),
        }),
        Action::Custom => match step.custom_name.as_deref().filter(|s| !s.is_empty()) {
            None => errors.push(DocumentError::MissingCustomActionName { step: n }),
            Some(name) if registry.action(name).is_none() => {
                errors.push(DocumentError::UnknownCustomAction {
                    step: n,
                    name: name.to_string(),
                })
            }
            Some(_) => {}
        },
        Action::Upload => {
            if !has_upload_source(step) {
                errors.push(DocumentError::MissingUploadSource { step: n });
            }
            if !has_selector(step.selector.as_deref()) {
                errors.push(DocumentError::UploadWithoutSelector { step: n });
            }
        }
        _ => {}
    }

    if !step.files.is_empty() && step.action != Action::Upload {
        errors.push(DocumentError::FilesOnNonUpload {
            step: n,
            action: step.action.to_string(),
        });
    }

    if let Some(SelectorStrategy::Unsupported(name)) = &step.selector_type {
        errors.push(DocumentError::UnknownSelectorType {
            step: n,
            selector_type: name.clone(),
        });
    }

    let step_has_target = has_selector(step.selector.as_deref());
    for (index, validation) in step.validations.iter().enumerate() {
        validate_validation(n, index + 1, validation, step_has_target, registry, errors);
    }
}

fn has_selector(selector: Option<&str>) -> bool {
    selector.is_some_and(|s| !s.is_empty())
}

fn has_upload_source(step: &TestStep) -> bool {
    let from_files = step.files.iter().any(|f| {
        f.content_base64.is_some() || f.path.as_deref().is_some_and(|p| !p.is_empty())
    });
    let from_data = match &step.data {
        Some(Value::String(path)) => !path.is_empty(),
        Some(Value::Array(items)) => items.iter().any(|i| i.as_str().is_some_and(|p| !p.is_empty())),
        _ => false,
    };
    from_files || from_data
}

fn validate_validation(
    step: usize,
    validation: usize,
    v: &ValidationStep,
    step_has_target: bool,
    registry: &Registry,
    errors: &mut Vec<DocumentError>,
) {
    if let Some(SelectorStrategy::Unsupported(name)) = &v.selector_type {
        errors.push(DocumentError::UnknownSelectorType {
            step,
            selector_type: name.clone(),
        });
    }

    match &v.kind {
        ValidationKind::Unsupported(kind) => errors.push(DocumentError::UnknownValidationType {
            step,
            validation,
            kind: kind.clone(),
        }),
        ValidationKind::ToHaveAttribute if v.attribute.as_deref().unwrap_or("").is_empty() => {
            errors.push(DocumentError::MissingAttributeKey { step, validation })
        }
        ValidationKind::ToHaveCss if v.css_property.as_deref().unwrap_or("").is_empty() => {
            errors.push(DocumentError::MissingCssPropertyKey { step, validation })
        }
        ValidationKind::Custom => match v.custom_name.as_deref().filter(|s| !s.is_empty()) {
            None => errors.push(DocumentError::MissingCustomValidationName { step, validation }),
            Some(name) if registry.validation(name).is_none() => {
                errors.push(DocumentError::UnknownCustomValidation {
                    step,
                    validation,
                    name: name.to_string(),
                })
            }
            Some(_) => {}
        },
        ValidationKind::ToHaveUrl | ValidationKind::ToHaveClass => {
            let pattern = v.data_string();
            if Regex::new(&pattern).is_err() {
                errors.push(DocumentError::InvalidPattern {
                    step,
                    validation,
                    pattern,
                });
            }
        }
        _ => {}
    }

    if v.kind.needs_target() && !step_has_target && !has_selector(v.selector.as_deref()) {
        errors.push(DocumentError::ValidationWithoutSelector {
            step,
            validation,
            kind: v.kind.to_string(),
        });
    }
}

// ============================================================================
// TESTES
// ============================================================================
