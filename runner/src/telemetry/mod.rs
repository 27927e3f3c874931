//! # Módulo de Telemetria
//!
//! Liga os spans do `tracing` (run → step → iteração → validação) a um
//! coletor OpenTelemetry, quando configurado, e sempre ao console.
//!
//! ## Hierarquia dos spans
//!
//! ```text
//! [run_with_context test_case="Login" run_id=...] ───────────────────────>
//!   [step index=0 action=goto] ──>
//!   [step index=1 action=click] ──────────────────>
//!     [execute action=click target=#submit] ──>
//!     [evaluate validation=toHaveURL] ───────────>
//! ```
//!
//! ## Configuração via variáveis de ambiente:
//!
//! - `OTEL_SERVICE_NAME`: Nome do serviço (padrão `scenario-runner`)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: URL do coletor OTLP (gRPC)
//! - `OTEL_TRACES_SAMPLER_ARG`: Taxa de sampling (0.0-1.0)
//! - `RUNNER_LOG_CONSOLE`: `false` desliga o log no console
//! - `RUST_LOG`: filtro de nível (padrão `info`)
//!
//! ## Exemplo de uso:
//!
//! ```ignore
//! init_telemetry(TelemetryConfig::from_env())?;
//! let report = engine.run(page.as_ref(), &case).await?;
//! shutdown_telemetry(); // flush dos spans pendentes
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::runtime::Tokio;
use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::{trace as sdktrace, Resource};
use tracing::Level;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::env_flag;

pub const DEFAULT_SERVICE_NAME: &str = "scenario-runner";

// ============================================================================
// CONFIGURAÇÃO
// ============================================================================

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,

    /// Coletor OTLP, ex.: "http://localhost:4317". `None` = só console.
    pub otlp_endpoint: Option<String>,

    /// Fração de traces coletados (0.0 a 1.0).
    pub sampling_ratio: f64,

    pub enable_console_logging: bool,

    /// Nível usado quando `RUST_LOG` não está definido.
    pub log_level: Level,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            otlp_endpoint: None,
            sampling_ratio: 1.0,
            enable_console_logging: true,
            log_level: Level::INFO,
        }
    }
}

impl TelemetryConfig {
    /// Padrões sobrescritos pelas variáveis `OTEL_*` / `RUNNER_LOG_CONSOLE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            if !name.trim().is_empty() {
                config.service_name = name;
            }
        }

        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.otlp_endpoint = Some(endpoint);
            }
        }

        if let Some(r) = std::env::var("OTEL_TRACES_SAMPLER_ARG")
            .ok()
            .and_then(|ratio| ratio.parse::<f64>().ok())
        {
            config.sampling_ratio = r.clamp(0.0, 1.0);
        }

        if let Some(console) = env_flag("RUNNER_LOG_CONSOLE") {
            config.enable_console_logging = console;
        }

        config
    }
}

// ============================================================================
// INICIALIZAÇÃO
// ============================================================================

/// Instala o subscriber global.
///
/// ## Retorno:
///
/// - `Ok(Some(Tracer))`: exportando via OTLP
/// - `Ok(None)`: apenas console
pub fn init_telemetry(config: TelemetryConfig) -> anyhow::Result<Option<Tracer>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));
    let Some(endpoint) = &config.otlp_endpoint else {
        let console = config
            .enable_console_logging
            .then(|| tracing_subscriber::fmt::layer().compact());
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console)
            .try_init()?;
        tracing::info!("Telemetria inicializada (apenas console, sem OTLP)");
        return Ok(None);
    };

    let tracer = init_otlp_tracer(&config.service_name, endpoint, config.sampling_ratio)?;
    let console = config
        .enable_console_logging
        .then(|| tracing_subscriber::fmt::layer().compact());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(OpenTelemetryLayer::new(tracer.clone()))
        .with(console)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        endpoint = %endpoint,
        sampling_ratio = config.sampling_ratio,
        "Telemetria OTEL inicializada"
    );
    Ok(Some(tracer))
}

/// Sampler correspondente à taxa configurada.
fn sampler_for(ratio: f64) -> Sampler {
    if ratio >= 1.0 {
        Sampler::AlwaysOn
    } else if ratio <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(ratio)
    }
}

/// Tracer com exporter OTLP/gRPC em lote, registrado como provider global.
fn init_otlp_tracer(service_name: &str, endpoint: &str, sampling_ratio: f64) -> anyhow::Result<Tracer> {
    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .build_span_exporter()?,
            Tokio,
        )
        .with_config(
            sdktrace::Config::default()
                .with_sampler(sampler_for(sampling_ratio))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name.to_string()),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    let tracer = tracer_provider.tracer(service_name.to_string());
    global::set_tracer_provider(tracer_provider);
    Ok(tracer)
}

// ============================================================================
// ENCERRAMENTO
// ============================================================================

/// Faz flush dos spans pendentes. Chamar antes de o processo terminar.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
    tracing::info!("Telemetria OTEL encerrada");
}
