use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use scenario_runner::batch::{run_batch, BatchOptions};
use scenario_runner::browser::playwright::{PlaywrightConfig, PlaywrightLauncher};
use scenario_runner::browser::PageFactory;
use scenario_runner::config::EngineConfig;
use scenario_runner::custom::Registry;
use scenario_runner::engine::Engine;
use scenario_runner::loader::{self, Placeholders};
use scenario_runner::protocol::{RunReport, StepStatus, TestCase};
use scenario_runner::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use scenario_runner::validation::validate_test_case;

#[derive(Parser)]
#[command(name = "runner")]
#[command(about = "Scenario Runner: executes declarative UI test cases in a browser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Executes a single test case
    Execute {
        /// Path to the test case JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Path to the output report file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Refuse invalid documents and fail on missing targets and unknown validation types
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Executes every enabled test case of a directory
    Batch {
        /// Directory with test case JSON files
        #[arg(short, long)]
        dir: PathBuf,

        /// Concurrent runs, each with its own browser (0 = all at once)
        #[arg(short, long, default_value_t = 1)]
        parallel: usize,

        /// Run every test case in one page, sequentially
        #[arg(long)]
        shared_page: bool,

        /// Path to the output report file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Checks a test case document without running it
    Validate {
        /// Path to the test case JSON file
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Overrides for the `RUNNER_*` browser variables.
#[derive(Args)]
struct BrowserArgs {
    /// Base URL for relative goto paths
    #[arg(long)]
    base_url: Option<String>,

    /// chromium, firefox or webkit
    #[arg(long)]
    browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,
}

impl BrowserArgs {
    fn launcher(self) -> PlaywrightLauncher {
        let mut config = PlaywrightConfig::from_env();
        if let Some(base_url) = self.base_url {
            config.base_url = Some(base_url);
        }
        if let Some(browser) = self.browser {
            config.browser = browser.to_ascii_lowercase();
        }
        if self.headed {
            config.headless = false;
        }
        PlaywrightLauncher::new(config)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_telemetry(TelemetryConfig::from_env()) {
        eprintln!("⚠️  Telemetry disabled: {:#}", e);
    }

    let outcome = match cli.command {
        Commands::Execute {
            file,
            output,
            strict,
            browser,
        } => execute_case(&file, output.as_deref(), strict, browser).await,
        Commands::Batch {
            dir,
            parallel,
            shared_page,
            output,
            browser,
        } => {
            let options = BatchOptions {
                max_parallel: parallel,
                shared_page,
            };
            execute_batch(&dir, output.as_deref(), options, browser).await
        }
        Commands::Validate { file } => validate_file(&file),
    };

    shutdown_telemetry();

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("❌ {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_case(file: &Path) -> Result<TestCase> {
    let mut case = loader::load_test_case(file)?;
    Placeholders::from_env().apply(&mut case)?;
    Ok(case)
}

/// Pre-flight check. Problems are warnings unless `strict` is set.
fn preflight(case: &TestCase, registry: &Registry, config: &EngineConfig, strict: bool) -> Result<()> {
    if let Err(problems) = validate_test_case(case, registry, config) {
        for problem in &problems {
            eprintln!("   ⚠️  [{}] {}", problem.code(), problem);
        }
        if strict {
            bail!("Test case has {} validation problem(s)", problems.len());
        }
    }
    Ok(())
}

async fn execute_case(file: &Path, output: Option<&Path>, strict: bool, browser: BrowserArgs) -> Result<bool> {
    println!("🚀 Runner Initializing...");

    let case = load_case(file)?;
    println!("📋 Test case loaded: {}", case.description);

    let mut config = EngineConfig::from_env();
    if strict {
        config.strict_targets = true;
        config.strict_validation_types = true;
    }
    let registry = Arc::new(Registry::with_builtins());
    preflight(&case, &registry, &config, strict)?;

    let engine = Engine::new(registry, config);
    let page = browser.launcher().open().await?;

    println!("▶️  Starting Execution...");
    let result = engine.run(page.as_ref(), &case).await;
    if let Err(e) = page.close().await {
        warn!(error = %e, "Failed to close browser");
    }
    let report = result.map_err(|e| anyhow!(e.user_message()))?;

    print_run(&report);
    println!("🏁 Execution Finished.");

    save_report(&report, output)?;
    Ok(report.passed())
}

async fn execute_batch(dir: &Path, output: Option<&Path>, options: BatchOptions, browser: BrowserArgs) -> Result<bool> {
    println!("🚀 Runner Initializing...");

    let cases = loader::load_scenarios(dir, &Placeholders::from_env())?;
    if cases.is_empty() {
        println!("📭 No enabled test cases in {}", dir.display());
        return Ok(true);
    }
    println!("📋 {} test case(s) loaded", cases.len());

    let config = EngineConfig::from_env();
    let registry = Arc::new(Registry::with_builtins());
    for case in &cases {
        if let Err(problems) = validate_test_case(case, &registry, &config) {
            println!("   ⚠️  {}: {} validation problem(s)", case.description, problems.len());
        }
    }

    let engine = Arc::new(Engine::new(registry, config));
    let factory: Arc<dyn PageFactory> = Arc::new(browser.launcher());

    println!("▶️  Starting Execution...");
    let batch = run_batch(engine, cases, factory, options).await;
    for report in &batch.runs {
        print_run(report);
    }
    let passed = batch.runs.iter().filter(|r| r.passed()).count();
    println!("🏁 Execution Finished: {}/{} passed.", passed, batch.runs.len());

    save_report(&batch, output)?;
    Ok(batch.passed())
}

fn validate_file(file: &Path) -> Result<bool> {
    let case = load_case(file)?;
    let registry = Registry::with_builtins();
    match validate_test_case(&case, &registry, &EngineConfig::from_env()) {
        Ok(()) => {
            println!("✅ {} is valid ({} steps)", case.description, case.test_steps.len());
            Ok(true)
        }
        Err(problems) => {
            println!("❌ {} has {} problem(s):", case.description, problems.len());
            for problem in &problems {
                println!("   [{}] {}", problem.code(), problem);
            }
            Ok(false)
        }
    }
}

fn print_run(report: &RunReport) {
    let icon = |status: StepStatus| match status {
        StepStatus::Passed => "✅",
        StepStatus::Failed => "❌",
    };
    println!("{} {} ({}ms)", icon(report.status), report.test_case, report.duration_ms);
    for step in &report.steps {
        println!("   {} {} ({}ms)", icon(step.status), step.title, step.duration_ms);
        if let Some(error) = &step.error {
            println!("      {}", error);
        }
        for soft in &step.soft_failures {
            println!("      ⚠️  {}", soft.message);
        }
    }
}

fn save_report<T: Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("📄 Report saved to: {}", path.display());
        }
        None => println!("\n--- Run Report ---\n{}", json),
    }
    Ok(())
}
