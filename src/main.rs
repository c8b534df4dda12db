use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use repomirror::config::Integration;
use repomirror::health::CheckResult;
use repomirror::{telemetry, Config, HealthCheck, OutcomeState, Repository, RunReport, Source, SourcePlugin, SyncEngine};

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(about = "Mirror repositories between hosting providers, keeping branches and tags in sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging (debug level, also on top of RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror every enabled integration
    Sync {
        /// Run only the integration with this name
        #[arg(long)]
        integration: Option<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the source repositories that would be mirrored
    List {
        /// Run only the integration with this name
        #[arg(long)]
        integration: Option<String>,

        /// Show repository details
        #[arg(long)]
        details: bool,
    },

    /// System health check and diagnostics
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = load_config(cli.config)?;
    let _telemetry = telemetry::init(&config.logging, cli.verbose)?;
    info!("Starting repomirror v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync { integration, json } => {
            cmd_sync(select_integration(config, integration.as_deref())?, json).await
        }
        Commands::List {
            integration,
            details,
        } => cmd_list(&select_integration(config, integration.as_deref())?, details).await,
        Commands::Check => cmd_check(&config).await,
    }
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Narrow the configuration to one integration when a name is given
fn select_integration(mut config: Config, name: Option<&str>) -> Result<Config> {
    if let Some(name) = name {
        config.integrations.retain(|i| i.name == name);
        if config.integrations.is_empty() {
            bail!("No integration named '{}' in configuration", name);
        }
    }
    Ok(config)
}

/// Mirror repositories according to configuration
///
/// Failed repositories are reported but do not change the exit code.
async fn cmd_sync(config: Config, json: bool) -> Result<()> {
    if config.integrations.is_empty() {
        println!("No integrations configured");
        return Ok(());
    }

    let engine = SyncEngine::from_config(&config);
    let report = engine.run(&config).await;

    if json {
        let rendered = serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
        println!("{}", rendered);
    } else {
        print_run_report(&report);
    }

    Ok(())
}

fn print_run_report(report: &RunReport) {
    for integration in &report.integrations {
        println!("🔗 {}", integration.name);

        if let repomirror::IntegrationStatus::Skipped { reason } = &integration.status {
            println!("   ⏭️  Skipped: {}", reason);
            continue;
        }

        for repo in &integration.repositories {
            match repo.state {
                OutcomeState::Done => println!("   ✅ {}", repo.slug),
                OutcomeState::PartialFailure => {
                    println!("   ⚠️  {}", repo.slug);
                    if !repo.outcome.failed_tags.is_empty() {
                        println!("      Failed tags: {}", repo.outcome.failed_tags.join(", "));
                    }
                    if !repo.outcome.failed_branches.is_empty() {
                        println!("      Failed branches: {}", repo.outcome.failed_branches.join(", "));
                    }
                }
                OutcomeState::FatalFailure => {
                    let error = repo
                        .outcome
                        .fatal_error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_default();
                    println!("   ❌ {}: {}", repo.slug, error);
                }
            }
        }
        for slug in &integration.dropped {
            println!("   ⏭️  {} (not available on target)", slug);
        }
    }

    let totals = &report.totals;
    println!("\n🎉 Synchronization Complete!");
    println!("   ✅ Done: {}", totals.done);
    println!("   ⚠️  Partial failures: {}", totals.partial);
    println!("   ❌ Fatal failures: {}", totals.fatal);
    println!("   ⏭️  Dropped repositories: {}", totals.dropped);
    println!("   ⏭️  Skipped integrations: {}", totals.skipped_integrations);
    println!("   ⏱️  Duration: {:.2}s", report.duration_secs);
}

/// List repositories that would be mirrored
///
/// A broken integration is reported and skipped; the others are still listed.
async fn cmd_list(config: &Config, details: bool) -> Result<()> {
    for integration in config.enabled_integrations() {
        let repositories = match list_integration(integration, config, details).await {
            Ok(repositories) => repositories,
            Err(e) => {
                error!(integration = %integration.name, error = %format!("{:#}", e), "Listing failed");
                println!("🔗 {}: ❌ {:#}", integration.name, e);
                continue;
            }
        };

        println!("🔗 {} ({}): {} repositories", integration.name, integration.source.kind, repositories.len());
        for repo in repositories {
            println!("  📁 {}", repo.slug);
            if details {
                if !repo.description.is_empty() {
                    println!("     📝 {}", repo.description);
                }
                println!("     🔗 {}", repo.source_url);
            }
        }
    }

    Ok(())
}

async fn list_integration(integration: &Integration, config: &Config, details: bool) -> Result<Vec<Repository>> {
    let source = SourcePlugin::from_config(&integration.source, config).context("Source misconfigured")?;
    source.authenticate().await.context("Source authentication failed")?;
    source
        .repositories(details)
        .await
        .context("Repository listing failed")
}

/// System health check and diagnostics
async fn cmd_check(config: &Config) -> Result<()> {
    let health = HealthCheck::run(config).await;
    print_health_report(&health);

    if !health.all_passed() {
        bail!("{} health checks failed", health.errors().len());
    }
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 repomirror System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(&name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
