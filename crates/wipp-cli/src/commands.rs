use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use wipp_domain::{Field, ProviderConfiguration, ProviderKey};
use wipp_reconciler::{reconcile_all, run_roundtrip};
use wipp_service::{GcpIamService, GcpIamServiceConfig, IdentityService, InMemoryService};

use crate::cli::{BackendArg, BackendSettings, OutputFormat};
use crate::output;

// ── Validate ──────────────────────────────────────────────────────────────────

pub fn validate(path: PathBuf) -> Result<()> {
    let configs = load(&path)?;
    let mut failed = 0;
    for config in &configs {
        match wipp_validate::validate(config) {
            Ok(_) => println!("ok    {}", config.key()),
            Err(e) => {
                failed += 1;
                println!("error {}", config.key());
                for problem in e.errors() {
                    println!("      {}", problem);
                }
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} provider(s) failed validation", failed, configs.len());
    }
    println!("{} provider(s) valid.", configs.len());
    Ok(())
}

// ── Plan / Apply ──────────────────────────────────────────────────────────────

pub async fn plan(path: PathBuf, output: OutputFormat, backend: BackendSettings) -> Result<()> {
    run_reconcile(path, output, backend, true).await
}

pub async fn apply(path: PathBuf, output: OutputFormat, backend: BackendSettings) -> Result<()> {
    run_reconcile(path, output, backend, false).await
}

async fn run_reconcile(
    path: PathBuf,
    output: OutputFormat,
    backend: BackendSettings,
    dry_run: bool,
) -> Result<()> {
    let configs = load(&path)?;
    let service = connect(&backend).await?;
    info!(
        backend = service.name(),
        providers = configs.len(),
        dry_run,
        "Reconciling"
    );

    let results = reconcile_all(configs, service, dry_run)
        .await
        .context("Reconcile failed")?;

    match output {
        OutputFormat::Text => print!("{}", output::render_results(&results)),
        OutputFormat::Json => println!("{}", output::results_json(&results)?),
    }

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed > 0 {
        bail!("{} provider(s) failed", failed);
    }
    Ok(())
}

// ── Show ──────────────────────────────────────────────────────────────────────

pub async fn show(pool_id: String, provider_id: String, backend: BackendSettings) -> Result<()> {
    let key = ProviderKey::new(pool_id, provider_id);
    let service = connect(&backend).await?;
    let observed = service
        .read(&key)
        .await
        .with_context(|| format!("Failed to read provider {key}"))?;
    println!("{}", serde_json::to_string_pretty(&observed)?);
    Ok(())
}

// ── Destroy ───────────────────────────────────────────────────────────────────

pub async fn destroy(
    pool_id: String,
    provider_id: String,
    yes: bool,
    backend: BackendSettings,
) -> Result<()> {
    let key = ProviderKey::new(pool_id, provider_id);

    if !yes {
        print!("Delete provider {key}? [y/N] ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let service = connect(&backend).await?;
    service
        .delete(&key)
        .await
        .with_context(|| format!("Failed to delete provider {key}"))?;
    println!("- {key} deleted");
    Ok(())
}

// ── Verify ────────────────────────────────────────────────────────────────────

pub async fn verify(steps: Vec<PathBuf>, ignore: Vec<Field>, backend: BackendSettings) -> Result<()> {
    let configs = steps
        .iter()
        .map(|p| {
            wipp_config::load_provider_file(p)
                .with_context(|| format!("Failed to load {}", p.display()))
        })
        .collect::<Result<Vec<ProviderConfiguration>>>()?;

    let service = connect(&backend).await?;
    let report = run_roundtrip(service, &configs, &ignore)
        .await
        .context("Round trip failed")?;

    print!("{}", output::render_lifecycle(&report));
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load(path: &Path) -> Result<Vec<ProviderConfiguration>> {
    let configs = wipp_config::load_providers(path)
        .with_context(|| format!("Failed to load providers from {}", path.display()))?;
    if configs.is_empty() {
        bail!("No provider files found under {}", path.display());
    }
    Ok(configs)
}

async fn connect(settings: &BackendSettings) -> Result<Arc<dyn IdentityService>> {
    match settings.backend {
        BackendArg::Memory => Ok(Arc::new(InMemoryService::new())),
        BackendArg::Gcp => {
            let project = settings
                .gcp_project
                .clone()
                .context("--gcp-project (or WIPP_GCP_PROJECT) is required for --backend gcp")?;
            let service = GcpIamService::from_adc(GcpIamServiceConfig { project })
                .await
                .context("Failed to initialise GCP IAM client")?;
            Ok(Arc::new(service))
        }
    }
}
