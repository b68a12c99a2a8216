//! Attribution CLI: multi-touch attribution and ad-platform conversion sync
//! over a JSON contact snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use attribution_core::config::AppConfig;
use attribution_core::types::{AttributionModelKind, LifecycleStage, RequestContext};
use attribution_engine::crm::ContactRecord;
use attribution_engine::{AttributionLedger, AttributionOrchestrator, ContactAttributionReport, InMemoryCrm};
use attribution_signaling::{DryRunTransport, SyncDispatcher};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "attribution-cli")]
#[command(about = "Multi-touch attribution and offline conversion sync")]
#[command(version)]
struct Cli {
    /// JSON snapshot of contacts and their touchpoints
    #[arg(long, env = "ATTRIBUTION__SNAPSHOT")]
    snapshot: PathBuf,

    /// Lookback window in days (overrides config)
    #[arg(long, env = "ATTRIBUTION__ATTRIBUTION__LOOKBACK_DAYS")]
    lookback_days: Option<u32>,

    /// Log platform payloads instead of sending them (overrides config)
    #[arg(long, env = "ATTRIBUTION__SIGNALING__DRY_RUN")]
    dry_run: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Allocate a conversion value across a contact's touchpoints
    Calculate {
        #[arg(long)]
        contact: String,
        #[arg(long)]
        value: f64,
        /// first_touch, last_touch, linear, w_shaped or full_path
        #[arg(long, env = "ATTRIBUTION__ATTRIBUTION__DEFAULT_MODEL")]
        model: Option<String>,
    },
    /// Send a lifecycle transition to the eligible ad platforms and move the
    /// contact to the new stage once at least one platform accepted it
    Sync {
        #[arg(long)]
        contact: String,
        #[arg(long)]
        from: LifecycleStage,
        #[arg(long)]
        to: LifecycleStage,
        #[arg(long)]
        value: Option<f64>,
        /// Calculate attribution with this model first and record the
        /// credited touchpoints on the event (needs --value)
        #[arg(long)]
        model: Option<AttributionModelKind>,
    },
    /// Summarize a contact's attribution
    Report {
        #[arg(long)]
        contact: String,
        /// Calculate every model for this value before reporting. Defaults to
        /// the contact's written-back revenue; with neither, the report holds
        /// the CRM fields only and omits `latest_by_model`
        #[arg(long)]
        value: Option<f64>,
    },
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    contacts: Vec<ContactRecord>,
}

fn load_snapshot(path: &Path) -> anyhow::Result<InMemoryCrm> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot {}", path.display()))?;

    let crm = InMemoryCrm::new();
    for contact in snapshot.contacts {
        crm.upsert_contact(contact)?;
    }
    info!(contacts = crm.contact_count(), "Snapshot loaded");
    Ok(crm)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "attribution_cli=info,attribution_engine=info,attribution_signaling=info".into()
            }),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(days) = cli.lookback_days {
        config.attribution.lookback_days = days;
    }
    if let Some(dry_run) = cli.dry_run {
        config.signaling.dry_run = dry_run;
    }
    if let Command::Calculate { model: Some(model), .. } = &cli.command {
        config.attribution.default_model = model.clone();
    }
    config.validate()?;

    info!(
        default_model = %config.attribution.default_model,
        lookback_days = config.attribution.lookback_days,
        dry_run = config.signaling.dry_run,
        "Configuration loaded"
    );

    let crm = Arc::new(load_snapshot(&cli.snapshot)?);
    let ctx = RequestContext::new();

    match cli.command {
        Command::Calculate { contact, value, .. } => {
            let orchestrator = AttributionOrchestrator::new(crm.clone(), crm.clone(), &config.attribution);
            let model = config.attribution.default_model()?;
            let record = orchestrator.calculate_with(&ctx, &contact, value, model).await?;
            print_json(&record)?;
        }
        Command::Sync {
            contact,
            from,
            to,
            value,
            model,
        } => {
            if !config.signaling.dry_run {
                bail!("no live conversion transport is available; run with --dry-run true");
            }
            let dispatcher = SyncDispatcher::from_config(crm.clone(), &config, Arc::new(DryRunTransport));
            let event = match model {
                Some(model) => {
                    let Some(value) = value else {
                        bail!("--model needs --value to calculate attribution");
                    };
                    let orchestrator =
                        AttributionOrchestrator::new(crm.clone(), crm.clone(), &config.attribution);
                    let record = orchestrator.calculate_with(&ctx, &contact, value, model).await?;
                    dispatcher
                        .sync_attributed(&ctx, &contact, from, to, Some(value), &record)
                        .await?
                }
                None => dispatcher.sync(&ctx, &contact, from, to, value).await?,
            };
            if !event.synced_platforms().is_empty() {
                let previous = crm.set_lifecycle_stage(&contact, to);
                info!(
                    contact_id = %contact,
                    previous_stage = ?previous,
                    stage = %to,
                    "Lifecycle stage updated"
                );
            }
            print_json(&event)?;
        }
        Command::Report { contact, value } => {
            let ledger = AttributionLedger::new();
            let stored = crm
                .get_contact(&contact)
                .with_context(|| format!("contact {contact} not found in snapshot"))?;
            if let Some(value) = value.or(stored.attributed_revenue) {
                let orchestrator =
                    AttributionOrchestrator::new(crm.clone(), crm.clone(), &config.attribution);
                for model in AttributionModelKind::ALL {
                    ledger.record(orchestrator.calculate_with(&ctx, &contact, value, model).await?);
                }
            }
            let record = crm
                .get_contact(&contact)
                .with_context(|| format!("contact {contact} not found in snapshot"))?;
            print_json(&ContactAttributionReport::build(&record, &ledger))?;
        }
    }

    Ok(())
}
