use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use session_core::{
    load_image, load_settings, ApplyOutcome, BroadcastSink, DiagnosisBackend,
    HttpDiagnosisBackend, Notification, SessionRuntime, Settings, UserAction,
};
use shared::domain::PatientMetadataPatch;
use tokio::sync::broadcast;

mod present;

#[derive(Parser, Debug)]
#[command(name = "diagnose-cli", about = "Mammogram analysis against the diagnosis service")]
struct Cli {
    /// Base URL of the inference service (overrides diagnosis.toml and API_BASE_URL).
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload an image with optional patient data and print the diagnosis.
    Diagnose(DiagnoseArgs),
    /// Generate a Grad-CAM heatmap for an image.
    Explain {
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Check that the service is up.
    Health,
}

#[derive(Args, Debug)]
struct DiagnoseArgs {
    image: PathBuf,
    #[arg(long, value_parser = clap::value_parser!(u16).range(18..=120))]
    age: Option<u16>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pain_level: Option<u8>,
    #[arg(long)]
    family_history: bool,
    #[arg(long)]
    lump_detected: bool,
    #[arg(long)]
    nipple_discharge: bool,
    /// Also request a Grad-CAM heatmap once the diagnosis is in.
    #[arg(long)]
    explain: bool,
    /// Where to write the decoded heatmap PNG (implies --explain).
    #[arg(long)]
    heatmap_out: Option<PathBuf>,
    /// Print the raw diagnosis as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

impl DiagnoseArgs {
    fn metadata_patch(&self) -> PatientMetadataPatch {
        let mut patch = PatientMetadataPatch::default()
            .family_history(self.family_history)
            .lump_detected(self.lump_detected)
            .nipple_discharge(self.nipple_discharge);
        if let Some(age) = self.age {
            patch = patch.age(age);
        }
        if let Some(pain_level) = self.pain_level {
            patch = patch.pain_level(pain_level);
        }
        patch
    }
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_settings()?;
    if let Some(url) = &cli.api_base_url {
        settings.api_base_url = session_core::backend::normalize_base_url(url)?;
    }
    if let Some(timeout) = cli.timeout_secs {
        settings.request_timeout_secs = timeout;
    }
    Ok(settings)
}

struct Session {
    runtime: SessionRuntime,
    notifications: broadcast::Receiver<Notification>,
}

impl Session {
    fn new(settings: &Settings, backend: Arc<dyn DiagnosisBackend>, auto_diagnose: bool) -> Self {
        let sink = BroadcastSink::new(16);
        let notifications = sink.subscribe();
        let runtime = SessionRuntime::new(settings.layout, backend, Arc::new(sink))
            .with_auto_diagnose(auto_diagnose);
        Self {
            runtime,
            notifications,
        }
    }

    /// Drains completions, prints the notifications they produced, and
    /// returns whether anything failed.
    async fn settle(&mut self) -> bool {
        let outcomes = self.runtime.run_until_idle().await;
        while let Ok(notification) = self.notifications.try_recv() {
            present::print_notification(&notification);
        }
        outcomes.contains(&ApplyOutcome::Failed)
    }
}

async fn run_diagnose(mut session: Session, args: DiagnoseArgs) -> Result<()> {
    let asset = load_image(&args.image).await?;
    // Metadata goes in before selection so the automatic diagnose carries it.
    session
        .runtime
        .handle(UserAction::UpdateMetadata(args.metadata_patch()))?;
    session.runtime.handle(UserAction::SelectImage(asset))?;
    if session.settle().await {
        bail!("diagnosis of '{}' failed", args.image.display());
    }

    let store = session.runtime.store();
    let Some(result) = store.diagnosis() else {
        bail!("no diagnosis was produced for '{}'", args.image.display());
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        present::print_diagnosis(result);
    }

    if args.explain || args.heatmap_out.is_some() {
        session.runtime.handle(UserAction::Explain)?;
        if session.settle().await {
            bail!("heatmap generation failed");
        }
        if let Some(out) = &args.heatmap_out {
            write_heatmap(&session.runtime, out).await?;
        }
    }
    Ok(())
}

async fn run_explain(mut session: Session, image: PathBuf, out: PathBuf) -> Result<()> {
    let asset = load_image(&image).await?;
    session.runtime.select_image(asset);
    session.runtime.handle(UserAction::Explain)?;
    if session.settle().await {
        bail!("heatmap generation for '{}' failed", image.display());
    }
    write_heatmap(&session.runtime, &out).await
}

async fn write_heatmap(runtime: &SessionRuntime, out: &Path) -> Result<()> {
    let heatmap = runtime
        .store()
        .heatmap()
        .context("service returned no heatmap for the selected image")?;
    let png = heatmap.decode().context("heatmap is not valid base64")?;
    tokio::fs::write(out, png)
        .await
        .with_context(|| format!("failed to write heatmap to '{}'", out.display()))?;
    println!("heatmap written to {}", out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = resolve_settings(&cli)?;
    tracing::debug!(
        api_base_url = %settings.api_base_url,
        timeout_secs = settings.request_timeout_secs,
        "settings resolved"
    );
    let backend: Arc<dyn DiagnosisBackend> = Arc::new(
        HttpDiagnosisBackend::new(&settings.api_base_url, settings.request_timeout())
            .context("failed to build inference client")?,
    );

    match cli.command {
        Command::Diagnose(args) => {
            run_diagnose(Session::new(&settings, Arc::clone(&backend), true), args).await
        }
        Command::Explain { image, out } => {
            run_explain(Session::new(&settings, Arc::clone(&backend), false), image, out).await
        }
        Command::Health => {
            let health = backend
                .health()
                .await
                .with_context(|| format!("service at {} is unreachable", settings.api_base_url))?;
            present::print_health(&health);
            Ok(())
        }
    }
}
