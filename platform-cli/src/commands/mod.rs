// =============================================================================
// RANSIM CLI COMMANDS - platform-cli/src/commands/mod.rs
// Operator command implementations
// =============================================================================

//! One function per subcommand. Each resolves the sandbox from the effective
//! configuration first; every path the operator names is then checked against
//! it by the library before anything is written.

use anyhow::{Context, Result as AnyhowResult};
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;

use ransim::{
    generate_operator_keypair, populate_safe_zone, spawn_simulation, CanaryDetector, ChannelSink,
    DecoyDeployment, DecoyRegistry, SimulationRequest, SimulatorConfiguration,
};
use shared::{Decoy, DecoyStatus, EncryptionAlgorithm};

const OPERATOR_KEY_DIR: &str = "operator_keys";
const PRIVATE_KEY_FILE: &str = "operator_private.pem";
const PUBLIC_KEY_FILE: &str = "operator_public.pem";

/// Window for filesystem events still in flight after a run finishes.
const DETECTOR_DRAIN: Duration = Duration::from_millis(500);

pub struct SimulateArgs {
    pub root: Option<PathBuf>,
    pub algorithm: Option<String>,
    pub all_files: bool,
    pub extensions: Vec<String>,
    pub note_file: Option<PathBuf>,
    pub public_key: Option<PathBuf>,
    pub decoys: Vec<String>,
    pub output: Option<PathBuf>,
}

pub struct KeygenArgs {
    pub out_dir: Option<PathBuf>,
    pub bits: usize,
}

pub struct SentinelArgs {
    pub dir: Option<PathBuf>,
    pub decoys: Vec<String>,
    pub log_triggers: bool,
}

pub fn populate(config: &SimulatorConfiguration) -> AnyhowResult<()> {
    let zone = config.establish_zone().context("Safe zone setup failed")?;
    let written = populate_safe_zone(&zone).context("Safe zone population failed")?;
    println!("Populated {} with {} files", zone.root().display(), written.len());
    Ok(())
}

pub async fn simulate(mut config: SimulatorConfiguration, args: SimulateArgs) -> AnyhowResult<()> {
    apply_overrides(&mut config, &args)?;
    let zone = config.establish_zone().context("Safe zone setup failed")?;
    let root = args.root.clone().unwrap_or_else(|| zone.root().to_path_buf());

    let mut request = SimulationRequest::new(root.clone(), config.simulation.algorithm);
    request.filter = config.extension_filter();
    request.note_text = config.note_text();
    request.operator_public_key_pem = config
        .operator_public_key()
        .context("Failed to read operator public key")?;

    let detector = if args.decoys.is_empty() {
        None
    } else {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut detector = CanaryDetector::start(DecoyRegistry::new(zone.clone()), ChannelSink(tx), config.detector_settings())
            .await
            .context("Canary detector startup failed")?;
        for name in &args.decoys {
            detector
                .deploy(DecoyDeployment::from_file_name(name, &root))
                .await
                .with_context(|| format!("Failed to deploy decoy {}", name))?;
        }
        tokio::spawn(report_triggers(rx));
        Some(detector)
    };

    let mut handle = spawn_simulation(zone.clone(), request);
    let cancel = handle.cancellation();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling after the current file");
            cancel.cancel();
        }
    });

    while let Some(progress) = handle.next_progress().await {
        info!(
            "Progress: {}/{} files ({}%) after {:.2}s",
            progress.done,
            progress.total,
            progress.percent(),
            progress.elapsed_seconds
        );
    }
    let metrics = handle.join().await.context("Simulation failed")?;

    if let Some(detector) = detector {
        tokio::time::sleep(DETECTOR_DRAIN).await;
        let decoys = detector.registry().snapshot().await;
        detector.shutdown().await.context("Canary detector shutdown failed")?;
        for decoy in &decoys {
            println!("Decoy {:<24} {}", decoy.name, status_label(decoy));
        }
    }

    let json = serde_json::to_string_pretty(&metrics).context("Metrics serialization failed")?;
    match &args.output {
        Some(path) => {
            let target = zone.ensure_contained(path)?;
            fs::write(&target, json).with_context(|| format!("Failed to write {}", target.display()))?;
            println!("Metrics written to {}", target.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn apply_overrides(config: &mut SimulatorConfiguration, args: &SimulateArgs) -> AnyhowResult<()> {
    if let Some(text) = &args.algorithm {
        config.simulation.algorithm = text.parse::<EncryptionAlgorithm>()?;
    }
    if args.all_files {
        config.simulation.all_files = true;
    }
    if !args.extensions.is_empty() {
        config.simulation.extensions = args.extensions.clone();
    }
    if let Some(path) = &args.note_file {
        config.simulation.note_text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read note file {}", path.display()))?;
        config.simulation.drop_notes = true;
    }
    if let Some(path) = &args.public_key {
        config.simulation.public_key_path = Some(path.clone());
    }
    config.normalize();
    config.validate().context("Invalid simulation options")?;
    Ok(())
}

async fn report_triggers(mut triggers: mpsc::UnboundedReceiver<Decoy>) {
    while let Some(decoy) = triggers.recv().await {
        error!(
            "CANARY TRIGGERED: {} in {} at {}",
            decoy.name,
            decoy.directory.display(),
            decoy
                .triggered_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown time".into())
        );
    }
}

fn status_label(decoy: &Decoy) -> String {
    match (decoy.status, decoy.triggered_at) {
        (DecoyStatus::Triggered, Some(at)) => format!("TRIGGERED at {}", at.to_rfc3339()),
        (DecoyStatus::Triggered, None) => "TRIGGERED".into(),
        (DecoyStatus::Armed, _) => "armed".into(),
    }
}

pub fn keygen(config: &SimulatorConfiguration, args: KeygenArgs) -> AnyhowResult<()> {
    let zone = config.establish_zone().context("Safe zone setup failed")?;
    let out_dir = args.out_dir.unwrap_or_else(|| zone.root().join(OPERATOR_KEY_DIR));
    let out_dir = zone.ensure_contained(&out_dir)?;
    fs::create_dir_all(&out_dir).with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let pair = generate_operator_keypair(args.bits).context("Key pair generation failed")?;
    let private_path = zone.ensure_contained(&out_dir.join(PRIVATE_KEY_FILE))?;
    let public_path = zone.ensure_contained(&out_dir.join(PUBLIC_KEY_FILE))?;
    fs::write(&private_path, pair.private_pem.as_bytes())
        .with_context(|| format!("Failed to write {}", private_path.display()))?;
    fs::write(&public_path, pair.public_pem.as_bytes())
        .with_context(|| format!("Failed to write {}", public_path.display()))?;

    println!("Private key: {}", private_path.display());
    println!("Public key:  {}", public_path.display());
    Ok(())
}

pub async fn sentinel(config: &SimulatorConfiguration, args: SentinelArgs) -> AnyhowResult<()> {
    let zone = config.establish_zone().context("Safe zone setup failed")?;
    let dir = args.dir.unwrap_or_else(|| zone.root().to_path_buf());

    let (tx, mut triggers) = mpsc::unbounded_channel();
    let mut detector = CanaryDetector::start(DecoyRegistry::new(zone), ChannelSink(tx), config.detector_settings())
        .await
        .context("Canary detector startup failed")?;
    for name in &args.decoys {
        let request = DecoyDeployment::from_file_name(name, &dir).with_logging(args.log_triggers);
        let decoy = detector
            .deploy(request)
            .await
            .with_context(|| format!("Failed to deploy decoy {}", name))?;
        println!("Armed {} ({})", decoy.bait_path.display(), decoy.id);
    }
    info!("Sentinel armed with {} decoys; press Ctrl-C to stop", args.decoys.len());

    loop {
        tokio::select! {
            Some(decoy) = triggers.recv() => println!("TRIGGERED: {} {}", decoy.name, status_label(&decoy)),
            _ = signal::ctrl_c() => break,
        }
    }

    let counts = detector.registry().counts();
    detector.shutdown().await.context("Canary detector shutdown failed")?;
    println!("{} armed, {} triggered", counts.armed, counts.triggered);
    Ok(())
}

pub fn show_config(config: &SimulatorConfiguration, show: bool) -> AnyhowResult<()> {
    config.validate().context("Configuration is invalid")?;
    if show {
        println!("{}", config.to_toml()?);
    } else {
        println!("Configuration is valid");
    }
    Ok(())
}
