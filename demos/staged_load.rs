// Loads a manifest over HTTP and prints what the session reports
//
//   cargo run --example staged_load -- manifest.json [options.json]
//
// Without arguments a small built-in manifest is used.

use anyhow::{Context, Result};
use log::info;
use staged_loader::loader::{HttpFetcher, Manifest};
use staged_loader::policy::{SystemMemoryProvider, ThroughputEstimator};
use staged_loader::{LoaderEvent, LoaderOptions, ReadyResult, StagedLoader};
use std::sync::Arc;

const BUILTIN_MANIFEST: &str = r#"{
  "resources": [
    { "id": "building", "order": 1, "kind": "model", "isCritical": true,
      "uri": "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Models/master/2.0/Box/glTF-Binary/Box.glb" },
    { "id": "crate-texture", "order": 2, "kind": "texture",
      "uri": "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Models/master/2.0/BoxTextured/glTF/CesiumLogoFlat.png" },
    { "id": "duck", "order": 3, "kind": "model",
      "uri": "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Models/master/2.0/Duck/glTF-Binary/Duck.glb" }
  ]
}"#;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let manifest = match args.next() {
        Some(path) => Manifest::from_path(&path)?,
        None => Manifest::from_json(BUILTIN_MANIFEST).context("Built-in manifest is invalid")?,
    };
    let options = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read options {}", path))?;
            LoaderOptions::from_json(&json).with_context(|| format!("Failed to parse options {}", path))?
        }
        None => LoaderOptions::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    runtime.block_on(run(manifest, options))
}

async fn run(manifest: Manifest, options: LoaderOptions) -> Result<()> {
    info!("Loading {} resource(s)", manifest.resources.len());

    let session = StagedLoader::new(Arc::new(HttpFetcher::new()))
        .with_options(options)
        .with_memory(Arc::new(SystemMemoryProvider::new()))
        .with_throughput_estimator(Arc::new(ThroughputEstimator::default()))
        .start(manifest.resources)?;

    let _subscription = session.subscribe(|event| match event {
        LoaderEvent::Progress(update) => {
            info!("Progress {:>5.1}%", update.fraction * 100.0);
        }
        LoaderEvent::TaskSucceeded { id, bytes } => info!("Loaded {} ({} bytes)", id, bytes),
        LoaderEvent::TaskFailed { id, error } => info!("Failed {}: {}", id, error),
        LoaderEvent::TierChanged(tier) => info!("Quality tier is now {}", tier),
        _ => {}
    });

    match session.await_ready().await {
        ReadyResult::Ready => info!("Critical resource ready, scene can be shown"),
        ReadyResult::CriticalLoadFailed(error) => info!("Critical resource failed: {}", error),
    }

    let snapshot = session.wait_until(|s| s.all_complete || s.disposed).await;
    for task in &snapshot.tasks {
        info!(
            "{:<16} {:<10} attempts: {}",
            task.id,
            task.state.to_string(),
            task.attempt
        );
    }

    let stats = session.store_stats();
    info!(
        "Done: {} resource(s), {} bytes in memory",
        stats.resource_count, stats.total_bytes
    );
    session.dispose().await;
    Ok(())
}
