//! PPG Monitor - live heart rate, HRV and SpO2 from a simulated sensor
//!
//! Usage: ppg-monitor [PROFILE | CONFIG.json] [SECONDS]
//!
//! PROFILE is one of `bandpass_edge`, `adaptive_baseline` or `batch_window`.

mod monitor_service;

use anyhow::{Context, Result};
use clap::Parser;
use monitor_service::MonitorService;
use ppg_processing::{PipelineConfig, PipelineProfile};
use ppg_simulation::{start_ppg_stream, FingerLift, PulsePattern, SimulatorConfig, StreamCommand, StreamConfig};
use std::path::Path;
use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Live heart rate, HRV and SpO2 from a simulated PPG sensor
#[derive(Parser, Debug)]
#[command(name = "ppg-monitor", version)]
struct Cli {
    /// Pipeline profile (bandpass_edge, adaptive_baseline, batch_window) or a JSON config path
    profile_or_config: Option<String>,

    /// Seconds of signal to monitor
    #[arg(default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    seconds: u64,
}

impl Cli {
    fn pipeline(&self) -> Result<PipelineConfig> {
        match self.profile_or_config.as_deref() {
            Some(arg) => pipeline_config(arg),
            None => Ok(PipelineConfig::default()),
        }
    }
}

fn pipeline_config(arg: &str) -> Result<PipelineConfig> {
    let profile = match arg {
        "bandpass_edge" => PipelineProfile::BandpassEdge,
        "adaptive_baseline" => PipelineProfile::AdaptiveBaseline,
        "batch_window" => PipelineProfile::BatchWindow,
        path => return load_config(Path::new(path)),
    };
    Ok(PipelineConfig::for_profile(profile))
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    PipelineConfig::from_json(&json).with_context(|| format!("invalid configuration in {}", path.display()))
}

/// Stress response with a short finger lift two thirds of the way through
fn demo_stream(pipeline: &PipelineConfig, seconds: u64) -> StreamConfig {
    let seconds = seconds as f32;
    StreamConfig {
        simulator: SimulatorConfig {
            sampling_rate: pipeline.sample_rate_hz,
            pattern: PulsePattern::Stress {
                base_bpm: 72.0,
                surge_bpm: 22.0,
                onset: seconds / 3.0,
            },
            finger_lifts: vec![FingerLift {
                start: seconds * 2.0 / 3.0,
                duration: 2.0,
            }],
            ..SimulatorConfig::default()
        },
        ..StreamConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let pipeline = cli.pipeline()?;
    info!(
        pipeline = %pipeline.name,
        seconds = cli.seconds,
        "starting PPG monitor"
    );

    let stream_config = demo_stream(&pipeline, cli.seconds);
    let (data_receiver, control_sender, stream_stats) = start_ppg_stream(stream_config)
        .await
        .context("failed to start simulated sensor")?;

    let mut service = MonitorService::new(data_receiver, pipeline)
        .context("failed to build processing pipeline")?;

    control_sender
        .send(StreamCommand::Start)
        .await
        .context("sensor stream stopped unexpectedly")?;

    let stats = service
        .run_for(Duration::from_secs(cli.seconds))
        .await
        .context("processing failed")?;

    // The stream task may already be gone on ctrl-c
    let _ = control_sender.send(StreamCommand::Stop).await;

    let stream_stats = stream_stats.lock().await.clone();
    info!(
        chunks = stream_stats.chunks_generated,
        samples = stream_stats.samples_generated,
        "sensor stream finished"
    );
    info!(
        samples = stats.performance.samples_processed,
        records = stats.performance.records_emitted,
        avg_latency_us = format_args!("{:.2}", stats.performance.avg_latency_us),
        max_latency_us = stats.performance.max_latency_us,
        overruns = stats.performance.overruns,
        "pipeline performance"
    );

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
