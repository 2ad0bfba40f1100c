//! Real-time PPG sample streaming in fixed-duration chunks

use crate::ppg_simulator::{PpgSimulator, SimulatorConfig};
use crate::pulse_patterns::PulsePattern;
use ppg_core::{PpgResult, SampleBlock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for real-time streaming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// PPG simulation configuration
    pub simulator: SimulatorConfig,
    /// Chunk duration in seconds (e.g., 0.1 for 100ms chunks)
    pub chunk_duration: f32,
    /// Buffer size for the stream (number of chunks to keep)
    pub buffer_size: usize,
    /// Update rate in Hz (how often to send new data)
    pub update_rate: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            chunk_duration: 0.1, // 100ms chunks
            buffer_size: 50,     // 5 seconds of history at 100ms chunks
            update_rate: 10.0,   // 10 Hz updates
        }
    }
}

/// Commands for controlling the stream
#[derive(Debug, Clone)]
pub enum StreamCommand {
    Start,
    Stop,
    Pause,
    Resume,
    UpdateConfig(StreamConfig),
    UpdatePattern(PulsePattern),
    SetTargetSpo2(f32),
    /// Remove the finger for the given number of seconds
    LiftFinger(f32),
}

/// Stream statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStats {
    pub is_running: bool,
    pub chunks_generated: u64,
    pub samples_generated: u64,
    pub total_duration: f32,
    pub current_bpm: f32,
    pub average_chunk_time: f32,
    pub last_update: u64,
}

/// Real-time PPG sample stream
pub struct RealTimePpgStream {
    config: StreamConfig,
    simulator: PpgSimulator,
    data_sender: broadcast::Sender<SampleBlock>,
    control_receiver: mpsc::Receiver<StreamCommand>,
    control_sender: mpsc::Sender<StreamCommand>,
    is_running: bool,
    stats: Arc<Mutex<StreamStats>>,
}

impl RealTimePpgStream {
    /// Create new real-time PPG stream
    pub fn new(config: StreamConfig) -> PpgResult<Self> {
        let simulator = PpgSimulator::new(config.simulator.clone())?;
        let (data_sender, _) = broadcast::channel(config.buffer_size.max(1));
        let (control_sender, control_receiver) = mpsc::channel(32);

        Ok(RealTimePpgStream {
            config,
            simulator,
            data_sender,
            control_receiver,
            control_sender,
            is_running: false,
            stats: Arc::new(Mutex::new(StreamStats::default())),
        })
    }

    /// Get a receiver for data updates
    pub fn subscribe(&self) -> broadcast::Receiver<SampleBlock> {
        self.data_sender.subscribe()
    }

    /// Get control sender for sending commands
    pub fn control_handle(&self) -> mpsc::Sender<StreamCommand> {
        self.control_sender.clone()
    }

    /// Shared statistics, readable while the stream runs
    pub fn stats_handle(&self) -> Arc<Mutex<StreamStats>> {
        Arc::clone(&self.stats)
    }

    /// Run the streaming loop until the control channel closes
    pub async fn run(&mut self) -> PpgResult<()> {
        let mut interval_timer = interval(self.update_interval());

        info!(
            update_rate = self.config.update_rate,
            chunk_ms = self.config.chunk_duration * 1000.0,
            "PPG stream ready"
        );

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    if self.is_running {
                        self.emit_chunk().await?;
                    }
                }

                command = self.control_receiver.recv() => {
                    let Some(command) = command else {
                        debug!("PPG stream control channel closed");
                        break;
                    };
                    if self.apply(command).await {
                        interval_timer = interval(self.update_interval());
                    }
                }
            }
        }

        Ok(())
    }

    async fn emit_chunk(&mut self) -> PpgResult<()> {
        let start_time = Instant::now();
        let chunk = self.simulator.generate_chunk(self.config.chunk_duration)?;
        let generation_time = start_time.elapsed();

        {
            let mut stats = self.stats.lock().await;
            stats.chunks_generated += 1;
            stats.samples_generated += chunk.len() as u64;
            stats.total_duration += self.config.chunk_duration;
            stats.current_bpm = self.simulator.config().pattern.bpm_at_time(self.simulator.time());
            stats.average_chunk_time +=
                (generation_time.as_secs_f32() - stats.average_chunk_time) / stats.chunks_generated as f32;
            stats.last_update = chunk.created_at;
        }

        // Send to subscribers (ignore if no receivers)
        let _ = self.data_sender.send(chunk);

        if generation_time.as_secs_f32() > self.config.chunk_duration {
            warn!(
                generation_ms = generation_time.as_millis() as u64,
                chunk_ms = self.config.chunk_duration * 1000.0,
                "chunk generation slower than real time"
            );
        }

        Ok(())
    }

    /// Apply a control command, returning true when the timer must be rebuilt
    async fn apply(&mut self, command: StreamCommand) -> bool {
        match command {
            StreamCommand::Start | StreamCommand::Resume => {
                self.set_running(true).await;
                info!("PPG stream running");
            }
            StreamCommand::Pause => {
                self.set_running(false).await;
                info!("PPG stream paused");
            }
            StreamCommand::Stop => {
                self.set_running(false).await;
                self.simulator.reset_time();
                {
                    let mut stats = self.stats.lock().await;
                    stats.chunks_generated = 0;
                    stats.samples_generated = 0;
                    stats.total_duration = 0.0;
                }
                info!("PPG stream stopped");
            }
            StreamCommand::UpdateConfig(new_config) => {
                match self.simulator.update_config(new_config.simulator.clone()) {
                    Ok(()) => {
                        self.config = new_config;
                        info!("PPG stream configuration updated");
                        return true;
                    }
                    Err(e) => error!(error = %e, "rejected stream configuration"),
                }
            }
            StreamCommand::UpdatePattern(pattern) => {
                self.simulator.set_pattern(pattern);
                self.config.simulator.pattern = pattern;
                info!(pattern = pattern.description(), "PPG stream pattern updated");
            }
            StreamCommand::SetTargetSpo2(target) => {
                let mut simulator_config = self.simulator.config().clone();
                simulator_config.target_spo2 = target;
                match self.simulator.update_config(simulator_config) {
                    Ok(()) => {
                        self.config.simulator.target_spo2 = target;
                        info!(target, "PPG stream saturation updated");
                    }
                    Err(e) => error!(error = %e, "rejected saturation target"),
                }
            }
            StreamCommand::LiftFinger(seconds) => {
                self.simulator.lift_finger(seconds);
                info!(seconds, "finger lifted from simulated sensor");
            }
        }

        false
    }

    async fn set_running(&mut self, running: bool) {
        self.is_running = running;
        self.stats.lock().await.is_running = running;
    }

    fn update_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.config.update_rate.max(0.1))
    }

    /// Get current stream statistics
    pub async fn stats(&self) -> StreamStats {
        self.stats.lock().await.clone()
    }

    /// Check if stream is running
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// Get current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

/// Helper function to create and start a stream in the background
pub async fn start_ppg_stream(
    config: StreamConfig,
) -> PpgResult<(
    broadcast::Receiver<SampleBlock>,
    mpsc::Sender<StreamCommand>,
    Arc<Mutex<StreamStats>>,
)> {
    let mut stream = RealTimePpgStream::new(config)?;
    let data_receiver = stream.subscribe();
    let control_sender = stream.control_handle();
    let stats = stream.stats_handle();

    tokio::spawn(async move {
        if let Err(e) = stream.run().await {
            error!(error = %e, "PPG stream failed");
        }
    });

    Ok((data_receiver, control_sender, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, Duration};

    #[tokio::test]
    async fn test_real_time_stream_basic() {
        let config = StreamConfig {
            chunk_duration: 0.05, // 50ms chunks for faster testing
            update_rate: 20.0,
            ..Default::default()
        };

        let (mut data_receiver, control_sender, _) = start_ppg_stream(config).await.unwrap();
        control_sender.send(StreamCommand::Start).await.unwrap();

        let mut chunk_count = 0;
        let mut last_timestamp = None;
        while chunk_count < 3 {
            let chunk = data_receiver.recv().await.unwrap();
            assert_eq!(chunk.duration(), 0.05);
            assert_eq!(chunk.len(), 5);

            // Timestamps continue across chunks
            let first = chunk.samples[0].timestamp_ms;
            if let Some(previous) = last_timestamp {
                assert_eq!(first, previous + 10);
            }
            last_timestamp = chunk.samples.last().map(|s| s.timestamp_ms);
            chunk_count += 1;
        }

        control_sender.send(StreamCommand::Stop).await.unwrap();
    }

    #[tokio::test]
    async fn test_stream_control_commands() {
        let (mut data_receiver, control_sender, stats) =
            start_ppg_stream(StreamConfig::default()).await.unwrap();

        control_sender.send(StreamCommand::Start).await.unwrap();
        sleep(Duration::from_millis(100)).await;

        control_sender.send(StreamCommand::Pause).await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(!stats.lock().await.is_running);

        control_sender.send(StreamCommand::Resume).await.unwrap();
        control_sender
            .send(StreamCommand::UpdatePattern(PulsePattern::Steady { bpm: 90.0 }))
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;

        let chunk = data_receiver.recv().await.unwrap();
        assert!(!chunk.is_empty());
        assert!(stats.lock().await.chunks_generated > 0);

        control_sender.send(StreamCommand::Stop).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(stats.lock().await.chunks_generated, 0);
    }

    #[tokio::test]
    async fn test_lift_finger_command() {
        let config = StreamConfig {
            chunk_duration: 0.05,
            update_rate: 50.0,
            ..Default::default()
        };
        let (mut data_receiver, control_sender, _) = start_ppg_stream(config).await.unwrap();

        control_sender.send(StreamCommand::LiftFinger(10.0)).await.unwrap();
        control_sender.send(StreamCommand::Start).await.unwrap();

        let chunk = data_receiver.recv().await.unwrap();
        assert!(chunk.samples.iter().all(|s| s.ir < 50_000));

        control_sender.send(StreamCommand::Stop).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut stream = RealTimePpgStream::new(StreamConfig::default()).unwrap();
        let mut bad = StreamConfig::default();
        bad.simulator.target_spo2 = 150.0;

        assert!(!stream.apply(StreamCommand::UpdateConfig(bad)).await);
        assert_eq!(stream.config().simulator.target_spo2, 97.0);
    }
}
