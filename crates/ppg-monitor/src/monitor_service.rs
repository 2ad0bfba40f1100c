//! Feeds streamed sample blocks through the feature pipeline

use ppg_core::{FeatureRecord, PpgResult, SampleBlock};
use ppg_processing::{PerformanceSummary, Pipeline, PipelineConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Running totals for a monitoring session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorStats {
    pub blocks_processed: u64,
    pub records_emitted: u64,
    pub blocks_skipped: u64,
    pub contact_changes: u64,
    pub performance: PerformanceSummary,
    pub last_record: Option<FeatureRecord>,
}

/// Pipeline host consuming a sample stream
pub struct MonitorService {
    pipeline: Pipeline,
    input_receiver: broadcast::Receiver<SampleBlock>,
    stats: MonitorStats,
    last_report_s: Option<u64>,
}

impl MonitorService {
    pub fn new(
        input_receiver: broadcast::Receiver<SampleBlock>,
        config: PipelineConfig,
    ) -> PpgResult<Self> {
        let pipeline = Pipeline::new(config)?;
        let (conditioner, detector) = pipeline.strategy_names();
        info!(conditioner, detector, "monitor pipeline ready");

        Ok(Self {
            pipeline,
            input_receiver,
            stats: MonitorStats::default(),
            last_report_s: None,
        })
    }

    /// Process blocks until the duration elapses, the input closes or ctrl-c
    pub async fn run_for(&mut self, duration: Duration) -> PpgResult<MonitorStats> {
        let deadline = sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => {
                    debug!("monitoring window elapsed");
                    break;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, stopping monitor");
                    break;
                }

                block = self.input_receiver.recv() => {
                    match block {
                        Ok(block) => self.handle_block(&block)?,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            self.stats.blocks_skipped += skipped;
                            warn!(skipped, "monitor lagged behind the stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            info!("input stream closed");
                            break;
                        }
                    }
                }
            }
        }

        Ok(self.stats())
    }

    fn handle_block(&mut self, block: &SampleBlock) -> PpgResult<()> {
        let records = self.pipeline.process_block(block)?;
        self.stats.blocks_processed += 1;

        for record in records {
            let contact_changed = self
                .stats
                .last_record
                .as_ref()
                .is_some_and(|last| last.finger_detected != record.finger_detected);
            if contact_changed {
                self.stats.contact_changes += 1;
            }

            self.report(&record);
            self.stats.records_emitted += 1;
            self.stats.last_record = Some(record);
        }

        Ok(())
    }

    // One log line per second of signal
    fn report(&mut self, record: &FeatureRecord) {
        let second = record.timestamp_ms / 1000;
        if self.last_report_s == Some(second) {
            return;
        }
        self.last_report_s = Some(second);

        if record.finger_detected {
            info!(
                t_s = second,
                bpm = format_args!("{:.1}", record.bpm),
                rmssd_ms = format_args!("{:.1}", record.hrv),
                sdnn_ms = format_args!("{:.1}", record.sdnn),
                spo2 = format_args!("{:.1}", record.spo2),
                quality = format_args!("{:.0}", record.quality),
                hrv_ready = record.hrv_ready,
                "pulse"
            );
        } else {
            info!(t_s = second, ir = record.ir, "no finger on sensor");
        }
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            performance: self.pipeline.performance_summary(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppg_simulation::{FingerLift, PpgSimulator, PulsePattern, SimulatorConfig};

    fn feed(sender: &broadcast::Sender<SampleBlock>, config: SimulatorConfig, blocks: usize) {
        let mut simulator = PpgSimulator::new(config).unwrap();
        for _ in 0..blocks {
            sender.send(simulator.generate_chunk(0.1).unwrap()).unwrap();
        }
    }

    #[tokio::test]
    async fn test_monitor_reports_heart_rate() {
        let (sender, receiver) = broadcast::channel(256);
        let mut service = MonitorService::new(receiver, PipelineConfig::default()).unwrap();

        feed(&sender, SimulatorConfig::quiet(PulsePattern::Steady { bpm: 72.0 }), 200);
        drop(sender);

        let stats = service.run_for(Duration::from_secs(10)).await.unwrap();
        assert_eq!(stats.blocks_processed, 200);
        assert_eq!(stats.blocks_skipped, 0);
        assert_eq!(stats.performance.samples_processed, 2000);
        assert_eq!(stats.records_emitted, 200);

        let last = stats.last_record.unwrap();
        assert!((last.bpm - 72.0).abs() <= 3.0, "bpm {}", last.bpm);
    }

    #[tokio::test]
    async fn test_monitor_counts_contact_changes() {
        let (sender, receiver) = broadcast::channel(256);
        let mut service = MonitorService::new(receiver, PipelineConfig::default()).unwrap();

        let config = SimulatorConfig {
            finger_lifts: vec![FingerLift { start: 5.0, duration: 2.0 }],
            ..SimulatorConfig::quiet(PulsePattern::default())
        };
        feed(&sender, config, 100);
        drop(sender);

        let stats = service.run_for(Duration::from_secs(10)).await.unwrap();
        assert_eq!(stats.contact_changes, 2);
        assert!(stats.last_record.unwrap().finger_detected);
    }

    #[tokio::test]
    async fn test_monitor_rejects_mismatched_rate() {
        let (sender, receiver) = broadcast::channel(16);
        let mut service = MonitorService::new(receiver, PipelineConfig::default()).unwrap();

        let config = SimulatorConfig {
            sampling_rate: 50.0,
            ..SimulatorConfig::quiet(PulsePattern::default())
        };
        feed(&sender, config, 1);
        drop(sender);

        assert!(service.run_for(Duration::from_secs(1)).await.is_err());
    }
}
