//! Simulated heart-rate strap
//!
//! Ramps linearly from resting to working heart rate over the warm-up, then
//! holds steady. Every sample gets uniform noise; a configurable fraction of
//! samples is replaced by a contact-loss error.

use crate::config::SimulationSettings;
use async_trait::async_trait;
use pulse_core::{DeviceSelector, HeartRateProvider, MonitorEvent, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Noise-free heart rate `simulated` into the run
pub fn heart_rate_at(simulated: Duration, settings: &SimulationSettings) -> f64 {
    let resting = f64::from(settings.resting_heart_rate);
    let working = f64::from(settings.working_heart_rate);
    if settings.warmup_secs == 0 {
        return working;
    }
    let progress = (simulated.as_secs_f64() / settings.warmup_secs as f64).min(1.0);
    resting + (working - resting) * progress
}

pub struct SimulatedSensor {
    settings: SimulationSettings,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SimulatedSensor {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            task: Mutex::new(None),
        }
    }

    fn rng(&self) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl HeartRateProvider for SimulatedSensor {
    async fn start(&self, device: &DeviceSelector, sink: mpsc::Sender<MonitorEvent>) -> Result<()> {
        info!(?device, "Simulated strap connected");

        let settings = self.settings.clone();
        let mut rng = self.rng();
        let step = Duration::from_secs(settings.sample_interval_secs);
        let real_step = settings.real_sample_interval();

        let task = tokio::spawn(async move {
            let mut simulated = Duration::ZERO;
            loop {
                let event = if rng.gen_bool(settings.dropout_rate) {
                    MonitorEvent::Error("strap lost skin contact".to_string())
                } else {
                    let noise = i64::from(settings.noise_bpm);
                    let jitter = if noise > 0 { rng.gen_range(-noise..=noise) } else { 0 };
                    let bpm = (heart_rate_at(simulated, &settings).round() as i64 + jitter).max(30);
                    MonitorEvent::Sample(bpm as u32)
                };

                if sink.send(event).await.is_err() {
                    debug!("Sample sink closed");
                    break;
                }

                tokio::time::sleep(real_step).await;
                simulated += step;
            }
        });

        let previous = self
            .task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            task.abort();
            info!("Simulated strap disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SimulationSettings {
        SimulationSettings {
            resting_heart_rate: 100,
            working_heart_rate: 160,
            warmup_secs: 600,
            noise_bpm: 0,
            sample_interval_secs: 60,
            time_scale: 60.0,
            seed: Some(1),
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn test_ramp_then_steady() {
        let s = settings();
        assert_eq!(heart_rate_at(Duration::ZERO, &s), 100.0);
        assert_eq!(heart_rate_at(Duration::from_secs(300), &s), 130.0);
        assert_eq!(heart_rate_at(Duration::from_secs(600), &s), 160.0);
        assert_eq!(heart_rate_at(Duration::from_secs(3600), &s), 160.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_until_stopped() {
        let sensor = SimulatedSensor::new(settings());
        let (tx, mut rx) = mpsc::channel(16);

        sensor.start(&DeviceSelector::Default, tx).await.unwrap();

        // One simulated minute per real second
        assert_eq!(rx.recv().await, Some(MonitorEvent::Sample(100)));
        assert_eq!(rx.recv().await, Some(MonitorEvent::Sample(106)));

        sensor.stop().await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_dropout_reports_errors() {
        let sensor = SimulatedSensor::new(SimulationSettings {
            dropout_rate: 1.0,
            ..settings()
        });
        let (tx, mut rx) = mpsc::channel(16);
        sensor.start(&DeviceSelector::Default, tx).await.unwrap();

        assert!(matches!(rx.recv().await, Some(MonitorEvent::Error(_))));
        sensor.stop().await;
    }
}
