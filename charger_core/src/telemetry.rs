//! Append-only charge telemetry.
//!
//! Every sample is kept for the whole session and also pushed to live
//! subscribers over unbounded channels, so a consumer thread (CSV writer,
//! plotter) can follow a charge without touching the controller.
use crossbeam_channel as xch;

/// One measurement taken after a setpoint write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Milliseconds since the session started.
    pub t_ms: u64,
    pub voltage_v: f32,
    pub current_a: f32,
    /// SOC bucket in effect when the sample was taken.
    pub soc: u8,
}

#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    samples: Vec<Sample>,
    subscribers: Vec<xch::Sender<Sample>>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live consumer. Samples recorded from now on are delivered
    /// in order; the receiver sees disconnect when the recorder is dropped.
    pub fn subscribe(&mut self) -> xch::Receiver<Sample> {
        let (tx, rx) = xch::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn record(&mut self, sample: Sample) {
        self.samples.push(sample);
        // Drop subscribers whose receiver is gone.
        self.subscribers.retain(|tx| tx.send(sample).is_ok());
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn last(&self) -> Option<Sample> {
        self.samples.last().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Forget samples from a previous session. Subscribers stay attached.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
