//! Running heart-rate metrics for one session

/// Append-only sample buffer with incremental aggregates
#[derive(Debug, Clone, Default)]
pub struct HeartRateBuffer {
    samples: Vec<u32>,
    sum: u64,
    max: Option<u32>,
}

impl HeartRateBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample
    pub fn push(&mut self, bpm: u32) {
        self.samples.push(bpm);
        self.sum += u64::from(bpm);
        if self.max.map_or(true, |max| bpm > max) {
            self.max = Some(bpm);
        }
    }

    /// Integer mean (truncating), `None` when empty
    pub fn average(&self) -> Option<u32> {
        if self.samples.is_empty() {
            return None;
        }
        Some((self.sum / self.samples.len() as u64) as u32)
    }

    /// Highest sample, `None` when empty
    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples were recorded
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in arrival order
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// Drop all samples
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
