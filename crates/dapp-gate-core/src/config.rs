use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackgroundConfig {
    /// Window in which repeated updates on one channel collapse into a single write + emission.
    pub debounce: Duration,
    /// Soft timeout after which gas estimation re-initialises the chain connection and retries.
    pub gas_estimate_timeout: Duration,
    pub subject_capacity: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            gas_estimate_timeout: Duration::from_millis(3_000),
            subject_capacity: 64,
        }
    }
}
