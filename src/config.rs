use std::num::NonZeroUsize;
use std::thread;

use crate::util::{Config, DEFAULT_BATCH_SIZE};

/// Engine settings, resolved once at startup and handed to every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub workers: usize,
    pub stripes: usize,
}

pub fn hardware_threads() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl PipelineConfig {
    /// Explicit settings; every value is clamped to at least 1.
    pub fn new(batch_size: usize, workers: usize, stripes: usize) -> Self {
        PipelineConfig {
            batch_size: batch_size.max(1),
            workers: workers.max(1),
            stripes: stripes.max(1),
        }
    }

    /// `threads == 0` means hardware parallelism, `stripes == 0` means one
    /// stripe per worker.
    pub fn resolve(batch_size: usize, threads: usize, stripes: usize) -> Self {
        let workers = if threads == 0 { hardware_threads() } else { threads };
        let stripes = if stripes == 0 { workers } else { stripes };
        PipelineConfig::new(batch_size, workers, stripes)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig::resolve(DEFAULT_BATCH_SIZE, 0, 0)
    }
}

impl From<&Config> for PipelineConfig {
    fn from(conf: &Config) -> Self {
        PipelineConfig::resolve(conf.batch_size, conf.threads, conf.stripes)
    }
}
