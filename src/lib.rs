pub mod error;
pub mod logging;
pub mod util;
pub mod config;

pub mod tokenizer;
pub mod codec;
pub mod batch_reader;
pub mod map;
pub mod reducer;
pub mod sorter;
pub mod output;
pub mod pipeline;
pub mod pool;

mod log_histogram;
pub use crate::log_histogram::{format_nanos, LatencyHistogram};

pub use crate::config::PipelineConfig;
pub use crate::error::WordCountError;
pub use crate::pipeline::{run_files, Pipeline, PipelineStats, SortedCounts};
pub use crate::reducer::{StripePolicy, StripedTable};
