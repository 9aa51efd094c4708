use std::fmt;
use std::time::{Duration, Instant};

const BINS: usize = 64;
const BARS: &[char; 9] = &['_', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BARS_MAX: i32 = 8;

pub fn format_nanos(t: f64) -> String {
    if t < 500.0 {
        format!("{:0.3}ns", t)
    } else if t < 500_000.0 {
        format!("{:0.3}us", t / 1000.0)
    } else if t < 500_000_000.0 {
        format!("{:0.3}ms", t / 1_000_000.0)
    } else {
        format!("{:0.3}s", t / 1_000_000_000.0)
    }
}

/// Latency histogram with power-of-two nanosecond bins. Used to summarise the
/// per-batch map and reduce phase durations of a run.
#[derive(Clone)]
pub struct LatencyHistogram {
    min: u64,
    max: u64,
    sum: u64,
    count: u64,
    hist: [u64; BINS],
}

impl LatencyHistogram {
    pub fn new() -> Self {
        LatencyHistogram {
            min: u64::MAX,
            max: 0,
            sum: 0,
            count: 0,
            hist: [0; BINS],
        }
    }

    pub fn add_sample_ns(&mut self, value: u64) {
        self.sum = self.sum.saturating_add(value);
        self.count += 1;
        self.max = value.max(self.max);
        self.min = value.min(self.min);
        let bin = ((64 - value.leading_zeros()) as usize).min(BINS - 1);
        self.hist[bin] += 1;
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.add_sample_ns(elapsed.as_nanos().min(u64::MAX as u128) as u64);
    }

    /// Records the time since `start` and returns it.
    pub fn sample_since(&mut self, start: &Instant) -> Duration {
        let elapsed = start.elapsed();
        self.record(elapsed);
        elapsed
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.sum)
    }

    pub fn mean_ns(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    pub fn min_ns(&self) -> Option<u64> {
        if self.count == 0 {
            None
        } else {
            Some(self.min)
        }
    }

    pub fn max_ns(&self) -> Option<u64> {
        if self.count == 0 {
            None
        } else {
            Some(self.max)
        }
    }

    // log interpolation inside a bin, so narrow distributions are approximate
    pub fn percentile(&self, p: f64) -> f64 {
        assert!((0.0..=1.0).contains(&p));
        if self.count == 0 {
            return 0.0;
        }

        let p_count = self.count as f64 * p;
        let mut samples: u64 = 0;
        for (i, &c_bin) in self.hist.iter().enumerate() {
            let samples_incl = samples + c_bin;
            if samples_incl as f64 > p_count {
                let d_bin = (p_count - samples as f64) / c_bin as f64;
                let log_val = i as f64 - 1.0 + d_bin;
                return log_val.exp2().clamp(self.min as f64, self.max as f64);
            }
            samples = samples_incl;
        }
        self.max as f64
    }

    fn sparkline(&self) -> String {
        let f_max = self.hist.iter().copied().max().unwrap_or(0);
        let log_f_max = 64 - f_max.leading_zeros() as i32;
        let mut spark_line = String::with_capacity(BINS);
        for (i, &f) in self.hist.iter().enumerate() {
            let bin_time = 1u128 << i;
            if (self.min as u128) > bin_time || (self.max as u128) * 2 < bin_time {
                continue;
            }

            let log_f = 64 - f.leading_zeros() as i32;
            let b = if log_f_max > BARS_MAX {
                log_f - (log_f_max - BARS_MAX)
            } else {
                log_f
            };
            if b < 0 {
                spark_line.push(if f > 0 { '.' } else { ' ' });
            } else {
                spark_line.push(BARS[b as usize]);
            }
        }
        spark_line
    }

    /// One-line summary: count, total, mean, p5/median/p95 and the min/max spread.
    pub fn summary(&self, name: &str) -> String {
        if self.count == 0 {
            return format!("[{}] no samples", name);
        }
        format!(
            "[{}] n: {} total: {} mean: {} 5%: {} med: {} 95%: {} min: {} |{}| max: {}",
            name,
            self.count,
            format_nanos(self.sum as f64),
            format_nanos(self.mean_ns()),
            format_nanos(self.percentile(0.05)),
            format_nanos(self.percentile(0.5)),
            format_nanos(self.percentile(0.95)),
            format_nanos(self.min as f64),
            self.sparkline(),
            format_nanos(self.max as f64)
        )
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("count", &self.count)
            .field("min", &self.min_ns())
            .field("max", &self.max_ns())
            .field("sum", &self.sum)
            .field("hist", &format_args!("{}", self.sparkline()))
            .finish()
    }
}
