//! Drives the per-batch read → map → reduce cycle, then the two sorts and the
//! output files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::batch_reader::{BatchReader, READ_CAPACITY};
use crate::config::PipelineConfig;
use crate::error::{Result, WordCountError};
use crate::log_histogram::LatencyHistogram;
use crate::map::map_batch;
use crate::output::{OutputFile, ALPHABETICAL_HEADER, FREQUENCY_HEADER};
use crate::pool::WorkerPool;
use crate::reducer::{reduce_batch, HashStripes, StripePolicy, StripedTable};
use crate::sorter::{alphabetical, by_frequency, ParallelSorter};
use crate::util::{Entry, FreqTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Reading,
    Mapping,
    Reducing,
    SortingAlpha,
    SortingFreq,
    Writing,
    Done,
}

#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub batches: usize,
    pub lines: usize,
    pub unique_words: usize,
    pub total_words: u64,
    pub map_times: LatencyHistogram,
    pub reduce_times: LatencyHistogram,
    pub alpha_sort_time: Duration,
    pub freq_sort_time: Duration,
}

impl PipelineStats {
    pub fn log_summary(&self) {
        info!(
            "{} unique words, {} words in {} lines ({} batches)",
            self.unique_words, self.total_words, self.lines, self.batches
        );
        info!("{}", self.map_times.summary("map"));
        info!("{}", self.reduce_times.summary("reduce"));
        info!(
            "sort: alphabetical {:?}, by frequency {:?}",
            self.alpha_sort_time, self.freq_sort_time
        );
    }
}

/// The final entries in both orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedCounts {
    pub alphabetical: Vec<Entry>,
    pub by_frequency: Vec<Entry>,
}

pub struct Pipeline<P = HashStripes> {
    conf: PipelineConfig,
    pool: WorkerPool,
    global: StripedTable<P>,
    // one per map worker, emptied as soon as the reduce phase has drained them
    locals: Vec<FreqTable>,
    phase: Phase,
    stats: PipelineStats,
}

impl Pipeline<HashStripes> {
    pub fn new(conf: PipelineConfig) -> Result<Self> {
        Pipeline::with_policy(conf, HashStripes::new())
    }
}

impl<P: StripePolicy> Pipeline<P> {
    pub fn with_policy(conf: PipelineConfig, policy: P) -> Result<Self> {
        let pool = WorkerPool::new(conf.workers)?;
        Ok(Pipeline {
            conf,
            global: StripedTable::with_policy(conf.stripes, policy),
            locals: vec![FreqTable::new(); pool.workers()],
            pool,
            phase: Phase::Reading,
            stats: PipelineStats::default(),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn into_stats(self) -> PipelineStats {
        self.stats
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Runs read/map/reduce over `input` until it is exhausted. Can be called
    /// again with more input; the global table keeps accumulating.
    pub fn consume<R: BufRead>(&mut self, input: R) -> Result<()> {
        let mut reader = BatchReader::new(input, self.conf.batch_size);
        loop {
            self.enter(Phase::Reading);
            let batch = reader.next_batch()?;
            if batch.is_empty() {
                return Ok(());
            }
            self.process_batch(&batch)?;
        }
    }

    fn process_batch(&mut self, batch: &[bytes::Bytes]) -> Result<()> {
        self.enter(Phase::Mapping);
        let start = Instant::now();
        map_batch(&self.pool, batch, &mut self.locals)?;
        let map_time = self.stats.map_times.sample_since(&start);

        self.enter(Phase::Reducing);
        let start = Instant::now();
        reduce_batch(&self.pool, &self.global, &self.locals)?;
        let reduce_time = self.stats.reduce_times.sample_since(&start);
        // drop the tokens that still point into this batch's lines
        for local in self.locals.iter_mut() {
            local.clear();
        }

        self.stats.batches += 1;
        self.stats.lines += batch.len();
        info!(
            "batch {}: {} lines, map {:?}, reduce {:?}",
            self.stats.batches,
            batch.len(),
            map_time,
            reduce_time
        );
        Ok(())
    }

    /// Takes the global table's entries and sorts them both ways. The table is
    /// left empty.
    pub fn finish(&mut self) -> Result<SortedCounts> {
        let sorter = ParallelSorter::new(self.pool.workers());
        debug!(
            "keys per stripe ({} stripes): {:?}",
            self.global.stripe_count(),
            self.global.stripe_sizes()?
        );
        let entries = self.global.drain_entries()?;
        self.stats.unique_words = entries.len();
        self.stats.total_words = entries.iter().map(|(_, count)| count).sum();

        self.enter(Phase::SortingAlpha);
        let start = Instant::now();
        let alphabetical = sorter.sort_by(&self.pool, entries, &alphabetical)?;
        self.stats.alpha_sort_time = start.elapsed();

        self.enter(Phase::SortingFreq);
        let start = Instant::now();
        let by_frequency = sorter.sort_by(&self.pool, alphabetical.clone(), &by_frequency)?;
        self.stats.freq_sort_time = start.elapsed();

        Ok(SortedCounts { alphabetical, by_frequency })
    }

    /// Writes both result files. Neither final path changes unless both files
    /// were written in full.
    pub fn write_outputs(
        &mut self,
        sorted: &SortedCounts,
        alpha_output: &str,
        freq_output: &str,
    ) -> Result<()> {
        self.enter(Phase::Writing);
        let mut alpha_file = OutputFile::create(alpha_output)?;
        let mut freq_file = OutputFile::create(freq_output)?;
        debug!("writing {} and {}", alpha_file.path(), freq_file.path());
        alpha_file.write(ALPHABETICAL_HEADER, &sorted.alphabetical)?;
        freq_file.write(FREQUENCY_HEADER, &sorted.by_frequency)?;
        alpha_file.commit()?;
        freq_file.commit()?;
        self.enter(Phase::Done);
        Ok(())
    }
}

/// Counts `input` and writes both result files. Nothing is written unless
/// counting succeeds and both files were written in full.
pub fn run_files(
    conf: &PipelineConfig,
    input: &str,
    alpha_output: &str,
    freq_output: &str,
) -> Result<PipelineStats> {
    let file = File::open(input).map_err(|source| WordCountError::InputOpen {
        path: input.to_owned(),
        source,
    })?;
    info!(
        "counting {} with {} workers, {} stripes, {} lines per batch",
        input, conf.workers, conf.stripes, conf.batch_size
    );

    let mut pipeline = Pipeline::new(*conf)?;
    pipeline.consume(BufReader::with_capacity(READ_CAPACITY, file))?;
    let sorted = pipeline.finish()?;
    pipeline.write_outputs(&sorted, alpha_output, freq_output)?;

    Ok(pipeline.into_stats())
}
