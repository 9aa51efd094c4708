use std::ops::Range;

use bytes::Bytes;
use log::debug;

use crate::error::Result;
use crate::pool::WorkerPool;
use crate::tokenizer::Tokens;
use crate::util::FreqTable;

/// Splits `[0, len)` into `workers` contiguous ranges of `ceil(len / workers)`
/// lines. Trailing ranges may be short or empty.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let per_worker = (len + workers - 1) / workers;
    (0..workers)
        .map(|i| {
            let start = (i * per_worker).min(len);
            let end = (start + per_worker).min(len);
            start..end
        })
        .collect()
}

#[inline(never)]
pub fn count_line(frequency: &mut FreqTable, line: &Bytes) {
    for word in Tokens::new(line) {
        *frequency.entry(word).or_insert(0) += 1;
    }
}

/// Map phase for one batch: worker `i` counts its range of `lines` into
/// `tables[i]` on `pool`. Returns once every worker has finished.
pub fn map_batch(pool: &WorkerPool, lines: &[Bytes], tables: &mut [FreqTable]) -> Result<()> {
    let ranges = partition(lines.len(), tables.len());
    let jobs: Vec<(&mut FreqTable, &[Bytes])> = tables
        .iter_mut()
        .zip(ranges)
        .enumerate()
        .filter_map(|(worker, (frequency, range))| {
            debug!("map worker {} <- lines {}..{}", worker, range.start, range.end);
            if range.is_empty() {
                None
            } else {
                Some((frequency, &lines[range]))
            }
        })
        .collect();

    pool.scope("map", move |scope| {
        for (frequency, part) in jobs {
            scope.spawn(move |_| {
                for line in part {
                    count_line(frequency, line);
                }
            });
        }
    })
}
