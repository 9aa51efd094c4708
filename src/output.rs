use std::fs::Permissions;
use std::io::{self, BufWriter, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::{Builder, NamedTempFile};

use crate::error::{Result, WordCountError};
use crate::util::Entry;

pub const ALPHABETICAL_HEADER: &str = "=== Final Word Counts (A → Z) ===";
pub const FREQUENCY_HEADER: &str = "=== Final Word Counts (by frequency) ===";

const WRITE_CAPACITY: usize = 131_072;

/// Header line, then one `<token> -> <count>` line per entry. Tokens are
/// written as raw bytes.
pub fn write_counts<W: Write>(out: &mut W, header: &str, entries: &[Entry]) -> io::Result<()> {
    writeln!(out, "{}", header)?;
    for (word, count) in entries {
        out.write_all(word)?;
        writeln!(out, " -> {}", count)?;
    }
    out.flush()
}

/// An output file staged as a temporary file next to its final path. The
/// final path is only touched by `commit`, which renames the staged file over
/// it; dropping an uncommitted `OutputFile` removes the staged file.
pub struct OutputFile {
    path: String,
    staged: NamedTempFile,
}

impl OutputFile {
    pub fn create(path: &str) -> Result<Self> {
        let dir = match Path::new(path).parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let staged = Builder::new()
            .prefix(".wc-")
            .suffix(".tmp")
            .permissions(Permissions::from_mode(0o666))
            .tempfile_in(dir)
            .map_err(|source| WordCountError::OutputCreate {
                path: path.to_owned(),
                source,
            })?;
        Ok(OutputFile {
            path: path.to_owned(),
            staged,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn write(&mut self, header: &str, entries: &[Entry]) -> Result<()> {
        let mut out = BufWriter::with_capacity(WRITE_CAPACITY, self.staged.as_file_mut());
        write_counts(&mut out, header, entries).map_err(|source| WordCountError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Moves the written file to its final path, replacing any existing file.
    pub fn commit(self) -> Result<()> {
        let OutputFile { path, staged } = self;
        staged
            .persist(&path)
            .map(drop)
            .map_err(|err| WordCountError::Write { path, source: err.error })
    }
}
