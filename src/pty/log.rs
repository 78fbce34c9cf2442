//! Raw PTY output mirror
//!
//! Appends every chunk read from the shell to a file. Logging is best
//! effort: the first write failure is reported once and the sink disables
//! itself.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct PtyLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PtyLog {
    /// Open `path` for appending, creating it if needed
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn append(&mut self, bytes: &[u8]) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.write_all(bytes) {
                self.disable(e);
            }
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                self.disable(e);
            }
        }
    }

    /// Flush and stop logging
    pub fn close(&mut self) {
        self.flush();
        self.writer = None;
    }

    fn disable(&mut self, err: std::io::Error) {
        warn!(
            "PTY log {} disabled after write failure: {}",
            self.path.display(),
            err
        );
        self.writer = None;
    }
}
