//! A document: a growing text file read incrementally.
//!
//! The log source keeps appending to the file while it is displayed, so
//! [`Document::refresh`] picks up new bytes from where it left off. Lines
//! are decoded as lossy UTF-8. A trailing line without a newline stays
//! pending until it is completed or the file stops growing.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::ViewerError;
use crate::logging::LogSink;

/// Upper bound on bytes consumed per refresh, so a burst of output cannot
/// stall the render loop.
pub const MAX_READ_BYTES_PER_REFRESH: usize = 4 * 1024 * 1024;

/// A viewable document backed by a file on disk.
#[derive(Debug)]
pub struct Document {
    /// Title shown in the status bar.
    pub caption: String,
    path: PathBuf,
    file: File,
    offset: u64,
    lines: Vec<String>,
    partial: Vec<u8>,
    log: LogSink,
}

impl Document {
    /// Open `path` for reading. Nothing is read until the first refresh.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ViewerError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| ViewerError::Open {
            path: path.clone(),
            source,
        })?;

        Ok(Self {
            caption: String::new(),
            path,
            file,
            offset: 0,
            lines: Vec::new(),
            partial: Vec::new(),
            log: LogSink::tracing(),
        })
    }

    /// Attach the debug sink the document reports to.
    pub fn set_log(&mut self, log: LogSink) {
        self.log = log;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Complete lines read so far, plus the pending partial line if any.
    pub fn line_count(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }

    /// Line `index`, counting the pending partial line last.
    pub fn line(&self, index: usize) -> Option<String> {
        if let Some(line) = self.lines.get(index) {
            return Some(line.clone());
        }
        if index == self.lines.len() && !self.partial.is_empty() {
            return Some(String::from_utf8_lossy(&self.partial).into_owned());
        }
        None
    }

    /// Read whatever was appended since the last call.
    ///
    /// Returns `true` when new content arrived. A file that shrank (the
    /// writer started over) is re-read from the beginning.
    pub fn refresh(&mut self) -> io::Result<bool> {
        let len = self.file.metadata()?.len();
        if len < self.offset {
            self.log.debug(format_args!(
                "{}: truncated from {} to {} bytes, reloading",
                self.path.display(),
                self.offset,
                len
            ));
            self.offset = 0;
            self.lines.clear();
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(false);
        }

        let want = (len - self.offset).min(MAX_READ_BYTES_PER_REFRESH as u64) as usize;
        let mut buf = vec![0u8; want];
        self.file.seek(SeekFrom::Start(self.offset))?;
        let read = self.file.read(&mut buf)?;
        buf.truncate(read);
        self.offset += read as u64;
        self.append(&buf);

        Ok(read > 0)
    }

    fn append(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.partial.extend_from_slice(&rest[..pos]);
            if self.partial.last() == Some(&b'\r') {
                self.partial.pop();
            }
            self.lines
                .push(String::from_utf8_lossy(&self.partial).into_owned());
            self.partial.clear();
            rest = &rest[pos + 1..];
        }
        self.partial.extend_from_slice(rest);
    }
}
