//! Line sources the driving loop pulls from.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::Error;

/// Anything that hands out successive text lines.
pub trait LineSource {
    /// Next line without its terminator, or `None` when nothing more is available now.
    fn next_line(&mut self) -> Result<Option<String>, Error>;

    /// Stable name for this source, used as the key when parser state is cached.
    fn identity(&self) -> &str;
}

/// Lines from any buffered reader.
pub struct ReaderSource<R: BufRead> {
    reader: R,
    identity: String,
    buf: String,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(identity: impl Into<String>, reader: R) -> Self {
        Self {
            reader,
            identity: identity.into(),
            buf: String::new(),
        }
    }
}

impl ReaderSource<BufReader<Box<dyn Read>>> {
    /// Open a file, decompressing it if the name ends in `.gz`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let file = File::open(path)?;
        let inner: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Self::new(path.display().to_string(), BufReader::new(inner)))
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> Result<Option<String>, Error> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        let line = self.buf.trim_end_matches(['\n', '\r']);
        Ok(Some(line.to_string()))
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}

/// Lines already held in memory, such as a chunk received from a pipe.
#[derive(Debug, Clone, Default)]
pub struct CachedLines {
    identity: String,
    lines: VecDeque<String>,
}

impl CachedLines {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            lines: VecDeque::new(),
        }
    }

    pub fn from_text(identity: impl Into<String>, text: &str) -> Self {
        let mut source = Self::new(identity);
        source.extend(text);
        source
    }

    /// Append more text; it is split into lines.
    pub fn extend(&mut self, text: &str) {
        self.lines.extend(text.lines().map(str::to_string));
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push_back(line.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl LineSource for CachedLines {
    fn next_line(&mut self) -> Result<Option<String>, Error> {
        Ok(self.lines.pop_front())
    }

    fn identity(&self) -> &str {
        &self.identity
    }
}
