//! Line reader over a memory-mapped (or in-memory) text buffer

use crate::types::{Location, Result};
use memmap2::Mmap;
use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

/// Map a file read-only. The mapping is released when the returned value drops.
pub(crate) fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the mapping is read-only and owned by the caller for the
    // duration of one read; concurrent truncation by another process is
    // outside what this crate guards against.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

/// Resumable position inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Byte offset of the next unread line
    pub offset: usize,
    /// Number of lines consumed so far
    pub lines: usize,
}

/// Line-oriented reader with single-level pushback
pub struct LineReader<'a> {
    data: &'a [u8],
    pos: usize,
    line: usize,
    /// Start offset of the most recently returned line
    last_start: usize,
    /// Position and line start before the most recently returned line, for push_back
    previous: Option<(Cursor, usize)>,
}

impl<'a> LineReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::resume(data, Cursor::default())
    }

    /// Continue reading `data` from a previously saved cursor
    pub fn resume(data: &'a [u8], cursor: Cursor) -> Self {
        Self {
            data,
            pos: cursor.offset.min(data.len()),
            line: cursor.lines,
            last_start: cursor.offset.min(data.len()),
            previous: None,
        }
    }

    #[inline]
    pub fn cursor(&self) -> Cursor {
        Cursor {
            offset: self.pos,
            lines: self.line,
        }
    }

    /// Location of the most recently returned line
    #[inline]
    pub fn location(&self) -> Location {
        Location {
            line: self.line,
            offset: self.last_start,
        }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.remaining() == 0
    }

    /// Next line without its terminator (`\n` or `\r\n`), or `None` at EOF
    pub fn next_line(&mut self) -> Option<Cow<'a, str>> {
        if self.pos >= self.data.len() {
            return None;
        }
        self.previous = Some((self.cursor(), self.last_start));

        let rest = &self.data[self.pos..];
        let (mut raw, advance) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        if let Some(stripped) = raw.strip_suffix(b"\r") {
            raw = stripped;
        }

        self.last_start = self.pos;
        self.pos += advance;
        self.line += 1;
        Some(String::from_utf8_lossy(raw))
    }

    /// Un-read the most recently returned line. Only one level is kept.
    pub fn push_back(&mut self) -> bool {
        match self.previous.take() {
            Some((cursor, last_start)) => {
                self.pos = cursor.offset;
                self.line = cursor.lines;
                self.last_start = last_start;
                true
            }
            None => false,
        }
    }

    /// Look at the next line without consuming it
    pub fn peek_line(&mut self) -> Option<Cow<'a, str>> {
        let saved = (self.pos, self.line, self.last_start, self.previous);
        let line = self.next_line();
        (self.pos, self.line, self.last_start, self.previous) = saved;
        line
    }
}
