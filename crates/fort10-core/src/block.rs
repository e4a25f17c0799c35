//! Block-dialect fort.11 reader
//!
//! Each block opens with a `step= <int> time= <float>` marker line and holds
//! 7-column rows (`i x v rho te ti depo`). Column-label lines and anything
//! that is not a 7-number row are skipped.

use crate::reader::{map_file, LineReader};
use crate::types::{Block, FormatErrorKind, FortError, Result, BLOCK_COLUMNS};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, instrument, trace, warn};

static MARKER_PATTERN: OnceLock<Regex> = OnceLock::new();
static LABEL_PATTERN: OnceLock<Regex> = OnceLock::new();

/// `step = <int> ... time = <float>`, case-insensitive
fn marker_regex() -> &'static Regex {
    MARKER_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bstep\s*=\s*(\d+)\b.*?\btime\s*=\s*([-+0-9.eEdD]+)")
            .expect("Invalid step marker pattern")
    })
}

/// Column-label line `i x v rho te ti depo`
fn label_regex() -> &'static Regex {
    LABEL_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*i\s+x\s+v\s+rho\s+te\s+ti\s+depo\b")
            .expect("Invalid column label pattern")
    })
}

/// Shape of one input line
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineKind {
    Marker { step: u64, time_seconds: f64 },
    Labels,
    Row([f64; BLOCK_COLUMNS]),
    Blank,
    Other,
}

fn parse_time(token: &str) -> Option<f64> {
    // Fortran writes double-precision exponents with D
    token.replace(['d', 'D'], "E").parse().ok()
}

pub(crate) fn classify(line: &str) -> LineKind {
    if line.trim().is_empty() {
        return LineKind::Blank;
    }

    if let Some(caps) = marker_regex().captures(line) {
        let step = caps[1].parse::<u64>().ok();
        let time = parse_time(&caps[2]);
        return match (step, time) {
            (Some(step), Some(time_seconds)) => LineKind::Marker { step, time_seconds },
            _ => {
                warn!(line = %line.trim(), "Unparseable step marker, line skipped");
                LineKind::Other
            }
        };
    }

    if label_regex().is_match(line) {
        return LineKind::Labels;
    }

    let mut row = [0.0f64; BLOCK_COLUMNS];
    let mut count = 0usize;
    for token in line.split_whitespace() {
        if count == BLOCK_COLUMNS {
            return LineKind::Other;
        }
        match token.parse::<f64>() {
            Ok(v) => row[count] = v,
            Err(_) => return LineKind::Other,
        }
        count += 1;
    }
    if count == BLOCK_COLUMNS {
        LineKind::Row(row)
    } else {
        LineKind::Other
    }
}

/// Block under construction
#[derive(Debug)]
struct PendingBlock {
    step: u64,
    time_seconds: f64,
    rows: Vec<[f64; BLOCK_COLUMNS]>,
}

impl PendingBlock {
    fn new(step: u64, time_seconds: f64) -> Self {
        Self {
            step,
            time_seconds,
            rows: Vec::new(),
        }
    }

    fn into_block(self) -> Option<Block> {
        if self.rows.is_empty() {
            debug!(step = self.step, "Dropping block without rows");
            return None;
        }
        Some(Block {
            step: self.step,
            time_seconds: self.time_seconds,
            rows: self.rows,
        })
    }
}

#[derive(Debug)]
enum State {
    /// Before the first marker
    Seeking,
    /// Inside a block, accumulating rows
    Collecting(PendingBlock),
}

/// Accumulates blocks line by line
#[derive(Debug)]
pub struct BlockParser {
    state: State,
    blocks: Vec<Block>,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockParser {
    pub fn new() -> Self {
        Self {
            state: State::Seeking,
            blocks: Vec::new(),
        }
    }

    fn flush(&mut self, pending: PendingBlock) {
        if let Some(block) = pending.into_block() {
            trace!(step = block.step, rows = block.len(), "Block flushed");
            self.blocks.push(block);
        }
    }

    /// Feed one line through the state machine
    pub fn feed(&mut self, line: &str) {
        let kind = classify(line);
        let state = std::mem::replace(&mut self.state, State::Seeking);

        let next = match (state, kind) {
            (State::Seeking, LineKind::Marker { step, time_seconds }) => {
                State::Collecting(PendingBlock::new(step, time_seconds))
            }
            (State::Seeking, _) => State::Seeking,
            (State::Collecting(pending), LineKind::Marker { step, time_seconds }) => {
                self.flush(pending);
                State::Collecting(PendingBlock::new(step, time_seconds))
            }
            (State::Collecting(mut pending), LineKind::Row(row)) => {
                pending.rows.push(row);
                State::Collecting(pending)
            }
            (State::Collecting(pending), LineKind::Labels | LineKind::Blank | LineKind::Other) => {
                State::Collecting(pending)
            }
        };
        self.state = next;
    }

    /// Flush the last block and return everything collected
    pub fn finish(mut self) -> Vec<Block> {
        if let State::Collecting(pending) = std::mem::replace(&mut self.state, State::Seeking) {
            self.flush(pending);
        }
        self.blocks
    }
}

/// Decode block-dialect text held in memory
pub fn parse_blocks(data: &[u8]) -> Result<Vec<Block>> {
    let mut reader = LineReader::new(data);
    let mut parser = BlockParser::new();
    while let Some(line) = reader.next_line() {
        parser.feed(&line);
    }

    let blocks = parser.finish();
    if blocks.is_empty() {
        return Err(FortError::format(
            FormatErrorKind::NoData,
            reader.location(),
            "no step/time blocks with 7-column rows found",
        ));
    }
    Ok(blocks)
}

/// Read every block of a block-dialect fort.11 file, in file order
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_blocks<P: AsRef<Path>>(path: P) -> Result<Vec<Block>> {
    let mmap = map_file(path.as_ref())?;
    let blocks = parse_blocks(&mmap)?;
    info!(
        blocks = blocks.len(),
        first_step = blocks.first().map(|b| b.step),
        last_step = blocks.last().map(|b| b.step),
        "Block file read"
    );
    Ok(blocks)
}
