//! Common types, errors, and constants for fort.10 / fort.11 file operations

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Constants
// ============================================================================

/// Width of one packed variable-name slot in a classic section header
pub const NAME_SLOT_WIDTH: usize = 8;

/// Number of columns in a block-dialect data row: i, x, v, rho, te, ti, depo
pub const BLOCK_COLUMNS: usize = 7;

/// Number of bytes sampled from the file head for format detection
pub const DEFAULT_SAMPLE_BYTES: usize = 4096;

/// Default minimum number of frames per streamed chunk
pub const DEFAULT_CHUNK_FRAMES: usize = 256;

/// Scalar variable holding the simulation time (seconds) of each frame
pub const TIME_VARIABLE: &str = "TIME";

/// Array variable holding cell-centre coordinates (cm)
pub const COORDINATE_VARIABLE: &str = "XC";

pub const SECONDS_PER_PICOSECOND: f64 = 1.0e-12;

// ============================================================================
// Enums
// ============================================================================

/// On-disk dialect of a fort.10 / fort.11 file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Packed 8-character names, run-length array descriptors, flat records
    Classic,
    /// `step= ... time= ...` markers followed by 7-column rows
    Block,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Classic => write!(f, "classic"),
            Dialect::Block => write!(f, "block"),
        }
    }
}

/// Fixed column schema of a block-dialect row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockColumn {
    Index,
    X,
    V,
    Rho,
    Te,
    Ti,
    Depo,
}

impl BlockColumn {
    pub const ALL: [BlockColumn; BLOCK_COLUMNS] = [
        BlockColumn::Index,
        BlockColumn::X,
        BlockColumn::V,
        BlockColumn::Rho,
        BlockColumn::Te,
        BlockColumn::Ti,
        BlockColumn::Depo,
    ];

    /// Column position within a row
    #[inline]
    pub fn position(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            BlockColumn::Index => "i",
            BlockColumn::X => "x",
            BlockColumn::V => "v",
            BlockColumn::Rho => "rho",
            BlockColumn::Te => "te",
            BlockColumn::Ti => "ti",
            BlockColumn::Depo => "depo",
        }
    }
}

impl FromStr for BlockColumn {
    type Err = FortError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        BlockColumn::ALL
            .into_iter()
            .find(|c| c.label() == lower)
            .ok_or_else(|| {
                FortError::Config(format!(
                    "unknown block column '{}' (expected one of i, x, v, rho, te, ti, depo)",
                    s
                ))
            })
    }
}

/// Length units accepted for coordinate conversion to micrometres
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Centimeter,
    Meter,
    Micrometer,
}

impl LengthUnit {
    /// Multiplicative factor converting this unit to micrometres
    pub fn factor_to_um(self) -> f64 {
        match self {
            LengthUnit::Centimeter => 1.0e4,
            LengthUnit::Meter => 1.0e6,
            LengthUnit::Micrometer => 1.0,
        }
    }
}

impl FromStr for LengthUnit {
    type Err = FortError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cm" => Ok(LengthUnit::Centimeter),
            "m" | "meter" | "meters" => Ok(LengthUnit::Meter),
            "um" | "µm" | "micron" | "microns" => Ok(LengthUnit::Micrometer),
            _ => Err(FortError::Config(format!(
                "unknown length unit '{}' (use cm, m or um)",
                s
            ))),
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Sub-kind of a malformed-input failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// Stream ended mid-header or mid-record
    UnexpectedEof,
    /// A token expected to be numeric failed to parse
    InvalidNumber,
    /// Header names and length codes cannot form a directory
    HeaderMismatch,
    /// The file decoded to zero frames or blocks
    NoData,
}

impl fmt::Display for FormatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormatErrorKind::UnexpectedEof => "unexpected end of file",
            FormatErrorKind::InvalidNumber => "invalid number",
            FormatErrorKind::HeaderMismatch => "header mismatch",
            FormatErrorKind::NoData => "no data",
        };
        f.write_str(s)
    }
}

/// Position of a line within the decoded input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// 1-based line number (0 before the first line is read)
    pub line: usize,
    /// Byte offset of the start of that line
    pub offset: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} (byte {})", self.line, self.offset)
    }
}

/// Error type for fort.10 reading operations
#[derive(Debug, thiserror::Error)]
pub enum FortError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error ({kind}) at {location}: {message}")]
    Format {
        kind: FormatErrorKind,
        location: Location,
        message: String,
    },

    #[error("{what} index {index} out of range [0..{len})")]
    Index {
        what: &'static str,
        index: i64,
        len: usize,
    },

    #[error("Config error: {0}")]
    Config(String),
}

impl FortError {
    pub(crate) fn format(
        kind: FormatErrorKind,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        FortError::Format {
            kind,
            location,
            message: message.into(),
        }
    }

    /// The format sub-kind, if this is a format error
    pub fn format_kind(&self) -> Option<FormatErrorKind> {
        match self {
            FortError::Format { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FortError>;

// ============================================================================
// Section Directory
// ============================================================================

/// One named variable of a classic section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    pub name: String,
    pub is_array: bool,
    /// Number of record slots; 1 for scalars
    pub count: usize,
}

impl VariableDescriptor {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_array: false,
            count: 1,
        }
    }

    /// An array descriptor; a length of 1 collapses to a scalar
    pub fn array(name: impl Into<String>, count: usize) -> Self {
        if count <= 1 {
            return Self::scalar(name);
        }
        Self {
            name: name.into(),
            is_array: true,
            count,
        }
    }
}

/// A borrowed view of one variable inside a decoded record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameValue<'a> {
    Scalar(f64),
    Array(&'a [f64]),
}

/// Ordered variable layout of one classic section
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionDirectory {
    variables: Vec<VariableDescriptor>,
    total_slots: usize,
}

impl SectionDirectory {
    /// Build a directory, `None` if the slot total does not fit in `usize`
    pub fn try_new(variables: Vec<VariableDescriptor>) -> Option<Self> {
        let total_slots = variables
            .iter()
            .try_fold(0usize, |acc, v| acc.checked_add(v.count))?;
        Some(Self {
            variables,
            total_slots,
        })
    }

    /// Build a directory; an overflowing slot total saturates at `usize::MAX`
    pub fn new(variables: Vec<VariableDescriptor>) -> Self {
        let total_slots = variables
            .iter()
            .fold(0usize, |acc, v| acc.saturating_add(v.count));
        Self {
            variables,
            total_slots,
        }
    }

    #[inline]
    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    /// Number of values in one flat record of this section
    #[inline]
    pub fn total_slots(&self) -> usize {
        self.total_slots
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&VariableDescriptor> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Slice a flat record into the directory's variables, in order.
    ///
    /// `values` shorter than `total_slots()` yields only the variables that fit.
    pub fn slice<'a>(
        &'a self,
        values: &'a [f64],
    ) -> impl Iterator<Item = (&'a VariableDescriptor, FrameValue<'a>)> + 'a {
        let mut pos = 0usize;
        self.variables.iter().map_while(move |var| {
            let slot = values.get(pos..pos.checked_add(var.count)?)?;
            pos += var.count;
            let value = if var.is_array {
                FrameValue::Array(slot)
            } else {
                FrameValue::Scalar(slot[0])
            };
            Some((var, value))
        })
    }
}

/// One decoded flat record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub values: Vec<f64>,
}

impl Frame {
    /// Look up one variable of this record through its directory
    pub fn get<'a>(&'a self, directory: &'a SectionDirectory, name: &str) -> Option<FrameValue<'a>> {
        directory
            .slice(&self.values)
            .find(|(var, _)| var.name == name)
            .map(|(_, value)| value)
    }
}

// ============================================================================
// Time Series
// ============================================================================

/// Per-cell values of an array variable, row-major `[frame][cell]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArraySeries {
    cells: usize,
    values: Vec<f64>,
}

impl ArraySeries {
    pub fn new(cells: usize, values: Vec<f64>) -> Self {
        Self { cells, values }
    }

    #[inline]
    pub fn cells(&self) -> usize {
        self.cells
    }

    #[inline]
    pub fn frames(&self) -> usize {
        if self.cells == 0 {
            0
        } else {
            self.values.len() / self.cells
        }
    }

    /// All cells at one frame
    pub fn frame(&self, index: usize) -> Option<&[f64]> {
        let start = index.checked_mul(self.cells)?;
        self.values.get(start..start.checked_add(self.cells)?)
    }

    /// One cell across all frames
    pub fn cell(&self, index: usize) -> Option<Vec<f64>> {
        if index >= self.cells {
            return None;
        }
        Some(
            self.values
                .chunks_exact(self.cells)
                .map(|row| row[index])
                .collect(),
        )
    }

    /// Flat row-major storage
    #[inline]
    pub fn as_flat(&self) -> &[f64] {
        &self.values
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.cells.max(1))
    }
}

/// Time series of one variable: scalar per frame or array per frame
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Scalar(Vec<f64>),
    Array(ArraySeries),
}

impl Series {
    /// Number of frames
    pub fn len(&self) -> usize {
        match self {
            Series::Scalar(v) => v.len(),
            Series::Array(a) => a.frames(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Series::Array(_))
    }

    pub fn as_scalar(&self) -> Option<&[f64]> {
        match self {
            Series::Scalar(v) => Some(v),
            Series::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArraySeries> {
        match self {
            Series::Scalar(_) => None,
            Series::Array(a) => Some(a),
        }
    }
}

/// Named time series decoded from the dynamic section of a classic file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    names: Vec<String>,
    series: HashMap<String, Series>,
    frames: usize,
}

impl TimeSeries {
    /// Number of frames shared by every variable
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Variable names in header order
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, name: &str) -> Option<&Series> {
        self.series.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series.contains_key(name)
    }

    /// The `TIME` series in seconds, if present
    pub fn time(&self) -> Option<&[f64]> {
        self.get(TIME_VARIABLE).and_then(Series::as_scalar)
    }

    /// Keep only the variables for which `keep` returns true
    pub fn retain<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.names.retain(|n| keep(n.as_str()));
        let names = &self.names;
        self.series.retain(|k, _| names.contains(k));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.names
            .iter()
            .filter_map(|n| self.series.get(n).map(|s| (n.as_str(), s)))
    }
}

/// Accumulates decoded frames into per-variable series
#[derive(Debug)]
pub(crate) struct SeriesBuilder {
    variables: Vec<VariableDescriptor>,
    buffers: Vec<Vec<f64>>,
    frames: usize,
}

impl SeriesBuilder {
    pub(crate) fn new(directory: &SectionDirectory) -> Self {
        Self {
            variables: directory.variables().to_vec(),
            buffers: vec![Vec::new(); directory.len()],
            frames: 0,
        }
    }

    /// Append one complete record; `values.len()` must equal the directory's slot total
    pub(crate) fn push(&mut self, values: &[f64]) {
        let mut pos = 0usize;
        for (var, buf) in self.variables.iter().zip(self.buffers.iter_mut()) {
            buf.extend_from_slice(&values[pos..pos + var.count]);
            pos += var.count;
        }
        self.frames += 1;
    }

    #[inline]
    pub(crate) fn frames(&self) -> usize {
        self.frames
    }

    pub(crate) fn finish(self) -> TimeSeries {
        let mut names = Vec::with_capacity(self.variables.len());
        let mut series = HashMap::with_capacity(self.variables.len());
        for (var, buf) in self.variables.into_iter().zip(self.buffers) {
            let s = if var.is_array {
                Series::Array(ArraySeries::new(var.count, buf))
            } else {
                Series::Scalar(buf)
            };
            names.push(var.name.clone());
            series.insert(var.name, s);
        }
        TimeSeries {
            names,
            series,
            frames: self.frames,
        }
    }
}

// ============================================================================
// Block Dialect
// ============================================================================

/// One tabular snapshot of the block dialect
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub step: u64,
    pub time_seconds: f64,
    pub rows: Vec<[f64; BLOCK_COLUMNS]>,
}

impl Block {
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn time_ps(&self) -> f64 {
        self.time_seconds / SECONDS_PER_PICOSECOND
    }

    /// One column across all rows
    pub fn column(&self, column: BlockColumn) -> Vec<f64> {
        let pos = column.position();
        self.rows.iter().map(|row| row[pos]).collect()
    }
}

/// Result of an auto-detecting read
#[derive(Debug, Clone)]
pub enum Dataset {
    Classic(TimeSeries),
    Blocks(Vec<Block>),
}

impl Dataset {
    pub fn dialect(&self) -> Dialect {
        match self {
            Dataset::Classic(_) => Dialect::Classic,
            Dataset::Blocks(_) => Dialect::Block,
        }
    }
}
