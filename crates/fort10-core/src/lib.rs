//! # fort.10 / fort.11 Reader - Core Library
//!
//! Reads the ASCII output of MULTI-family radiation-hydrodynamics codes into
//! structured, queryable data.
//!
//! ## Supported Formats
//!
//! - Classic fort.10: packed 8-character names, run-length array descriptors,
//!   one static record then dynamic records until end of file
//! - Block fort.11: `step= <int> time= <float>` markers followed by 7-column
//!   rows (`i x v rho te ti depo`)
//! - Plain whitespace-delimited numeric tables
//!
//! ## Features
//!
//! - Memory-mapped file I/O, with in-memory `parse_*` entry points
//! - Dialect auto-detection from the file head
//! - Streaming reader for very large classic files
//! - Frame selection by index or nearest time, spatial profiles, time traces
//! - Structured logging via `tracing` for diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fort10_core::{profile, read_classic, select_frame, FrameSelector};
//!
//! let series = read_classic("fort.10").unwrap();
//! println!("Frames: {}", series.frame_count());
//!
//! // Frame nearest to 5 ps, then the ion temperature across the cells
//! let frame = select_frame(&series, FrameSelector::TimePs(5.0)).unwrap();
//! let ti = profile(&series, "TI", frame).unwrap();
//! println!("{} cells, x in cm: {}", ti.y.len(), ti.x_is_coordinate);
//! ```
//!
//! ## Block Files
//!
//! ```rust,no_run
//! use fort10_core::{find_step, read_blocks, BlockColumn};
//!
//! let blocks = read_blocks("fort.11").unwrap();
//! if let Some(block) = find_step(&blocks, 100) {
//!     println!("t = {} ps, rho = {:?}", block.time_ps(), block.column(BlockColumn::Rho));
//! }
//! ```
//!
//! ## Streaming for Large Files
//!
//! ```rust,no_run
//! use fort10_core::read_classic_stream;
//!
//! let reader = read_classic_stream("fort.10").unwrap();
//! for chunk in reader {
//!     let chunk = chunk.unwrap();
//!     println!("Chunk {}: frames {:?}", chunk.chunk_index, chunk.frame_range);
//! }
//! ```
//!
//! ## Enabling Logging
//!
//! This library uses `tracing` for structured logging. To see log output,
//! initialize a tracing subscriber in your application:
//!
//! ```rust,ignore
//! // Add tracing-subscriber to your Cargo.toml
//! tracing_subscriber::fmt::init();
//!
//! // Now library logs will be visible
//! let data = fort10_core::read("fort.10").unwrap();
//! ```

mod block;
mod classic;
mod detect;
mod frame;
mod header;
mod query;
mod reader;
mod stream;
mod table;
mod types;

// Re-export public types
pub use types::{
    // Section layout
    ArraySeries,
    Block,
    BlockColumn,
    Dataset,
    Dialect,
    // Error types
    FormatErrorKind,
    FortError,
    Frame,
    FrameValue,
    LengthUnit,
    Location,
    Result,
    SectionDirectory,
    Series,
    TimeSeries,
    VariableDescriptor,
    // Constants
    BLOCK_COLUMNS,
    COORDINATE_VARIABLE,
    DEFAULT_CHUNK_FRAMES,
    DEFAULT_SAMPLE_BYTES,
    NAME_SLOT_WIDTH,
    SECONDS_PER_PICOSECOND,
    TIME_VARIABLE,
};

// Re-export readers
pub use block::{parse_blocks, read_blocks, BlockParser};
pub use classic::{parse_classic, parse_classic_file, read_classic, read_classic_file, ClassicFile};
pub use detect::{detect, detect_file};
pub use frame::FrameDecoder;
pub use header::{compress_runs, read_section_header};
pub use reader::{Cursor, LineReader};
pub use table::{parse_table, read_table, ColumnTable};

// Re-export streaming types
pub use stream::{read_classic_stream, read_classic_stream_chunked, ClassicStream, FrameChunk};

// Re-export query layer
pub use query::{
    block_profile, convert_length, find_step, profile, ps_to_seconds, seconds_to_ps,
    select_frame, smooth, trace, FrameSelector, Profile, Timeline, Trace,
};

// ============================================================================
// Public API Functions
// ============================================================================

/// Read a fort.10 / fort.11 file of either dialect.
///
/// The dialect is guessed from the first `DEFAULT_SAMPLE_BYTES` of the file.
///
/// # Example
/// ```rust,no_run
/// use fort10_core::Dataset;
///
/// match fort10_core::read("fort.11").unwrap() {
///     Dataset::Classic(series) => println!("{} frames", series.frame_count()),
///     Dataset::Blocks(blocks) => println!("{} blocks", blocks.len()),
/// }
/// ```
pub fn read<P: AsRef<std::path::Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    match detect_file(path)? {
        Dialect::Classic => read_classic(path).map(Dataset::Classic),
        Dialect::Block => read_blocks(path).map(Dataset::Blocks),
    }
}
