//! Classic fort.10 reader
//!
//! Layout: one static section (header + exactly one record), one dynamic
//! section header, then dynamic records until end of file.

use crate::frame::FrameDecoder;
use crate::header::read_section_header;
use crate::reader::{map_file, LineReader};
use crate::types::{
    FormatErrorKind, FortError, Frame, FrameValue, Result, SectionDirectory, SeriesBuilder,
    TimeSeries,
};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Static section plus dynamic header, everything before the first frame
#[derive(Debug, Clone)]
pub(crate) struct Preamble {
    pub static_directory: SectionDirectory,
    pub static_frame: Frame,
    pub dynamic: SectionDirectory,
}

/// A fully decoded classic file, static record included
#[derive(Debug, Clone)]
pub struct ClassicFile {
    pub static_directory: SectionDirectory,
    pub static_frame: Frame,
    pub series: TimeSeries,
}

impl ClassicFile {
    /// Look up one variable of the static record
    pub fn static_value(&self, name: &str) -> Option<FrameValue<'_>> {
        self.static_frame.get(&self.static_directory, name)
    }
}

/// Decode the static section and the dynamic section header
pub(crate) fn read_preamble(reader: &mut LineReader) -> Result<Preamble> {
    let static_directory = read_section_header(reader)?;
    let static_frame = FrameDecoder::new(&static_directory).read_frame(reader)?;
    debug!(
        variables = static_directory.len(),
        values = static_frame.values.len(),
        "Static section read"
    );

    let dynamic = read_section_header(reader)?;
    if dynamic.total_slots() == 0 {
        return Err(FortError::format(
            FormatErrorKind::NoData,
            reader.location(),
            "dynamic section declares no values",
        ));
    }

    Ok(Preamble {
        static_directory,
        static_frame,
        dynamic,
    })
}

/// Decode every remaining dynamic record into named series
fn read_frames(reader: &mut LineReader, directory: &SectionDirectory) -> Result<TimeSeries> {
    let decoder = FrameDecoder::new(directory);
    let mut builder = SeriesBuilder::new(directory);

    while let Some(frame) = decoder.next_frame(reader)? {
        builder.push(&frame.values);
    }

    if builder.frames() == 0 {
        return Err(FortError::format(
            FormatErrorKind::NoData,
            reader.location(),
            "no dynamic frames after the section header",
        ));
    }
    Ok(builder.finish())
}

/// Decode a classic file held in memory, keeping the static record
pub fn parse_classic_file(data: &[u8]) -> Result<ClassicFile> {
    let mut reader = LineReader::new(data);
    let preamble = read_preamble(&mut reader)?;
    let series = read_frames(&mut reader, &preamble.dynamic)?;

    Ok(ClassicFile {
        static_directory: preamble.static_directory,
        static_frame: preamble.static_frame,
        series,
    })
}

/// Decode a classic file held in memory into its dynamic time series
pub fn parse_classic(data: &[u8]) -> Result<TimeSeries> {
    let mut reader = LineReader::new(data);
    let preamble = read_preamble(&mut reader)?;
    read_frames(&mut reader, &preamble.dynamic)
}

/// Read the dynamic time series of a classic fort.10 file
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_classic<P: AsRef<Path>>(path: P) -> Result<TimeSeries> {
    let mmap = map_file(path.as_ref())?;
    let series = parse_classic(&mmap)?;
    info!(
        frames = series.frame_count(),
        variables = series.names().len(),
        "Classic file read"
    );
    Ok(series)
}

/// Read a classic fort.10 file, keeping the static record
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_classic_file<P: AsRef<Path>>(path: P) -> Result<ClassicFile> {
    let mmap = map_file(path.as_ref())?;
    let file = parse_classic_file(&mmap)?;
    info!(
        frames = file.series.frame_count(),
        variables = file.series.names().len(),
        static_variables = file.static_directory.len(),
        "Classic file read"
    );
    Ok(file)
}
