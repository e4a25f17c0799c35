//! Streaming reader for large classic fort.10 files
//!
//! Only the preamble (static section and dynamic header) is decoded at
//! `open()`. Dynamic records are decoded on demand during iteration, so peak
//! memory is O(chunk frames * record width) rather than O(file size).
//! Records are never split across chunks.

use crate::classic::read_preamble;
use crate::frame::FrameDecoder;
use crate::reader::{map_file, Cursor, LineReader};
use crate::types::{
    Frame, FormatErrorKind, FortError, Result, SectionDirectory, SeriesBuilder, TimeSeries,
    DEFAULT_CHUNK_FRAMES, TIME_VARIABLE,
};
use memmap2::Mmap;
use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;
use tracing::{info, instrument, trace};

/// A run of consecutive dynamic frames
#[derive(Debug, Clone)]
pub struct FrameChunk {
    /// Index of this chunk (0-based)
    pub chunk_index: usize,
    /// Global frame indices covered by this chunk
    pub frame_range: Range<usize>,
    /// First and last `TIME` value of the chunk, if the file has `TIME`
    pub time_range: Option<(f64, f64)>,
    /// Decoded series for the frames of this chunk
    pub series: TimeSeries,
}

/// Chunked reader over the dynamic section of a classic file
pub struct ClassicStream {
    /// Memory-mapped file data
    mmap: Mmap,
    /// Position of the next unread dynamic record
    cursor: Cursor,
    static_directory: SectionDirectory,
    static_frame: Frame,
    directory: SectionDirectory,
    /// Minimum frames per chunk (the last chunk may hold fewer)
    min_chunk_frames: usize,
    current_chunk: usize,
    frames_read: usize,
    /// Variable filter (None = all variables)
    variable_filter: Option<HashSet<String>>,
    finished: bool,
}

impl ClassicStream {
    /// Open a file and decode its preamble
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P, min_chunk_frames: usize) -> Result<Self> {
        let mmap = map_file(path.as_ref())?;

        let (preamble, cursor) = {
            let mut reader = LineReader::new(&mmap);
            let preamble = read_preamble(&mut reader)?;
            (preamble, reader.cursor())
        };

        info!(
            variables = preamble.dynamic.len(),
            record_width = preamble.dynamic.total_slots(),
            chunk_frames = min_chunk_frames,
            "Stream reader opened"
        );

        Ok(Self {
            mmap,
            cursor,
            static_directory: preamble.static_directory,
            static_frame: preamble.static_frame,
            directory: preamble.dynamic,
            min_chunk_frames: min_chunk_frames.max(1),
            current_chunk: 0,
            frames_read: 0,
            variable_filter: None,
            finished: false,
        })
    }

    /// Only keep the named variables (and `TIME`) in yielded chunks
    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variable_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Layout of each dynamic record
    pub fn directory(&self) -> &SectionDirectory {
        &self.directory
    }

    pub fn static_directory(&self) -> &SectionDirectory {
        &self.static_directory
    }

    pub fn static_frame(&self) -> &Frame {
        &self.static_frame
    }

    /// Frames yielded so far
    pub fn frames_read(&self) -> usize {
        self.frames_read
    }

    fn next_chunk(&mut self) -> Result<Option<FrameChunk>> {
        let mut reader = LineReader::resume(&self.mmap, self.cursor);
        let decoder = FrameDecoder::new(&self.directory);
        let mut builder = SeriesBuilder::new(&self.directory);

        while builder.frames() < self.min_chunk_frames {
            match decoder.next_frame(&mut reader)? {
                Some(frame) => builder.push(&frame.values),
                None => {
                    self.finished = true;
                    break;
                }
            }
        }
        self.cursor = reader.cursor();

        let frames = builder.frames();
        if frames == 0 {
            if self.frames_read == 0 {
                return Err(FortError::format(
                    FormatErrorKind::NoData,
                    reader.location(),
                    "no dynamic frames after the section header",
                ));
            }
            return Ok(None);
        }

        let mut series = builder.finish();
        let time_range = series
            .time()
            .and_then(|t| Some((*t.first()?, *t.last()?)));
        if let Some(filter) = &self.variable_filter {
            series.retain(|name| name == TIME_VARIABLE || filter.contains(name));
        }

        let chunk = FrameChunk {
            chunk_index: self.current_chunk,
            frame_range: self.frames_read..self.frames_read + frames,
            time_range,
            series,
        };
        trace!(
            chunk = chunk.chunk_index,
            frames,
            first_frame = chunk.frame_range.start,
            "Chunk built"
        );

        self.current_chunk += 1;
        self.frames_read += frames;
        Ok(Some(chunk))
    }
}

impl Iterator for ClassicStream {
    type Item = Result<FrameChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Open a classic file for streaming read with the default chunk size
pub fn read_classic_stream<P: AsRef<Path>>(path: P) -> Result<ClassicStream> {
    ClassicStream::open(path, DEFAULT_CHUNK_FRAMES)
}

/// Open a classic file for streaming read with a custom minimum chunk size
pub fn read_classic_stream_chunked<P: AsRef<Path>>(
    path: P,
    min_chunk_frames: usize,
) -> Result<ClassicStream> {
    ClassicStream::open(path, min_chunk_frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameValue, Series};
    use std::fs;

    const SAMPLE: &str = "\
1
NCELL
0
2
3
TIME    TI      TI
0 2 2
0.0 10.0 20.0
1.0e-12 11.0 21.0
2.0e-12 12.0 22.0
3.0e-12 13.0 23.0
4.0e-12 14.0 24.0
";

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, contents).expect("write temp file");
        path
    }

    #[test]
    fn test_stream_chunks_cover_all_frames() {
        let path = write_temp("fort10_stream_chunks.fort10", SAMPLE);
        let mut stream = read_classic_stream_chunked(&path, 2).unwrap();
        assert_eq!(stream.directory().total_slots(), 3);
        assert_eq!(stream.static_directory().len(), 1);
        assert_eq!(
            stream.static_frame().get(stream.static_directory(), "NCELL"),
            Some(FrameValue::Scalar(2.0))
        );

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next() {
            chunks.push(chunk.unwrap());
            assert_eq!(stream.frames_read(), chunks.last().unwrap().frame_range.end);
        }
        assert_eq!(stream.frames_read(), 5);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].frame_range, 0..2);
        assert_eq!(chunks[2].frame_range, 4..5);
        assert_eq!(chunks[1].time_range, Some((2.0e-12, 3.0e-12)));

        let ti: Vec<f64> = chunks
            .iter()
            .flat_map(|c| {
                c.series
                    .get("TI")
                    .and_then(Series::as_array)
                    .and_then(|a| a.cell(1))
                    .unwrap()
            })
            .collect();
        assert_eq!(ti, vec![20.0, 21.0, 22.0, 23.0, 24.0]);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_stream_variable_filter() {
        let path = write_temp("fort10_stream_filter.fort10", SAMPLE);
        let stream = ClassicStream::open(&path, 10).unwrap().with_variables(["TI"]);
        let chunks: Vec<FrameChunk> = stream.map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].series.names(),
            &["TIME".to_string(), "TI".to_string()]
        );
        assert_eq!(chunks[0].time_range, Some((0.0, 4.0e-12)));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_stream_without_frames_reports_no_data() {
        let path = write_temp("fort10_stream_empty.fort10", "1\nA\n0\n1.0\n1\nTIME\n0\n");
        let mut stream = read_classic_stream(&path).unwrap();
        let err = stream.next().unwrap().unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::NoData));
        assert!(stream.next().is_none());

        fs::remove_file(&path).ok();
    }
}
