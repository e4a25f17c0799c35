//! Classic record decoding
//!
//! One record holds `total_slots()` whitespace-separated numbers wrapped over
//! any number of lines. Numbers left over on the last line of a record are
//! discarded; the next record starts on a fresh line.

use crate::reader::LineReader;
use crate::types::{FormatErrorKind, FortError, Frame, Result, SectionDirectory};
use tracing::trace;

/// Decodes successive flat records laid out by one directory
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder<'d> {
    directory: &'d SectionDirectory,
}

impl<'d> FrameDecoder<'d> {
    pub fn new(directory: &'d SectionDirectory) -> Self {
        Self { directory }
    }

    #[inline]
    pub fn directory(&self) -> &'d SectionDirectory {
        self.directory
    }

    /// Decode the next record.
    ///
    /// Returns `Ok(None)` when the input ends before any value of the record
    /// was read (trailing blank lines included). Ending part-way through a
    /// record is an error.
    pub fn next_frame(&self, reader: &mut LineReader) -> Result<Option<Frame>> {
        let total = self.directory.total_slots();
        // every value takes at least two bytes of input
        let mut values = Vec::with_capacity(total.min(reader.remaining() / 2));

        while values.len() < total {
            let Some(line) = reader.next_line() else {
                if values.is_empty() {
                    return Ok(None);
                }
                return Err(FortError::format(
                    FormatErrorKind::UnexpectedEof,
                    reader.location(),
                    format!("record ended after {} of {} values", values.len(), total),
                ));
            };

            let mut tokens = line.split_whitespace();
            for token in tokens.by_ref() {
                let value: f64 = token.parse().map_err(|_| {
                    FortError::format(
                        FormatErrorKind::InvalidNumber,
                        reader.location(),
                        format!("'{}' is not a number", token),
                    )
                })?;
                values.push(value);
                if values.len() == total {
                    break;
                }
            }

            let discarded = tokens.count();
            if discarded > 0 {
                trace!(
                    line = reader.location().line,
                    discarded,
                    "Dropped trailing values after end of record"
                );
            }
        }

        Ok(Some(Frame { values }))
    }

    /// Decode a record that must be present
    pub fn read_frame(&self, reader: &mut LineReader) -> Result<Frame> {
        self.next_frame(reader)?.ok_or_else(|| {
            FortError::format(
                FormatErrorKind::UnexpectedEof,
                reader.location(),
                format!(
                    "end of file before a record of {} values",
                    self.directory.total_slots()
                ),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameValue, VariableDescriptor};

    fn directory() -> SectionDirectory {
        SectionDirectory::new(vec![
            VariableDescriptor::scalar("TIME"),
            VariableDescriptor::array("TI", 3),
        ])
    }

    #[test]
    fn test_records_wrap_across_lines() {
        let dir = directory();
        let decoder = FrameDecoder::new(&dir);
        let mut reader = LineReader::new(b"0.0 1.0\n2.0\n3.0\n1e-12 4 5 6\n");

        let first = decoder.next_frame(&mut reader).unwrap().unwrap();
        assert_eq!(first.values, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(first.get(&dir, "TI"), Some(FrameValue::Array(&[1.0, 2.0, 3.0])));

        let second = decoder.next_frame(&mut reader).unwrap().unwrap();
        assert_eq!(second.get(&dir, "TIME"), Some(FrameValue::Scalar(1e-12)));

        assert!(decoder.next_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_trailing_blank_lines_end_cleanly() {
        let dir = directory();
        let decoder = FrameDecoder::new(&dir);
        let mut reader = LineReader::new(b"0 1 2 3\n\n   \n");
        assert!(decoder.next_frame(&mut reader).unwrap().is_some());
        assert!(decoder.next_frame(&mut reader).unwrap().is_none());
    }

    #[test]
    fn test_partial_record_is_an_error() {
        let dir = directory();
        let decoder = FrameDecoder::new(&dir);
        let mut reader = LineReader::new(b"0 1 2 3\n0 1\n");
        decoder.next_frame(&mut reader).unwrap();
        let err = decoder.next_frame(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_invalid_number() {
        let dir = directory();
        let decoder = FrameDecoder::new(&dir);
        let mut reader = LineReader::new(b"0 1 x 3\n");
        let err = decoder.next_frame(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::InvalidNumber));
    }

    #[test]
    fn test_surplus_values_on_last_line_are_dropped() {
        let dir = directory();
        let decoder = FrameDecoder::new(&dir);
        let mut reader = LineReader::new(b"0 1 2 3 99\n5 6 7 8\n");
        decoder.next_frame(&mut reader).unwrap();
        let second = decoder.next_frame(&mut reader).unwrap().unwrap();
        assert_eq!(second.values, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_required_record() {
        let dir = directory();
        let decoder = FrameDecoder::new(&dir);
        let mut reader = LineReader::new(b"");
        let err = decoder.read_frame(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::UnexpectedEof));
    }
}
