//! Classic section header decoding
//!
//! A section header is an element count, a run of packed 8-character name
//! slots, and a matching run of length codes (0 for scalars, the array
//! length for every slot of an array variable). Both runs may wrap across
//! any number of lines.

use crate::reader::LineReader;
use crate::types::{
    FormatErrorKind, FortError, Result, SectionDirectory, VariableDescriptor, NAME_SLOT_WIDTH,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Split a line into trimmed, non-empty fixed-width name slots
fn name_slots(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(NAME_SLOT_WIDTH)
        .map(|slot| slot.iter().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read the leading element count of a section
fn read_element_count(reader: &mut LineReader) -> Result<usize> {
    let line = reader.next_line().ok_or_else(|| {
        FortError::format(
            FormatErrorKind::UnexpectedEof,
            reader.location(),
            "end of file before section element count",
        )
    })?;

    let token = line.split_whitespace().next().ok_or_else(|| {
        FortError::format(
            FormatErrorKind::InvalidNumber,
            reader.location(),
            "missing section element count",
        )
    })?;

    let n: i64 = token.parse().map_err(|_| {
        FortError::format(
            FormatErrorKind::InvalidNumber,
            reader.location(),
            format!("section element count '{}' is not an integer", token),
        )
    })?;

    usize::try_from(n).map_err(|_| {
        FortError::format(
            FormatErrorKind::HeaderMismatch,
            reader.location(),
            format!("negative section element count {}", n),
        )
    })
}

/// Collect exactly `n` positional names across as many lines as needed
fn read_names(reader: &mut LineReader, n: usize) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(n);
    while names.len() < n {
        let line = reader.next_line().ok_or_else(|| {
            FortError::format(
                FormatErrorKind::UnexpectedEof,
                reader.location(),
                format!("end of file after {} of {} variable names", names.len(), n),
            )
        })?;
        names.extend(name_slots(&line));
    }

    if names.len() > n {
        return Err(FortError::format(
            FormatErrorKind::HeaderMismatch,
            reader.location(),
            format!("declared {} names but the name run holds {}", n, names.len()),
        ));
    }
    Ok(names)
}

/// Collect exactly `n` whitespace- or comma-separated length codes
fn read_lengths(reader: &mut LineReader, n: usize) -> Result<Vec<usize>> {
    let mut lengths = Vec::with_capacity(n);
    while lengths.len() < n {
        let line = reader.next_line().ok_or_else(|| {
            FortError::format(
                FormatErrorKind::UnexpectedEof,
                reader.location(),
                format!("end of file after {} of {} length codes", lengths.len(), n),
            )
        })?;

        for token in line.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            let value: i64 = token.parse().map_err(|_| {
                FortError::format(
                    FormatErrorKind::InvalidNumber,
                    reader.location(),
                    format!("length code '{}' is not an integer", token),
                )
            })?;
            let value = usize::try_from(value).map_err(|_| {
                FortError::format(
                    FormatErrorKind::HeaderMismatch,
                    reader.location(),
                    format!("negative length code {}", value),
                )
            })?;
            lengths.push(value);
        }
    }

    if lengths.len() > n {
        return Err(FortError::format(
            FormatErrorKind::HeaderMismatch,
            reader.location(),
            format!("declared {} length codes but the run holds {}", n, lengths.len()),
        ));
    }
    Ok(lengths)
}

/// Collapse repeated (name, length) slots into variable descriptors.
///
/// A run of `L` slots sharing one name and all carrying length `L` becomes a
/// single array. At the first run that does not hold together, the remaining
/// pairs are emitted unchanged: `0` as a scalar, `L` as an array of `L`
/// slots.
pub fn compress_runs(names: &[String], lengths: &[usize]) -> Vec<VariableDescriptor> {
    let n = names.len().min(lengths.len());
    let mut variables = Vec::new();
    let mut i = 0usize;

    while i < n {
        let (name, len) = (&names[i], lengths[i]);
        if len == 0 {
            variables.push(VariableDescriptor::scalar(name.as_str()));
            i += 1;
            continue;
        }

        let end = i.saturating_add(len);
        let consistent = end <= n
            && names[i..end].iter().all(|nm| nm == name)
            && lengths[i..end].iter().all(|&l| l == len);
        if consistent {
            variables.push(VariableDescriptor::array(name.as_str(), len));
            i = end;
            continue;
        }

        warn!(
            variable = %name,
            position = i,
            length = len,
            "Inconsistent array run, keeping remaining header entries uncompressed"
        );
        variables.extend(names[i..n].iter().zip(&lengths[i..n]).map(|(nm, &l)| {
            if l == 0 {
                VariableDescriptor::scalar(nm.as_str())
            } else {
                VariableDescriptor::array(nm.as_str(), l)
            }
        }));
        break;
    }

    variables
}

/// Decode one section header into its directory
pub fn read_section_header(reader: &mut LineReader) -> Result<SectionDirectory> {
    let n = read_element_count(reader)?;
    let names = read_names(reader, n)?;
    let lengths = read_lengths(reader, n)?;

    let variables = compress_runs(&names, &lengths);

    {
        let mut seen = HashSet::with_capacity(variables.len());
        if let Some(dup) = variables.iter().find(|v| !seen.insert(v.name.as_str())) {
            return Err(FortError::format(
                FormatErrorKind::HeaderMismatch,
                reader.location(),
                format!("variable '{}' appears more than once in the section", dup.name),
            ));
        }
    }

    let directory = SectionDirectory::try_new(variables).ok_or_else(|| {
        FortError::format(
            FormatErrorKind::HeaderMismatch,
            reader.location(),
            "array lengths overflow the record size",
        )
    })?;
    debug!(
        elements = n,
        variables = directory.len(),
        slots = directory.total_slots(),
        "Section header decoded"
    );
    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_name_slots_are_positional() {
        let slots = name_slots("TIME    R       R       XC");
        assert_eq!(slots, vec!["TIME", "R", "R", "XC"]);

        // Names containing spaces inside a slot are kept whole
        let slots = name_slots("  A B   C");
        assert_eq!(slots, vec!["A B", "C"]);
    }

    #[test]
    fn test_compress_expanded_runs() {
        let names = strings(&["TIME", "R", "R", "R", "TE", "TE"]);
        let lengths = vec![0, 3, 3, 3, 2, 2];
        let vars = compress_runs(&names, &lengths);

        assert_eq!(
            vars,
            vec![
                VariableDescriptor::scalar("TIME"),
                VariableDescriptor::array("R", 3),
                VariableDescriptor::array("TE", 2),
            ]
        );
        let total: usize = vars.iter().map(|v| v.count).sum();
        assert_eq!(total, names.len());
    }

    #[test]
    fn test_compress_falls_back_on_inconsistent_run() {
        // compact layout: each name once with its array length
        let names = strings(&["TIME", "R", "TE"]);
        let lengths = vec![0, 4, 4];
        let vars = compress_runs(&names, &lengths);

        assert_eq!(
            vars,
            vec![
                VariableDescriptor::scalar("TIME"),
                VariableDescriptor::array("R", 4),
                VariableDescriptor::array("TE", 4),
            ]
        );
    }

    #[test]
    fn test_read_wrapped_header() {
        let text = "5\nTIME    R       R\n      R       DT\n0 3\n3 3, 0\n";
        let mut reader = LineReader::new(text.as_bytes());
        let dir = read_section_header(&mut reader).unwrap();

        assert_eq!(dir.len(), 3);
        assert_eq!(dir.total_slots(), 5);
        assert_eq!(dir.get("R"), Some(&VariableDescriptor::array("R", 3)));
        assert!(reader.is_eof());
    }

    #[test]
    fn test_truncated_names_fail_closed() {
        let text = "4\nTIME    R       \n";
        let mut reader = LineReader::new(text.as_bytes());
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_bad_count_and_lengths() {
        let mut reader = LineReader::new(b"abc\n");
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::InvalidNumber));

        let mut reader = LineReader::new(b"-2\n");
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::HeaderMismatch));

        let mut reader = LineReader::new(b"2\nA       B\n0 x\n");
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::InvalidNumber));
    }

    #[test]
    fn test_overlong_name_run_is_a_mismatch() {
        let mut reader = LineReader::new(b"2\nA       B       C\n0 0\n");
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::HeaderMismatch));
    }

    #[test]
    fn test_duplicate_scalars_are_a_mismatch() {
        let mut reader = LineReader::new(b"2\nA       A\n0 0\n");
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::HeaderMismatch));
    }

    #[test]
    fn test_huge_length_codes() {
        // a single huge compact array is accepted; its record can never be filled
        let mut reader = LineReader::new(b"2\nTIME    R\n0 100000000000000\n");
        let dir = read_section_header(&mut reader).unwrap();
        assert_eq!(dir.total_slots(), 100_000_000_000_001);

        let mut reader = LineReader::new(
            b"3\nA       B       C\n7000000000000000000 7000000000000000000 7000000000000000000\n",
        );
        let err = read_section_header(&mut reader).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::HeaderMismatch));
    }

    #[test]
    fn test_empty_section() {
        let mut reader = LineReader::new(b"0\n");
        let dir = read_section_header(&mut reader).unwrap();
        assert!(dir.is_empty());
        assert_eq!(dir.total_slots(), 0);
    }
}
