//! Dialect detection from the head of a file

use crate::types::{Dialect, Result, DEFAULT_SAMPLE_BYTES};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Banner written by the simulation's ASCII block output (spelling as emitted)
const ASCII_OUTPUT_BANNER: &str = "ascii_ouput";

static STEP_TOKEN: OnceLock<Regex> = OnceLock::new();
static TIME_TOKEN: OnceLock<Regex> = OnceLock::new();

fn step_token() -> &'static Regex {
    STEP_TOKEN.get_or_init(|| Regex::new(r"(?i)step\s*=").expect("Invalid step token pattern"))
}

fn time_token() -> &'static Regex {
    TIME_TOKEN.get_or_init(|| Regex::new(r"(?i)time\s*=").expect("Invalid time token pattern"))
}

/// Guess the dialect of a file from a sample of its head.
///
/// `Block` when the sample holds both a `step=` and a `time=` token (any
/// case) or the ASCII-output banner, otherwise `Classic`. A wrong guess
/// surfaces later as a format error from the chosen reader.
pub fn detect(sample: &str) -> Dialect {
    let has_markers = step_token().is_match(sample) && time_token().is_match(sample);
    if has_markers || sample.to_lowercase().contains(ASCII_OUTPUT_BANNER) {
        Dialect::Block
    } else {
        Dialect::Classic
    }
}

/// Sample the first `DEFAULT_SAMPLE_BYTES` of a file and detect its dialect
pub fn detect_file<P: AsRef<Path>>(path: P) -> Result<Dialect> {
    let file = File::open(path.as_ref())?;
    let mut sample = Vec::with_capacity(DEFAULT_SAMPLE_BYTES);
    file.take(DEFAULT_SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)?;

    let dialect = detect(&String::from_utf8_lossy(&sample));
    debug!(
        path = %path.as_ref().display(),
        sampled = sample.len(),
        %dialect,
        "Dialect detected"
    );
    Ok(dialect)
}
