//! Frame selection, profiles, traces, unit conversion and smoothing

use crate::types::{
    Block, BlockColumn, FormatErrorKind, FortError, LengthUnit, Location, Result, Series,
    TimeSeries, COORDINATE_VARIABLE, SECONDS_PER_PICOSECOND,
};

// ============================================================================
// Time helpers
// ============================================================================

#[inline]
pub fn ps_to_seconds(ps: f64) -> f64 {
    ps * SECONDS_PER_PICOSECOND
}

#[inline]
pub fn seconds_to_ps(seconds: f64) -> f64 {
    seconds / SECONDS_PER_PICOSECOND
}

// ============================================================================
// Frame selection
// ============================================================================

/// Anything with an ordered sequence of frames, optionally timestamped
pub trait Timeline {
    fn frame_count(&self) -> usize;

    /// Time of a frame in seconds, `None` if the timeline carries no times
    fn frame_time(&self, index: usize) -> Option<f64>;
}

impl Timeline for TimeSeries {
    fn frame_count(&self) -> usize {
        TimeSeries::frame_count(self)
    }

    fn frame_time(&self, index: usize) -> Option<f64> {
        self.time()?.get(index).copied()
    }
}

impl Timeline for [Block] {
    fn frame_count(&self) -> usize {
        self.len()
    }

    fn frame_time(&self, index: usize) -> Option<f64> {
        self.get(index).map(|b| b.time_seconds)
    }
}

impl Timeline for [f64] {
    fn frame_count(&self) -> usize {
        self.len()
    }

    fn frame_time(&self, index: usize) -> Option<f64> {
        self.get(index).copied()
    }
}

/// How to pick one frame (or block) out of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FrameSelector {
    /// Explicit index, clamped into range
    Index(i64),
    /// Nearest time in picoseconds; ties go to the lowest index
    TimePs(f64),
    /// The final frame
    #[default]
    Last,
}

impl FrameSelector {
    /// `frame` takes precedence over `time_ps`; neither selects the last frame
    pub fn from_options(frame: Option<i64>, time_ps: Option<f64>) -> Self {
        match (frame, time_ps) {
            (Some(i), _) => FrameSelector::Index(i),
            (None, Some(t)) => FrameSelector::TimePs(t),
            (None, None) => FrameSelector::Last,
        }
    }
}

/// Resolve a selector to a frame index
pub fn select_frame<T: Timeline + ?Sized>(timeline: &T, selector: FrameSelector) -> Result<usize> {
    let n = timeline.frame_count();
    if n == 0 {
        return Err(FortError::format(
            FormatErrorKind::NoData,
            Location::default(),
            "no frames to select from",
        ));
    }
    let last = n - 1;

    match selector {
        FrameSelector::Index(i) => Ok(i.clamp(0, last as i64) as usize),
        FrameSelector::Last => Ok(last),
        FrameSelector::TimePs(ps) => {
            if !ps.is_finite() {
                return Err(FortError::Config(format!(
                    "target time {} ps is not a finite number",
                    ps
                )));
            }
            let target = ps_to_seconds(ps);
            let mut best: Option<(usize, f64)> = None;
            for i in 0..n {
                let t = timeline.frame_time(i).ok_or_else(|| {
                    FortError::Config("cannot select by time: no time axis".into())
                })?;
                let diff = (t - target).abs();
                match best {
                    Some((_, d)) if diff >= d => {}
                    _ if diff.is_nan() => {}
                    _ => best = Some((i, diff)),
                }
            }
            Ok(best.map(|(i, _)| i).unwrap_or(last))
        }
    }
}

/// The block whose step number equals `step`
pub fn find_step(blocks: &[Block], step: u64) -> Option<&Block> {
    blocks.iter().find(|b| b.step == step)
}

// ============================================================================
// Profiles and traces
// ============================================================================

/// One variable against space at a fixed time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// `x` holds spatial coordinates rather than cell or frame indices
    pub x_is_coordinate: bool,
}

impl Profile {
    /// Reorder points by ascending `x` (stable)
    pub fn sorted_by_x(self) -> Self {
        let mut order: Vec<usize> = (0..self.x.len().min(self.y.len())).collect();
        order.sort_by(|&a, &b| self.x[a].total_cmp(&self.x[b]));
        Self {
            x: order.iter().map(|&i| self.x[i]).collect(),
            y: order.iter().map(|&i| self.y[i]).collect(),
            x_is_coordinate: self.x_is_coordinate,
        }
    }

    pub fn smoothed(mut self, k: usize) -> Self {
        self.y = smooth(&self.y, k);
        self
    }

    /// Convert coordinate `x` values to micrometres. Index axes are left alone.
    pub fn with_x_unit(mut self, unit: LengthUnit) -> Self {
        if self.x_is_coordinate {
            let factor = unit.factor_to_um();
            self.x.iter_mut().for_each(|v| *v *= factor);
        }
        self
    }
}

/// One variable against time at a fixed cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trace {
    /// Seconds
    pub t: Vec<f64>,
    pub y: Vec<f64>,
}

fn lookup<'a>(series: &'a TimeSeries, variable: &str) -> Result<&'a Series> {
    let name = variable.trim();
    series.get(name).ok_or_else(|| {
        let available: Vec<&str> = series.names().iter().take(15).map(String::as_str).collect();
        FortError::Config(format!(
            "variable '{}' not found (available: {})",
            name,
            available.join(", ")
        ))
    })
}

/// Values of `variable` across space at `frame`.
///
/// `x` is the `XC` coordinate row when it exists with a matching cell count,
/// otherwise cell indices. A scalar variable yields its whole series against
/// frame index.
pub fn profile(series: &TimeSeries, variable: &str, frame: usize) -> Result<Profile> {
    let array = match lookup(series, variable)? {
        Series::Scalar(values) => {
            return Ok(Profile {
                x: (0..values.len()).map(|i| i as f64).collect(),
                y: values.clone(),
                x_is_coordinate: false,
            })
        }
        Series::Array(array) => array,
    };

    let y = array.frame(frame).ok_or(FortError::Index {
        what: "frame",
        index: frame as i64,
        len: array.frames(),
    })?;

    let coordinates = series
        .get(COORDINATE_VARIABLE)
        .and_then(Series::as_array)
        .filter(|xc| xc.cells() == array.cells())
        .and_then(|xc| xc.frame(frame));

    let (x, x_is_coordinate) = match coordinates {
        Some(xc) => (xc.to_vec(), true),
        None => ((0..y.len()).map(|i| i as f64).collect(), false),
    };

    Ok(Profile {
        x,
        y: y.to_vec(),
        x_is_coordinate,
    })
}

/// Values of `variable` across time at one cell (default: the middle cell)
pub fn trace(series: &TimeSeries, variable: &str, cell: Option<i64>) -> Result<Trace> {
    let values = lookup(series, variable)?;
    let t = series
        .time()
        .ok_or_else(|| FortError::Config("series has no TIME variable".into()))?
        .to_vec();

    let y = match values {
        Series::Scalar(v) => v.clone(),
        Series::Array(array) => {
            let cells = array.cells();
            let index = cell.unwrap_or((cells / 2) as i64);
            let out_of_range = FortError::Index {
                what: "cell",
                index,
                len: cells,
            };
            let index = usize::try_from(index).map_err(|_| out_of_range)?;
            array.cell(index).ok_or(FortError::Index {
                what: "cell",
                index: index as i64,
                len: cells,
            })?
        }
    };

    Ok(Trace { t, y })
}

/// One block column against the block's `x` column
pub fn block_profile(block: &Block, column: BlockColumn) -> Profile {
    Profile {
        x: block.column(BlockColumn::X),
        y: block.column(column),
        x_is_coordinate: true,
    }
}

// ============================================================================
// Conversion and smoothing
// ============================================================================

/// Convert lengths given in `unit` to micrometres
pub fn convert_length(values: &[f64], unit: &str) -> Result<Vec<f64>> {
    let factor = unit.parse::<LengthUnit>()?.factor_to_um();
    Ok(values.iter().map(|v| v * factor).collect())
}

/// Centered boxcar average over `k` cells; `k <= 1` returns the input.
///
/// Cells outside the input count as zero, so values within `k / 2` of either
/// edge are pulled towards zero. Even `k` leans one cell to the left.
pub fn smooth(values: &[f64], k: usize) -> Vec<f64> {
    if k <= 1 {
        return values.to_vec();
    }

    let n = values.len() as isize;
    let k_signed = k as isize;
    let offset = (k_signed - 1) / 2;
    let weight = 1.0 / k as f64;

    (0..n)
        .map(|i| {
            let hi = (i + offset).min(n - 1);
            let lo = (i + offset + 1 - k_signed).max(0);
            if lo > hi {
                return 0.0;
            }
            values[lo as usize..=hi as usize].iter().sum::<f64>() * weight
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SectionDirectory, SeriesBuilder, VariableDescriptor};

    fn sample_series() -> TimeSeries {
        let dir = SectionDirectory::new(vec![
            VariableDescriptor::scalar("TIME"),
            VariableDescriptor::array("XC", 3),
            VariableDescriptor::array("TI", 3),
            VariableDescriptor::array("Q", 2),
        ]);
        let mut builder = SeriesBuilder::new(&dir);
        builder.push(&[0.0, 3.0, 1.0, 2.0, 10.0, 11.0, 12.0, 7.0, 8.0]);
        builder.push(&[1e-12, 3.5, 1.5, 2.5, 20.0, 21.0, 22.0, 7.5, 8.5]);
        builder.finish()
    }

    #[test]
    fn test_time_unit_helpers() {
        assert!((seconds_to_ps(5.0e-12) - 5.0).abs() < 1e-9);
        assert!((ps_to_seconds(5.0) - 5.0e-12).abs() < 1e-24);
        assert!((seconds_to_ps(ps_to_seconds(0.25)) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_time_selection() {
        let times = [0.0, 1e-12, 5e-12, 9e-12];
        assert_eq!(select_frame(&times[..], FrameSelector::TimePs(4.0)).unwrap(), 2);
        assert_eq!(select_frame(&times[..], FrameSelector::TimePs(0.4)).unwrap(), 0);
        // equidistant between 1 ps and 5 ps: lowest index wins
        assert_eq!(select_frame(&times[..], FrameSelector::TimePs(3.0)).unwrap(), 1);
    }

    #[test]
    fn test_index_clamping_and_default() {
        let times = vec![0.0; 10];
        assert_eq!(select_frame(&times[..], FrameSelector::Index(-5)).unwrap(), 0);
        assert_eq!(select_frame(&times[..], FrameSelector::Index(50)).unwrap(), 9);
        assert_eq!(select_frame(&times[..], FrameSelector::Last).unwrap(), 9);
    }

    #[test]
    fn test_selector_precedence() {
        assert_eq!(
            FrameSelector::from_options(Some(2), Some(4.0)),
            FrameSelector::Index(2)
        );
        assert_eq!(
            FrameSelector::from_options(None, Some(4.0)),
            FrameSelector::TimePs(4.0)
        );
        assert_eq!(FrameSelector::from_options(None, None), FrameSelector::Last);
    }

    #[test]
    fn test_select_from_empty_or_timeless() {
        let empty: [f64; 0] = [];
        let err = select_frame(&empty[..], FrameSelector::Last).unwrap_err();
        assert_eq!(err.format_kind(), Some(FormatErrorKind::NoData));

        let err = select_frame(&[0.0, 1.0][..], FrameSelector::TimePs(f64::NAN)).unwrap_err();
        assert!(matches!(err, FortError::Config(_)));
    }

    #[test]
    fn test_select_frame_on_time_series() {
        let ts = sample_series();
        assert_eq!(select_frame(&ts, FrameSelector::TimePs(0.9)).unwrap(), 1);
    }

    #[test]
    fn test_profile_uses_coordinates() {
        let ts = sample_series();
        let p = profile(&ts, "TI", 1).unwrap();
        assert!(p.x_is_coordinate);
        assert_eq!(p.x, vec![3.5, 1.5, 2.5]);
        assert_eq!(p.y, vec![20.0, 21.0, 22.0]);

        let sorted = p.sorted_by_x();
        assert_eq!(sorted.x, vec![1.5, 2.5, 3.5]);
        assert_eq!(sorted.y, vec![21.0, 22.0, 20.0]);
    }

    #[test]
    fn test_profile_falls_back_to_cell_index() {
        let ts = sample_series();
        let p = profile(&ts, "Q", 0).unwrap();
        assert!(!p.x_is_coordinate);
        assert_eq!(p.x, vec![0.0, 1.0]);

        let err = profile(&ts, "Q", 2).unwrap_err();
        assert!(matches!(err, FortError::Index { what: "frame", .. }));

        let err = profile(&ts, "NOPE", 0).unwrap_err();
        assert!(matches!(err, FortError::Config(_)));
    }

    #[test]
    fn test_trace_bounds() {
        let ts = sample_series();
        let tr = trace(&ts, "TI", None).unwrap();
        assert_eq!(tr.t, vec![0.0, 1e-12]);
        assert_eq!(tr.y, vec![11.0, 21.0]);

        assert!(matches!(
            trace(&ts, "TI", Some(-1)),
            Err(FortError::Index { index: -1, .. })
        ));
        assert!(matches!(
            trace(&ts, "TI", Some(3)),
            Err(FortError::Index { index: 3, len: 3, .. })
        ));
        assert_eq!(trace(&ts, "TI", Some(2)).unwrap().y, vec![12.0, 22.0]);
    }

    #[test]
    fn test_convert_length() {
        assert_eq!(convert_length(&[1.0], "cm").unwrap(), vec![1e4]);
        assert_eq!(convert_length(&[1.0], "m").unwrap(), vec![1e6]);
        assert_eq!(convert_length(&[2.5], "um").unwrap(), vec![2.5]);
        assert!(matches!(
            convert_length(&[1.0], "ft"),
            Err(FortError::Config(_))
        ));
    }

    #[test]
    fn test_smooth() {
        let values = [1.0, 4.0, 2.0, 8.0];
        assert_eq!(smooth(&values, 0), values.to_vec());
        assert_eq!(smooth(&values, 1), values.to_vec());

        let s = smooth(&[3.0, 3.0, 3.0, 3.0], 3);
        assert_eq!(s.len(), 4);
        assert!((s[0] - 2.0).abs() < 1e-12);
        assert!((s[1] - 3.0).abs() < 1e-12);
        assert!((s[3] - 2.0).abs() < 1e-12);

        // even window: [x[i-2] + x[i-1] + x[i] + x[i+1]] / 4
        let s = smooth(&[4.0, 4.0, 4.0, 4.0, 4.0], 4);
        assert!((s[0] - 2.0).abs() < 1e-12);
        assert!((s[2] - 4.0).abs() < 1e-12);
        assert!((s[4] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_block_helpers() {
        let blocks = vec![
            Block {
                step: 10,
                time_seconds: 1e-12,
                rows: vec![[1.0, 0.2, 0.0, 2.0, 0.0, 5.0, 0.0]],
            },
            Block {
                step: 20,
                time_seconds: 2e-12,
                rows: vec![[1.0, 0.3, 0.0, 3.0, 0.0, 6.0, 0.0]],
            },
        ];
        assert_eq!(find_step(&blocks, 20).map(|b| b.time_seconds), Some(2e-12));
        assert!(find_step(&blocks, 30).is_none());
        assert_eq!(select_frame(&blocks[..], FrameSelector::TimePs(1.2)).unwrap(), 0);

        let p = block_profile(&blocks[1], BlockColumn::Ti).with_x_unit(LengthUnit::Centimeter);
        assert_eq!(p.y, vec![6.0]);
        assert!((p.x[0] - 3000.0).abs() < 1e-9);
    }
}
