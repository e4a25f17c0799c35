//! Python bindings for the fort.10 / fort.11 reader
//!
//! This crate provides PyO3 bindings to expose fort10-core to the Python
//! plotting scripts.

use fort10_core::{
    self, Block, BlockColumn, ClassicFile, Dataset, FortError, FrameSelector, FrameValue, Series,
    TimeSeries,
};
use numpy::ndarray::{Array1, Array2};
use numpy::IntoPyArray;
use pyo3::create_exception;
use pyo3::exceptions::{PyIndexError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use tracing_subscriber::EnvFilter;

create_exception!(
    fort10reader,
    FormatError,
    PyValueError,
    "Malformed fort.10 / fort.11 input"
);

// ============================================================================
// Helper Functions
// ============================================================================

fn to_py_err(err: FortError) -> PyErr {
    match err {
        FortError::Io(e) => e.into(),
        e @ FortError::Format { .. } => FormatError::new_err(e.to_string()),
        e @ FortError::Index { .. } => PyIndexError::new_err(e.to_string()),
        e @ FortError::Config(_) => PyValueError::new_err(e.to_string()),
    }
}

fn vec_to_numpy(py: Python, values: Vec<f64>) -> Py<PyAny> {
    Array1::from_vec(values).into_pyarray(py).into_any().unbind()
}

fn matrix_to_numpy(py: Python, rows: usize, cols: usize, values: Vec<f64>) -> PyResult<Py<PyAny>> {
    let array = Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(array.into_pyarray(py).into_any().unbind())
}

/// Scalar series as 1-D `(frames,)`, array series as 2-D `(frames, cells)`
fn series_to_numpy(py: Python, series: &Series) -> PyResult<Py<PyAny>> {
    match series {
        Series::Scalar(v) => Ok(vec_to_numpy(py, v.clone())),
        Series::Array(a) => matrix_to_numpy(py, a.frames(), a.cells(), a.as_flat().to_vec()),
    }
}

fn frame_value_to_py(py: Python, value: FrameValue<'_>) -> PyResult<Py<PyAny>> {
    match value {
        FrameValue::Scalar(v) => Ok(v.into_pyobject(py)?.into_any().unbind()),
        FrameValue::Array(v) => Ok(vec_to_numpy(py, v.to_vec())),
    }
}

fn static_dict<'py>(py: Python<'py>, file: &ClassicFile) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    for (var, value) in file.static_directory.slice(&file.static_frame.values) {
        dict.set_item(&var.name, frame_value_to_py(py, value)?)?;
    }
    Ok(dict)
}

// ============================================================================
// Python Classes
// ============================================================================

/// Named time series of a classic fort.10 file
#[pyclass(name = "TimeSeries")]
pub struct PyTimeSeries {
    inner: TimeSeries,
}

#[pymethods]
impl PyTimeSeries {
    /// Variable names in header order
    fn keys(&self) -> Vec<String> {
        self.inner.names().to_vec()
    }

    /// Get a variable as a numpy array: `(frames,)` or `(frames, cells)`
    fn get(&self, py: Python, name: &str) -> PyResult<Option<Py<PyAny>>> {
        self.inner
            .get(name)
            .map(|s| series_to_numpy(py, s))
            .transpose()
    }

    fn __contains__(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Number of frames
    fn __len__(&self) -> usize {
        self.inner.frame_count()
    }

    /// Frame index by explicit index (clamped) or nearest time in ps; last frame by default
    #[pyo3(signature = (frame=None, time_ps=None))]
    fn select_frame(&self, frame: Option<i64>, time_ps: Option<f64>) -> PyResult<usize> {
        fort10_core::select_frame(&self.inner, FrameSelector::from_options(frame, time_ps))
            .map_err(to_py_err)
    }

    /// `(x, y)` of a variable across cells at one frame
    #[pyo3(signature = (name, frame, sort=false, smooth=1))]
    fn profile(
        &self,
        py: Python,
        name: &str,
        frame: i64,
        sort: bool,
        smooth: i64,
    ) -> PyResult<(Py<PyAny>, Py<PyAny>)> {
        let index = usize::try_from(frame).map_err(|_| {
            to_py_err(FortError::Index {
                what: "frame",
                index: frame,
                len: self.inner.frame_count(),
            })
        })?;
        let mut profile = fort10_core::profile(&self.inner, name, index).map_err(to_py_err)?;
        if sort {
            profile = profile.sorted_by_x();
        }
        let profile = profile.smoothed(smooth.max(0) as usize);
        Ok((vec_to_numpy(py, profile.x), vec_to_numpy(py, profile.y)))
    }

    /// `(t, y)` of a variable at one cell (default: the middle cell)
    #[pyo3(signature = (name, cell=None))]
    fn trace(&self, py: Python, name: &str, cell: Option<i64>) -> PyResult<(Py<PyAny>, Py<PyAny>)> {
        let trace = fort10_core::trace(&self.inner, name, cell).map_err(to_py_err)?;
        Ok((vec_to_numpy(py, trace.t), vec_to_numpy(py, trace.y)))
    }

    fn __repr__(&self) -> String {
        format!(
            "TimeSeries(frames={}, variables={})",
            self.inner.frame_count(),
            self.inner.names().len()
        )
    }
}

impl From<TimeSeries> for PyTimeSeries {
    fn from(inner: TimeSeries) -> Self {
        PyTimeSeries { inner }
    }
}

/// One step of a block-dialect fort.11 file
#[pyclass(name = "Block")]
pub struct PyBlock {
    inner: Block,
}

#[pymethods]
impl PyBlock {
    #[getter]
    fn step(&self) -> u64 {
        self.inner.step
    }

    /// Time in seconds
    #[getter]
    fn time_s(&self) -> f64 {
        self.inner.time_seconds
    }

    #[getter]
    fn time_ps(&self) -> f64 {
        self.inner.time_ps()
    }

    /// All rows as an `(N, 7)` array: i, x, v, rho, te, ti, depo
    #[getter]
    fn data(&self, py: Python) -> PyResult<Py<PyAny>> {
        let flat: Vec<f64> = self.inner.rows.iter().flatten().copied().collect();
        matrix_to_numpy(py, self.inner.len(), fort10_core::BLOCK_COLUMNS, flat)
    }

    /// One column by label
    fn column(&self, py: Python, name: &str) -> PyResult<Py<PyAny>> {
        let column: BlockColumn = name.parse().map_err(to_py_err)?;
        Ok(vec_to_numpy(py, self.inner.column(column)))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Block(step={}, time_ps={}, rows={})",
            self.inner.step,
            self.inner.time_ps(),
            self.inner.len()
        )
    }
}

impl From<Block> for PyBlock {
    fn from(inner: Block) -> Self {
        PyBlock { inner }
    }
}

fn blocks_to_list(py: Python, blocks: Vec<Block>) -> PyResult<Py<PyList>> {
    let list = PyList::empty(py);
    for block in blocks {
        list.append(PyBlock::from(block))?;
    }
    Ok(list.unbind())
}

// ============================================================================
// Python Functions
// ============================================================================

/// Read the dynamic time series of a classic fort.10 file
#[pyfunction]
pub fn read_classic(path: &str) -> PyResult<PyTimeSeries> {
    fort10_core::read_classic(path)
        .map(PyTimeSeries::from)
        .map_err(to_py_err)
}

/// Read a classic fort.10 file, returning `(static_values, TimeSeries)`
#[pyfunction]
pub fn read_classic_file(py: Python, path: &str) -> PyResult<(Py<PyDict>, PyTimeSeries)> {
    let file = fort10_core::read_classic_file(path).map_err(to_py_err)?;
    let statics = static_dict(py, &file)?.unbind();
    Ok((statics, PyTimeSeries::from(file.series)))
}

/// Read every block of a block-dialect fort.11 file
#[pyfunction]
pub fn read_blocks(py: Python, path: &str) -> PyResult<Py<PyList>> {
    let blocks = fort10_core::read_blocks(path).map_err(to_py_err)?;
    blocks_to_list(py, blocks)
}

/// Read a file of either dialect: `TimeSeries` or `list[Block]`
#[pyfunction]
pub fn read(py: Python, path: &str) -> PyResult<Py<PyAny>> {
    match fort10_core::read(path).map_err(to_py_err)? {
        Dataset::Classic(series) => Ok(Py::new(py, PyTimeSeries::from(series))?.into_any()),
        Dataset::Blocks(blocks) => Ok(blocks_to_list(py, blocks)?.into_any()),
    }
}

/// Guess the dialect of a text sample: "classic" or "block"
#[pyfunction]
pub fn detect(sample: &str) -> String {
    fort10_core::detect(sample).to_string()
}

#[pyfunction]
pub fn detect_file(path: &str) -> PyResult<String> {
    fort10_core::detect_file(path)
        .map(|d| d.to_string())
        .map_err(to_py_err)
}

/// Read a whitespace-delimited numeric table as a `(rows, columns)` array
#[pyfunction]
pub fn read_table(py: Python, path: &str, columns: usize) -> PyResult<Py<PyAny>> {
    let table = fort10_core::read_table(path, columns).map_err(to_py_err)?;
    matrix_to_numpy(py, table.rows(), table.columns(), table.as_flat().to_vec())
}

/// Convert lengths in `unit` (cm, m, um) to micrometres
#[pyfunction]
pub fn convert_length(py: Python, values: Vec<f64>, unit: &str) -> PyResult<Py<PyAny>> {
    let converted = fort10_core::convert_length(&values, unit).map_err(to_py_err)?;
    Ok(vec_to_numpy(py, converted))
}

/// Centered boxcar average over `k` cells; `k <= 1` returns the input
#[pyfunction]
pub fn smooth(py: Python, values: Vec<f64>, k: i64) -> Py<PyAny> {
    vec_to_numpy(py, fort10_core::smooth(&values, k.max(0) as usize))
}

/// Index into `times` (seconds) by explicit index or nearest time in ps
#[pyfunction]
#[pyo3(signature = (times, frame=None, time_ps=None))]
pub fn select_frame(times: Vec<f64>, frame: Option<i64>, time_ps: Option<f64>) -> PyResult<usize> {
    fort10_core::select_frame(&times[..], FrameSelector::from_options(frame, time_ps))
        .map_err(to_py_err)
}

/// Stream a large classic file in chunks of at least `chunk_frames` frames
#[pyfunction]
#[pyo3(signature = (path, chunk_frames=fort10_core::DEFAULT_CHUNK_FRAMES, variables=None))]
pub fn stream(
    py: Python,
    path: &str,
    chunk_frames: usize,
    variables: Option<Vec<String>>,
) -> PyResult<Py<PyList>> {
    let mut reader = fort10_core::read_classic_stream_chunked(path, chunk_frames).map_err(to_py_err)?;
    if let Some(names) = variables {
        reader = reader.with_variables(names);
    }

    let chunks_list = PyList::empty(py);
    for chunk in reader {
        let chunk = chunk.map_err(to_py_err)?;
        let chunk_dict = PyDict::new(py);
        chunk_dict.set_item("chunk_index", chunk.chunk_index)?;
        chunk_dict.set_item("frame_range", (chunk.frame_range.start, chunk.frame_range.end))?;
        chunk_dict.set_item("time_range", chunk.time_range)?;

        let data_dict = PyDict::new(py);
        for (name, series) in chunk.series.iter() {
            data_dict.set_item(name, series_to_numpy(py, series)?)?;
        }
        chunk_dict.set_item("data", data_dict)?;

        chunks_list.append(chunk_dict)?;
    }

    Ok(chunks_list.unbind())
}

/// Install a stderr log subscriber. `RUST_LOG` overrides `level` when set.
///
/// Returns False if a subscriber was already installed.
#[pyfunction]
#[pyo3(signature = (level="info"))]
pub fn init_logging(level: &str) -> PyResult<bool> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| PyValueError::new_err(e.to_string()))?,
    };
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok())
}

// ============================================================================
// Module Definition
// ============================================================================

#[pymodule]
pub fn fort10reader(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Functions
    m.add_function(wrap_pyfunction!(read, m)?)?;
    m.add_function(wrap_pyfunction!(read_classic, m)?)?;
    m.add_function(wrap_pyfunction!(read_classic_file, m)?)?;
    m.add_function(wrap_pyfunction!(read_blocks, m)?)?;
    m.add_function(wrap_pyfunction!(read_table, m)?)?;
    m.add_function(wrap_pyfunction!(detect, m)?)?;
    m.add_function(wrap_pyfunction!(detect_file, m)?)?;
    m.add_function(wrap_pyfunction!(convert_length, m)?)?;
    m.add_function(wrap_pyfunction!(smooth, m)?)?;
    m.add_function(wrap_pyfunction!(select_frame, m)?)?;
    m.add_function(wrap_pyfunction!(stream, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    // Classes
    m.add_class::<PyTimeSeries>()?;
    m.add_class::<PyBlock>()?;

    // Exceptions
    m.add("FormatError", m.py().get_type::<FormatError>())?;

    Ok(())
}
