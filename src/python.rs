//! Python bindings via PyO3.

use crate::lipid::{Lipid, LipidLevel, LipidParser};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Python wrapper for Lipid.
#[pyclass(name = "Lipid")]
#[derive(Clone)]
struct PyLipid {
    inner: Lipid,
}

#[pymethods]
impl PyLipid {
    /// Class abbreviation, e.g. "PC".
    #[getter]
    fn class_name(&self) -> &'static str {
        self.inner.class.as_str()
    }

    /// Level the name was parsed at.
    #[getter]
    fn level(&self) -> &'static str {
        self.inner.level.as_str()
    }

    /// Carbon and double bond counts per chain.
    #[getter]
    fn chains(&self) -> Vec<(u32, u32)> {
        self.inner
            .chains
            .iter()
            .map(|fa| (fa.carbon, fa.double_bonds))
            .collect()
    }

    /// Shorthand name, at the lipid's own level unless `level` is given.
    #[pyo3(signature = (level=None))]
    fn name(&self, level: Option<&str>) -> PyResult<String> {
        let level = match level {
            Some(level) => level
                .parse::<LipidLevel>()
                .map_err(|e| PyValueError::new_err(e.to_string()))?,
            None => self.inner.level,
        };
        self.inner
            .name(level)
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }

    fn __repr__(&self) -> String {
        format!("Lipid('{}', level={})", self.inner, self.inner.level)
    }
}

/// Python wrapper for LipidParser.
#[pyclass(name = "LipidParser")]
struct PyLipidParser {
    inner: LipidParser,
}

#[pymethods]
impl PyLipidParser {
    #[new]
    fn new() -> PyResult<Self> {
        let inner = LipidParser::new().map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(PyLipidParser { inner })
    }

    /// Parse a lipid name, raising ValueError if no dialect matches.
    fn parse(&self, name: &str) -> PyResult<PyLipid> {
        self.inner
            .parse(name)
            .map(|inner| PyLipid { inner })
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    /// Dialect names in the order they are tried.
    #[getter]
    fn dialects(&self) -> Vec<String> {
        self.inner.dialects().into_iter().map(String::from).collect()
    }
}

/// Python module definition.
#[pymodule]
fn lipid_grammar(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyLipid>()?;
    m.add_class::<PyLipidParser>()?;
    Ok(())
}
