//! Persisted fit artifacts.
//!
//! An artifact stores a function as source text plus an entry point, next to
//! the fitted parameter values. It is written as JSON and reloads into a
//! function that evaluates bit-identically, with the same parameter values.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use tracing::{debug, info};

use crate::error::{FitError, Result};
use crate::function::TargetFunction;
use crate::parameters::ParameterState;
use crate::source::SourceEnvironment;

/// Format version written into every artifact.
pub const ARTIFACT_VERSION: u32 = 1;

/// A serialized `(function, parameters)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitArtifact {
    pub version: u32,

    /// Source text defining the function and what it depends on
    pub source: String,

    /// Name of the function inside `source`
    pub entry_point: String,

    /// Parameter values in declaration order
    #[serde(with = "crate::utils::ordered_map")]
    pub parameters: Vec<(String, f64)>,
}

impl FitArtifact {
    /// Build an artifact from a function with source and its parameter values.
    ///
    /// Fails with `Serialization` for functions without a source definition
    /// and for non-finite values, which JSON cannot carry exactly.
    pub fn new(func: &TargetFunction, parameters: Vec<(String, f64)>) -> Result<Self> {
        let source = func.source().ok_or_else(|| {
            FitError::Serialization(format!(
                "function '{}' has no source definition and cannot be saved",
                func.name()
            ))
        })?;

        if let Some((name, value)) = parameters.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FitError::Serialization(format!(
                "parameter '{}' has non-finite value {}",
                name, value
            )));
        }

        Ok(Self {
            version: ARTIFACT_VERSION,
            source: source.text,
            entry_point: source.entry_point,
            parameters,
        })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Re-create the function from its source.
    ///
    /// The parameter names must match the function's parameters.
    pub fn function(&self) -> Result<TargetFunction> {
        if self.version != ARTIFACT_VERSION {
            return Err(FitError::Serialization(format!(
                "unsupported artifact version {} (expected {})",
                self.version, ARTIFACT_VERSION
            )));
        }

        let mut env = SourceEnvironment::with_seed(0);
        env.exec(&self.source)?;
        let func = env.function(&self.entry_point)?;

        let declared = func.parameter_names();
        let matches = declared.len() == self.parameters.len()
            && declared.iter().all(|name| self.get(name).is_some());
        if !matches {
            return Err(FitError::Serialization(format!(
                "artifact parameters {:?} do not match '{}' parameters {:?}",
                self.parameters.iter().map(|(n, _)| n).collect::<Vec<_>>(),
                self.entry_point,
                declared
            )));
        }
        Ok(func)
    }
}

/// Write `func` and the values in `parameters` to `writer`.
pub fn dump<W: Write>(func: &TargetFunction, parameters: &ParameterState, writer: W) -> Result<()> {
    let artifact = FitArtifact::new(func, parameters.to_pairs())?;
    serde_json::to_writer_pretty(writer, &artifact)?;
    info!(function = func.name(), "saved fit artifact");
    Ok(())
}

/// [`dump`] into a byte vector.
pub fn dumps(func: &TargetFunction, parameters: &ParameterState) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    dump(func, parameters, &mut buffer)?;
    Ok(buffer)
}

/// Read an artifact back into a function and its parameter mapping.
pub fn load<R: Read>(reader: R) -> Result<(TargetFunction, Vec<(String, f64)>)> {
    let artifact: FitArtifact = serde_json::from_reader(reader)?;
    let func = artifact.function()?;
    debug!(
        function = func.name(),
        parameters = artifact.parameters.len(),
        "loaded fit artifact"
    );
    Ok((func, artifact.parameters))
}

/// [`load`] from a byte slice.
pub fn loads(bytes: &[u8]) -> Result<(TargetFunction, Vec<(String, f64)>)> {
    load(bytes)
}
