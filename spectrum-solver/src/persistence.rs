//! Versioned JSON records of diagonalized eigen systems.
//!
//! Version 2 nests the eigen system under a header naming the format, version and model:
//!
//! ```json
//! {
//!   "format": "spectrum-solver/eigen-system",
//!   "version": 2,
//!   "model": "dicke",
//!   "eigen_system": {
//!     "basis_params": [20.0, 4.0, 1.0],
//!     "request": { "count": 10, "vectors": true, "target": null },
//!     "eigenvalues": [...],
//!     "eigenvectors": [[...], ...]
//!   }
//! }
//! ```
//!
//! Version 1 records are flat, without a format header, with eigenvectors stored
//! as one column-major array of `vector_count` columns. Records without a
//! `version` field are version 1.

use std::{
    fs::{create_dir_all, File},
    io::{Read, Write},
    path::Path,
    sync::Arc,
};

use faer::Mat;
use quantum::{BasisParams, QuantumBasis};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{
    eigen_system::EigenSystem,
    error::{EigenError, PersistenceError},
    model::HamiltonianBuilder,
    selector::SolveRequest,
    solvers::Spectrum,
};

pub const FORMAT: &str = "spectrum-solver/eigen-system";
pub const VERSION: u64 = 2;

/// Typed read access to the fields of one JSON object.
#[derive(Clone, Debug)]
pub struct Record<'a> {
    path: String,
    fields: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    pub fn new(value: &'a Value) -> Result<Self, PersistenceError> {
        match value {
            Value::Object(fields) => Ok(Self {
                path: String::new(),
                fields,
            }),
            _ => Err(PersistenceError::InvalidField {
                field: "record".to_string(),
                message: "expected an object".to_string(),
            }),
        }
    }

    fn field_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path)
        }
    }

    /// Field `name`, `None` when absent or null.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, PersistenceError> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| PersistenceError::InvalidField {
                    field: self.field_path(name),
                    message: e.to_string(),
                }),
        }
    }

    pub fn required<T: DeserializeOwned>(&self, name: &str) -> Result<T, PersistenceError> {
        self.optional(name)?
            .ok_or_else(|| PersistenceError::MissingField(self.field_path(name)))
    }

    pub fn or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, PersistenceError> {
        Ok(self.optional(name)?.unwrap_or_default())
    }

    /// Nested record under `name`, errors name the nested fields with their full path.
    pub fn nested(&self, name: &str) -> Result<Record<'a>, PersistenceError> {
        match self.fields.get(name) {
            Some(Value::Object(fields)) => Ok(Record {
                path: self.field_path(name),
                fields,
            }),
            Some(_) => Err(PersistenceError::InvalidField {
                field: self.field_path(name),
                message: "expected an object".to_string(),
            }),
            None => Err(PersistenceError::MissingField(self.field_path(name))),
        }
    }
}

/// Builds a JSON object keeping fields in writing order.
#[derive(Clone, Debug, Default)]
pub struct RecordWriter {
    fields: Map<String, Value>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self, PersistenceError> {
        self.fields.insert(name.to_string(), serde_json::to_value(value)?);

        Ok(self)
    }

    pub fn nested(mut self, name: &str, record: RecordWriter) -> Self {
        self.fields.insert(name.to_string(), record.finish());

        self
    }

    pub fn finish(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Version independent content of a record.
#[derive(Debug)]
struct Decoded {
    params: Vec<f64>,
    request: SolveRequest,
    values: Vec<f64>,
    /// Eigenvectors as columns.
    vectors: Option<Vec<Vec<f64>>>,
}

/// Decodes a record written for the model named `model`.
fn decode(value: &Value, model: &str) -> Result<Decoded, PersistenceError> {
    let record = Record::new(value)?;

    let decoded = match record.optional::<u64>("version")?.unwrap_or(1) {
        1 => decode_v1(&record)?,
        2 => decode_v2(&record, model)?,
        version => return Err(PersistenceError::UnsupportedVersion(version)),
    };

    if decoded.values.windows(2).any(|w| w[0] > w[1]) {
        return Err(PersistenceError::Inconsistent("eigenvalues are not ascending".to_string()));
    }

    Ok(decoded)
}

fn decode_v1(record: &Record) -> Result<Decoded, PersistenceError> {
    let params: Vec<f64> = record.required("basis_params")?;
    let values: Vec<f64> = record.required("eigenvalues")?;
    let vector_count: usize = record.or_default("vector_count")?;
    let flat: Vec<f64> = record.or_default("eigenvectors")?;

    let vectors = match vector_count {
        0 if flat.is_empty() => None,
        0 => {
            return Err(PersistenceError::Inconsistent(format!(
                "{} eigenvector entries stored for zero vectors",
                flat.len()
            )));
        }
        count if count != values.len() => {
            return Err(PersistenceError::Inconsistent(format!(
                "{count} eigenvectors stored for {} eigenvalues",
                values.len()
            )));
        }
        count if flat.is_empty() || flat.len() % count != 0 => {
            return Err(PersistenceError::Inconsistent(format!(
                "{} eigenvector entries do not split into {count} columns",
                flat.len()
            )));
        }
        count => Some(flat.chunks(flat.len() / count).map(|c| c.to_vec()).collect()),
    };

    Ok(Decoded {
        params,
        request: SolveRequest::lowest(values.len()).with_vectors(vector_count > 0),
        values,
        vectors,
    })
}

fn decode_v2(record: &Record, expected: &str) -> Result<Decoded, PersistenceError> {
    let format: String = record.required("format")?;
    if format != FORMAT {
        return Err(PersistenceError::WrongFormat {
            found: format,
            expected: FORMAT.to_string(),
        });
    }
    let model: String = record.required("model")?;
    if model != expected {
        return Err(PersistenceError::ModelMismatch {
            found: model,
            expected: expected.to_string(),
        });
    }

    let system = record.nested("eigen_system")?;
    let params: Vec<f64> = system.required("basis_params")?;
    let request: SolveRequest = system.required("request")?;
    let values: Vec<f64> = system.required("eigenvalues")?;
    let vectors: Option<Vec<Vec<f64>>> = system.optional("eigenvectors")?;

    if request.vectors != vectors.is_some() {
        return Err(PersistenceError::Inconsistent(
            "eigenvector presence does not match the stored request".to_string(),
        ));
    }
    if let Some(vectors) = &vectors {
        if vectors.len() != values.len() {
            return Err(PersistenceError::Inconsistent(format!(
                "{} eigenvectors stored for {} eigenvalues",
                vectors.len(),
                values.len()
            )));
        }
    }

    Ok(Decoded {
        params,
        request,
        values,
        vectors,
    })
}

fn write_json(path: &Path, value: &Value) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent)?;
            tracing::info!("created path {}", parent.display());
        }
    }

    let buf = serde_json::to_string_pretty(value)?;
    let mut file = File::create(path)?;
    file.write_all(buf.as_bytes())?;

    tracing::info!("saved eigen system on {}", path.display());
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, PersistenceError> {
    let mut buf = String::new();
    File::open(path)?.read_to_string(&mut buf)?;

    Ok(serde_json::from_str(&buf)?)
}

impl<M: HamiltonianBuilder> EigenSystem<M> {
    /// Current version record of the diagonalized system.
    pub fn to_record(&self) -> Result<Value, EigenError> {
        let spectrum = self.spectrum()?;
        let request = self.request().ok_or(EigenError::NotDiagonalized)?;

        let mut system = RecordWriter::new()
            .field("basis_params", self.params().values())?
            .field("request", request)?
            .field("eigenvalues", &spectrum.values)?;
        if let Some(vectors) = &spectrum.vectors {
            let columns: Vec<Vec<f64>> = (0..vectors.ncols())
                .map(|j| vectors.col(j).iter().copied().collect())
                .collect();
            system = system.field("eigenvectors", &columns)?;
        }

        let record = RecordWriter::new()
            .field("format", FORMAT)?
            .field("version", &VERSION)?
            .field("model", M::NAME)?
            .nested("eigen_system", system);

        Ok(record.finish())
    }

    /// Restores a diagonalized system of `model` from a record of any supported version.
    ///
    /// The basis is rebuilt from the stored parameters.
    pub fn from_record(value: &Value, model: &Arc<M>) -> Result<Self, EigenError> {
        let decoded = decode(value, M::NAME)?;

        let params = BasisParams::new(decoded.params);
        let basis = model.build_basis(&params)?;
        let size = basis.len();
        if decoded.values.len() > size {
            return Err(PersistenceError::Inconsistent(format!(
                "{} eigenvalues stored for a basis of {size} states",
                decoded.values.len()
            ))
            .into());
        }
        let request = decoded.request.clipped(size);
        if decoded.values.len() != request.count {
            return Err(PersistenceError::Inconsistent(format!(
                "{} eigenvalues stored for a request of {}",
                decoded.values.len(),
                request.count
            ))
            .into());
        }

        let vectors = match decoded.vectors {
            Some(columns) => {
                if let Some(column) = columns.iter().find(|c| c.len() != size) {
                    return Err(PersistenceError::Inconsistent(format!(
                        "eigenvector of length {} stored for a basis of {size} states",
                        column.len()
                    ))
                    .into());
                }

                Some(Mat::from_fn(size, columns.len(), |i, j| columns[j][i]))
            }
            None => None,
        };

        let spectrum = Spectrum {
            values: decoded.values,
            vectors,
        };

        Ok(EigenSystem::restored(
            params,
            Arc::downgrade(model),
            basis,
            request,
            spectrum,
        ))
    }

    /// Writes the current version record to `path`, creating missing directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), EigenError> {
        Ok(write_json(path.as_ref(), &self.to_record()?)?)
    }

    pub fn load(path: impl AsRef<Path>, model: &Arc<M>) -> Result<Self, EigenError> {
        let value = read_json(path.as_ref())?;

        Self::from_record(&value, model)
    }
}
