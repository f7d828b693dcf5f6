use crate::mesh::Mesh;
use chrono::NaiveDate;
use std::fmt;

/// Free-form metadata carried through every transformation stage by value,
/// so no stage mutates a shared attribute bag.
#[derive(Debug, Clone, Default)]
pub struct FieldMeta {
    pub runid: String,
    pub datapath: String,
    /// Short run description used in labels; may stay empty
    pub descript: String,
    pub long_name: String,
    pub units: String,
}

/// A depth-resolved scalar field on mesh nodes or elements, with an optional
/// time axis. Values are stored flattened as (time, level, location).
/// Below-bottom entries are NaN or zero; they carry no flux either way.
#[derive(Debug, Clone)]
pub struct Field {
    values: Vec<f64>,
    ntime: usize,
    nz: usize,
    nloc: usize,
    pub times: Option<Vec<NaiveDate>>,
    pub meta: FieldMeta,
}

#[derive(Debug)]
pub enum FieldError {
    Shape { got: usize, want: usize },
    TimeAxis { got: usize, want: usize },
    LocationCount { got: usize, want: usize },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Shape { got, want } => {
                write!(f, "field buffer has {} values, expected {}", got, want)
            }
            FieldError::TimeAxis { got, want } => {
                write!(f, "time axis has {} entries, expected {}", got, want)
            }
            FieldError::LocationCount { got, want } => {
                write!(f, "field has {} locations, mesh has {}", got, want)
            }
        }
    }
}

impl std::error::Error for FieldError {}

impl Field {
    pub fn new(
        values: Vec<f64>,
        ntime: usize,
        nz: usize,
        nloc: usize,
        times: Option<Vec<NaiveDate>>,
        meta: FieldMeta,
    ) -> Result<Self, FieldError> {
        let want = ntime * nz * nloc;
        if values.len() != want {
            return Err(FieldError::Shape { got: values.len(), want });
        }
        if let Some(t) = &times
            && t.len() != ntime
        {
            return Err(FieldError::TimeAxis { got: t.len(), want: ntime });
        }

        Ok(Self { values, ntime, nz, nloc, times, meta })
    }

    pub fn ntime(&self) -> usize {
        self.ntime
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn nloc(&self) -> usize {
        self.nloc
    }

    pub fn has_time(&self) -> bool {
        self.times.is_some()
    }

    #[inline]
    pub fn get(&self, t: usize, iz: usize, loc: usize) -> f64 {
        self.values[(t * self.nz + iz) * self.nloc + loc]
    }

    #[inline]
    pub fn set(&mut self, t: usize, iz: usize, loc: usize, value: f64) {
        self.values[(t * self.nz + iz) * self.nloc + loc] = value;
    }

    /// Average the per-node field onto elements as the unweighted mean of the
    /// three vertices. Runs over the full node set; basin masking happens
    /// later, because element connectivity indexes into the unmasked nodes.
    pub fn to_elements(&self, mesh: &Mesh) -> Result<Field, FieldError> {
        if self.nloc != mesh.n_nodes() {
            return Err(FieldError::LocationCount { got: self.nloc, want: mesh.n_nodes() });
        }

        let ne = mesh.n_elems();
        let mut values = Vec::with_capacity(self.ntime * self.nz * ne);
        for t in 0..self.ntime {
            for iz in 0..self.nz {
                for elem in &mesh.elems {
                    let sum = self.get(t, iz, elem[0])
                        + self.get(t, iz, elem[1])
                        + self.get(t, iz, elem[2]);
                    values.push(sum / 3.0);
                }
            }
        }

        Field::new(values, self.ntime, self.nz, ne, self.times.clone(), self.meta.clone())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Field {{ time: {}, levels: {}, locations: {}, long_name: {:?} }}",
            self.ntime, self.nz, self.nloc, self.meta.long_name
        )
    }
}
