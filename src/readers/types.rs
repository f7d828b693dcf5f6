use std::fmt;

#[derive(Debug)]
pub enum ReadError {
    NetCdf(String),
    MissingVariable { file: String, var: String },
    /// Dimension/shape mismatch after alias normalization. Surfaced, never
    /// ignored: a silent mismatch corrupts the area-weighting multiply.
    Shape { what: &'static str, got: (usize, usize), want: (usize, usize) },
    Parse { file: String, line: usize, msg: String },
    Mesh(crate::mesh::MeshError),
    Field(crate::field::FieldError),
    Io(std::io::Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::NetCdf(msg) => write!(f, "NetCDF read failed: {}", msg),
            ReadError::MissingVariable { file, var } => {
                write!(f, "variable {:?} not found in {}", var, file)
            }
            ReadError::Shape { what, got, want } => write!(
                f,
                "{} has shape ({}, {}), expected ({}, {})",
                what, got.0, got.1, want.0, want.1
            ),
            ReadError::Parse { file, line, msg } => {
                write!(f, "{}:{}: {}", file, line, msg)
            }
            ReadError::Mesh(e) => write!(f, "{}", e),
            ReadError::Field(e) => write!(f, "{}", e),
            ReadError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ReadError {}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> ReadError {
        ReadError::Io(err)
    }
}

impl From<crate::mesh::MeshError> for ReadError {
    fn from(err: crate::mesh::MeshError) -> ReadError {
        ReadError::Mesh(err)
    }
}

impl From<crate::field::FieldError> for ReadError {
    fn from(err: crate::field::FieldError) -> ReadError {
        ReadError::Field(err)
    }
}

impl From<gdal::errors::GdalError> for ReadError {
    fn from(err: gdal::errors::GdalError) -> ReadError {
        ReadError::NetCdf(err.to_string())
    }
}

/// Horizontal area of the control volume per (depth level, location).
/// Depth-dependent: cells narrow toward the sea floor as levels go inactive.
#[derive(Debug, Clone)]
pub struct AreaWeight {
    values: Vec<f64>,
    nz: usize,
    nloc: usize,
}

impl AreaWeight {
    pub fn new(values: Vec<f64>, nz: usize, nloc: usize) -> Result<Self, ReadError> {
        if values.len() != nz * nloc {
            return Err(ReadError::Shape {
                what: "area weight buffer",
                got: (values.len(), 1),
                want: (nz * nloc, 1),
            });
        }
        Ok(Self { values, nz, nloc })
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn nloc(&self) -> usize {
        self.nloc
    }

    #[inline]
    pub fn get(&self, iz: usize, loc: usize) -> f64 {
        self.values[iz * self.nloc + loc]
    }

    /// Drop surplus trailing levels. Diag files on the `nl1` interface axis
    /// carry one level more than the field; the extra row never holds flux.
    pub fn truncate_levels(mut self, nz: usize) -> Self {
        if nz < self.nz {
            self.values.truncate(nz * self.nloc);
            self.nz = nz;
        }
        self
    }
}

/// Canonical names for the historical dimension aliases found in diag files.
pub fn normalize_dim_name(name: &str) -> &str {
    match name {
        "elem_n" => "elem",
        "nod_n" => "nod2",
        "nl" => "nz",
        "nl1" => "nz1",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dim_alias_table() {
        assert_eq!(normalize_dim_name("elem_n"), "elem");
        assert_eq!(normalize_dim_name("nod_n"), "nod2");
        assert_eq!(normalize_dim_name("nl"), "nz");
        assert_eq!(normalize_dim_name("nl1"), "nz1");
        // canonical names pass through
        assert_eq!(normalize_dim_name("elem"), "elem");
        assert_eq!(normalize_dim_name("time"), "time");
    }

    #[test]
    fn test_area_weight_indexing() {
        let w = AreaWeight::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(w.get(0, 2), 3.0);
        assert_eq!(w.get(1, 0), 4.0);
    }

    #[test]
    fn test_area_weight_shape_check() {
        assert!(AreaWeight::new(vec![0.0; 5], 2, 3).is_err());
    }

    #[test]
    fn test_truncate_interface_level() {
        let w = AreaWeight::new(vec![1.0; 6], 3, 2).unwrap().truncate_levels(2);
        assert_eq!(w.nz(), 2);
        assert_eq!(w.get(1, 1), 1.0);
    }
}
