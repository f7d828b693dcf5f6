use std::fmt;
use std::path::PathBuf;

/// Unstructured triangular surface mesh as used by FESOM-style ocean models.
///
/// Depth levels are positive metres, surface first (index 0 = shallowest).
/// The bottom index of a location is the index of its deepest valid level;
/// levels at or below it are under the sea floor.
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Node longitudes [deg]
    pub lon: Vec<f64>,
    /// Node latitudes [deg]
    pub lat: Vec<f64>,
    /// Element connectivity, 3 node indices per triangle
    pub elems: Vec<[usize; 3]>,
    /// Deepest valid level index per node
    pub node_bottom: Vec<usize>,
    /// Deepest valid level index per element
    pub elem_bottom: Vec<usize>,
    /// Depth levels [m], positive down, surface first
    pub depth: Vec<f64>,
    /// Mesh directory, used as the last fallback when searching the diag file
    pub path: PathBuf,
    /// Periodic-boundary duplicate nodes (lon, lat), appended for contiguous
    /// plotting only and not counted in `n_nodes`
    pub aux_nodes: Vec<(f64, f64)>,
    /// Periodic-boundary duplicate elements, plotting only
    pub aux_elems: Vec<[usize; 3]>,
}

#[derive(Debug)]
pub enum MeshError {
    LengthMismatch(&'static str, usize, usize),
    NodeIndexOutOfRange { elem: usize, node: usize },
    BottomIndexOutOfRange { loc: usize, index: usize },
    EmptyDepthAxis,
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::LengthMismatch(what, got, want) => {
                write!(f, "{} has length {}, expected {}", what, got, want)
            }
            MeshError::NodeIndexOutOfRange { elem, node } => {
                write!(f, "element {} references node {} outside the mesh", elem, node)
            }
            MeshError::BottomIndexOutOfRange { loc, index } => {
                write!(f, "bottom index {} at location {} exceeds the depth axis", index, loc)
            }
            MeshError::EmptyDepthAxis => write!(f, "mesh has no depth levels"),
        }
    }
}

impl std::error::Error for MeshError {}

impl Mesh {
    pub fn new(
        lon: Vec<f64>,
        lat: Vec<f64>,
        elems: Vec<[usize; 3]>,
        node_bottom: Vec<usize>,
        elem_bottom: Vec<usize>,
        depth: Vec<f64>,
        path: PathBuf,
    ) -> Result<Self, MeshError> {
        if depth.is_empty() {
            return Err(MeshError::EmptyDepthAxis);
        }

        let n_nodes = lon.len();
        if lat.len() != n_nodes {
            return Err(MeshError::LengthMismatch("lat", lat.len(), n_nodes));
        }
        if node_bottom.len() != n_nodes {
            return Err(MeshError::LengthMismatch("node_bottom", node_bottom.len(), n_nodes));
        }
        if elem_bottom.len() != elems.len() {
            return Err(MeshError::LengthMismatch("elem_bottom", elem_bottom.len(), elems.len()));
        }

        for (ei, elem) in elems.iter().enumerate() {
            for &ni in elem {
                if ni >= n_nodes {
                    return Err(MeshError::NodeIndexOutOfRange { elem: ei, node: ni });
                }
            }
        }

        for (loc, &iz) in node_bottom.iter().enumerate() {
            if iz >= depth.len() {
                return Err(MeshError::BottomIndexOutOfRange { loc, index: iz });
            }
        }
        for (loc, &iz) in elem_bottom.iter().enumerate() {
            if iz >= depth.len() {
                return Err(MeshError::BottomIndexOutOfRange { loc, index: iz });
            }
        }

        Ok(Self {
            lon,
            lat,
            elems,
            node_bottom,
            elem_bottom,
            depth,
            path,
            aux_nodes: Vec::new(),
            aux_elems: Vec::new(),
        })
    }

    /// Attach the periodic-boundary duplicates used for contiguous plotting.
    pub fn with_periodic_extension(
        mut self,
        aux_nodes: Vec<(f64, f64)>,
        aux_elems: Vec<[usize; 3]>,
    ) -> Self {
        self.aux_nodes = aux_nodes;
        self.aux_elems = aux_elems;
        self
    }

    /// Primary node count, periodic duplicates excluded.
    pub fn n_nodes(&self) -> usize {
        self.lon.len()
    }

    /// Primary element count, periodic duplicates excluded.
    pub fn n_elems(&self) -> usize {
        self.elems.len()
    }

    pub fn n_levels(&self) -> usize {
        self.depth.len()
    }

    /// Element latitude as the unweighted mean of its three vertices.
    pub fn elem_lat(&self) -> Vec<f64> {
        self.elems
            .iter()
            .map(|e| (self.lat[e[0]] + self.lat[e[1]] + self.lat[e[2]]) / 3.0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_mesh() -> Mesh {
        // two triangles sharing an edge
        Mesh::new(
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![[0, 1, 2], [1, 3, 2]],
            vec![1, 1, 1, 1],
            vec![1, 1],
            vec![0.0, 100.0, 500.0],
            PathBuf::from("/tmp/mesh"),
        )
        .unwrap()
    }

    #[test]
    fn test_counts_exclude_periodic_duplicates() {
        let mesh = small_mesh().with_periodic_extension(vec![(359.0, 0.0)], vec![[0, 1, 3]]);
        assert_eq!(mesh.n_nodes(), 4);
        assert_eq!(mesh.n_elems(), 2);
        assert_eq!(mesh.aux_nodes.len(), 1);
    }

    #[test]
    fn test_elem_lat_is_vertex_mean() {
        let mesh = small_mesh();
        let elat = mesh.elem_lat();
        assert!((elat[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((elat[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bad_connectivity_is_rejected() {
        let result = Mesh::new(
            vec![0.0, 1.0],
            vec![0.0, 0.0],
            vec![[0, 1, 5]],
            vec![0, 0],
            vec![0],
            vec![0.0],
            PathBuf::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_elem_bottom_error_reports_element_index() {
        let result = Mesh::new(
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![[0, 1, 2], [2, 1, 0]],
            vec![0, 0, 0],
            vec![0, 5],
            vec![0.0, 100.0],
            PathBuf::new(),
        );
        match result {
            Err(MeshError::BottomIndexOutOfRange { loc, index }) => {
                // the second element, not an index offset by the node count
                assert_eq!(loc, 1);
                assert_eq!(index, 5);
            }
            other => panic!("expected a bottom index error, got {:?}", other),
        }
    }

    #[test]
    fn test_bottom_index_must_fit_depth_axis() {
        let result = Mesh::new(
            vec![0.0],
            vec![0.0],
            vec![],
            vec![3],
            vec![],
            vec![0.0, 100.0],
            PathBuf::new(),
        );
        assert!(result.is_err());
    }
}
