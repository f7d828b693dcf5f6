//! ASCII mesh directory loader (`nod2d.out`, `elem2d.out`, `aux3d.out`).
//!
//! The classic FESOM layout: node file with `id lon lat flag` rows, element
//! file with 1-based triangle connectivity, and an aux file holding the
//! level count, the level interfaces (negative down), and the bottom
//! topography per node. Bottom level indices are derived from the
//! topography; the element bottom is the shallowest of its three vertices.

use super::types::ReadError;
use crate::mesh::Mesh;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

fn parse_err(file: &Path, line: usize, msg: impl Into<String>) -> ReadError {
    ReadError::Parse { file: file.display().to_string(), line, msg: msg.into() }
}

fn read_lines(path: &Path) -> Result<Vec<String>, ReadError> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line?);
    }
    Ok(lines)
}

fn read_count(path: &Path, lines: &[String]) -> Result<usize, ReadError> {
    lines
        .first()
        .and_then(|l| l.split_whitespace().next())
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| parse_err(path, 1, "missing leading count"))
}

fn read_nodes(path: &Path) -> Result<(Vec<f64>, Vec<f64>), ReadError> {
    let lines = read_lines(path)?;
    let n = read_count(path, &lines)?;

    let mut lon = Vec::with_capacity(n);
    let mut lat = Vec::with_capacity(n);
    for (i, line) in lines.iter().skip(1).take(n).enumerate() {
        // id lon lat flag
        let mut tokens = line.split_whitespace().skip(1);
        let x: f64 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| parse_err(path, i + 2, "bad longitude"))?;
        let y: f64 = tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| parse_err(path, i + 2, "bad latitude"))?;
        lon.push(x);
        lat.push(y);
    }
    if lon.len() != n {
        return Err(parse_err(path, lines.len(), format!("expected {} node rows", n)));
    }
    Ok((lon, lat))
}

fn read_elems(path: &Path) -> Result<Vec<[usize; 3]>, ReadError> {
    let lines = read_lines(path)?;
    let n = read_count(path, &lines)?;

    let mut elems = Vec::with_capacity(n);
    for (i, line) in lines.iter().skip(1).take(n).enumerate() {
        let mut tokens = line.split_whitespace();
        let mut tri = [0usize; 3];
        for slot in &mut tri {
            let idx: usize = tokens
                .next()
                .and_then(|t| t.parse().ok())
                .filter(|&v| v >= 1)
                .ok_or_else(|| parse_err(path, i + 2, "bad node index"))?;
            *slot = idx - 1; // file is 1-based
        }
        elems.push(tri);
    }
    if elems.len() != n {
        return Err(parse_err(path, lines.len(), format!("expected {} element rows", n)));
    }
    Ok(elems)
}

/// Level interfaces plus per-node bottom topography (both negative down in
/// the file, returned as positive depths).
fn read_aux3d(path: &Path, n_nodes: usize) -> Result<(Vec<f64>, Vec<f64>), ReadError> {
    let lines = read_lines(path)?;
    let nl = read_count(path, &lines)?;

    let mut values = lines
        .iter()
        .skip(1)
        .flat_map(|l| l.split_whitespace())
        .map(|t| t.parse::<f64>().map(f64::abs));

    let mut zbar = Vec::with_capacity(nl);
    for _ in 0..nl {
        let v = values
            .next()
            .transpose()
            .ok()
            .flatten()
            .ok_or_else(|| parse_err(path, 2, "truncated level axis"))?;
        zbar.push(v);
    }

    let mut topo = Vec::with_capacity(n_nodes);
    for _ in 0..n_nodes {
        let v = values
            .next()
            .transpose()
            .ok()
            .flatten()
            .ok_or_else(|| parse_err(path, 2, "truncated bottom topography"))?;
        topo.push(v);
    }

    Ok((zbar, topo))
}

/// Deepest level index whose interface is still above the local floor.
fn bottom_index(depth: &[f64], topo: f64) -> usize {
    let mut iz = 0;
    for (i, &d) in depth.iter().enumerate() {
        if d <= topo {
            iz = i;
        }
    }
    iz
}

pub fn load_mesh(dir: &Path) -> Result<Mesh, ReadError> {
    let (lon, lat) = read_nodes(&dir.join("nod2d.out"))?;
    let elems = read_elems(&dir.join("elem2d.out"))?;
    let (depth, topo) = read_aux3d(&dir.join("aux3d.out"), lon.len())?;

    let node_bottom: Vec<usize> = topo.iter().map(|&t| bottom_index(&depth, t)).collect();
    let elem_bottom: Vec<usize> = elems
        .iter()
        .map(|e| {
            // an element is active only while all three columns are
            node_bottom[e[0]].min(node_bottom[e[1]]).min(node_bottom[e[2]])
        })
        .collect();

    Ok(Mesh::new(lon, lat, elems, node_bottom, elem_bottom, depth, dir.to_path_buf())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_mesh_dir(dir: &Path) {
        fs::write(
            dir.join("nod2d.out"),
            "4\n1 0.0 0.0 0\n2 1.0 0.0 0\n3 0.0 1.0 1\n4 1.0 1.0 0\n",
        )
        .unwrap();
        fs::write(dir.join("elem2d.out"), "2\n1 2 3\n2 4 3\n").unwrap();
        // 3 levels at 0/-100/-500 m, bottoms at 500 500 100 500 m
        fs::write(dir.join("aux3d.out"), "3\n0.0\n-100.0\n-500.0\n-500\n-500\n-100\n-500\n")
            .unwrap();
    }

    #[test]
    fn test_load_mesh_from_ascii_dir() {
        let dir = tempdir().unwrap();
        write_mesh_dir(dir.path());

        let mesh = load_mesh(dir.path()).unwrap();
        assert_eq!(mesh.n_nodes(), 4);
        assert_eq!(mesh.n_elems(), 2);
        assert_eq!(mesh.depth, vec![0.0, 100.0, 500.0]);
        // connectivity converted to 0-based
        assert_eq!(mesh.elems[0], [0, 1, 2]);
        // node 3 (100 m floor) bottoms out at level 1, the rest at level 2
        assert_eq!(mesh.node_bottom, vec![2, 2, 1, 2]);
        // both elements touch the shallow node
        assert_eq!(mesh.elem_bottom, vec![1, 1]);
    }

    #[test]
    fn test_truncated_aux3d_is_an_error() {
        let dir = tempdir().unwrap();
        write_mesh_dir(dir.path());
        fs::write(dir.path().join("aux3d.out"), "3\n0.0\n-100.0\n").unwrap();

        assert!(load_mesh(dir.path()).is_err());
    }

    #[test]
    fn test_missing_node_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(load_mesh(dir.path()).is_err());
    }
}
