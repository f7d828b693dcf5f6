//! Discovery and loading of the per-run mesh diagnostic file
//! (`<runid>.mesh.diag.nc`), which carries the depth-resolved control-volume
//! areas (`elem_area`, `nod_area`) the MOC integration weights with.

use super::types::{AreaWeight, ReadError};
use crate::config::ConfigError;
use gdal::Dataset;
use std::path::{Path, PathBuf};

const DIAG_SUFFIX: &str = ".mesh.diag.nc";

pub fn diag_file_name(runid: &str) -> String {
    format!("{}{}", runid, DIAG_SUFFIX)
}

/// Locate the diag file for a run. Checks, in order: the run's data path,
/// the sibling ensemble-member-1 directory, the mesh directory. First hit
/// wins; exhaustion is fatal, no retry.
pub fn find_diag_file(
    runid: &str,
    datapath: &Path,
    mesh_path: &Path,
) -> Result<PathBuf, ConfigError> {
    let fname = diag_file_name(runid);

    let mut candidates = vec![datapath.join(&fname)];
    if let Some(parent) = datapath.parent() {
        candidates.push(parent.join("1").join(&fname));
    }
    candidates.push(mesh_path.join(&fname));

    for candidate in &candidates {
        if candidate.is_file() {
            return Ok(candidate.clone());
        }
    }

    Err(ConfigError::AreaWeightFileNotFound { runid: runid.to_string(), searched: candidates })
}

/// GDAL subdataset path for one NetCDF variable.
pub(crate) fn netcdf_path(file: &Path, variable: &str) -> String {
    format!("NETCDF:{}:{}", file.display(), variable)
}

/// Read a 2D NetCDF variable as (rows, cols) with scale and missing-value
/// handling applied; missing cells become NaN.
pub(crate) fn read_grid(file: &Path, variable: &str) -> Result<(Vec<f64>, usize, usize), ReadError> {
    let dataset = Dataset::open(netcdf_path(file, variable)).map_err(|_| {
        ReadError::MissingVariable {
            file: file.display().to_string(),
            var: variable.to_string(),
        }
    })?;

    let band = dataset.rasterband(1)?;
    let (width, height) = dataset.raster_size();
    let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let scale = band.scale().unwrap_or(1.0);
    let missing = band.no_data_value();

    let values = buffer
        .data()
        .iter()
        .map(|&raw| {
            if missing.is_some_and(|mv| raw == mv as f32) {
                f64::NAN
            } else {
                raw as f64 * scale
            }
        })
        .collect();

    Ok((values, height, width))
}

/// Load the area weight for the chosen location set and check it against the
/// field's axes. Diag files on the interface axis (`nl1`) carry one extra
/// level; the surplus is dropped. Any other mismatch is surfaced.
pub fn load_area_weight(
    diag_file: &Path,
    on_elements: bool,
    want_nz: usize,
    want_nloc: usize,
) -> Result<AreaWeight, ReadError> {
    let variable = if on_elements { "elem_area" } else { "nod_area" };
    let (values, nz, nloc) = read_grid(diag_file, variable)?;

    if nloc != want_nloc || nz < want_nz {
        return Err(ReadError::Shape {
            what: "area weight",
            got: (nz, nloc),
            want: (want_nz, want_nloc),
        });
    }

    Ok(AreaWeight::new(values, nz, nloc)?.truncate_levels(want_nz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_search_order_prefers_datapath() {
        let root = tempdir().unwrap();
        let datapath = root.path().join("run").join("2");
        let meshdir = root.path().join("mesh");
        fs::create_dir_all(&datapath).unwrap();
        fs::create_dir_all(&meshdir).unwrap();

        File::create(datapath.join("core2.mesh.diag.nc")).unwrap();
        File::create(meshdir.join("core2.mesh.diag.nc")).unwrap();

        let found = find_diag_file("core2", &datapath, &meshdir).unwrap();
        assert_eq!(found, datapath.join("core2.mesh.diag.nc"));
    }

    #[test]
    fn test_ensemble_member_one_fallback() {
        let root = tempdir().unwrap();
        let datapath = root.path().join("run").join("3");
        let member1 = root.path().join("run").join("1");
        fs::create_dir_all(&datapath).unwrap();
        fs::create_dir_all(&member1).unwrap();
        File::create(member1.join("core2.mesh.diag.nc")).unwrap();

        let found = find_diag_file("core2", &datapath, root.path()).unwrap();
        assert_eq!(found, member1.join("core2.mesh.diag.nc"));
    }

    #[test]
    fn test_mesh_dir_is_last_resort() {
        let root = tempdir().unwrap();
        let datapath = root.path().join("run");
        let meshdir = root.path().join("mesh");
        fs::create_dir_all(&datapath).unwrap();
        fs::create_dir_all(&meshdir).unwrap();
        File::create(meshdir.join("core2.mesh.diag.nc")).unwrap();

        let found = find_diag_file("core2", &datapath, &meshdir).unwrap();
        assert_eq!(found, meshdir.join("core2.mesh.diag.nc"));
    }

    #[test]
    fn test_exhausted_search_is_fatal() {
        let root = tempdir().unwrap();
        let err = find_diag_file("core2", root.path(), root.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("area weight file not found"), "got: {}", msg);
        assert!(msg.contains("core2.mesh.diag.nc"));
    }

    #[test]
    fn test_netcdf_subdataset_path() {
        let p = netcdf_path(Path::new("/data/core2.mesh.diag.nc"), "elem_area");
        assert_eq!(p, "NETCDF:/data/core2.mesh.diag.nc:elem_area");
    }
}
