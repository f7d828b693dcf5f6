//! Discovery and loading of a run's yearly vertical-velocity files
//! (`w.<runid>.<year>.nc`, variable `w` on (time, level, node)).

use super::types::{ReadError, normalize_dim_name};
use crate::field::{Field, FieldMeta};
use chrono::NaiveDate;
use gdal::{Dataset, Metadata};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Year encoded in a `w.<runid>.<year>.nc` file name, if any.
fn parse_year(file_name: &str, runid: &str) -> Option<i32> {
    file_name
        .strip_prefix("w.")?
        .strip_prefix(runid)?
        .strip_prefix('.')?
        .strip_suffix(".nc")?
        .parse()
        .ok()
}

/// Recursively collect the run's yearly files under `datapath`, sorted by
/// year.
pub fn find_w_files(datapath: &Path, runid: &str) -> Vec<(i32, PathBuf)> {
    let mut files: Vec<(i32, PathBuf)> = WalkDir::new(datapath)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let year = parse_year(&e.file_name().to_string_lossy(), runid)?;
            Some((year, e.path().to_path_buf()))
        })
        .collect();
    files.sort();
    files
}

/// True when the band's extra NetCDF dimension normalizes to `time`.
fn band_extra_dim_is_time(band: &gdal::raster::RasterBand) -> bool {
    band.metadata_domain("")
        .map(|entries| {
            entries.iter().any(|entry| {
                entry
                    .split_once('=')
                    .and_then(|(key, _)| key.strip_prefix("NETCDF_DIM_"))
                    .map(normalize_dim_name)
                    == Some("time")
            })
        })
        .unwrap_or(false)
}

/// Nominal sample dates within one year: mid-year for an annual mean,
/// mid-month for monthly output, evenly spaced otherwise.
fn sample_dates(year: i32, n: usize) -> Vec<NaiveDate> {
    match n {
        1 => vec![NaiveDate::from_ymd_opt(year, 7, 1).unwrap_or_default()],
        12 => (1..=12)
            .map(|m| NaiveDate::from_ymd_opt(year, m, 15).unwrap_or_default())
            .collect(),
        n => (0..n)
            .map(|i| {
                let ordinal = ((i as f64 + 0.5) * 365.0 / n as f64).floor() as u32 + 1;
                NaiveDate::from_yo_opt(year, ordinal.min(365)).unwrap_or_default()
            })
            .collect(),
    }
}

/// Load and concatenate the yearly files of one run into a single field.
pub fn load_w(files: &[(i32, PathBuf)], meta: FieldMeta) -> Result<Field, ReadError> {
    let mut values: Vec<f64> = Vec::new();
    let mut times: Vec<NaiveDate> = Vec::new();
    let mut shape: Option<(usize, usize)> = None; // (nz, nloc)

    for (year, path) in files {
        let dataset = Dataset::open(super::diag::netcdf_path(path, "w")).map_err(|_| {
            ReadError::MissingVariable { file: path.display().to_string(), var: "w".into() }
        })?;

        let (width, height) = dataset.raster_size();
        match shape {
            None => shape = Some((height, width)),
            Some(want) if want != (height, width) => {
                return Err(ReadError::Shape {
                    what: "vertical velocity",
                    got: (height, width),
                    want,
                });
            }
            Some(_) => {}
        }

        let nbands = dataset.raster_count();
        for b in 1..=nbands {
            let band = dataset.rasterband(b)?;
            if nbands > 1 && !band_extra_dim_is_time(&band) {
                return Err(ReadError::NetCdf(format!(
                    "{}: variable w has a non-time record dimension",
                    path.display()
                )));
            }
            let buffer = band.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
            let scale = band.scale().unwrap_or(1.0);
            let missing = band.no_data_value();
            values.extend(buffer.data().iter().map(|&raw| {
                if missing.is_some_and(|mv| raw == mv as f32) {
                    f64::NAN
                } else {
                    raw as f64 * scale
                }
            }));
        }
        times.extend(sample_dates(*year, nbands));
    }

    let (nz, nloc) = shape.unwrap_or((0, 0));
    Ok(Field::new(values, times.len(), nz, nloc, Some(times), meta)?)
}
