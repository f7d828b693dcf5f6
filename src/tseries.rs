//! Cell-strength time series from precomputed MOC fields.
//!
//! Reduces a (time, depth, latitude) streamfunction to one scalar per time
//! step via a latitude selector and the cell's extremum rule, then to one
//! value per calendar year. Cycle layout and the reference overlay are pure
//! presentation arithmetic, kept apart from the MOC computation itself.

use crate::moc::{AABW_MIN_DEPTH, NADW_MIN_DEPTH, Streamfunction};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// The two overturning cells. Their extrema have opposite signs: the upper
/// (NADW) cell is a maximum, the lower (AABW) cell a minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    UpperCell,
    LowerCell,
}

impl CellKind {
    /// Historical variable name of the derived series.
    pub fn series_name(&self) -> &'static str {
        match self {
            CellKind::UpperCell => "zmoc_nadw",
            CellKind::LowerCell => "zmoc_aabw",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CellKind::UpperCell => "upper cell strength",
            CellKind::LowerCell => "lower cell strength",
        }
    }

    /// Short tag used in figure file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            CellKind::UpperCell => "nadw",
            CellKind::LowerCell => "aabw",
        }
    }

    fn min_depth(&self) -> f64 {
        match self {
            CellKind::UpperCell => NADW_MIN_DEPTH,
            CellKind::LowerCell => AABW_MIN_DEPTH,
        }
    }

    fn take_max(&self) -> bool {
        matches!(self, CellKind::UpperCell)
    }
}

/// Conventional latitude window behind the "max-envelope" selector.
pub const MAX_ENVELOPE_RANGE: (f64, f64) = (40.0, 60.0);

/// How to pick the latitude (or latitudes) the series is read at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatSelector {
    /// Bin nearest to the given latitude by absolute difference; on a tie
    /// the first bin on the ascending axis wins, deterministically.
    Nearest(f64),
    /// Open interval (l0, l1); the cell's extremum over the window.
    Range(f64, f64),
    /// `Range(40, 60)` by convention.
    MaxEnvelope,
}

impl LatSelector {
    fn window(&self) -> Option<(f64, f64)> {
        match self {
            LatSelector::Nearest(_) => None,
            LatSelector::Range(l0, l1) => Some((*l0, *l1)),
            LatSelector::MaxEnvelope => Some(MAX_ENVELOPE_RANGE),
        }
    }

    /// Plot-title label, e.g. "26.5°N" or "40°N<lat<60°N".
    pub fn label(&self) -> String {
        match self {
            LatSelector::Nearest(lat) if *lat >= 0.0 => format!("{}°N", lat),
            LatSelector::Nearest(lat) => format!("{}°S", -lat),
            LatSelector::Range(l0, l1) => format!("{}°N<lat<{}°N", l0, l1),
            LatSelector::MaxEnvelope => {
                format!("{}°N<lat<{}°N", MAX_ENVELOPE_RANGE.0, MAX_ENVELOPE_RANGE.1)
            }
        }
    }
}

#[derive(Debug)]
pub enum TseriesError {
    NoTimeAxis,
    EmptyLatAxis,
    Parse { file: String, line: usize },
    Io(std::io::Error),
}

impl fmt::Display for TseriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TseriesError::NoTimeAxis => {
                write!(f, "streamfunction has no time axis to extract a series from")
            }
            TseriesError::EmptyLatAxis => write!(f, "streamfunction has no latitude bins"),
            TseriesError::Parse { file, line } => {
                write!(f, "{}:{}: expected 'YYYY-MM-DD,value'", file, line)
            }
            TseriesError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for TseriesError {}

impl From<std::io::Error> for TseriesError {
    fn from(err: std::io::Error) -> TseriesError {
        TseriesError::Io(err)
    }
}

/// One annual-mean series with its year axis. Stored values are never
/// touched by cycle layout; only the displayed year axis shifts.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSeries {
    pub years: Vec<i32>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesSummary {
    pub mean: f64,
    pub std: f64,
}

impl CellSeries {
    /// Mean and population standard deviation over the finite annual values;
    /// None when the series carries no data.
    pub fn summary(&self) -> Option<SeriesSummary> {
        let finite: Vec<f64> = self.values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let n = finite.len() as f64;
        let mean = finite.iter().sum::<f64>() / n;
        let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(SeriesSummary { mean, std: var.sqrt() })
    }

    /// Year axis shifted for cycle `cycle_index` (1-based) in concatenation
    /// mode, so repeated cycles lay out left to right instead of on top of
    /// each other. Display only; `values` stay as they are.
    pub fn display_years(&self, cycle_index: u32) -> Vec<i32> {
        let offset = match (self.years.first(), self.years.last()) {
            (Some(&first), Some(&last)) => concat_year_offset(first, last, cycle_index),
            _ => 0,
        };
        self.years.iter().map(|&y| y + offset).collect()
    }
}

/// Year offset of cycle `cycle_index` (1-based): the span of one cycle times
/// the number of cycles already laid out.
pub fn concat_year_offset(first_year: i32, last_year: i32, cycle_index: u32) -> i32 {
    (last_year - first_year + 1) * (cycle_index as i32 - 1)
}

/// Cell strength per (time, latitude bin): extremum of the streamfunction
/// over the cell's depth window, NaN where the whole column is NaN.
fn cell_strength(sf: &Streamfunction, cell: CellKind) -> Vec<f64> {
    let (ntime, nlat) = (sf.ntime(), sf.nlat());
    let mut out = vec![f64::NAN; ntime * nlat];
    for t in 0..ntime {
        for ilat in 0..nlat {
            let mut best = f64::NAN;
            for (iz, &d) in sf.depth.iter().enumerate() {
                if d < cell.min_depth() {
                    continue;
                }
                let v = sf.get(t, iz, ilat);
                if v.is_nan() {
                    continue;
                }
                if best.is_nan() {
                    best = v;
                } else if cell.take_max() {
                    best = best.max(v);
                } else {
                    best = best.min(v);
                }
            }
            out[t * nlat + ilat] = best;
        }
    }
    out
}

/// First bin index minimizing |lat - target| on the ascending axis.
fn nearest_bin(lat: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &l) in lat.iter().enumerate() {
        let d = (l - target).abs();
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

/// One scalar per time step, per the selector and the cell's extremum rule.
pub fn select(
    sf: &Streamfunction,
    cell: CellKind,
    selector: LatSelector,
) -> Result<Vec<f64>, TseriesError> {
    let nlat = sf.nlat();
    if nlat == 0 {
        return Err(TseriesError::EmptyLatAxis);
    }
    let strength = cell_strength(sf, cell);

    let reduce = |t: usize| -> f64 {
        match selector.window() {
            None => {
                let LatSelector::Nearest(target) = selector else { unreachable!() };
                // nlat > 0, so the nearest bin exists
                let i = nearest_bin(&sf.lat, target).unwrap_or(0);
                strength[t * nlat + i]
            }
            Some((l0, l1)) => {
                let mut best = f64::NAN;
                for (i, &l) in sf.lat.iter().enumerate() {
                    if !(l > l0 && l < l1) {
                        continue;
                    }
                    let v = strength[t * nlat + i];
                    if v.is_nan() {
                        continue;
                    }
                    if best.is_nan() {
                        best = v;
                    } else if cell.take_max() {
                        best = best.max(v);
                    } else {
                        best = best.min(v);
                    }
                }
                best
            }
        }
    };

    Ok((0..sf.ntime()).map(reduce).collect())
}

/// Aggregate sub-annual samples to one arithmetic mean per calendar year.
/// NaN samples are skipped; a year with no finite sample stays NaN.
pub fn annual_mean(times: &[NaiveDate], values: &[f64]) -> CellSeries {
    let mut by_year: BTreeMap<i32, (f64, u32)> = BTreeMap::new();
    for (date, &v) in times.iter().zip(values) {
        let entry = by_year.entry(date.year()).or_insert((0.0, 0));
        if v.is_finite() {
            entry.0 += v;
            entry.1 += 1;
        }
    }

    let mut years = Vec::with_capacity(by_year.len());
    let mut means = Vec::with_capacity(by_year.len());
    for (year, (sum, count)) in by_year {
        years.push(year);
        means.push(if count > 0 { sum / count as f64 } else { f64::NAN });
    }
    CellSeries { years, values: means }
}

/// Latitude selection plus annual aggregation in one step.
pub fn extract_annual(
    sf: &Streamfunction,
    cell: CellKind,
    selector: LatSelector,
) -> Result<CellSeries, TseriesError> {
    let times = sf.times.as_ref().ok_or(TseriesError::NoTimeAxis)?;
    let per_step = select(sf, cell, selector)?;
    Ok(annual_mean(times, &per_step))
}

/// Observational reference overlay (e.g. a mooring-array transport),
/// aggregated to annual means the same way as the model series.
#[derive(Debug, Clone)]
pub struct ReferenceSeries {
    pub label: String,
    pub times: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl ReferenceSeries {
    /// Load `YYYY-MM-DD,value` lines; `#` lines are comments.
    pub fn from_csv(path: &Path, label: &str) -> Result<Self, TseriesError> {
        let reader = BufReader::new(File::open(path)?);
        let mut times = Vec::new();
        let mut values = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parsed = trimmed.split_once(',').and_then(|(d, v)| {
                let date = NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()?;
                let value: f64 = v.trim().parse().ok()?;
                Some((date, value))
            });
            let Some((date, value)) = parsed else {
                return Err(TseriesError::Parse {
                    file: path.display().to_string(),
                    line: i + 1,
                });
            };
            times.push(date);
            values.push(value);
        }
        Ok(Self { label: label.to_string(), times, values })
    }

    pub fn annual(&self) -> CellSeries {
        annual_mean(&self.times, &self.values)
    }
}

/// Per-selector output file name: `<stem>_<cell>_<label><ext>` with the
/// degree symbol dropped and spaces replaced.
pub fn figure_path(base: &Path, cell: CellKind, selector: &LatSelector) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("tseries");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("png");
    let label = selector.label().replace('°', "").replace(' ', "_");
    base.with_file_name(format!("{}_{}_{}.{}", stem, cell.file_tag(), label, ext))
}
