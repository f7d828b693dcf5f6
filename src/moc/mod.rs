//! Meridional overturning streamfunction from vertical velocities.
//!
//! The engine bins basin locations into latitude bands, sums the
//! area-weighted vertical velocity per band and depth level, and integrates
//! cumulatively from the northernmost band southward with a sign flip. The
//! result is the classical depth x latitude MOC in Sverdrup, with bottom
//! topography envelopes attached for plotting.

pub mod bottom;

use crate::basin::{Basin, ExtremaRule};
use crate::field::{Field, FieldError, FieldMeta};
use crate::mesh::Mesh;
use crate::readers::AreaWeight;
use chrono::NaiveDate;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// m^3/s to Sverdrup
const SV_PER_M3S: f64 = 1e-6;

// Basin-convention thresholds for the diagnostic cell-strength report.
// Domain heuristics, not derived values.
pub const NADW_MIN_DEPTH: f64 = 700.0;
pub const NADW_MIN_LAT: f64 = 0.0;
pub const AABW_MIN_DEPTH: f64 = 2500.0;
pub const AABW_MIN_DEPTH_PACIFIC: f64 = 2000.0;
pub const AABW_MIN_LAT: f64 = -50.0;

#[derive(Debug, Clone)]
pub struct MocOptions {
    pub basin: Basin,
    /// Latitude bin width [deg], > 0
    pub dlat: f64,
    /// Element-based instead of node-based averaging
    pub on_elements: bool,
    /// Print progress and the cell-strength summary
    pub do_info: bool,
}

impl Default for MocOptions {
    fn default() -> Self {
        Self { basin: Basin::Global, dlat: 1.0, on_elements: false, do_info: false }
    }
}

/// The computed streamfunction: values on (time, depth, latitude bin), the
/// two coordinate axes, the bottom envelopes, and the propagated metadata.
/// Everything a renderer consumes; immutable after creation.
#[derive(Debug, Clone)]
pub struct Streamfunction {
    /// MOC variant name, e.g. "amoc"
    pub name: String,
    values: Vec<f64>,
    ntime: usize,
    /// Depth levels [m], surface first
    pub depth: Vec<f64>,
    /// Latitude bin centers [deg], ascending
    pub lat: Vec<f64>,
    /// Max bottom depth per bin, NaN where the bin is empty
    pub botmax: Vec<f64>,
    /// Smoothed 80th-percentile bottom depth per bin, NaN where empty
    pub botnice: Vec<f64>,
    pub times: Option<Vec<NaiveDate>>,
    pub meta: FieldMeta,
    pub long_name: String,
    pub units: String,
}

impl Streamfunction {
    /// Assemble a streamfunction from raw parts, shape-checked. The engine
    /// builds its own; this exists for collaborators that persist or mock
    /// results.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        values: Vec<f64>,
        ntime: usize,
        depth: Vec<f64>,
        lat: Vec<f64>,
        botmax: Vec<f64>,
        botnice: Vec<f64>,
        times: Option<Vec<NaiveDate>>,
        meta: FieldMeta,
    ) -> Result<Self, MocError> {
        let want = ntime * depth.len() * lat.len();
        if values.len() != want {
            return Err(MocError::Field(FieldError::Shape { got: values.len(), want }));
        }
        Ok(Self {
            name,
            values,
            ntime,
            depth,
            lat,
            botmax,
            botnice,
            times,
            meta,
            long_name: "MOC".to_string(),
            units: "Sv".to_string(),
        })
    }

    pub fn ntime(&self) -> usize {
        self.ntime
    }

    pub fn nz(&self) -> usize {
        self.depth.len()
    }

    pub fn nlat(&self) -> usize {
        self.lat.len()
    }

    pub fn has_time(&self) -> bool {
        self.times.is_some()
    }

    #[inline]
    pub fn get(&self, t: usize, iz: usize, ilat: usize) -> f64 {
        self.values[(t * self.nz() + iz) * self.lat.len() + ilat]
    }
}

#[derive(Debug)]
pub enum MocError {
    BinWidth(f64),
    Field(FieldError),
    WeightShape { got: (usize, usize), want: (usize, usize) },
    MaskIndex { index: usize, nloc: usize },
}

impl fmt::Display for MocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MocError::BinWidth(dlat) => write!(f, "bin width must be > 0, got {}", dlat),
            MocError::Field(e) => write!(f, "{}", e),
            MocError::WeightShape { got, want } => write!(
                f,
                "area weight has shape (nz={}, loc={}), field needs (nz={}, loc={})",
                got.0, got.1, want.0, want.1
            ),
            MocError::MaskIndex { index, nloc } => {
                write!(f, "basin mask index {} outside the {} locations", index, nloc)
            }
        }
    }
}

impl std::error::Error for MocError {}

impl From<FieldError> for MocError {
    fn from(e: FieldError) -> Self {
        MocError::Field(e)
    }
}

/// Latitude bin key: nearest multiple of `dlat`, as an integer so the
/// ordered map stays exact. Half-way latitudes round to the even bin, the
/// numpy convention, so a node at exactly 0.5 with dlat 1 lands in bin 0.
#[inline]
pub(crate) fn bin_key(lat: f64, dlat: f64) -> i64 {
    (lat / dlat).round_ties_even() as i64
}

/// Compute the MOC streamfunction for one basin.
///
/// `mask` holds the basin's location indices (nodes, or elements when
/// `opts.on_elements`), as produced by a `BasinSelector`. An empty mask is
/// not an error; it yields a zero-bin result. The area weight must cover the
/// same location set and depth axis as the field.
pub fn calc_zmoc(
    mesh: &Mesh,
    field: &Field,
    weight: &AreaWeight,
    mask: &[usize],
    opts: &MocOptions,
) -> Result<Streamfunction, MocError> {
    let t_start = Instant::now();
    if opts.do_info {
        println!(
            "_____calc. {} from vertical velocities via meridional bins_____",
            opts.basin.short_id().to_uppercase()
        );
    }
    if !(opts.dlat > 0.0) {
        return Err(MocError::BinWidth(opts.dlat));
    }

    // Element mode averages the vertices onto elements before anything else;
    // the connectivity indexes into the full, unmasked node set. The node
    // path borrows the mesh latitudes instead of copying them.
    let elem_field;
    let (field, lat_loc, bottom_index): (&Field, Cow<[f64]>, &[usize]) = if opts.on_elements {
        let mut f = field.to_elements(mesh)?;
        enforce_bottom(&mut f, &mesh.elem_bottom);
        elem_field = f;
        (&elem_field, Cow::Owned(mesh.elem_lat()), &mesh.elem_bottom)
    } else {
        (field, Cow::Borrowed(mesh.lat.as_slice()), &mesh.node_bottom)
    };

    let (ntime, nz, nloc) = (field.ntime(), field.nz(), field.nloc());
    if weight.nz() != nz || weight.nloc() != nloc {
        return Err(MocError::WeightShape {
            got: (weight.nz(), weight.nloc()),
            want: (nz, nloc),
        });
    }
    if let Some(&bad) = mask.iter().find(|&&loc| loc >= nloc) {
        return Err(MocError::MaskIndex { index: bad, nloc });
    }

    // Ordered bin axis: one pass to collect the keys, columns assigned in
    // sorted order so the output is deterministic regardless of input order.
    if opts.do_info {
        println!(" --> do binning of latitudes");
    }
    let mut bins: BTreeMap<i64, usize> = BTreeMap::new();
    for &loc in mask {
        bins.entry(bin_key(lat_loc[loc], opts.dlat)).or_insert(0);
    }
    for (col, (_, slot)) in bins.iter_mut().enumerate() {
        *slot = col;
    }
    let nlat = bins.len();
    let lat_axis: Vec<f64> = bins.keys().map(|&k| k as f64 * opts.dlat).collect();

    // Area-weighted sum per (time, level, bin). NaN products are zero flux,
    // so one bad sample cannot poison a whole band.
    if opts.do_info {
        println!(" --> do sumation/integration over bins");
    }
    let mut acc = vec![0.0f64; ntime * nz * nlat];
    for &loc in mask {
        let col = bins[&bin_key(lat_loc[loc], opts.dlat)];
        for t in 0..ntime {
            for iz in 0..nz {
                let v = field.get(t, iz, loc) * weight.get(iz, loc) * SV_PER_M3S;
                if v.is_finite() {
                    acc[(t * nz + iz) * nlat + col] += v;
                }
            }
        }
    }

    // Negated running sum from the northernmost bin southward. The axis is
    // already sorted by latitude, so walking the columns in reverse is the
    // whole integral; no bin is dropped or duplicated.
    if opts.do_info {
        println!(" --> do cumsum over latitudes");
    }
    for t in 0..ntime {
        for iz in 0..nz {
            let row = (t * nz + iz) * nlat;
            let mut running = 0.0;
            for ilat in (0..nlat).rev() {
                running += acc[row + ilat];
                acc[row + ilat] = -running;
            }
        }
    }

    let (botmax, botnice) =
        bottom::estimate_bottom(&mesh.depth, bottom_index, &lat_loc, mask, opts.dlat, &bins);

    let result = Streamfunction {
        name: opts.basin.short_id().to_string(),
        values: acc,
        ntime,
        depth: mesh.depth.clone(),
        lat: lat_axis,
        botmax,
        botnice,
        times: field.times.clone(),
        meta: field.meta.clone(),
        long_name: "MOC".to_string(),
        units: "Sv".to_string(),
    };

    if opts.do_info {
        println!(" --> total time:{:.3} s", t_start.elapsed().as_secs_f64());
        if !result.has_time() {
            print_cell_extrema(&result, opts.basin);
        }
    }

    Ok(result)
}

/// Zero every level below a location's bottom index. Skipping this leaks
/// spurious transport along topography in element mode.
fn enforce_bottom(field: &mut Field, bottom_index: &[usize]) {
    for t in 0..field.ntime() {
        for iz in 0..field.nz() {
            for loc in 0..field.nloc() {
                if iz > bottom_index[loc] {
                    field.set(t, iz, loc, 0.0);
                }
            }
        }
    }
}

/// Extremum of the first time step over {depth >= min_depth, lat > min_lat}.
/// None when no cell qualifies or all values are NaN.
fn extremum(
    sf: &Streamfunction,
    min_depth: f64,
    min_lat: f64,
    take_max: bool,
) -> Option<f64> {
    let mut best: Option<f64> = None;
    for (iz, &d) in sf.depth.iter().enumerate() {
        if d < min_depth {
            continue;
        }
        for (ilat, &lat) in sf.lat.iter().enumerate() {
            if lat <= min_lat {
                continue;
            }
            let v = sf.get(0, iz, ilat);
            if v.is_nan() {
                continue;
            }
            best = Some(match best {
                None => v,
                Some(b) if take_max => b.max(v),
                Some(b) => b.min(v),
            });
        }
    }
    best
}

/// Best-effort NADW/AABW cell-strength report. Prints nothing when no cell
/// matches the thresholds; a missing run label falls back to "".
fn print_cell_extrema(sf: &Streamfunction, basin: Basin) {
    let label = sf.meta.descript.as_str();
    match basin.extrema_rule() {
        ExtremaRule::AtlanticLike => {
            if let Some(maxv) = extremum(sf, NADW_MIN_DEPTH, NADW_MIN_LAT, true) {
                println!(" max. NADW_{} = {:.2} Sv", label, maxv);
            }
            if let Some(minv) = extremum(sf, AABW_MIN_DEPTH, AABW_MIN_LAT, false) {
                println!(" max. AABW_{} = {:.2} Sv", label, minv);
            }
        }
        ExtremaRule::PacificLike => {
            if let Some(minv) = extremum(sf, AABW_MIN_DEPTH_PACIFIC, AABW_MIN_LAT, false) {
                println!(" max. AABW_{} = {:.2} Sv", label, minv);
            }
        }
        ExtremaRule::None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// One node per latitude in `lats`, single triangle fan, nz levels.
    fn line_mesh(lats: &[f64], depth: Vec<f64>) -> Mesh {
        let n = lats.len();
        let bottom = depth.len() - 1;
        Mesh::new(
            vec![0.0; n],
            lats.to_vec(),
            vec![],
            vec![bottom; n],
            vec![],
            depth,
            PathBuf::new(),
        )
        .unwrap()
    }

    fn unit_weight(nz: usize, nloc: usize) -> AreaWeight {
        // 1e6 m^2-equivalent per cell, so w = 1 m/s contributes 1 Sv
        AreaWeight::new(vec![1e6; nz * nloc], nz, nloc).unwrap()
    }

    fn options() -> MocOptions {
        MocOptions { basin: Basin::Global, dlat: 1.0, on_elements: false, do_info: false }
    }

    #[test]
    fn test_sinking_in_the_north_gives_positive_cell() {
        // mass-conserving column: sinking at the two northern bins,
        // compensating upwelling at the two southern ones
        let mesh = line_mesh(&[-2.0, -1.0, 0.0, 1.0, 2.0], vec![0.0, 1000.0]);
        let w = vec![
            0.0, 0.0, 0.0, 0.0, 0.0, // surface level
            1.0, 1.0, 0.0, -1.0, -1.0, // subsurface level
        ];
        let field =
            Field::new(w, 1, 2, 5, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 5);
        let mask: Vec<usize> = (0..5).collect();

        let sf = calc_zmoc(&mesh, &field, &weight, &mask, &options()).unwrap();

        // positive immediately south of the sinking region
        assert!((sf.get(0, 1, 2) - 2.0).abs() < 1e-9);
        assert!((sf.get(0, 1, 1) - 1.0).abs() < 1e-9);
        // closed at the southern boundary
        assert!(sf.get(0, 1, 0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_field_gives_exact_zero_everywhere() {
        let mesh = line_mesh(&[-1.0, 0.0, 1.0], vec![0.0, 500.0]);
        let field = Field::new(vec![0.0; 6], 1, 2, 3, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 3);

        let sf = calc_zmoc(&mesh, &field, &weight, &[0, 1, 2], &options()).unwrap();
        for iz in 0..2 {
            for ilat in 0..3 {
                assert_eq!(sf.get(0, iz, ilat), 0.0);
            }
        }
    }

    #[test]
    fn test_southern_boundary_balances_total_flux() {
        let mesh = line_mesh(&[-1.0, 0.0, 1.0], vec![0.0, 500.0]);
        let w = vec![0.0, 0.0, 0.0, 0.25, 1.0, 0.5];
        let field = Field::new(w, 1, 2, 3, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 3);

        let sf = calc_zmoc(&mesh, &field, &weight, &[0, 1, 2], &options()).unwrap();
        // southernmost bin = negative of the basin-integrated flux
        assert!((sf.get(0, 1, 0) - (-1.75)).abs() < 1e-9);
    }

    #[test]
    fn test_bin_axis_matches_distinct_rounded_latitudes() {
        // 0.3 and -0.2 both round to bin 0
        let mesh = line_mesh(&[-2.0, -0.2, 0.3, 1.4], vec![0.0, 100.0]);
        let field = Field::new(vec![1.0; 8], 1, 2, 4, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 4);

        let sf = calc_zmoc(&mesh, &field, &weight, &[0, 1, 2, 3], &options()).unwrap();
        assert_eq!(sf.lat, vec![-2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_half_bin_latitudes_round_to_even_bin() {
        assert_eq!(bin_key(0.5, 1.0), 0);
        assert_eq!(bin_key(1.5, 1.0), 2);
        assert_eq!(bin_key(2.5, 1.0), 2);
        assert_eq!(bin_key(-0.5, 1.0), 0);
        assert_eq!(bin_key(-1.5, 1.0), -2);
        // off the boundary the nearest bin still wins
        assert_eq!(bin_key(0.6, 1.0), 1);
        assert_eq!(bin_key(-0.6, 1.0), -1);

        // end to end: two boundary nodes share the even bins
        let mesh = line_mesh(&[0.5, 1.5], vec![0.0, 100.0]);
        let field = Field::new(vec![1.0; 4], 1, 2, 2, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 2);
        let sf = calc_zmoc(&mesh, &field, &weight, &[0, 1], &options()).unwrap();
        assert_eq!(sf.lat, vec![0.0, 2.0]);
    }

    #[test]
    fn test_linearity_under_input_scaling() {
        let mesh = line_mesh(&[-1.0, 0.0, 1.0], vec![0.0, 100.0]);
        let w = vec![0.1, -0.4, 0.3, 0.7, 0.2, -0.9];
        let scaled: Vec<f64> = w.iter().map(|v| v * 3.5).collect();
        let weight = unit_weight(2, 3);
        let mask = vec![0, 1, 2];

        let f1 = Field::new(w, 1, 2, 3, None, FieldMeta::default()).unwrap();
        let f2 = Field::new(scaled, 1, 2, 3, None, FieldMeta::default()).unwrap();
        let s1 = calc_zmoc(&mesh, &f1, &weight, &mask, &options()).unwrap();
        let s2 = calc_zmoc(&mesh, &f2, &weight, &mask, &options()).unwrap();

        for iz in 0..2 {
            for ilat in 0..3 {
                assert!((s2.get(0, iz, ilat) - 3.5 * s1.get(0, iz, ilat)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_empty_basin_mask_does_not_raise() {
        let mesh = line_mesh(&[0.0, 1.0], vec![0.0, 100.0]);
        let field = Field::new(vec![1.0; 4], 1, 2, 2, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 2);

        let sf = calc_zmoc(&mesh, &field, &weight, &[], &options()).unwrap();
        assert_eq!(sf.nlat(), 0);
    }

    #[test]
    fn test_nan_samples_are_zero_flux() {
        let mesh = line_mesh(&[0.0, 1.0], vec![0.0, 100.0]);
        let w = vec![0.0, 0.0, f64::NAN, 1.0];
        let field = Field::new(w, 1, 2, 2, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 2);

        let sf = calc_zmoc(&mesh, &field, &weight, &[0, 1], &options()).unwrap();
        assert!((sf.get(0, 1, 1) - (-1.0)).abs() < 1e-9);
        assert!((sf.get(0, 1, 0) - (-1.0)).abs() < 1e-9);
        assert!(!sf.get(0, 1, 0).is_nan());
    }

    #[test]
    fn test_element_mode_enforces_bottom_topography() {
        // two triangles; element 1 has a shallow bottom, so its deep level
        // must not contribute even though the node field is non-zero there
        let mesh = Mesh::new(
            vec![0.0, 1.0, 0.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            vec![[0, 1, 2], [1, 3, 2]],
            vec![1, 1, 1, 1],
            vec![1, 0],
            vec![0.0, 1000.0],
            PathBuf::new(),
        )
        .unwrap();
        let w = vec![
            0.0, 0.0, 0.0, 0.0, // surface
            3.0, 3.0, 3.0, 3.0, // deep level, node based
        ];
        let field = Field::new(w, 1, 2, 4, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 2); // element weights
        let opts = MocOptions { on_elements: true, ..options() };

        let sf = calc_zmoc(&mesh, &field, &weight, &[0, 1], &opts).unwrap();
        // vertex-mean latitudes 1/3 and 2/3 round to bins 0 and 1; only
        // element 0 may contribute its 3.0 * 1e6 m^3/s at the deep level
        assert_eq!(sf.lat, vec![0.0, 1.0]);
        assert_eq!(sf.get(0, 1, 1), 0.0);
        assert!((sf.get(0, 1, 0) - (-3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_weight_shape_mismatch_is_surfaced() {
        let mesh = line_mesh(&[0.0, 1.0], vec![0.0, 100.0]);
        let field = Field::new(vec![0.0; 4], 1, 2, 2, None, FieldMeta::default()).unwrap();
        let weight = unit_weight(2, 3);

        assert!(calc_zmoc(&mesh, &field, &weight, &[0, 1], &options()).is_err());
    }
}
