use crate::mesh::Mesh;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// MOC variants, named after the historical short ids used in file names and
/// on colorbars.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Basin {
    #[serde(rename(deserialize = "gmoc"))]
    Global,
    #[serde(rename(deserialize = "amoc"))]
    Atlantic,
    #[serde(rename(deserialize = "aamoc"))]
    AtlanticArctic,
    #[serde(rename(deserialize = "pmoc"))]
    Pacific,
    #[serde(rename(deserialize = "ipmoc"))]
    IndoPacific,
    #[serde(rename(deserialize = "imoc"))]
    Indian,
}

/// Which diagnostic cell-strength report applies to a basin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremaRule {
    /// Upper (NADW) and lower (AABW) cell extrema
    AtlanticLike,
    /// Lower (AABW) cell extremum only
    PacificLike,
    None,
}

#[derive(Debug)]
pub struct BasinParseError(String);

impl fmt::Display for BasinParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown basin id {:?}, expected one of gmoc, amoc, aamoc, pmoc, ipmoc, imoc",
            self.0
        )
    }
}

impl std::error::Error for BasinParseError {}

impl FromStr for Basin {
    type Err = BasinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gmoc" => Ok(Basin::Global),
            "amoc" => Ok(Basin::Atlantic),
            "aamoc" => Ok(Basin::AtlanticArctic),
            "pmoc" => Ok(Basin::Pacific),
            "ipmoc" => Ok(Basin::IndoPacific),
            "imoc" => Ok(Basin::Indian),
            other => Err(BasinParseError(other.to_string())),
        }
    }
}

impl Basin {
    pub fn short_id(&self) -> &'static str {
        match self {
            Basin::Global => "gmoc",
            Basin::Atlantic => "amoc",
            Basin::AtlanticArctic => "aamoc",
            Basin::Pacific => "pmoc",
            Basin::IndoPacific => "ipmoc",
            Basin::Indian => "imoc",
        }
    }

    /// Colorbar label for the rendered streamfunction.
    pub fn label(&self) -> &'static str {
        match self {
            Basin::Global => "Global MOC [Sv]",
            Basin::Atlantic => "Atlantic MOC [Sv]",
            Basin::AtlanticArctic => "Arctic-Atlantic MOC [Sv]",
            Basin::Pacific => "Pacific MOC [Sv]",
            Basin::IndoPacific => "Indo-Pacific MOC [Sv]",
            Basin::Indian => "Indo MOC [Sv]",
        }
    }

    pub fn extrema_rule(&self) -> ExtremaRule {
        match self {
            Basin::Global | Basin::Atlantic | Basin::AtlanticArctic => ExtremaRule::AtlanticLike,
            Basin::Pacific | Basin::IndoPacific => ExtremaRule::PacificLike,
            Basin::Indian => ExtremaRule::None,
        }
    }
}

impl fmt::Display for Basin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_id())
    }
}

/// Restricts the mesh to a basin. Returns indices into the node set, or into
/// the element set when `on_elements` is true.
pub trait BasinSelector {
    fn select(&self, mesh: &Mesh, basin: Basin, on_elements: bool) -> Vec<usize>;
}

/// Rough longitude/latitude boxes per basin. Stands in for a proper
/// polygon-based basin mask so the pipeline runs end-to-end; good enough for
/// the open ocean, wrong near Indonesia and Drake Passage.
pub struct BoxBasinSelector;

impl BoxBasinSelector {
    fn contains(basin: Basin, lon: f64, lat: f64) -> bool {
        // normalize to [-180, 180)
        let lon = if lon >= 180.0 { lon - 360.0 } else { lon };
        match basin {
            Basin::Global => true,
            Basin::Atlantic => (-100.0..25.0).contains(&lon) && (-35.0..65.0).contains(&lat),
            Basin::AtlanticArctic => {
                lat >= 65.0 || ((-100.0..25.0).contains(&lon) && (-35.0..65.0).contains(&lat))
            }
            Basin::Pacific => {
                (!(-70.0..115.0).contains(&lon)) && (-35.0..65.0).contains(&lat)
            }
            Basin::IndoPacific => {
                (!(-70.0..25.0).contains(&lon)) && (-35.0..65.0).contains(&lat)
            }
            Basin::Indian => (25.0..115.0).contains(&lon) && (-35.0..25.0).contains(&lat),
        }
    }
}

impl BasinSelector for BoxBasinSelector {
    fn select(&self, mesh: &Mesh, basin: Basin, on_elements: bool) -> Vec<usize> {
        if on_elements {
            let elat = mesh.elem_lat();
            mesh.elems
                .iter()
                .enumerate()
                .filter(|(ei, e)| {
                    let elon = (mesh.lon[e[0]] + mesh.lon[e[1]] + mesh.lon[e[2]]) / 3.0;
                    Self::contains(basin, elon, elat[*ei])
                })
                .map(|(ei, _)| ei)
                .collect()
        } else {
            (0..mesh.n_nodes())
                .filter(|&ni| Self::contains(basin, mesh.lon[ni], mesh.lat[ni]))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basin_ids_round_trip() {
        for id in ["gmoc", "amoc", "aamoc", "pmoc", "ipmoc", "imoc"] {
            let basin: Basin = id.parse().unwrap();
            assert_eq!(basin.short_id(), id);
        }
        assert!("nmoc".parse::<Basin>().is_err());
    }

    #[test]
    fn test_extrema_rule_classes() {
        assert_eq!(Basin::Atlantic.extrema_rule(), ExtremaRule::AtlanticLike);
        assert_eq!(Basin::Global.extrema_rule(), ExtremaRule::AtlanticLike);
        assert_eq!(Basin::IndoPacific.extrema_rule(), ExtremaRule::PacificLike);
        assert_eq!(Basin::Indian.extrema_rule(), ExtremaRule::None);
    }

    #[test]
    fn test_box_selector_separates_atlantic_and_pacific() {
        // mid Atlantic vs mid Pacific
        assert!(BoxBasinSelector::contains(Basin::Atlantic, -30.0, 20.0));
        assert!(!BoxBasinSelector::contains(Basin::Atlantic, -150.0, 20.0));
        assert!(BoxBasinSelector::contains(Basin::Pacific, -150.0, 20.0));
        assert!(BoxBasinSelector::contains(Basin::Pacific, 160.0, 20.0));
        assert!(!BoxBasinSelector::contains(Basin::Pacific, -30.0, 20.0));
    }

    #[test]
    fn test_deserialize_from_short_id() {
        let basin: Basin = serde_json::from_str("\"ipmoc\"").unwrap();
        assert_eq!(basin, Basin::IndoPacific);
    }
}
