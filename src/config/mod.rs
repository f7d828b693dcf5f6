use crate::basin::Basin;

use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub mod error;
pub use error::ConfigError;

#[derive(Debug, Deserialize, Clone)]
pub struct Run {
    pub name: String,
    pub runid: String,
    pub datapath: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    mesh_path: PathBuf,
    runs: Vec<Run>,
    which_moc: Basin,
    dlat: f64,
    on_elements: bool,
    do_info: bool,
    cycles: Option<u32>,
    do_concat: bool,
    reference_series: Option<PathBuf>,
    save_path: Option<PathBuf>,
    save_dpi: u32,
}

// Deserializes a Config, applying defaults and rejecting values the
// numeric pipeline cannot work with (non-positive bin width, empty run
// list).
impl<'de> Deserialize<'de> for Config {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            mesh_path: PathBuf,
            runs: Vec<Run>,
            which_moc: Basin,
            dlat: Option<f64>,
            on_elements: Option<bool>,
            do_info: Option<bool>,
            cycles: Option<u32>,
            do_concat: Option<bool>,
            reference_series: Option<PathBuf>,
            save_path: Option<PathBuf>,
            save_dpi: Option<u32>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let dlat = helper.dlat.unwrap_or(1.0);
        if !(dlat > 0.0) {
            return Err(D::Error::custom(ConfigError::BinWidth(dlat)));
        }

        if helper.runs.is_empty() {
            return Err(D::Error::custom(ConfigError::NoRuns));
        }

        Ok(Config {
            mesh_path: helper.mesh_path,
            runs: helper.runs,
            which_moc: helper.which_moc,
            dlat,
            on_elements: helper.on_elements.unwrap_or(false),
            do_info: helper.do_info.unwrap_or(true),
            cycles: helper.cycles,
            do_concat: helper.do_concat.unwrap_or(false),
            reference_series: helper.reference_series,
            save_path: helper.save_path,
            save_dpi: helper.save_dpi.unwrap_or(600),
        })
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: Config = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn mesh_path(&self) -> &Path {
        &self.mesh_path
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn which_moc(&self) -> Basin {
        self.which_moc
    }

    pub fn dlat(&self) -> f64 {
        self.dlat
    }

    pub fn on_elements(&self) -> bool {
        self.on_elements
    }

    pub fn do_info(&self) -> bool {
        self.do_info
    }

    pub fn cycles(&self) -> Option<u32> {
        self.cycles
    }

    pub fn do_concat(&self) -> bool {
        self.do_concat
    }

    pub fn reference_series(&self) -> Option<&Path> {
        self.reference_series.as_deref()
    }

    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    pub fn save_dpi(&self) -> u32 {
        self.save_dpi
    }
}
