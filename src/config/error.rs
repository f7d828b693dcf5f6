use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    BinWidth(f64),
    NoRuns,
    /// The per-run mesh diag file could not be located after exhausting the
    /// documented fallback paths. Fatal; no computation proceeds.
    AreaWeightFileNotFound { runid: String, searched: Vec<PathBuf> },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse JSON: {}", e),
            ConfigError::BinWidth(dlat) => {
                write!(f, "latitude bin width must be > 0, got {}", dlat)
            }
            ConfigError::NoRuns => write!(f, "config lists no runs"),
            ConfigError::AreaWeightFileNotFound { runid, searched } => {
                write!(f, "area weight file not found for run {:?}, searched:", runid)?;
                for path in searched {
                    write!(f, " {}", path.display())?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> ConfigError {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> ConfigError {
        ConfigError::Json(err)
    }
}
