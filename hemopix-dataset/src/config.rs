//! Pipeline configuration loaded from JSON.
//!
//! ```json
//! {
//!   "root": "/data/rsna",
//!   "windows": [[80, 200], [600, 2800]],
//!   "validation_fraction": 0.05,
//!   "seed": 42,
//!   "rotation": "counter_clockwise"
//! }
//! ```
//!
//! Every field is optional.

use crate::error::{Error, Result};
use crate::split::SplitConfig;
use hemopix_core::{Rotation, WindowSpec};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Dataset root, extra windows, split parameters and volume rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset root directory.
    pub root: Option<PathBuf>,
    /// Extra windows as `[center, width]` pairs, in channel order.
    pub windows: Vec<(i32, i32)>,
    /// Fraction of RSNA slices assigned to validation.
    pub validation_fraction: f64,
    /// Split shuffle seed.
    pub seed: u64,
    /// In-plane rotation for 3D volumes.
    pub rotation: Rotation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let split = SplitConfig::default();
        Self {
            root: None,
            windows: Vec::new(),
            validation_fraction: split.validation_fraction,
            seed: split.seed,
            rotation: Rotation::CounterClockwise,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened and [`Error::Config`]
    /// if it is not valid configuration JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(hemopix_io::Error::from)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Loads configuration from a JSON string.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `json` is not valid configuration JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Extra windows, validated.
    ///
    /// # Errors
    /// Returns `InvalidWindow` for a non-positive width.
    pub fn window_specs(&self) -> Result<Vec<WindowSpec>> {
        self.windows
            .iter()
            .map(|&pair| WindowSpec::try_from(pair).map_err(Error::from))
            .collect()
    }

    /// Split parameters.
    #[must_use]
    pub fn split_config(&self) -> SplitConfig {
        SplitConfig::default()
            .with_validation_fraction(self.validation_fraction)
            .with_seed(self.seed)
    }
}
