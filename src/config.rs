//! Configuration
//!
//! Settings shared by every calibration strategy, and json IO for the
//! serializable artifacts of the crate.
use crate::errors::ConformalError;
use crate::quantile::QuantileMethod;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_parallel() -> bool {
    true
}
fn default_median() -> bool {
    true
}

/// Configuration for conformal calibration and prediction.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConformalConfig {
    /// Interpolation rule for every empirical quantile.
    #[serde(default)]
    pub quantile_method: QuantileMethod,
    /// Number of threads for fold fitting. `None` uses every available core.
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Fit folds and predict rows on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Seed for fold shuffling and bootstrap draws.
    #[serde(default)]
    pub seed: u64,
    /// Ask quantile models for the median and use it as the CQR point prediction.
    /// When false the midpoint of the corrected band is used.
    #[serde(default = "default_median")]
    pub cqr_median: bool,
}

impl Default for ConformalConfig {
    fn default() -> Self {
        ConformalConfig {
            quantile_method: QuantileMethod::Linear,
            num_threads: None,
            parallel: true,
            seed: 0,
            cqr_median: true,
        }
    }
}

impl ConformalConfig {
    /// Set the quantile interpolation rule.
    pub fn set_quantile_method(mut self, quantile_method: QuantileMethod) -> Self {
        self.quantile_method = quantile_method;
        self
    }

    /// Set the number of threads.
    /// * `num_threads` - Threads used for fold fitting.
    pub fn set_num_threads(mut self, num_threads: Option<usize>) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set whether work runs on the rayon pool.
    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the seed used for resampling.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set whether CQR uses the model median as point prediction.
    pub fn set_cqr_median(mut self, cqr_median: bool) -> Self {
        self.cqr_median = cqr_median;
        self
    }

    /// Build the thread pool fold fitting runs on.
    pub(crate) fn thread_pool(&self) -> Result<rayon::ThreadPool, ConformalError> {
        let num_threads = match self.num_threads {
            Some(num_threads) => num_threads,
            None => std::thread::available_parallelism().map_or(1, |n| n.get()),
        };
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| ConformalError::InvalidConfiguration(e.to_string()))
    }
}

/// IO
pub trait ConformalIO: Serialize + DeserializeOwned + Sized {
    /// Save as a json object to a file.
    ///
    /// * `path` - Path to save to.
    fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConformalError> {
        fs::write(path, self.json_dump()?).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Dump as a json string.
    fn json_dump(&self) -> Result<String, ConformalError> {
        serde_json::to_string(self).map_err(|e| ConformalError::UnableToWrite(e.to_string()))
    }

    /// Load from a json string.
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, ConformalError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| ConformalError::UnableToRead(e.to_string()))
    }

    /// Load from a path to a json object.
    ///
    /// * `path` - Path to load from.
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConformalError> {
        let json_str = fs::read_to_string(path).map_err(|e| ConformalError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl ConformalIO for ConformalConfig {}
