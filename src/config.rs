//! Evaluation driver configuration.
//!
//! One JSON document with the sections the driver consumes. Keys are
//! camelCase:
//!
//! ```json
//! {
//!   "coarseQuantizer": { "numberCentroids": 1000, "maxIterations": 50, "seed": 0 },
//!   "productQuantizer": { "numberSubquantizers": 8, "numberCentroids": 256,
//!                          "maxIterations": 50, "seed": 0 },
//!   "ivfadc": { "coarseNeighborsLookup": 8, "nearestNeighbors": 100 },
//!   "datasets": { "trainSet": "sift_learn.fvecs", "baseSet": "sift_base.fvecs",
//!                 "querySet": "sift_query.fvecs", "groundTruth": "sift_gt.ivecs" },
//!   "misc": { "logLevel": "INFO", "recallRs": [1, 10, 100] }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ivfadc::IvfAdcParams;

/// Errors surfaced while loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The whole driver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DriverConfig {
    pub coarse_quantizer: CoarseSection,
    pub product_quantizer: PqSection,
    pub ivfadc: SearchSection,
    pub datasets: DatasetsSection,
    pub misc: MiscSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CoarseSection {
    pub number_centroids: usize,
    pub max_iterations: usize,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PqSection {
    pub number_subquantizers: usize,
    pub number_centroids: usize,
    pub max_iterations: usize,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchSection {
    /// Number of coarse cells probed per query (w).
    pub coarse_neighbors_lookup: usize,
    /// Neighbors returned per query (k).
    pub nearest_neighbors: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasetsSection {
    pub train_set: PathBuf,
    pub base_set: PathBuf,
    pub query_set: PathBuf,
    pub ground_truth: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MiscSection {
    pub log_level: LogLevel,
    /// recall@R cutoffs to report; each must lie in [1, nearestNeighbors].
    pub recall_rs: Vec<usize>,
}

/// Totally ordered log levels, most restrictive first. CRITICAL and FATAL
/// are aliases, as are WARN and WARNING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Critical,
    Fatal,
    Error,
    Warn,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// Map onto the `log` crate's filter; the facade has no fatal level,
    /// so CRITICAL and FATAL collapse into ERROR.
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Critical | LogLevel::Fatal | LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn | LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
        }
    }
}

impl DriverConfig {
    /// Load and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: DriverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.coarse_quantizer.number_centroids < 1
            || self.product_quantizer.number_centroids < 1
            || self.product_quantizer.number_subquantizers < 1
        {
            return Err(ConfigError::Invalid(
                "centroid and subquantizer counts must be >= 1".into(),
            ));
        }
        if self.coarse_quantizer.max_iterations < 1 || self.product_quantizer.max_iterations < 1 {
            return Err(ConfigError::Invalid("maxIterations must be >= 1".into()));
        }
        let k = self.ivfadc.nearest_neighbors;
        if k < 1 {
            return Err(ConfigError::Invalid("nearestNeighbors must be >= 1".into()));
        }
        let w = self.ivfadc.coarse_neighbors_lookup;
        if w < 1 || w > self.coarse_quantizer.number_centroids {
            return Err(ConfigError::Invalid(format!(
                "coarseNeighborsLookup must lie in [1, numberCentroids], was {w}"
            )));
        }
        for &r in &self.misc.recall_rs {
            if r < 1 || r > k {
                return Err(ConfigError::Invalid(format!(
                    "recallRs entries must lie in [1, nearestNeighbors], found {r}"
                )));
            }
        }
        Ok(())
    }

    /// Index construction parameters drawn from the quantizer sections.
    pub fn to_params(&self) -> IvfAdcParams {
        IvfAdcParams {
            coarse_centroids: self.coarse_quantizer.number_centroids,
            coarse_max_iter: self.coarse_quantizer.max_iterations,
            coarse_seed: self.coarse_quantizer.seed,
            pq_subquantizers: self.product_quantizer.number_subquantizers,
            pq_centroids: self.product_quantizer.number_centroids,
            pq_max_iter: self.product_quantizer.max_iterations,
            pq_seed: self.product_quantizer.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> String {
        r#"{
            "coarseQuantizer": { "numberCentroids": 64, "maxIterations": 25, "seed": 7 },
            "productQuantizer": { "numberSubquantizers": 8, "numberCentroids": 256,
                                   "maxIterations": 50, "seed": 3 },
            "ivfadc": { "coarseNeighborsLookup": 8, "nearestNeighbors": 100 },
            "datasets": { "trainSet": "learn.fvecs", "baseSet": "base.fvecs",
                          "querySet": "query.fvecs", "groundTruth": "gt.ivecs" },
            "misc": { "logLevel": "DEBUG", "recallRs": [1, 10, 100] }
        }"#
        .to_string()
    }

    #[test]
    fn parses_camel_case_sections() {
        let config: DriverConfig = serde_json::from_str(&sample_json()).unwrap();
        assert_eq!(config.coarse_quantizer.number_centroids, 64);
        assert_eq!(config.product_quantizer.seed, 3);
        assert_eq!(config.misc.log_level, LogLevel::Debug);
        assert!(config.validate().is_ok());

        let params = config.to_params();
        assert_eq!(params.coarse_centroids, 64);
        assert_eq!(params.pq_subquantizers, 8);
    }

    #[test]
    fn recall_cutoffs_above_k_are_invalid() {
        let text = sample_json().replace("[1, 10, 100]", "[1, 500]");
        let config: DriverConfig = serde_json::from_str(&text).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn lookup_wider_than_cells_is_invalid() {
        let text = sample_json().replace("\"coarseNeighborsLookup\": 8", "\"coarseNeighborsLookup\": 65");
        let config: DriverConfig = serde_json::from_str(&text).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn level_aliases_collapse() {
        assert_eq!(LogLevel::Critical.to_filter(), log::LevelFilter::Error);
        assert_eq!(LogLevel::Fatal.to_filter(), log::LevelFilter::Error);
        assert_eq!(LogLevel::Warning.to_filter(), LogLevel::Warn.to_filter());

        let level: LogLevel = serde_json::from_str("\"WARNING\"").unwrap();
        assert_eq!(level, LogLevel::Warning);
    }
}
