//! Configuration types for the hyperspectral clustering pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors produced by configuration validation.
///
/// All of these are fatal and surfaced before any cube data is loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {role} worker count {value}: must be at least 1")]
    InvalidWorkerCount { role: &'static str, value: usize },

    #[error("data usage selector {0} out of range: expected 1..=4")]
    InvalidDataUsage(u32),

    #[error("invalid cluster count {0}: must be at least 2")]
    InvalidClusterCount(usize),

    #[error("invalid iteration budget {0}: must be at least 1")]
    InvalidIterations(usize),

    #[error("display band index {index} out of range for {bands} bands")]
    InvalidBandIndex { index: usize, bands: usize },
}

/// Configuration for the raw data cube geometry and cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeConfig {
    /// Number of samples (columns) per line
    #[serde(default = "default_samples")]
    pub samples: usize,

    /// Number of lines (rows) in the full cube
    #[serde(default = "default_lines")]
    pub lines: usize,

    /// Number of spectral bands per pixel
    #[serde(default = "default_bands")]
    pub bands: usize,

    /// Invalid-sample marker replaced with 0 during load
    #[serde(default = "default_sentinel")]
    pub sentinel: f32,

    /// Band index nearest the visible-red wavelength (~667.5nm)
    #[serde(default = "default_red_band")]
    pub red_band: usize,

    /// Band index nearest the visible-green wavelength (~540nm)
    #[serde(default = "default_green_band")]
    pub green_band: usize,

    /// Band index nearest the visible-blue wavelength (~470nm)
    #[serde(default = "default_blue_band")]
    pub blue_band: usize,

    /// Data fraction selector in 1..=4; each step below 4 halves the lines loaded
    #[serde(default = "default_data_usage")]
    pub data_usage: u32,
}

fn default_samples() -> usize {
    637
}

fn default_lines() -> usize {
    4207
}

fn default_bands() -> usize {
    425
}

fn default_sentinel() -> f32 {
    -9999.0
}

fn default_red_band() -> usize {
    57
}

fn default_green_band() -> usize {
    32
}

fn default_blue_band() -> usize {
    18
}

fn default_data_usage() -> u32 {
    1
}

impl Default for CubeConfig {
    fn default() -> Self {
        Self {
            samples: default_samples(),
            lines: default_lines(),
            bands: default_bands(),
            sentinel: default_sentinel(),
            red_band: default_red_band(),
            green_band: default_green_band(),
            blue_band: default_blue_band(),
            data_usage: default_data_usage(),
        }
    }
}

impl CubeConfig {
    /// Number of lines actually loaded after applying the data usage selector.
    ///
    /// Selectors above 4 behave like 4 (the full cube); `validate()` still
    /// rejects them before a pipeline run starts.
    pub fn lines_loaded(&self) -> usize {
        self.lines / 2usize.pow(4u32.saturating_sub(self.data_usage))
    }

    /// Total number of float samples expected from the source stream.
    pub fn num_values(&self) -> usize {
        self.samples * self.lines_loaded() * self.bands
    }
}

/// Configuration for one K-means run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    /// Number of clusters, or the maximum K when searching
    #[serde(default = "default_num_clusters")]
    pub num_clusters: usize,

    /// Fixed iteration budget (no convergence early-exit)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_num_clusters() -> usize {
    10
}

fn default_max_iterations() -> usize {
    10
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            num_clusters: default_num_clusters(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Configuration for the two-level worker pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of K values clustered concurrently
    #[serde(default = "default_search_threads")]
    pub search_threads: usize,

    /// Number of per-pixel workers within one K-means instance
    #[serde(default = "default_kmeans_threads")]
    pub kmeans_threads: usize,
}

fn default_search_threads() -> usize {
    1
}

fn default_kmeans_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            search_threads: default_search_threads(),
            kmeans_threads: default_kmeans_threads(),
        }
    }
}

/// Toggles for the optional result outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Write the final assignment map to CSV
    #[serde(default)]
    pub write_assignments: bool,

    /// Write the per-K timing log
    #[serde(default)]
    pub write_timing: bool,

    /// Render the final cluster map to PNG
    #[serde(default)]
    pub render_clusters: bool,
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub cube: CubeConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub display: DisplayConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check all values the clustering core depends on.
    ///
    /// Fails before any data is read: worker counts below 1, a data usage
    /// selector outside 1..=4, fewer than 2 clusters, an empty iteration
    /// budget, or display band indices outside the cube depth.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.search_threads < 1 {
            return Err(ConfigError::InvalidWorkerCount {
                role: "search",
                value: self.scheduler.search_threads,
            });
        }
        if self.scheduler.kmeans_threads < 1 {
            return Err(ConfigError::InvalidWorkerCount {
                role: "kmeans",
                value: self.scheduler.kmeans_threads,
            });
        }
        if self.cube.data_usage < 1 || self.cube.data_usage > 4 {
            return Err(ConfigError::InvalidDataUsage(self.cube.data_usage));
        }
        if self.clustering.num_clusters < 2 {
            return Err(ConfigError::InvalidClusterCount(
                self.clustering.num_clusters,
            ));
        }
        if self.clustering.max_iterations < 1 {
            return Err(ConfigError::InvalidIterations(
                self.clustering.max_iterations,
            ));
        }
        for index in [
            self.cube.red_band,
            self.cube.green_band,
            self.cube.blue_band,
        ] {
            if index >= self.cube.bands {
                return Err(ConfigError::InvalidBandIndex {
                    index,
                    bands: self.cube.bands,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cube_config() {
        let config = CubeConfig::default();
        assert_eq!(config.samples, 637);
        assert_eq!(config.bands, 425);
        assert_eq!(config.sentinel, -9999.0);
        assert_eq!(config.red_band, 57);
    }

    #[test]
    fn test_lines_loaded_halves_per_step() {
        let mut config = CubeConfig {
            lines: 4000,
            ..CubeConfig::default()
        };

        config.data_usage = 4;
        assert_eq!(config.lines_loaded(), 4000);
        config.data_usage = 3;
        assert_eq!(config.lines_loaded(), 2000);
        config.data_usage = 2;
        assert_eq!(config.lines_loaded(), 1000);
        config.data_usage = 1;
        assert_eq!(config.lines_loaded(), 500);
    }

    #[test]
    fn test_lines_loaded_saturates_above_full_usage() {
        // An out-of-range selector must not overflow the exponent; it reads
        // as the full cube and validate() rejects it separately.
        let config = CubeConfig {
            lines: 100,
            data_usage: 9,
            ..CubeConfig::default()
        };
        assert_eq!(config.lines_loaded(), 100);
    }

    #[test]
    fn test_default_pipeline_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = PipelineConfig::default();
        config.scheduler.kmeans_threads = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkerCount { role: "kmeans", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_data_usage() {
        let mut config = PipelineConfig::default();
        config.cube.data_usage = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDataUsage(5))
        ));
    }

    #[test]
    fn test_validate_rejects_band_out_of_range() {
        let mut config = PipelineConfig::default();
        config.cube.bands = 10;
        config.cube.red_band = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBandIndex {
                index: 10,
                bands: 10
            })
        ));
    }
}
