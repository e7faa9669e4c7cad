//! Solver configuration.
//!
//! Loaded from a TOML file when one is found, otherwise built from defaults.
//! A handful of `TILESOLVER_*` environment variables override the file so a
//! caller can tune thresholds without editing config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name prefer searches for, e.g. `tilesolver.toml` in the working directory
/// or `~/.config/tilesolver/`.
pub const CONFIG_NAME: &str = "tilesolver";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// How fallback tiles are chosen when no tile matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Uniform random sample over the whole index range.
    #[default]
    Random,
    /// The lowest indices, for reproducible runs.
    LowestIndex,
}

impl FallbackPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackPolicy::Random => "random",
            FallbackPolicy::LowestIndex => "lowest-index",
        }
    }
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "random" => Ok(FallbackPolicy::Random),
            "lowest-index" | "lowest" => Ok(FallbackPolicy::LowestIndex),
            _ => Err(format!(
                "Invalid fallback policy '{}'. Valid options: random, lowest-index",
                s
            )),
        }
    }
}

/// Fallback selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default)]
    pub policy: FallbackPolicy,

    /// Upper bound on the number of guessed tiles.
    #[serde(default = "default_max_picks")]
    pub max_picks: usize,

    /// Fixed RNG seed for the random policy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            policy: FallbackPolicy::default(),
            max_picks: default_max_picks(),
            seed: None,
        }
    }
}

/// Tesseract command-line settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Language passed with `-l`.
    #[serde(default = "default_language")]
    pub language: String,

    /// Page segmentation modes run on every variant.
    #[serde(default = "default_psm_modes")]
    pub psm_modes: Vec<u8>,

    /// Extra page segmentation modes run only in enhanced mode.
    #[serde(default = "default_enhanced_psm_modes")]
    pub enhanced_psm_modes: Vec<u8>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            psm_modes: default_psm_modes(),
            enhanced_psm_modes: default_enhanced_psm_modes(),
        }
    }
}

/// Image preprocessing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default = "default_enhance_factor")]
    pub contrast_factor: f32,

    #[serde(default = "default_enhance_factor")]
    pub sharpness_factor: f32,

    /// Pixels brighter than this become white in the binary variant.
    #[serde(default = "default_binary_cutoff")]
    pub binary_cutoff: u8,

    /// Half-width of the adaptive threshold window (5 gives 11x11).
    #[serde(default = "default_adaptive_block_radius")]
    pub adaptive_block_radius: u32,

    #[serde(default = "default_filter_radius")]
    pub median_radius: u32,

    #[serde(default = "default_filter_radius")]
    pub closing_radius: u8,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            contrast_factor: default_enhance_factor(),
            sharpness_factor: default_enhance_factor(),
            binary_cutoff: default_binary_cutoff(),
            adaptive_block_radius: default_adaptive_block_radius(),
            median_radius: 1,
            closing_radius: 1,
        }
    }
}

/// Top-level solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Engine detections below this confidence are discarded.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Minimum Hamming similarity for a fuzzy match.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Tiles processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per recognizer, per variant time limit.
    #[serde(default = "default_recognizer_timeout_secs")]
    pub recognizer_timeout_secs: u64,

    /// OCR engines to register, in order. Unknown or unavailable names are skipped.
    #[serde(default = "default_recognizers")]
    pub recognizers: Vec<String>,

    /// Register the dark-pixel heuristic after the engines.
    #[serde(default = "default_true")]
    pub heuristic: bool,

    /// Override directory for engine model files.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub tesseract: TesseractConfig,

    #[serde(default)]
    pub preprocess: PreprocessConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            similarity_threshold: default_similarity_threshold(),
            workers: default_workers(),
            recognizer_timeout_secs: default_recognizer_timeout_secs(),
            recognizers: default_recognizers(),
            heuristic: true,
            model_path: None,
            fallback: FallbackConfig::default(),
            tesseract: TesseractConfig::default(),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Load configuration from a specific TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SolverConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Load configuration, apply environment overrides and validate.
    ///
    /// An explicit path wins. Otherwise prefer discovers a `tilesolver.*`
    /// file in the standard locations, and defaults are used when none exists.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::load_from_path(path)?,
            None => match prefer::load(CONFIG_NAME).await {
                Ok(discovered) => match discovered.source_path() {
                    Some(path) => {
                        tracing::debug!("Using config file {}", path.display());
                        Self::load_from_path(path)?
                    }
                    None => Self::default(),
                },
                Err(e) => {
                    tracing::debug!("No config file found ({}), using defaults", e);
                    Self::default()
                }
            },
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TILESOLVER_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_value("TILESOLVER_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = parse_env("confidence_threshold", &value)?;
        }
        if let Some(value) = env_value("TILESOLVER_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = parse_env("similarity_threshold", &value)?;
        }
        if let Some(value) = env_value("TILESOLVER_WORKERS") {
            self.workers = parse_env("workers", &value)?;
        }
        if let Some(value) = env_value("TILESOLVER_FALLBACK_POLICY") {
            self.fallback.policy = value.parse().map_err(|reason| ConfigError::Invalid {
                key: "fallback.policy",
                reason,
            })?;
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_range("confidence_threshold", self.confidence_threshold)?;
        check_unit_range("similarity_threshold", self.similarity_threshold)?;
        if self.workers == 0 {
            return Err(ConfigError::Invalid {
                key: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.recognizer_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "recognizer_timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.fallback.max_picks == 0 {
            return Err(ConfigError::Invalid {
                key: "fallback.max_picks",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn recognizer_timeout(&self) -> Duration {
        Duration::from_secs(self.recognizer_timeout_secs)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn check_unit_range(key: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            reason: format!("{} is outside 0.0..=1.0", value),
        })
    }
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_similarity_threshold() -> f32 {
    0.8
}

fn default_workers() -> usize {
    4
}

fn default_recognizer_timeout_secs() -> u64 {
    10
}

fn default_recognizers() -> Vec<String> {
    vec![
        "tesseract".to_string(),
        "paddle".to_string(),
        "ocrs".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_max_picks() -> usize {
    3
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_psm_modes() -> Vec<u8> {
    vec![8, 7, 6, 13]
}

fn default_enhanced_psm_modes() -> Vec<u8> {
    vec![10, 11]
}

fn default_enhance_factor() -> f32 {
    2.0
}

fn default_binary_cutoff() -> u8 {
    127
}

fn default_adaptive_block_radius() -> u32 {
    5
}

fn default_filter_radius<T: From<u8>>() -> T {
    T::from(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.fallback.max_picks, 3);
        assert_eq!(config.fallback.policy, FallbackPolicy::Random);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "similarity_threshold = 0.75\n\n[fallback]\npolicy = \"lowest-index\"\nseed = 7"
        )
        .unwrap();

        let config = SolverConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.similarity_threshold, 0.75);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.fallback.policy, FallbackPolicy::LowestIndex);
        assert_eq!(config.fallback.seed, Some(7));
        assert_eq!(config.fallback.max_picks, 3);
        assert_eq!(config.tesseract.psm_modes, vec![8, 7, 6, 13]);
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = \"many\"").unwrap();

        let err = SolverConfig::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_load_explicit_path_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 2\nconfidence_threshold = 0.6").unwrap();
        let config = SolverConfig::load(Some(file.path())).await.unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.confidence_threshold, 0.6);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "confidence_threshold = 3.0").unwrap();
        let err = SolverConfig::load(Some(bad.path())).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "confidence_threshold", .. }));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = SolverConfig {
            similarity_threshold: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SolverConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fallback_policy_from_str() {
        assert_eq!(
            "lowest_index".parse::<FallbackPolicy>().unwrap(),
            FallbackPolicy::LowestIndex
        );
        assert_eq!("Random".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::Random);
        assert!("coin-flip".parse::<FallbackPolicy>().is_err());
    }
}
