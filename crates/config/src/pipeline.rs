// Pipeline configuration
// Loaded from a TOML file, by default ~/.config/gamba/pipeline.toml

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    Read { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    Parse(String),
    /// Semantically invalid config (zero image size, empty prefix, ...).
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "cannot read config {}: {message}", path.display())
            }
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::Validation(msg) => write!(f, "config validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Root of the working tree (INFERENCE/, AREAS/, RESULTS/ live under it).
    pub base_dir: PathBuf,
    /// Restrict processing to one campaign year.
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub paths: PathOverrides,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub formats: FormatConfig,
}

/// Optional directory / file overrides. Relative paths resolve against `base_dir`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathOverrides {
    pub inference_dir: Option<PathBuf>,
    pub areas_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub ledger_file: Option<PathBuf>,
    pub metadata_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    pub image_width: u32,
    pub image_height: u32,
    /// Only label files whose name starts with this prefix are read.
    pub prefix: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            image_width: 640,
            image_height: 640,
            prefix: "OPMM_Subasta_".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaReportFormat {
    /// `Imagen:` / `Identificador:` blocks
    #[default]
    Text,
    /// headerless `class_id,area,image_name` rows
    Csv,
}

impl AreaReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub area_report: AreaReportFormat,
    pub metadata_has_header: bool,
}

/// Every directory and file the pipeline touches, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub inference_dir: PathBuf,
    pub areas_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub results_dir: PathBuf,
    pub ledger_file: PathBuf,
    pub metadata_file: PathBuf,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Config with every default, rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            year: None,
            paths: PathOverrides::default(),
            labels: LabelConfig::default(),
            formats: FormatConfig::default(),
        }
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Default config file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gamba")
            .join("pipeline.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("base_dir must not be empty".into()));
        }
        if self.labels.image_width == 0 || self.labels.image_height == 0 {
            return Err(ConfigError::Validation(format!(
                "image size must be positive, got {}x{}",
                self.labels.image_width, self.labels.image_height
            )));
        }
        if self.labels.prefix.is_empty() {
            return Err(ConfigError::Validation("labels.prefix must not be empty".into()));
        }
        if let Some(year) = self.year {
            if !(1900..=9999).contains(&year) {
                return Err(ConfigError::Validation(format!("year out of range: {year}")));
            }
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn paths(&self) -> ResolvedPaths {
        let p = &self.paths;
        let over = |o: &Option<PathBuf>, default: PathBuf| match o {
            Some(path) => self.resolve(path),
            None => default,
        };

        let inference_dir = over(&p.inference_dir, self.base_dir.join("INFERENCE"));
        let areas_dir = over(&p.areas_dir, self.base_dir.join("AREAS"));
        let temp_dir = over(&p.temp_dir, areas_dir.join("TEMP"));
        let results_dir = over(&p.results_dir, self.base_dir.join("RESULTS"));
        let ledger_name = match self.year {
            Some(year) => format!("ARA_{year}.csv"),
            None => "ARA.csv".to_string(),
        };
        let ledger_file = over(&p.ledger_file, results_dir.join(ledger_name));
        let metadata_file = over(
            &p.metadata_file,
            inference_dir.join("resultados_metadatos.txt"),
        );

        ResolvedPaths {
            inference_dir,
            areas_dir,
            temp_dir,
            results_dir,
            ledger_file,
            metadata_file,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
