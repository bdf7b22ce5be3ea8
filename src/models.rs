use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub data_source_mode: DataSourceMode,
    pub data_directory: Option<String>,
    pub cutoff_urls: Option<Vec<String>>,
    pub placement_urls: Option<Vec<String>>,
    pub output_directory: Option<String>,
    #[serde(default)]
    pub prediction: PredictionSettings,
    #[serde(default)]
    pub placements: PlacementSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
    #[serde(rename = "both")]
    Both,
}

impl DataSourceMode {
    pub fn uses_local(self) -> bool {
        matches!(self, DataSourceMode::Local | DataSourceMode::Both)
    }

    pub fn uses_internet(self) -> bool {
        matches!(self, DataSourceMode::Internet | DataSourceMode::Both)
    }
}

/// Heuristic knobs for cutoff projection. None of these are derived from a
/// statistical model; they are trend-smoothing guesses kept overridable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionSettings {
    /// Ranks within this distance past the projected cutoff are borderline.
    pub borderline_window: u32,
    /// Share of the year-on-year rise added to the latest cutoff.
    pub increase_factor: f64,
    /// Share of the year-on-year fall removed from the latest cutoff.
    pub decrease_factor: f64,
    /// Added to a cutoff that is only known for the older year.
    pub older_year_buffer: u32,
    /// Institutions listed first in eligible/borderline results, in this order.
    pub priority_institutions: Vec<String>,
    /// Programs offered to Commerce-stream applicants instead of cutoff matching.
    pub commerce_programs: Vec<String>,
    /// Programs suggested when no engineering offering is within reach.
    pub alternative_programs: Vec<String>,
}

pub const DEFAULT_BORDERLINE_WINDOW: u32 = 2000;
pub const DEFAULT_INCREASE_FACTOR: f64 = 0.5;
pub const DEFAULT_DECREASE_FACTOR: f64 = 0.3;
pub const DEFAULT_OLDER_YEAR_BUFFER: u32 = 1500;
/// Rough size of one graduating batch; placement rate is an estimate against it.
pub const DEFAULT_ASSUMED_BATCH_SIZE: u32 = 120;

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            borderline_window: DEFAULT_BORDERLINE_WINDOW,
            increase_factor: DEFAULT_INCREASE_FACTOR,
            decrease_factor: DEFAULT_DECREASE_FACTOR,
            older_year_buffer: DEFAULT_OLDER_YEAR_BUFFER,
            priority_institutions: Vec::new(),
            commerce_programs: vec![
                "B.Com".to_string(),
                "BBA".to_string(),
                "BCA".to_string(),
                "B.Sc. (IT)".to_string(),
            ],
            alternative_programs: vec![
                "B.Sc.".to_string(),
                "BCA".to_string(),
                "Diploma in Engineering".to_string(),
                "BBA".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlacementSettings {
    pub assumed_batch_size: u32,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            assumed_batch_size: DEFAULT_ASSUMED_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_source_mode: DataSourceMode::Local,
            data_directory: Some("data".to_string()),
            cutoff_urls: Some(vec!["https://example.com/cutoffs.json".to_string()]),
            placement_urls: Some(vec!["https://example.com/placements.json".to_string()]),
            output_directory: Some("output".to_string()),
            prediction: PredictionSettings::default(),
            placements: PlacementSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config: {}", file_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", file_path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)
            .with_context(|| format!("Failed to write config: {}", file_path.display()))?;
        Ok(())
    }

    pub fn data_directory(&self) -> &str {
        self.data_directory.as_deref().unwrap_or("data")
    }

    pub fn output_directory(&self) -> &str {
        self.output_directory.as_deref().unwrap_or("output")
    }

    pub fn validate(&self) -> Result<(), DataError> {
        let prediction = &self.prediction;
        if prediction.borderline_window == 0 {
            return Err(DataError::InvalidSetting {
                name: "prediction.borderline_window",
                message: "must be positive".to_string(),
            });
        }
        for (name, value) in [
            ("prediction.increase_factor", prediction.increase_factor),
            ("prediction.decrease_factor", prediction.decrease_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DataError::InvalidSetting {
                    name,
                    message: format!("must be a non-negative number, got {value}"),
                });
            }
        }
        if self.placements.assumed_batch_size == 0 {
            return Err(DataError::InvalidSetting {
                name: "placements.assumed_batch_size",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Reservation category partitioning the cutoff tables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    #[serde(alias = "open", alias = "Open")]
    Open,
    #[serde(alias = "ews", alias = "Ews")]
    Ews,
    #[serde(alias = "sebc", alias = "Sebc")]
    Sebc,
    #[serde(alias = "sc", alias = "Sc")]
    Sc,
    #[serde(alias = "st", alias = "St")]
    St,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Open,
        Category::Ews,
        Category::Sebc,
        Category::Sc,
        Category::St,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Open => "OPEN",
            Category::Ews => "EWS",
            Category::Sebc => "SEBC",
            Category::Sc => "SC",
            Category::St => "ST",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    #[default]
    Science,
    Commerce,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Science => f.write_str("science"),
            Stream::Commerce => f.write_str("commerce"),
        }
    }
}

impl FromStr for Stream {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "science" => Ok(Stream::Science),
            "commerce" => Ok(Stream::Commerce),
            _ => Err(ValidationError::UnknownStream(s.to_string())),
        }
    }
}

/// One row of the admission cutoff reference data. A missing `cutoff`
/// means no seat was offered that year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutoffRecord {
    pub institution: String,
    pub program: String,
    pub category: Category,
    pub year: u16,
    #[serde(default)]
    pub cutoff: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompanyPlacement {
    pub company: String,
    pub offers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementYearRecord {
    pub year: String,
    pub companies: Vec<CompanyPlacement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("open".parse::<Category>().unwrap(), Category::Open);
        assert_eq!(" Sebc ".parse::<Category>().unwrap(), Category::Sebc);
        assert_eq!(
            "OBC".parse::<Category>(),
            Err(ValidationError::UnknownCategory("OBC".to_string()))
        );
    }

    #[test]
    fn stream_rejects_unknown_values() {
        assert_eq!("Commerce".parse::<Stream>().unwrap(), Stream::Commerce);
        assert!("arts".parse::<Stream>().is_err());
    }

    #[test]
    fn default_config_survives_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            data_source_mode = "local"
            data_directory = "fixtures"

            [prediction]
            borderline_window = 1500
            priority_institutions = ["LDCE"]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.prediction.borderline_window, 1500);
        assert_eq!(parsed.prediction.decrease_factor, DEFAULT_DECREASE_FACTOR);
        assert_eq!(parsed.placements.assumed_batch_size, DEFAULT_ASSUMED_BATCH_SIZE);
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.output_directory(), "output");
    }

    #[test]
    fn validation_rejects_zero_window() {
        let mut config = Config::default();
        config.prediction.borderline_window = 0;
        assert!(matches!(
            config.validate(),
            Err(DataError::InvalidSetting { name: "prediction.borderline_window", .. })
        ));
    }
}
