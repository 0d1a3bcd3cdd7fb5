use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-odb.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub visit_subject: Option<String>,
    #[serde(default)]
    pub abundance_subject: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub kegg_peaks: Option<Vec<String>>,
    #[serde(default)]
    pub plot_path: Option<PathBuf>,
}

/// Parameters of the fixed queries; the defaults reproduce the standard cohort report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    pub visit_subject: String,
    pub abundance_subject: String,
    pub transcript: String,
    pub kegg_peaks: Vec<String>,
    pub plot_path: PathBuf,
}

impl Default for QueryConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `kira-odb.json` in the current directory when no path is
    /// given. Only an explicitly named file is required to exist.
    pub fn resolve(path: Option<&str>) -> Result<QueryConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(QueryConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        tracing::debug!(path = %config_path.display(), "loaded query config");
        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> QueryConfig {
        QueryConfig {
            visit_subject: config
                .visit_subject
                .unwrap_or_else(|| "ZNQOVZV".to_string()),
            abundance_subject: config
                .abundance_subject
                .unwrap_or_else(|| "ZOZOW1T".to_string()),
            transcript: config.transcript.unwrap_or_else(|| "A1BG".to_string()),
            kegg_peaks: config.kegg_peaks.unwrap_or_else(default_kegg_peaks),
            plot_path: config
                .plot_path
                .unwrap_or_else(|| PathBuf::from("age_vs_bmi_scatterplot.svg")),
        }
    }
}

pub fn default_kegg_peaks() -> Vec<String> {
    vec![
        "nHILIC_121.0505_3.5".to_string(),
        "nHILIC_130.0872_6.3".to_string(),
        "nHILIC_133.0506_2.3".to_string(),
        "nHILIC_133.0506_4.4".to_string(),
    ]
}
