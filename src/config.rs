use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the HCAL rec-hit monitor.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Event collection labels.
    #[serde(default)]
    pub input: InputConfig,

    /// Emit per-hit debug records. Default: false.
    #[serde(default)]
    pub debug: bool,

    /// Book the high-resolution vs-ring distributions. Default: false.
    #[serde(default)]
    pub fine_binning: bool,

    /// Root histogram folder. Default: "RecoMETV/METTask/RecHits/HCAL".
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Export artifact configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Labels of the three rec-hit collections looked up in each event.
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// Combined barrel + endcap collection. Default: "hbhereco".
    #[serde(default = "default_hbhe_label")]
    pub hbhe_label: String,

    /// Outer collection. Default: "horeco".
    #[serde(default = "default_ho_label")]
    pub ho_label: String,

    /// Forward collection. Default: "hfreco".
    #[serde(default = "default_hf_label")]
    pub hf_label: String,
}

/// Export artifact configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Output file. Default: "hcal_rechits.json".
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Encoding of the output file. Default: json.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_folder() -> String {
    "RecoMETV/METTask/RecHits/HCAL".to_string()
}

fn default_hbhe_label() -> String {
    "hbhereco".to_string()
}

fn default_ho_label() -> String {
    "horeco".to_string()
}

fn default_hf_label() -> String {
    "hfreco".to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("hcal_rechits.json")
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            input: InputConfig::default(),
            debug: false,
            fine_binning: false,
            folder: default_folder(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            hbhe_label: default_hbhe_label(),
            ho_label: default_ho_label(),
            hf_label: default_hf_label(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::default(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.folder.trim().is_empty() {
            bail!("folder must not be empty");
        }

        let labels = [
            ("input.hbhe_label", &self.input.hbhe_label),
            ("input.ho_label", &self.input.ho_label),
            ("input.hf_label", &self.input.hf_label),
        ];

        let mut seen = HashSet::new();
        for (field, label) in labels {
            if label.is_empty() {
                bail!("{field} is required");
            }
            if !seen.insert(label.as_str()) {
                bail!("{field} duplicates another collection label: {label}");
            }
        }

        if self.output.path.as_os_str().is_empty() {
            bail!("output.path is required");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.folder, "RecoMETV/METTask/RecHits/HCAL");
        assert_eq!(cfg.input.hbhe_label, "hbhereco");
        assert_eq!(cfg.input.ho_label, "horeco");
        assert_eq!(cfg.input.hf_label, "hfreco");
        assert!(!cfg.debug);
        assert!(!cfg.fine_binning);
        assert_eq!(cfg.output.format, OutputFormat::Json);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml_uses_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "fine_binning: true\ninput:\n  ho_label: hoCustom\noutput:\n  format: yaml\n",
        )
        .expect("parse");
        assert!(cfg.fine_binning);
        assert_eq!(cfg.input.ho_label, "hoCustom");
        assert_eq!(cfg.input.hbhe_label, "hbhereco");
        assert_eq!(cfg.output.format, OutputFormat::Yaml);
        assert_eq!(cfg.output.path, PathBuf::from("hcal_rechits.json"));
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        let res: std::result::Result<Config, _> = serde_yaml::from_str("output:\n  format: root\n");
        assert!(res.is_err());
    }

    #[test]
    fn test_validation_empty_label() {
        let mut cfg = Config::default();
        cfg.input.hf_label = String::new();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("input.hf_label"));
    }

    #[test]
    fn test_validation_duplicate_labels() {
        let mut cfg = Config::default();
        cfg.input.ho_label = cfg.input.hbhe_label.clone();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("duplicates"));
    }

    #[test]
    fn test_validation_empty_folder() {
        let cfg = Config {
            folder: "  ".to_string(),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("folder"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hcalmon.yaml");
        std::fs::write(&path, "debug: true\nfolder: Test/HCAL\n").expect("write");

        let cfg = Config::load(&path).expect("load");
        assert!(cfg.debug);
        assert_eq!(cfg.folder, "Test/HCAL");
    }

    #[test]
    fn test_load_missing_file_has_context() {
        let err = Config::load(Path::new("/nonexistent/hcalmon.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("reading config file"));
    }
}
