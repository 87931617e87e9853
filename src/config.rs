use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::azure::{ServiceEndpoints, DEFAULT_TIMEOUT_SECS};

/// Configuration file structure for BuildLens.
///
/// Holds the Azure DevOps connection settings and output preferences so they
/// don't need to be repeated on every run. Command-line flags and environment
/// variables take precedence over file values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Azure DevOps connection settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceConfig {
    /// Azure DevOps personal access token
    pub token: Option<String>,

    /// Build API host
    #[serde(default = "default_build_url")]
    pub build_url: String,

    /// Release Management API host
    #[serde(default = "default_release_url")]
    pub release_url: String,

    /// Collection (or organisation) name
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Team project id (GUID) or name
    pub project_id: Option<String>,

    /// Display name of the team project
    pub project_name: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token: None,
            build_url: default_build_url(),
            release_url: default_release_url(),
            collection: default_collection(),
            project_id: None,
            project_name: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn endpoints(&self) -> ServiceEndpoints {
        ServiceEndpoints {
            build_url: self.build_url.clone(),
            release_url: self.release_url.clone(),
            collection: self.collection.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

fn default_build_url() -> String {
    "https://dev.azure.com".to_string()
}

fn default_release_url() -> String {
    "https://vsrm.dev.azure.com".to_string()
}

fn default_collection() -> String {
    "DefaultCollection".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("buildlens").join("config.toml"))
}

impl Config {
    /// Reads `path` when given, otherwise the first of `./buildlens.{toml,json,yaml,yml}`
    /// and `<user config dir>/buildlens/config.toml` that exists.
    ///
    /// Falls back to defaults when no file is found. Files with an unknown extension
    /// are tried as TOML, JSON and then YAML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["buildlens.toml", "buildlens.json", "buildlens.yaml", "buildlens.yml"]
            .iter()
            .map(PathBuf::from)
            .chain(user_config_file());

        for candidate in candidates {
            if candidate.exists() {
                return Self::load_from_path(&candidate);
            }
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.service.timeout_secs == 0 {
            anyhow::bail!("service.timeout-secs must be at least 1");
        }
        Ok(())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let formats = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => &[FileFormat::Toml][..],
            Some("json") => &[FileFormat::Json][..],
            Some("yaml" | "yml") => &[FileFormat::Yaml][..],
            _ => &[FileFormat::Toml, FileFormat::Json, FileFormat::Yaml][..],
        };

        let mut last_error = None;
        for format in formats {
            match format.parse(&contents) {
                Ok(config) => {
                    config
                        .validate()
                        .with_context(|| format!("Invalid config file: {}", path.display()))?;
                    return Ok(config);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("no parser for config file"))
            .context(format!("Failed to parse config file: {}", path.display())))
    }
}

#[derive(Debug, Clone, Copy)]
enum FileFormat {
    Toml,
    Json,
    Yaml,
}

impl FileFormat {
    fn parse(self, contents: &str) -> Result<Config> {
        Ok(match self {
            Self::Toml => toml::from_str(contents)?,
            Self::Json => serde_json::from_str(contents)?,
            Self::Yaml => serde_yaml::from_str(contents)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.build_url, "https://dev.azure.com");
        assert_eq!(config.service.release_url, "https://vsrm.dev.azure.com");
        assert_eq!(config.service.collection, "DefaultCollection");
        assert_eq!(config.service.timeout_secs, 30);
        assert!(config.service.token.is_none());
        assert_eq!(config.output.format, OutputFormat::Summary);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[service]
token = "pat-test-token"
build-url = "https://devdiv.visualstudio.com"
release-url = "https://devdiv.vsrm.visualstudio.com"
project-id = "0bdbc590-a062-4c3f-b0f6-9383f67865ee"
timeout-secs = 10

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.service.token, Some("pat-test-token".to_string()));
        assert_eq!(config.service.build_url, "https://devdiv.visualstudio.com");
        assert_eq!(
            config.service.project_id.as_deref(),
            Some("0bdbc590-a062-4c3f-b0f6-9383f67865ee")
        );
        assert_eq!(config.service.collection, "DefaultCollection");
        assert_eq!(config.service.timeout_secs, 10);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "service": {
    "token": "pat-json-token",
    "collection": "Contoso"
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.service.token, Some("pat-json-token".to_string()));
        assert_eq!(config.service.collection, "Contoso");
        assert_eq!(config.service.build_url, "https://dev.azure.com");
    }

    #[test]
    fn test_load_yaml_config_without_extension() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "service:\n  project-name: DevDiv\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.service.project_name.as_deref(), Some("DevDiv"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[service]\ntimeout-secs = 0\n").unwrap();

        let err = Config::load(Some(temp_file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("timeout-secs"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("does-not-exist.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoints_from_service_config() {
        let service = ServiceConfig {
            timeout_secs: 3,
            ..ServiceConfig::default()
        };
        let endpoints = service.endpoints();
        assert_eq!(endpoints.timeout, Duration::from_secs(3));
        assert_eq!(endpoints.collection, "DefaultCollection");
    }
}
