//! Extractor configuration
//!
//! Reads the YAML file describing which metadata extractors are installed,
//! where their schemas live and which methods each one offers.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default file name looked up next to the executable and in the user config dir
pub const DEFAULT_CONFIG_FILE_NAME: &str = "extmethods-config.yaml";

/// Environment variable that points at a config file
pub const CONFIG_ENV_VAR: &str = "EXTMETHODS_CONFIG";

/// The only checksum algorithm extractors may declare
pub const SUPPORTED_CHECKSUM_ALG: &str = "sha256";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: String, reason: String },

    #[error("no config file found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },
}

/// A single method offered by an extractor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct MethodConfig {
    pub name: String,

    /// Schema file name, relative to `SchemasLocation`
    pub schema: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub name: String,
    pub github_org: String,
    pub github_project: String,
    pub version: String,
    pub executable: String,
    pub checksum: String,
    pub checksum_alg: String,

    /// Arguments passed to the executable, e.g. `-i '{{.SourceFolder}}' -o '{{.OutputFile}}'`
    pub command_line_template: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_parameters: Vec<String>,

    pub methods: Vec<MethodConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default, deny_unknown_fields)]
pub struct ExtractorsConfig {
    pub extractors: Vec<ExtractorConfig>,
    pub installation_path: PathBuf,
    pub schemas_location: PathBuf,
    pub download_missing_extractors: bool,
    pub download_schemas: bool,

    /// Extractor run timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ExtractorConfig {
    /// Full path of the executable below the installation root.
    pub fn install_path(&self, installation_path: &Path) -> PathBuf {
        installation_path
            .join(&self.github_org)
            .join(&self.github_project)
            .join(&self.version)
            .join(&self.executable)
    }
}

impl ExtractorsConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Locate and load the config file.
    ///
    /// An explicit path wins, then `EXTMETHODS_CONFIG`, then the default file
    /// name next to the executable, then the user config directory.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, path.to_path_buf()));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            return Ok((Self::from_file(&path)?, path));
        }

        let searched = candidate_paths();
        match searched.iter().find(|p| p.is_file()) {
            Some(path) => Ok((Self::from_file(path)?, path.clone())),
            None => Err(ConfigError::NotFound { searched }),
        }
    }

    /// Check required fields and value constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_path("InstallationPath", &self.installation_path)?;
        require_path("SchemasLocation", &self.schemas_location)?;

        for (i, extractor) in self.extractors.iter().enumerate() {
            let prefix = format!("Extractors[{i}]");
            for (field, value) in [
                ("Name", &extractor.name),
                ("GithubOrg", &extractor.github_org),
                ("GithubProject", &extractor.github_project),
                ("Version", &extractor.version),
                ("Executable", &extractor.executable),
                ("Checksum", &extractor.checksum),
                ("CommandLineTemplate", &extractor.command_line_template),
            ] {
                require(&format!("{prefix}.{field}"), value)?;
            }

            if extractor.checksum_alg != SUPPORTED_CHECKSUM_ALG {
                return Err(invalid(
                    &format!("{prefix}.ChecksumAlg"),
                    &format!("must be one of [{SUPPORTED_CHECKSUM_ALG}], got '{}'", extractor.checksum_alg),
                ));
            }

            if extractor.methods.is_empty() {
                return Err(invalid(&format!("{prefix}.Methods"), "must contain at least one method"));
            }

            for (j, method) in extractor.methods.iter().enumerate() {
                let prefix = format!("{prefix}.Methods[{j}]");
                require(&format!("{prefix}.Name"), &method.name)?;
                require(&format!("{prefix}.Schema"), &method.schema)?;
                if let Some(url) = &method.url {
                    if !is_http_url(url) {
                        return Err(invalid(&format!("{prefix}.Url"), "must be an http(s) URL"));
                    }
                }
            }
        }

        Ok(())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn require(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "is required"));
    }
    Ok(())
}

fn require_path(field: &str, value: &Path) -> Result<(), ConfigError> {
    if value.as_os_str().is_empty() {
        return Err(invalid(field, "is required"));
    }
    Ok(())
}

fn is_http_url(url: &str) -> bool {
    regex::Regex::new(r"^https?://[^\s/?#]+(?:[/?#]\S*)?$")
        .map(|re| re.is_match(url))
        .unwrap_or(false)
}

/// Default lookup locations, in priority order.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
        paths.push(dir.join(DEFAULT_CONFIG_FILE_NAME));
    }

    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")));
    if let Ok(dir) = config_dir {
        paths.push(dir.join("extmethods").join(DEFAULT_CONFIG_FILE_NAME));
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
InstallationPath: ./parentPathToAllExtractors/
SchemasLocation: ./ExtractorSchemas
DownloadMissingExtractors: false
Timeout: 120
Extractors:
  - Name: LS
    GithubOrg: SwissOpenEM
    GithubProject: LS_Metadata_reader
    Version: v0.2.3
    Executable: LS_Metadata_reader
    Checksum: 8c5249c41a5b3464d183d063be7d96d9557dcb11c76598690f2c20bb06937fbe
    ChecksumAlg: sha256
    CommandLineTemplate: "-i '{{.SourceFolder}}' -o '{{.OutputFile}}' {{.AdditionalParameters}}"
    AdditionalParameters:
      - --param1=value1
      - --param2=value2
    Methods:
      - Name: Single Particle
        Schema: singleParticleSchema.json
      - Name: Tomography
        Schema: tomographySchema.json
        Url: https://example.org/tomography
"#;

    #[test]
    fn test_parse_valid_config() {
        let config = ExtractorsConfig::from_yaml(VALID).unwrap();
        assert_eq!(config.installation_path, PathBuf::from("./parentPathToAllExtractors/"));
        assert!(!config.download_schemas);
        assert_eq!(config.timeout, Some(120));
        assert_eq!(config.extractors.len(), 1);

        let ls = &config.extractors[0];
        assert_eq!(ls.additional_parameters, vec!["--param1=value1", "--param2=value2"]);
        assert_eq!(ls.methods[0].name, "Single Particle");
        assert_eq!(ls.methods[0].url, None);
        assert_eq!(ls.methods[1].url.as_deref(), Some("https://example.org/tomography"));
        assert_eq!(
            ls.install_path(&config.installation_path),
            PathBuf::from("./parentPathToAllExtractors/SwissOpenEM/LS_Metadata_reader/v0.2.3/LS_Metadata_reader")
        );
    }

    #[test]
    fn test_rejects_unknown_key() {
        let yaml = format!("{VALID}Bogus: 1\n");
        assert!(matches!(ExtractorsConfig::from_yaml(&yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_rejects_missing_required_field() {
        let yaml = VALID.replace("    Checksum: 8c5249c41a5b3464d183d063be7d96d9557dcb11c76598690f2c20bb06937fbe\n", "");
        match ExtractorsConfig::from_yaml(&yaml) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "Extractors[0].Checksum"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unsupported_checksum_alg() {
        let yaml = VALID.replace("ChecksumAlg: sha256", "ChecksumAlg: md5");
        match ExtractorsConfig::from_yaml(&yaml) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "Extractors[0].ChecksumAlg"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_method_url() {
        let yaml = VALID.replace("https://example.org/tomography", "ftp://example.org");
        match ExtractorsConfig::from_yaml(&yaml) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "Extractors[0].Methods[1].Url"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_extractor_without_methods() {
        let config = ExtractorsConfig {
            installation_path: PathBuf::from("/opt/extractors"),
            schemas_location: PathBuf::from("/opt/schemas"),
            extractors: vec![ExtractorConfig {
                name: "ex".to_string(),
                github_org: "org".to_string(),
                github_project: "proj".to_string(),
                version: "v1".to_string(),
                executable: "ex".to_string(),
                checksum: "abc".to_string(),
                checksum_alg: "sha256".to_string(),
                command_line_template: "{{.SourceFolder}}".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, "Extractors[0].Methods"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, VALID).unwrap();

        let (config, used) = ExtractorsConfig::load(Some(&path)).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.extractors[0].name, "LS");

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            ExtractorsConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_http_url() {
        assert!(is_http_url("http://localhost:8080/x"));
        assert!(is_http_url("https://example.org"));
        assert!(!is_http_url("example.org"));
        assert!(!is_http_url("https://"));
    }
}
