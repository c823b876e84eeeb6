//! Catalog of available extraction methods
//!
//! Built once from the extractors config. Every extractor is checked for a
//! usable installation and every method for a readable JSON schema; anything
//! broken is logged and left out rather than failing the whole catalog.

use crate::config::{ExtractorConfig, ExtractorsConfig};
use crate::model::ExtractionMethod;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A registered method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Base64 encoded schema
    pub schema: String,
    /// Name of the extractor providing this method
    pub extractor: String,
}

/// An installed extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    pub executable_path: PathBuf,
    pub command_line_template: String,
    pub additional_args: String,
    pub version: String,
}

impl Extractor {
    /// The command line with the extractor's own parameters filled in.
    /// Per-run placeholders such as `{{.SourceFolder}}` stay visible.
    pub fn render_command_line(&self) -> String {
        render_command_line(
            &self.command_line_template,
            &self.executable_path.display().to_string(),
            &self.additional_args,
        )
    }
}

#[derive(Debug, Default)]
pub struct MethodCatalog {
    methods: BTreeMap<String, Method>,
    extractors: BTreeMap<String, Extractor>,
}

impl MethodCatalog {
    pub fn new(config: &ExtractorsConfig) -> Self {
        let mut catalog = Self::default();

        for extractor_config in &config.extractors {
            info!(name = %extractor_config.name, "Registering extractor");

            let install_path = extractor_config.install_path(&config.installation_path);

            if config.download_missing_extractors {
                warn!(name = %extractor_config.name, "Downloading extractors is not supported, using existing installation");
            }

            if let Err(e) = verify_installation(&install_path, extractor_config) {
                error!(
                    name = %extractor_config.name,
                    path = %install_path.display(),
                    error = %e,
                    "Installation verification failed"
                );
                continue;
            }

            if let Err(e) = check_template(&extractor_config.command_line_template) {
                error!(
                    name = %extractor_config.name,
                    template = %extractor_config.command_line_template,
                    error = %e,
                    "Failed to parse extractor commandline template"
                );
                continue;
            }

            catalog.register_methods(extractor_config, &config.schemas_location);

            catalog.extractors.insert(
                extractor_config.name.clone(),
                Extractor {
                    executable_path: install_path,
                    command_line_template: extractor_config.command_line_template.clone(),
                    additional_args: extractor_config.additional_parameters.join(" "),
                    version: extractor_config.version.clone(),
                },
            );
        }

        catalog
    }

    fn register_methods(&mut self, extractor_config: &ExtractorConfig, schemas_location: &Path) {
        for m in &extractor_config.methods {
            if self.methods.contains_key(&m.name) {
                error!(method = %m.name, "Duplicate method name found. Skipping.");
                continue;
            }

            let schema_path = schemas_location.join(&m.schema);
            let schema = match read_schema(&schema_path) {
                Ok(schema) => schema,
                Err(e) => {
                    error!(
                        method = %m.name,
                        file = %schema_path.display(),
                        error = %format!("{e:#}"),
                        "Schema unusable. Skipping."
                    );
                    continue;
                }
            };

            self.methods.insert(
                m.name.clone(),
                Method {
                    name: m.name.clone(),
                    schema: STANDARD.encode(schema),
                    extractor: extractor_config.name.clone(),
                },
            );
        }
    }

    /// All registered methods, sorted by name.
    pub fn available_methods(&self) -> Vec<ExtractionMethod> {
        self.methods
            .values()
            .map(|m| ExtractionMethod::new(m.name.clone(), m.schema.clone()))
            .collect()
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// The extractor that provides `method`.
    pub fn extractor_for(&self, method: &str) -> Option<&Extractor> {
        self.methods
            .get(method)
            .and_then(|m| self.extractors.get(&m.extractor))
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// The executable must exist below the installation path and must not be
/// shadowed by a binary of the same name on `PATH`.
fn verify_installation(install_path: &Path, extractor_config: &ExtractorConfig) -> Result<()> {
    if !install_path.is_file() {
        bail!("expected extractor executable does not exist");
    }
    if which::which(&extractor_config.executable).is_ok() {
        bail!("executable file found in PATH of the system");
    }
    Ok(())
}

/// Names a command line template may refer to as `{{.Name}}`
pub const TEMPLATE_PARAMETERS: [&str; 4] = ["Executable", "SourceFolder", "OutputFile", "AdditionalParameters"];

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    /// Parameter name and the raw `{{ ... }}` text it came from
    Parameter(&'a str, &'a str),
}

fn parse_template(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let Some(len) = rest[start + 2..].find("}}") else {
            bail!("unclosed action at '{}'", &rest[start..]);
        };
        let end = start + 2 + len + 2;
        let action = rest[start + 2..end - 2].trim();
        let name = action
            .strip_prefix('.')
            .with_context(|| format!("unsupported action '{action}'"))?;
        if !TEMPLATE_PARAMETERS.contains(&name) {
            bail!("unknown parameter '{name}'");
        }
        segments.push(Segment::Parameter(name, &rest[start..end]));
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    Ok(segments)
}

/// Fails when the template has unbalanced `{{ }}` or unknown parameters.
pub fn check_template(template: &str) -> Result<()> {
    parse_template(template).map(|_| ())
}

/// Substitute `{{.Executable}}` and `{{.AdditionalParameters}}`, keeping all
/// other placeholders as written. Unparseable templates are returned as is.
pub fn render_command_line(template: &str, executable: &str, additional_args: &str) -> String {
    let Ok(segments) = parse_template(template) else {
        return template.trim().to_string();
    };

    let rendered: String = segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Parameter("Executable", _) => executable,
            Segment::Parameter("AdditionalParameters", _) => additional_args,
            Segment::Parameter(_, raw) => raw,
        })
        .collect();
    rendered.trim().to_string()
}

fn read_schema(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        bail!("schema file not found");
    }
    let schema = fs::read(path).context("failed to read schema file")?;
    if !is_valid_json(&schema) {
        bail!("schema file does not contain valid json");
    }
    Ok(schema)
}

/// Whether `bytes` hold a single valid JSON document.
pub fn is_valid_json(bytes: impl AsRef<[u8]>) -> bool {
    serde_json::from_slice::<serde::de::IgnoredAny>(bytes.as_ref()).is_ok()
}
