//! Record types exchanged with the frontend
//!
//! `ExtractionMethod` is the typed view a frontend builds from whatever the
//! backend hands it. Both fields are optional: an absent key stays absent.
//! Records are only built through `ExtractionMethod::create_from`, never
//! deserialized directly.

use serde::Serialize;

/// A named extraction method and its opaque schema payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtractionMethod {
    /// Id and display name of the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Schema payload, kept as text and never re-parsed here.
    /// Base64 of the schema file when produced by the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl ExtractionMethod {
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            schema: Some(schema.into()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}
