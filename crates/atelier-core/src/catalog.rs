//! The component catalog: the static list of reusable library components the
//! model may reference by name.
//!
//! The catalog is loaded before the pipeline runs (typically from a library's
//! metadata JSON file) and is treated as given - the core performs no
//! validation of its contents.

use serde::{Deserialize, Serialize};

/// One reusable library component the model can pick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogComponent {
    /// Component name, referenced by the model in its structured output.
    pub name: String,
    /// Short description shown to the model in the catalog listing turn.
    pub description: String,
    /// Optional usage snippet carried by some catalogs; not sent to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
}

/// The full catalog of available library components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    components: Vec<CatalogComponent>,
}

impl Catalog {
    /// Creates a catalog from a list of components.
    #[must_use]
    pub fn new(components: Vec<CatalogComponent>) -> Self {
        Self { components }
    }

    /// Parses a catalog from a JSON array of `{name, description, usage?}`
    /// entries, the shape of a component library's metadata file.
    ///
    /// # Errors
    /// Returns the underlying `serde_json` error if the JSON is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The catalog entries, in listing order.
    #[must_use]
    pub fn components(&self) -> &[CatalogComponent] {
        &self.components
    }

    /// Component names, in listing order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.name.as_str())
    }

    /// Number of catalog entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
