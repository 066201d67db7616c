//! The design output schema: the structural contract the model's tool-call
//! arguments must satisfy.
//!
//! The schema is parameterized over the catalog supplied at call time - the
//! enum of permitted component names is computed fresh on every build, so a
//! stale catalog can never silently validate.

use crate::catalog::Catalog;
use atelier_abstraction::ToolDefinition;
use serde::Deserialize;
use serde_json::{Value, json};

/// Name of the function tool the model is instructed to call.
pub const DESIGN_TOOL_NAME: &str = "design_new_component_api";

/// Description attached to the design tool declaration.
pub const DESIGN_TOOL_DESCRIPTION: &str =
    "generate the required design details to create a new component";

const DESCRIPTION_FIELD_PROMPT: &str = "Write a description for the component design task based \
     on the user query. Stick strictly to what the user wants in their request - do not go off track";

/// The raw structured output the model returns through the design tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DesignOutput {
    /// The model's free-text description of the component to build.
    pub new_component_description: String,
    /// Library components the model selected, in presentation order.
    pub use_library_components: Vec<LibraryComponentUse>,
}

/// One selected library component in the raw tool output.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibraryComponentUse {
    /// Must be one of the catalog's component names.
    pub library_component_name: String,
    /// The model's justification for using it.
    pub library_component_usage_reason: String,
}

/// Validation schema for the design tool output, derived from a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignSchema {
    allowed_names: Vec<String>,
}

impl DesignSchema {
    /// Builds the schema for the given catalog.
    ///
    /// An empty catalog yields an empty enum: any output naming a component
    /// will fail [`check`](Self::check), while an output with an empty
    /// component list still validates.
    #[must_use]
    pub fn for_catalog(catalog: &Catalog) -> Self {
        Self { allowed_names: catalog.names().map(str::to_string).collect() }
    }

    /// The permitted component names, in catalog order.
    #[must_use]
    pub fn allowed_names(&self) -> &[String] {
        &self.allowed_names
    }

    /// Renders the JSON schema sent to the model in the tool declaration.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "new_component_description": {
                    "type": "string",
                    "description": DESCRIPTION_FIELD_PROMPT,
                },
                "use_library_components": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "library_component_name": {
                                "type": "string",
                                "enum": self.allowed_names,
                            },
                            "library_component_usage_reason": {
                                "type": "string",
                            }
                        },
                        "required": [
                            "library_component_name",
                            "library_component_usage_reason"
                        ],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["new_component_description", "use_library_components"],
            "additionalProperties": false
        })
    }

    /// Builds the tool declaration carried by the completion request.
    #[must_use]
    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition::new(DESIGN_TOOL_NAME, DESIGN_TOOL_DESCRIPTION, self.to_json_schema())
    }

    /// Validates a parsed output against the enum constraint.
    ///
    /// # Errors
    /// Returns a description of the first violation: a component name not in
    /// the catalog.
    pub fn check(&self, output: &DesignOutput) -> Result<(), String> {
        for entry in &output.use_library_components {
            if !self.allowed_names.iter().any(|name| name == &entry.library_component_name) {
                return Err(format!(
                    "unknown library component '{}'",
                    entry.library_component_name
                ));
            }
        }
        Ok(())
    }
}
