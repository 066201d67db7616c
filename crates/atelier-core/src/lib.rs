//! Core design pipeline for Atelier.
//!
//! Turns a free-text UI-component request into a validated design task:
//! the catalog-derived output schema and three-turn prompt are built per
//! invocation, the model's streamed tool-call output is forwarded to the
//! caller fragment by fragment while being accumulated, and the accumulated
//! buffer is decoded into a [`DesignTask`] attached to the request context.
//!
//! # Example
//!
//! ```no_run
//! use atelier_core::{Catalog, RequestContext, design_component};
//! use atelier_models::OpenAIModel;
//!
//! # async fn example() -> Result<(), atelier_core::DesignError> {
//! # let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "key".to_string());
//! let metadata = std::fs::read_to_string("templates/metadata.json")
//!     .expect("catalog metadata file");
//! let catalog = Catalog::from_json_str(&metadata).expect("valid catalog metadata");
//! let mut ctx = RequestContext::new();
//! let mut streamed = String::new();
//!
//! let task = design_component(&model, &catalog, "a login form", &mut streamed, &mut ctx).await?;
//! println!("{}", task.description.llm);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod context;
pub mod designer;
pub mod error;
pub mod prompt;
pub mod schema;
pub mod task;

pub use catalog::{Catalog, CatalogComponent};
pub use context::RequestContext;
pub use designer::{FragmentSink, decode_design_task, design_component};
pub use error::{DesignError, Result};
pub use prompt::design_messages;
pub use schema::{
    DESIGN_TOOL_DESCRIPTION, DESIGN_TOOL_NAME, DesignOutput, DesignSchema, LibraryComponentUse,
};
pub use task::{ComponentUse, DesignTask, TaskDescription};
