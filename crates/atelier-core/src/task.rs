//! The design task record: the canonical decoded output of the pipeline.

use serde::{Deserialize, Serialize};

/// The user's verbatim request paired with the model's own description of the
/// component to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    /// Verbatim copy of the caller's free-text request.
    pub user: String,
    /// The model's description of the design task.
    pub llm: String,
}

/// One library component the model selected, with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentUse {
    /// Catalog name of the component.
    pub name: String,
    /// Why the model wants to use it.
    pub usage: String,
}

/// The canonical design task produced by a successful decode, attached to the
/// request context for downstream stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignTask {
    /// User and model descriptions of the task.
    pub description: TaskDescription,
    /// Selected library components, in the model's presentation order.
    pub components: Vec<ComponentUse>,
}
