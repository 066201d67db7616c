//! Prompt assembly for the design task.
//!
//! Turn order is fixed: system instruction, catalog listing, user request.
//! The model is instructed to weigh the catalog before the user's own words,
//! so reordering changes behavior and is not permitted. The full catalog is
//! always listed - truncation is an explicit non-goal.

use crate::catalog::Catalog;
use atelier_abstraction::ChatMessage;
use std::fmt::Write;

const SYSTEM_INSTRUCTION: &str = "Your task is to design a new web UI component, according to \
     the user's request.\nIf you judge it is relevant to do so, you can specify pre-made library \
     components to use in the task.\nYou can also specify the use of icons if you see that the \
     user's request requires it.";

/// Builds the ordered conversation turns for a design request.
#[must_use]
pub fn design_messages(catalog: &Catalog, user_request: &str) -> Vec<ChatMessage> {
    let mut listing = String::new();
    for component in catalog.components() {
        let _ = writeln!(listing, "{} : {};", component.name, component.description);
    }

    vec![
        ChatMessage::system(SYSTEM_INSTRUCTION),
        ChatMessage::user(format!(
            "Multiple library components can be used while creating a new component in order \
             to help you do a better design job, faster.\n\n\
             AVAILABLE LIBRARY COMPONENTS:\n```\n{listing}```"
        )),
        ChatMessage::user(format!(
            "USER QUERY : \n```\n{user_request}\n```\n\n\
             Design the new web component task for the user as the creative genius you are"
        )),
    ]
}
