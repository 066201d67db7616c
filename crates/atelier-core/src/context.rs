//! Per-request context shared across the stages handling one request.
//!
//! The context is passed explicitly as a mutable handle - no thread-locals or
//! globals. The pipeline only ever writes the design-task slot; downstream
//! stages read it. An absent slot means "decode did not succeed or has not
//! run yet"; the core does not disambiguate the two.

use crate::task::DesignTask;

/// Mutable, request-scoped store with a slot for the decoded design task.
#[derive(Debug, Default)]
pub struct RequestContext {
    design_task: Option<DesignTask>,
}

impl RequestContext {
    /// Creates an empty context for a new request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the decoded design task, unconditionally overwriting any
    /// prior value for this request.
    pub fn attach_design_task(&mut self, task: DesignTask) {
        self.design_task = Some(task);
    }

    /// The decoded design task, if a decode has succeeded.
    #[must_use]
    pub fn design_task(&self) -> Option<&DesignTask> {
        self.design_task.as_ref()
    }

    /// Takes the design task out of the context, leaving the slot empty.
    pub fn take_design_task(&mut self) -> Option<DesignTask> {
        self.design_task.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ComponentUse, TaskDescription};

    fn task(llm: &str) -> DesignTask {
        DesignTask {
            description: TaskDescription { user: "a toast".to_string(), llm: llm.to_string() },
            components: vec![ComponentUse {
                name: "Alert".to_string(),
                usage: "transient notification".to_string(),
            }],
        }
    }

    #[test]
    fn test_slot_starts_empty() {
        let ctx = RequestContext::new();
        assert!(ctx.design_task().is_none());
    }

    #[test]
    fn test_attach_and_read() {
        let mut ctx = RequestContext::new();
        ctx.attach_design_task(task("first"));
        assert_eq!(ctx.design_task().unwrap().description.llm, "first");
    }

    #[test]
    fn test_attach_overwrites_prior_value() {
        let mut ctx = RequestContext::new();
        ctx.attach_design_task(task("first"));
        ctx.attach_design_task(task("second"));

        let current = ctx.design_task().unwrap();
        assert_eq!(current.description.llm, "second");
        assert!(!format!("{current:?}").contains("first"));
    }

    #[test]
    fn test_take_empties_slot() {
        let mut ctx = RequestContext::new();
        ctx.attach_design_task(task("only"));
        assert!(ctx.take_design_task().is_some());
        assert!(ctx.design_task().is_none());
    }
}
