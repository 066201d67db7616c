//! The design pipeline driver.
//!
//! One invocation runs the full flow: build the schema and prompt for the
//! supplied catalog, open the streamed tool call, forward each fragment to
//! the caller's output channel while accumulating it, then decode the
//! accumulated buffer and attach the design task to the request context.
//!
//! Forwarding is at-most-once and in-order: each fragment is appended to the
//! buffer and written to the sink before the next stream event is awaited.
//! Fragments already forwarded are never retracted, even if decoding fails
//! afterwards - stream success and decode success are independent outcomes.

use crate::catalog::Catalog;
use crate::context::RequestContext;
use crate::error::{DesignError, Result};
use crate::prompt::design_messages;
use crate::schema::{DesignOutput, DesignSchema};
use crate::task::{ComponentUse, DesignTask, TaskDescription};
use async_trait::async_trait;
use atelier_abstraction::{StreamEvent, ToolCallModel};
use futures::StreamExt;
use tracing::{debug, error};

/// A write-only, append-only sink belonging to the triggering request.
///
/// The pipeline writes raw fragments to it and never reads from it. A write
/// error means the caller went away; the pipeline stops promptly without
/// attempting a decode.
#[async_trait]
pub trait FragmentSink: Send {
    /// Writes one fragment, verbatim.
    async fn send(&mut self, fragment: &str) -> std::io::Result<()>;
}

/// In-memory sink for tests and local capture.
#[async_trait]
impl FragmentSink for String {
    async fn send(&mut self, fragment: &str) -> std::io::Result<()> {
        self.push_str(fragment);
        Ok(())
    }
}

/// Bridges fragments to a channel, e.g. one draining into a response body.
/// A dropped receiver surfaces as a broken-pipe error.
#[async_trait]
impl FragmentSink for tokio::sync::mpsc::Sender<String> {
    async fn send(&mut self, fragment: &str) -> std::io::Result<()> {
        tokio::sync::mpsc::Sender::send(self, fragment.to_string()).await.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "fragment receiver dropped")
        })
    }
}

/// Runs the design pipeline for one request.
///
/// On success the decoded [`DesignTask`] is attached to `ctx` and returned.
/// On failure the context slot is left untouched; fragments already written
/// to `sink` stay written.
///
/// # Errors
/// - [`DesignError::Model`] when the completion request or stream fails
///   (transport error) - the buffer is discarded, decode is never attempted.
/// - [`DesignError::MalformedOutput`] when the accumulated output is not
///   valid JSON or fails schema validation.
/// - [`DesignError::ChannelClosed`] when the caller's output channel closes
///   mid-stream.
pub async fn design_component<M, S>(
    model: &M,
    catalog: &Catalog,
    user_request: &str,
    sink: &mut S,
    ctx: &mut RequestContext,
) -> Result<DesignTask>
where
    M: ToolCallModel + ?Sized,
    S: FragmentSink,
{
    debug!(
        model_id = %model.model_id(),
        catalog_len = catalog.len(),
        request_len = user_request.len(),
        "designing new component"
    );

    let schema = DesignSchema::for_catalog(catalog);
    let messages = design_messages(catalog, user_request);
    let tool = schema.to_tool_definition();

    let mut stream = model.stream_tool_call(&messages, &tool, None).await?;

    let mut completion = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Fragment(fragment) => {
                // Append, then forward, before awaiting the next event.
                completion.push_str(&fragment);
                sink.send(&fragment).await?;
            }
            StreamEvent::Done => break,
        }
    }

    let task = decode_design_task(&schema, user_request, &completion)?;
    debug!(
        component_count = task.components.len(),
        completion_len = completion.len(),
        "design task decoded"
    );

    ctx.attach_design_task(task.clone());
    Ok(task)
}

/// Decodes the accumulated tool-call output into a design task.
///
/// # Errors
/// Returns [`DesignError::MalformedOutput`] when the buffer is not parseable
/// JSON or a selected component name is not in the schema's enum.
pub fn decode_design_task(
    schema: &DesignSchema,
    user_request: &str,
    completion: &str,
) -> Result<DesignTask> {
    let output: DesignOutput = serde_json::from_str(completion).map_err(|e| {
        error!(error = %e, completion_len = completion.len(), "tool-call output is not valid JSON");
        DesignError::MalformedOutput(format!("invalid tool-call JSON: {e}"))
    })?;

    schema.check(&output).map_err(|violation| {
        error!(violation = %violation, "tool-call output failed schema validation");
        DesignError::MalformedOutput(violation)
    })?;

    Ok(DesignTask {
        description: TaskDescription {
            user: user_request.to_string(),
            llm: output.new_component_description,
        },
        components: output
            .use_library_components
            .into_iter()
            .map(|entry| ComponentUse {
                name: entry.library_component_name,
                usage: entry.library_component_usage_reason,
            })
            .collect(),
    })
}
