use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::workflow::types::WorkflowKey;

/// Initialize structured logging for the engine's host process.
///
/// JSON output with span context gives the portal's log pipeline the
/// correlation ids and structured transition data it needs. Safe to call
/// more than once; later calls are no-ops.
pub fn init_telemetry() -> Result<()> {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();

    tracing::info!("Signoff engine telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common workflow attributes
pub fn create_workflow_span(
    operation: &str,
    key: &WorkflowKey,
    actor_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "review_workflow",
        operation = operation,
        item.r#type = %key.item_type,
        item.id = %key.item_id,
        engagement = %key.engagement,
        actor.id = actor_id,
        otel.kind = "internal"
    )
}
