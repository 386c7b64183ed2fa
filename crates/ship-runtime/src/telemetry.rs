//! Structured logging, initialised once at process startup. Request-scoped
//! fields (`requestId`, `contextId`, `channel`) are attached via a
//! `tracing::Span` built from a `RequestContext`, not thread-locals.
//! `AgentTurn::run` instruments its whole turn with this span, so every log
//! line emitted while a turn is in flight — including from tools it calls —
//! is tagged with the owning request.

use ship_domain::RequestContext;
use tracing_subscriber::EnvFilter;

/// Install a JSON-formatted subscriber reading `RUST_LOG`, defaulting to
/// `info` for everything and `debug` for this crate's own spans.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ship_runtime=debug")),
        )
        .json()
        .init();
}

/// Span carrying the per-request fields every log line inside a turn should
/// be tagged with.
pub fn request_span(ctx: &RequestContext) -> tracing::Span {
    tracing::info_span!(
        "turn",
        request_id = %ctx.request_id,
        context_id = %ctx.context_id,
        channel = ctx.channel.as_deref().unwrap_or("unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_span_carries_context_id() {
        let ctx = RequestContext::new("api:chat:1");
        let span = request_span(&ctx);
        assert_eq!(span.metadata().unwrap().name(), "turn");
    }
}
