//! Span creation for the dispatch loop. An implementation without
//! distributed tracing can omit tracing entirely — both the port and a
//! no-op implementation are always present so the core compiles and runs
//! either way.

use opentelemetry::global;
use opentelemetry::trace::{Span, SpanKind, Status, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::SdkTracerProvider;

use tailpost_domain::TailPostError;

/// Abstract interface the core depends on for trace propagation.
/// `start_span` returns the child context to carry forward (so a span
/// opened around one line's processing parents the request span) plus a
/// handle to close over when recording the outcome.
pub trait TracerSink: Send + Sync {
    fn start_span(&self, ctx: &Context, name: &str) -> (Context, Box<dyn SpanHandle>);

    /// Flushes and shuts down the exporter. Called once, as the last step of
    /// the supervisor's shutdown sequence. No-op for sinks with nothing to
    /// flush.
    fn shutdown(&self);
}

pub trait SpanHandle: Send {
    fn record_error(&mut self, err: &TailPostError);
}

pub struct OtelTracerSink {
    provider: SdkTracerProvider,
}

impl OtelTracerSink {
    /// Builds an OTLP exporter pointed at `endpoint` (gRPC). Construction
    /// failure here is treated like any other startup error by the
    /// supervisor's caller.
    pub fn new(endpoint: &str) -> Result<Self, TailPostError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| TailPostError::internal(format!("failed to build OTLP exporter: {e}")))?;

        let provider = SdkTracerProvider::builder().with_batch_exporter(exporter).build();
        global::set_tracer_provider(provider.clone());
        Ok(Self { provider })
    }

    /// Flushes and shuts down the exporter. Called during the supervisor's
    /// final shutdown step.
    pub fn shutdown(&self) {
        let _ = self.provider.shutdown();
    }
}

impl TracerSink for OtelTracerSink {
    fn start_span(&self, ctx: &Context, name: &str) -> (Context, Box<dyn SpanHandle>) {
        let tracer = self.provider.tracer("tailpost");
        let span = tracer
            .span_builder(name.to_string())
            .with_kind(SpanKind::Internal)
            .start_with_context(&tracer, ctx);
        let child_ctx = ctx.with_span(span.clone());
        (child_ctx, Box::new(OtelSpanHandle { span }))
    }

    fn shutdown(&self) {
        OtelTracerSink::shutdown(self);
    }
}

struct OtelSpanHandle {
    span: opentelemetry_sdk::trace::Span,
}

impl SpanHandle for OtelSpanHandle {
    fn record_error(&mut self, err: &TailPostError) {
        self.span.set_status(Status::error(err.to_string()));
        self.span
            .add_event("error", vec![KeyValue::new("category", err.category().to_string())]);
    }
}

pub struct NoopTracerSink;

impl TracerSink for NoopTracerSink {
    fn start_span(&self, ctx: &Context, _name: &str) -> (Context, Box<dyn SpanHandle>) {
        (ctx.clone(), Box::new(NoopSpanHandle))
    }

    fn shutdown(&self) {}
}

struct NoopSpanHandle;

impl SpanHandle for NoopSpanHandle {
    fn record_error(&mut self, _err: &TailPostError) {}
}
