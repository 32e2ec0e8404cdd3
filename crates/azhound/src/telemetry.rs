//! # Logging and telemetry
//!
//! Log records always go through `tracing` and are printed to stderr by
//! `tracing_subscriber::fmt`, keeping stdout free for collected data.
//! OpenTelemetry export is opt-in.
//!
//! ## Feature matrix
//!
//! - `otel`: Exports spans (one `collect` span per run).
//! - `metrics`: Exports run metrics (collections, items emitted, failures,
//!   duration, runs in flight).
//! - `stdout`: Uses the stdout exporter.
//! - `otlp`: Uses the OTLP/HTTP exporter, configured through the standard
//!   `OTEL_EXPORTER_OTLP_*` environment variables.
//!
//! Exporters require at least one of `otel` or `metrics`. Without `metrics`
//! the recorder functions below compile to no-ops.
//!
//! ## Log level
//!
//! `RUST_LOG` wins when set. Otherwise the level follows the number of `-v`
//! flags: none for `info`, one for `debug` (connection checks, page
//! boundaries), two or more for `trace` (every discovered object).

#[cfg(all(feature = "otlp", not(any(feature = "otel", feature = "metrics"))))]
compile_error!("The 'otlp' feature requires at least one of 'otel' or 'metrics' to be enabled.");

#[cfg(all(feature = "stdout", not(any(feature = "otel", feature = "metrics"))))]
compile_error!("The 'stdout' feature requires at least one of 'otel' or 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "otel"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "otel")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "otel")]
use opentelemetry_sdk::trace as sdktrace;

pub struct TelemetryProviders {
    #[cfg(feature = "otel")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down the exporters, if any.
    pub fn shutdown(self) {
        #[cfg(feature = "otel")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {err:#?}");
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {err:#?}");
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {err:#?}");
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {err:#?}");
            }
        }
    }
}

/// Default filter directive for `verbosity` repetitions of `-v`.
pub const fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub fn init_telemetry(verbosity: u8) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "otel")]
    let tracer_provider = init_tracer()?;

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics()?;

    #[cfg(any(feature = "metrics", feature = "otel"))]
    let scope = InstrumentationScope::builder("azhound")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    let registry = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(verbosity).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true),
        );

    #[cfg(feature = "otel")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "otel")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "otel"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("azhound")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> anyhow::Result<sdkmetrics::SdkMeterProvider> {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();
        builder.with_reader(reader)
    };

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::MetricExporter::builder()
            .with_http()
            .with_temporality(sdkmetrics::Temporality::Delta)
            .build()
            .context("failed to build metrics exporter")?;
        builder.with_periodic_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "otel")]
fn init_tracer() -> anyhow::Result<sdktrace::SdkTracerProvider> {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = builder.with_simple_exporter(opentelemetry_stdout::SpanExporter::default());

    #[cfg(feature = "otlp")]
    let builder = {
        use anyhow::Context;

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .build()
            .context("failed to build span exporter")?;
        builder.with_batch_exporter(exporter)
    };

    Ok(builder.build())
}

#[cfg(feature = "metrics")]
static COLLECTIONS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static COLLECTIONS_INFLIGHT: OnceLock<UpDownCounter<i64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ITEMS_EMITTED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static COLLECTION_FAILURES: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static COLLECTION_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = COLLECTIONS.set(
        meter
            .u64_counter("collections")
            .with_description("Collection runs started")
            .build(),
    );

    let _ = COLLECTIONS_INFLIGHT.set(
        meter
            .i64_up_down_counter("collections_inflight")
            .with_description("Collection runs currently enumerating")
            .build(),
    );

    let _ = ITEMS_EMITTED.set(
        meter
            .u64_counter("items_emitted")
            .with_description("Envelopes published onto output streams")
            .build(),
    );

    let _ = COLLECTION_FAILURES.set(
        meter
            .u64_counter("collection_failures")
            .with_description("Runs stopped by an item or page error")
            .build(),
    );

    let _ = COLLECTION_DURATION_MS.set(
        meter
            .f64_histogram("collection_duration")
            .with_unit("ms")
            .with_description("End-to-end collection run duration")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_collections() {
    if let Some(counter) = COLLECTIONS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_collections() {}

#[cfg(feature = "metrics")]
pub fn increment_collections_inflight() {
    if let Some(counter) = COLLECTIONS_INFLIGHT.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_collections_inflight() {}

#[cfg(feature = "metrics")]
pub fn decrement_collections_inflight() {
    if let Some(counter) = COLLECTIONS_INFLIGHT.get() {
        counter.add(-1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn decrement_collections_inflight() {}

#[cfg(feature = "metrics")]
pub fn increment_items_emitted(count: u64) {
    if let Some(counter) = ITEMS_EMITTED.get() {
        counter.add(count, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_items_emitted(_count: u64) {}

#[cfg(feature = "metrics")]
pub fn increment_collection_failures() {
    if let Some(counter) = COLLECTION_FAILURES.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_collection_failures() {}

#[cfg(feature = "metrics")]
pub fn record_collection_duration(duration_ms: f64) {
    if let Some(histogram) = COLLECTION_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_collection_duration(_duration_ms: f64) {}

#[cfg(test)]
mod tests {
    use super::default_directive;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(2), "trace");
        assert_eq!(default_directive(9), "trace");
    }
}
