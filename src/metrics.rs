//! Observability: Prometheus metrics (feature `metrics`) and tracing spans (feature `tracing`).

#[cfg(feature = "metrics")]
pub use prometheus_metrics::{PantryMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider, ObservableGauge};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Encoder, Registry, TextEncoder};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    pub static METRICS: Lazy<PantryMetrics> = Lazy::new(PantryMetrics::init);

    pub struct PantryMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub transactions_total: Counter<u64>,
        pub queue_depth: Arc<AtomicUsize>,
        _queue_depth_gauge: ObservableGauge<u64>,
    }

    impl PantryMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("pantry");

            let queries_total = meter
                .u64_counter("pantry_queries_total")
                .with_description("Total queries executed")
                .build();

            let query_errors_total = meter
                .u64_counter("pantry_query_errors_total")
                .with_description("Queries rejected by the server or the driver")
                .build();

            let query_duration = meter
                .f64_histogram("pantry_query_duration_seconds")
                .with_description("Duration of queries")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("pantry_connection_wait_seconds")
                .with_description("Time spent establishing or acquiring a connection")
                .build();

            let transactions_total = meter
                .u64_counter("pantry_transactions_total")
                .with_description("Finished transaction scopes by outcome")
                .build();

            let queue_depth = Arc::new(AtomicUsize::new(0));
            let depth_clone = Arc::clone(&queue_depth);

            let queue_depth_gauge = meter
                .u64_observable_gauge("pantry_pool_queue_depth")
                .with_description("Number of callers waiting for a pooled connection")
                .with_callback(move |observer| {
                    observer.observe(depth_clone.load(Ordering::Relaxed) as u64, &[]);
                })
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                transactions_total,
                queue_depth,
                _queue_depth_gauge: queue_depth_gauge,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, duration: Duration) {
            self.connection_wait_duration.record(duration.as_secs_f64(), &[]);
        }

        pub fn record_transaction(&self, committed: bool) {
            let outcome = if committed { "commit" } else { "rollback" };
            self.transactions_total.add(1, &[KeyValue::new("outcome", outcome)]);
        }

        pub fn enter_queue(&self) {
            self.queue_depth.fetch_add(1, Ordering::Relaxed);
        }

        pub fn leave_queue(&self) {
            self.queue_depth.fetch_sub(1, Ordering::Relaxed);
        }

        /// Current metrics in Prometheus text exposition format.
        pub fn render(&self) -> Result<String, prometheus::Error> {
            let mut buffer = Vec::new();
            TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
            Ok(String::from_utf8_lossy(&buffer).into_owned())
        }
    }

}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    //! Span constructors shared by the executor, transactions and the pool, plus a
    //! `tracing-subscriber` layer that forwards span names over a channel.

    use crossbeam_channel::{unbounded, Receiver, Sender};
    use tracing::span::{Attributes, Id};
    use tracing::{info_span, Span, Subscriber};
    use tracing_subscriber::layer::{Context, Layer};

    pub fn execute_query_span(query: &str) -> Span {
        info_span!("execute_query", db.statement = %query)
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("begin_transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("commit_transaction")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("rollback_transaction")
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("acquire_connection")
    }

    /// Span wrapping one service operation, e.g. `transactions.create`.
    pub fn operation_span(operation: &'static str) -> Span {
        info_span!("pantry_operation", operation)
    }

    /// Forwards the name of every new span to a channel.
    pub struct ChannelLayer {
        tx: Sender<String>,
    }

    impl<S: Subscriber> Layer<S> for ChannelLayer {
        fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
            let _ = self.tx.send(attrs.metadata().name().to_string());
        }
    }

    /// Build a `ChannelLayer` and the receiving end of its channel.
    pub fn channel_layer() -> (ChannelLayer, Receiver<String>) {
        let (tx, rx) = unbounded();
        (ChannelLayer { tx }, rx)
    }

}
