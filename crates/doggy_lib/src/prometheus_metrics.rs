use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::OnceLock;

// Use the crate re-exported by `prometheus_exporter`, otherwise we'd end up
// with two incompatible default registries.
use prometheus_exporter::prometheus;

pub struct PrometheusMetrics {
    pub graphql_resolver_calls: prometheus::IntCounterVec,
    pub image_uploads: prometheus::IntCounterVec,
    pub email_exists_requests: prometheus::IntCounterVec,
}

static METRICS: OnceLock<PrometheusMetrics> = OnceLock::new();

pub fn metrics() -> &'static PrometheusMetrics {
    METRICS.get_or_init(|| PrometheusMetrics::new(prometheus::default_registry().clone()))
}

impl PrometheusMetrics {
    fn new(registry: prometheus::Registry) -> Self {
        // Registration only fails for duplicate or malformed metric names,
        // which are all fixed here.
        let graphql_resolver_calls = prometheus::register_int_counter_vec_with_registry!(
            "graphql_resolver_calls",
            "Number of GraphQL query and mutation resolver calls",
            &["operation", "success"],
            registry
        )
        .unwrap();
        let image_uploads = prometheus::register_int_counter_vec_with_registry!(
            "image_uploads",
            "Number of profile image uploads",
            &["table", "success"],
            registry
        )
        .unwrap();
        let email_exists_requests = prometheus::register_int_counter_vec_with_registry!(
            "email_exists_requests",
            "Number of emailExists requests",
            &["success"],
            registry
        )
        .unwrap();

        Self {
            graphql_resolver_calls,
            image_uploads,
            email_exists_requests,
        }
    }

    /// Counts one resolver call, labelled by operation name and outcome.
    pub fn record_resolver_call<T, E>(&self, operation: &str, result: &Result<T, E>) {
        self.graphql_resolver_calls
            .with_label_values(&[operation, success_label(result)])
            .inc();
    }
}

pub(crate) fn success_label<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "true"
    } else {
        "false"
    }
}

#[derive(Debug)]
pub struct PrometheusExporter {
    binding: SocketAddr,
    _exporter: prometheus_exporter::Exporter,
}

impl PrometheusExporter {
    /// Starts exporting Prometheus metrics at `http://0.0.0.0:{port}/metrics`. The server
    /// will keep running until the returned [`PrometheusExporter`] is dropped.
    pub fn start(port: u16, registry: prometheus::Registry) -> anyhow::Result<Self> {
        let binding = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let exporter = {
            let mut builder = prometheus_exporter::Builder::new(binding);
            builder.with_registry(registry);
            builder.start()?
        };

        Ok(Self {
            binding,
            _exporter: exporter,
        })
    }

    /// Returns the port this Prometheus exporter is bound to.
    pub fn port(&self) -> u16 {
        self.binding.port()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_calls_are_labelled_by_outcome() {
        let metrics = PrometheusMetrics::new(prometheus::Registry::new());

        metrics.record_resolver_call("user", &Ok::<_, ()>(()));
        metrics.record_resolver_call("user", &Err::<(), _>(()));
        metrics.record_resolver_call("user", &Err::<(), _>(()));

        let calls = &metrics.graphql_resolver_calls;
        assert_eq!(calls.with_label_values(&["user", "true"]).get(), 1);
        assert_eq!(calls.with_label_values(&["user", "false"]).get(), 2);
    }

    #[tokio::test]
    async fn server_is_alive() {
        let exporter = PrometheusExporter::start(13370, prometheus::Registry::new()).unwrap();
        reqwest::get(&format!("http://127.0.0.1:{}/metrics", exporter.port()))
            .await
            .unwrap();
    }
}
