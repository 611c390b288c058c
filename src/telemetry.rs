//! Logging and trace export for the checkout binary.
//!
//! Logs always go to stderr through a `tracing-subscriber` fmt layer filtered by `RUST_LOG`
//! (default `info`). With the `telemetry` feature enabled and any `OTEL_EXPORTER_OTLP_*`
//! variable set, spans are additionally exported over OTLP.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(feature = "telemetry")]
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Holds the trace pipeline so it can be flushed on drop.
pub struct Telemetry {
    name: &'static str,
    version: &'static str,
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            #[cfg(feature = "telemetry")]
            tracer_provider: None,
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    fn filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Installs the global subscriber.
    #[cfg_attr(not(feature = "telemetry"), allow(unused_mut))]
    pub fn register(mut self) -> Self {
        #[cfg(feature = "telemetry")]
        if let Some(protocol) = otlp::TelemetryProtocol::from_env() {
            match otlp::init_tracer_provider(protocol, self.name, self.version) {
                Ok(provider) => {
                    use opentelemetry::trace::TracerProvider as _;
                    let tracer = provider.tracer(self.name);
                    let installed = tracing_subscriber::registry()
                        .with(Self::filter())
                        .with(fmt::layer().with_writer(std::io::stderr))
                        .with(tracing_opentelemetry::OpenTelemetryLayer::new(tracer))
                        .try_init();
                    if let Err(error) = installed {
                        eprintln!("Failed to install tracing subscriber: {error}");
                    }
                    tracing::info!(?protocol, "OpenTelemetry trace export enabled");
                    self.tracer_provider = Some(provider);
                    return self;
                }
                Err(error) => eprintln!("OpenTelemetry disabled: {error}"),
            }
        }

        let installed = tracing_subscriber::registry()
            .with(Self::filter())
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init();
        if let Err(error) = installed {
            eprintln!("Failed to install tracing subscriber: {error}");
        }
        tracing::debug!(name = self.name, version = self.version, "Logging initialized");
        self
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        #[cfg(feature = "telemetry")]
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}

#[cfg(feature = "telemetry")]
mod otlp {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::Resource;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
    use opentelemetry_semantic_conventions::SCHEMA_URL;
    use opentelemetry_semantic_conventions::attribute::{
        DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION,
    };
    use std::env;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TelemetryProtocol {
        Http,
        Grpc,
    }

    impl TelemetryProtocol {
        /// `None` unless some `OTEL_EXPORTER_OTLP_*` variable is set.
        pub fn from_env() -> Option<Self> {
            let enabled = ["ENDPOINT", "HEADERS", "PROTOCOL"]
                .iter()
                .any(|suffix| env::var(format!("OTEL_EXPORTER_OTLP_{suffix}")).is_ok());
            if !enabled {
                return None;
            }
            let protocol = match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
                Ok("grpc") => TelemetryProtocol::Grpc,
                _ => TelemetryProtocol::Http,
            };
            Some(protocol)
        }
    }

    fn resource(name: &'static str, version: &'static str) -> Resource {
        let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
        Resource::builder()
            .with_service_name(name)
            .with_schema_url(
                [
                    KeyValue::new(SERVICE_VERSION, version),
                    KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
                ],
                SCHEMA_URL,
            )
            .build()
    }

    pub fn init_tracer_provider(
        protocol: TelemetryProtocol,
        name: &'static str,
        version: &'static str,
    ) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
        let exporter = opentelemetry_otlp::SpanExporter::builder();
        let exporter = match protocol {
            TelemetryProtocol::Http => exporter.with_http().build()?,
            TelemetryProtocol::Grpc => exporter.with_tonic().build()?,
        };
        Ok(SdkTracerProvider::builder()
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                1.0,
            ))))
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource(name, version))
            .with_batch_exporter(exporter)
            .build())
    }
}
