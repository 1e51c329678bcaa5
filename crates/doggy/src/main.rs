use std::net::Ipv4Addr;
use std::sync::Arc;

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::GraphQL;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use doggy_lib::config::Config;
use doggy_lib::graphql_api::{self, ApiSchemaContext};
use doggy_lib::object_storage::HttpObjectStorage;
use doggy_lib::rest::{rest_routes, RestState};
use doggy_lib::{metrics, CliOptions, PrometheusExporter, DOGGY_VERSION};
use doggy_store::{DoggyStore, Store};
use prometheus_exporter::prometheus;
use tokio::net::TcpListener;
use tracing::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Parse options");
    let cli_options = CliOptions::parse();

    info!("Loading configuration file");
    let config = Config::load(&cli_options)?;

    info!("Initialize store and running migrations");
    let store = Store::new(&config.database_url).await?;
    info!("Store initialization successful");

    // Prometheus metrics.
    metrics();
    let registry = prometheus::default_registry().clone();
    let _exporter = PrometheusExporter::start(config.prometheus_port, registry)?;

    let storage = HttpObjectStorage::from_config(&config.object_storage);
    let rest_state = RestState {
        store: Arc::new(store.clone()),
        storage: Arc::new(storage),
        bucket: config.object_storage.bucket.clone(),
        upload_timeout: config.object_storage.upload_timeout(),
    };

    info!(
        port = config.graphql.port,
        version = DOGGY_VERSION,
        "Serving API"
    );
    // Listen to requests forever.
    axum::serve(
        TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.graphql.port)).await?,
        axum_server(Arc::new(store), rest_state),
    )
    .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn axum_server(store: Arc<dyn DoggyStore>, rest_state: RestState) -> Router<()> {
    let api_schema = graphql_api::api_schema(ApiSchemaContext::new(store));

    Router::new()
        .route("/", get(|| async { "Ready to roll!" }))
        .route(
            "/graphql",
            get(graphiql_route).post_service(GraphQL::new(api_schema)),
        )
        .merge(rest_routes(rest_state))
}

async fn graphiql_route() -> impl IntoResponse {
    axum::response::Html(GraphiQLSource::build().endpoint("/graphql").finish())
}
