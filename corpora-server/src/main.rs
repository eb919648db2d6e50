mod auth;
mod container;
mod response;
mod routes;
mod storage;

use anyhow::Result;
use auth::Authorizer;
use axum::{
    extract::Request,
    http::{HeaderValue, header},
    middleware::Next,
};
use bytesize::ByteSize;
use clap::Parser;
use clap_duration::duration_range_value_parse;
use dotenvy::dotenv;
use duration_human::{DurationHuman, DurationHumanValidator};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use storage::BlobStorage;
use tokio::{net::TcpListener, signal};
use tower_http::{
    catch_panic::CatchPanicLayer,
    normalize_path::NormalizePathLayer,
    trace::{self, TraceLayer},
};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[clap(author, about, version)]
struct Arguments {
    /// Internet socket address that the server should be ran on.
    #[arg(
        long = "address",
        env = "CORPORA_SERVER_ADDRESS",
        default_value = "127.0.0.1:8310"
    )]
    address: SocketAddr,

    /// Public base URL (including scheme) that minted signed URLs should
    /// point at. Must be the URL clients reach this server on.
    #[clap(
        long = "public-url",
        env = "CORPORA_SERVER_PUBLIC_URL",
        default_value = "http://127.0.0.1:8310"
    )]
    public_url: Url,

    /// The directory where blobs should be stored.
    ///
    /// CAUTION: This directory should not be used for anything else as it and all subdirectories will be automatically managed.
    #[clap(
        long = "data-path",
        env = "CORPORA_SERVER_DATA_DIRECTORY",
        default_value = dirs::data_local_dir().unwrap().join(env!("CARGO_PKG_NAME")).into_os_string()
    )]
    data_directory: PathBuf,

    /// Secret key used to sign and verify signed download URLs.
    ///
    /// Rotating the key invalidates all previously minted URLs.
    #[clap(
        long = "signing-key",
        env = "CORPORA_SERVER_SIGNING_KEY",
        hide_env_values = true
    )]
    signing_key: String,

    /// Access tokens that identify callers as users (comma-separated).
    #[clap(
        long = "access-token",
        env = "CORPORA_SERVER_ACCESS_TOKENS",
        value_delimiter = ',',
        required = true,
        hide_env_values = true
    )]
    access_tokens: Vec<String>,

    /// Amount of time a minted signed download URL stays valid for.
    #[clap(long = "signed-url-ttl", env = "CORPORA_SERVER_SIGNED_URL_TTL", default_value = "5min", value_parser = duration_range_value_parse!(min: 1min, max: 1h))]
    signed_url_ttl: DurationHuman,

    /// The maximum blob size that is permitted.
    #[clap(
        long = "blob-max-size",
        env = "CORPORA_SERVER_BLOB_MAX_SIZE",
        default_value = "500MB"
    )]
    blob_max_size: ByteSize,
}

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<BlobStorage>,
    pub authorizer: Arc<Authorizer>,
    pub signed_url_ttl: Duration,
    pub blob_max_size: ByteSize,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info")))
        .init();
    let args = Arguments::parse();

    let storage = Arc::new(BlobStorage::new(
        args.data_directory.join("blobs"),
        args.public_url,
        args.signing_key,
    )?);

    let router = routes::router(AppState {
        storage,
        authorizer: Arc::new(Authorizer::new(args.access_tokens)),
        signed_url_ttl: Duration::from(&args.signed_url_ttl),
        blob_max_size: args.blob_max_size,
    })
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    )
    .layer(NormalizePathLayer::trim_trailing_slash())
    .layer(CatchPanicLayer::new())
    .layer(axum::middleware::from_fn(
        async |req: Request, next: Next| {
            let mut res = next.run(req).await;
            let res_headers = res.headers_mut();
            res_headers.insert(
                header::SERVER,
                HeaderValue::from_static(env!("CARGO_PKG_NAME")),
            );
            res_headers.insert("X-Robots-Tag", HeaderValue::from_static("none"));
            res
        },
    ));

    let tcp_listener = TcpListener::bind(args.address).await?;
    info!(
        "\nCorpora server started\n* Listening on: http://{}",
        args.address,
    );
    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

// https://github.com/tokio-rs/axum/blob/15917c6dbcb4a48707a20e9cfd021992a279a662/examples/graceful-shutdown/src/main.rs#L55
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
