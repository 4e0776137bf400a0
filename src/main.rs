use std::{path::Path, process, sync::Arc};

use sensor_proxy::{
    application::{
        error::AppError,
        poller::PollingController,
        proxy::{ProxyConfig, ProxyService},
    },
    cache::{CacheConfig, TtlCache, spawn_sweeper},
    config::{self, PollArgs, RepairConfigArgs},
    domain::{
        connection::{ConnectionDescriptor, EndpointSource, repair_connection_config},
        sensor::SensorDescriptor,
    },
    infra::{
        error::InfraError,
        http::{self, AppState},
        proxy_client::HttpProxyClient,
        telemetry,
        upstream::HttpUpstream,
    },
};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Poll(args) => run_poll(settings, *args).await,
        config::Command::RepairConfig(args) => run_repair_config(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let cache = Arc::new(TtlCache::new());
    let upstream = HttpUpstream::new(settings.upstream.request_timeout)?;
    let proxy_config = ProxyConfig::new(settings.upstream.default_endpoint.clone(), &cache_config)
        .with_format_suffix(settings.upstream.format_suffix.clone());
    let proxy = Arc::new(ProxyService::new(
        cache.clone(),
        Arc::new(upstream),
        proxy_config,
    ));

    let shutdown = CancellationToken::new();
    let sweeper = cache_config
        .sweep_interval
        .map(|period| spawn_sweeper(cache.clone(), period, shutdown.clone()));

    let router = http::build_router(AppState { proxy });
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "sensor_proxy::server",
        addr = %settings.server.addr,
        default_endpoint = %settings.upstream.default_endpoint,
        cache_ttl_ms = cache_config.ttl.as_millis() as u64,
        "telemetry proxy listening"
    );

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let mut server_task = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server_task => {
            shutdown.cancel();
            return flatten_server_result(joined);
        }
        _ = wait_for_ctrl_c() => {}
    }

    info!(target = "sensor_proxy::server", "shutdown requested");
    shutdown.cancel();

    let result = match tokio::time::timeout(settings.server.graceful_shutdown, server_task).await {
        Ok(joined) => flatten_server_result(joined),
        Err(_) => {
            warn!(
                target = "sensor_proxy::server",
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out, dropping open connections"
            );
            Ok(())
        }
    };

    if let Some(handle) = sweeper {
        // The sweeper only ever exits through cancellation.
        let _ = handle.await;
    }

    result
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn run_poll(settings: config::Settings, args: PollArgs) -> Result<(), AppError> {
    let connection_config = match args.connection_config_file.as_deref() {
        Some(path) => Some(read_text(Some(path)).await?),
        None => args.connection_config.clone(),
    };

    let mut sensor = SensorDescriptor::new(args.sensor_id.clone()).with_status(args.status);
    if let Some(path) = args.resource_path.as_deref() {
        sensor = sensor.with_resource_path(path);
    }
    if let Some(raw) = connection_config.as_deref() {
        sensor = sensor.with_connection_config(raw);
    }

    let client = HttpProxyClient::new(
        &settings.polling.proxy_url,
        settings.upstream.request_timeout,
    )?;
    info!(
        target = "sensor_proxy::poller",
        sensor_id = %sensor.id,
        status = %sensor.status,
        resource_path = %sensor.effective_resource_path(),
        proxy = %client.endpoint(),
        "starting poll"
    );

    let controller =
        PollingController::new(sensor, true, settings.polling.interval, Arc::new(client));
    let mut updates = controller.subscribe();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                info!(
                    target = "sensor_proxy::poller",
                    sensor_id = %controller.sensor().id,
                    value = state.value,
                    connected = state.connected,
                    last_updated_at = %state.last_updated_at,
                    "reading"
                );
            }
            _ = wait_for_ctrl_c() => break,
        }
    }

    controller.shutdown().await;
    Ok(())
}

async fn run_repair_config(
    settings: config::Settings,
    args: RepairConfigArgs,
) -> Result<(), AppError> {
    let input = read_text(args.file.as_deref()).await?;
    let repaired = repair_connection_config(&input);
    let descriptor =
        ConnectionDescriptor::resolve(Some(&repaired), "", &settings.upstream.default_endpoint);

    println!("{repaired}");
    match &descriptor.source {
        EndpointSource::CustomConfig => {
            eprintln!("endpoint: {} (from config)", descriptor.endpoint_url);
        }
        EndpointSource::DefaultFallback(reason) => {
            eprintln!(
                "endpoint: {} (default, {})",
                descriptor.endpoint_url,
                reason.as_str()
            );
        }
    }
    Ok(())
}

/// Read a whole file, or stdin when `path` is absent or `-`.
async fn read_text(path: Option<&Path>) -> Result<String, AppError> {
    match path {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .map_err(|err| AppError::from(InfraError::from(err))),
        _ => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            Ok(input)
        }
    }
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c, waiting indefinitely");
        std::future::pending::<()>().await;
    }
}
