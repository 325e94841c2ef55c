//! bucketcast server
//!
//! Routes bucket events from MQTT to per-rule topics and serves the admin
//! commands over gRPC. Configuration comes from `BUCKETCAST_*` variables and
//! the optional TOML file named by `BUCKETCAST_CONFIG`.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::signal;
use tonic::transport::Server;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use bucketcast::remote::InMemoryNotificationBackend;
use bucketcast::router::RouterConfig;
use bucketcast::transport::grpc::AdminServiceImpl;
use bucketcast::transport::mqtt::{spawn_inbound, MqttPublisher};
use bucketcast::{run_startup_sync, NotificationService, Router, RouterSystem, ServerConfig};

fn init_tracing() {
    // RUST_LOG wins; default to "info" if unset or invalid.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::load()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        queue_id = %config.queue_id,
        broker = %format!("{}:{}", config.mqtt.broker_host, config.mqtt.broker_port),
        base_topic = %config.mqtt.base_topic,
        "starting bucketcast"
    );

    // Embedded backend seeded with the configured buckets.
    let backend = Arc::new(InMemoryNotificationBackend::with_buckets(config.buckets.clone()));
    let service = Arc::new(NotificationService::in_memory(backend, config.queue_id.clone()));

    let policy = config.startup;
    let sync_service = Arc::clone(&service);
    let report = tokio::task::spawn_blocking(move || run_startup_sync(&sync_service, policy)).await??;
    if !report.is_clean() {
        warn!(failures = ?report.failures, "startup sync incomplete; running degraded");
    }

    let runtime = Handle::current();
    let (publisher, outbound_task) = MqttPublisher::start(&config.mqtt, &runtime);
    let router = Arc::new(Router::new(
        RouterConfig {
            base_topic: config.mqtt.base_topic.clone(),
            publish_timeout: config.mqtt.publish_timeout(),
        },
        service.rule_store(),
        publisher,
    ));
    let system = Arc::new(RouterSystem::start(config.router, router)?);
    let inbound_task = spawn_inbound(&config.mqtt, Arc::clone(&system), &runtime);

    let admin = AdminServiceImpl::new(Arc::clone(&service)).into_server();
    info!(addr = %config.admin_bind, "admin gRPC listening; Ctrl+C to stop");

    Server::builder()
        .add_service(admin)
        .serve_with_shutdown(config.admin_bind, async {
            let _ = signal::ctrl_c().await;
        })
        .await?;

    inbound_task.abort();
    outbound_task.abort();
    info!(
        processed = system.processed(),
        dropped = system.dropped(),
        rejected = system.rejected(),
        "shut down"
    );
    Ok(())
}
