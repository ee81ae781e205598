//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that wires the event router,
//! the telnet server and the chat plugin together, runs the background tasks
//! and drives the phased shutdown.

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::display_banner;
use crate::signals::{wait_for_shutdown, wait_for_signal};
use mud_event_system::{Event, EventRouter, ShutdownState};
use plugin_chat::ChatPlugin;
use std::sync::Arc;
use std::time::Duration;
use telnet_server::{ConnectionRegistry, TelnetServer};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant};
use tracing::{error, info, warn};

const HEALTH_INTERVAL: Duration = Duration::from_secs(60);

/// Owns everything the server process runs.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    router: Arc<EventRouter>,
    server: TelnetServer,
    shutdown_state: ShutdownState,
}

impl Application {
    /// Builds the application from parsed arguments.
    ///
    /// Loads the configuration file (creating it if missing), applies CLI
    /// overrides, validates the result and registers the chat plugin.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_overrides(&args)?;

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();
        Self::from_config(config)
    }

    /// Builds the application from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let router = Arc::new(EventRouter::new());
        ChatPlugin::new(&config.chat)?.register(&router);

        let shutdown_state = ShutdownState::new();
        let server = TelnetServer::with_shutdown_state(
            config.to_server_config()?,
            Arc::clone(&router),
            shutdown_state.clone(),
        );

        Ok(Self {
            config,
            router,
            server,
            shutdown_state,
        })
    }

    /// Runs until a termination signal arrives, then shuts down in phases.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting MUD server");
        self.log_configuration_summary();

        let Self {
            config,
            router,
            server,
            shutdown_state,
        } = self;

        router.start()?;
        let local_addr = match server.start() {
            Ok(addr) => addr,
            Err(e) => {
                router.shutdown();
                return Err(e.into());
            }
        };

        let tick_handle = spawn_tick(
            Arc::clone(&router),
            config.server.tick_interval_ms,
            config.server.tick_message.clone(),
        );
        let monitoring_handle = spawn_health_monitor(Arc::clone(&router), server.registry());

        info!("✅ MUD server is now running!");
        info!("🎮 Ready to accept telnet connections on {}", local_addr);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        wait_for_shutdown(&shutdown_state).await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = wait_for_signal().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("📡 Phase 1: Stopping background tasks...");
        if let Some(handle) = tick_handle {
            handle.abort();
        }
        monitoring_handle.abort();

        info!("🔌 Phase 2: Closing connections...");
        tokio::task::spawn_blocking(move || server.shutdown()).await?;

        info!("⏳ Phase 3: Delivering remaining events...");
        let drained = Arc::clone(&router);
        tokio::task::spawn_blocking(move || drained.shutdown()).await?;
        shutdown_state.complete_shutdown();

        log_final_statistics(&router);
        info!("✅ MUD server shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!(
            "  📏 Max line: {} bytes | Max queue: {} units",
            self.config.server.max_line_length, self.config.server.max_outgoing_queue
        );
        info!("  🖼️ Framing: {:?}", self.config.server.framing);
        info!(
            "  🗣️ Gossip: {} (echo to sender: {})",
            if self.config.gossip.enabled { "on" } else { "off" },
            self.config.gossip.echo_to_sender
        );
        info!("  💬 Chat commands: {}", self.config.chat.commands.len());
        if self.config.server.tick_interval_ms > 0 {
            info!("  ⏱️ Tick every {}ms", self.config.server.tick_interval_ms);
        }
    }
}

/// Broadcasts `message` every `interval_ms`; `None` when ticks are disabled.
fn spawn_tick(router: Arc<EventRouter>, interval_ms: u64, message: String) -> Option<JoinHandle<()>> {
    if interval_ms == 0 {
        return None;
    }

    let period = Duration::from_millis(interval_ms);
    Some(tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        loop {
            ticks.tick().await;
            if router.publish(Event::broadcast(message.clone())).is_err() {
                break;
            }
        }
    }))
}

fn spawn_health_monitor(router: Arc<EventRouter>, registry: Arc<ConnectionRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval(HEALTH_INTERVAL);
        let mut last_published = 0u64;

        loop {
            ticks.tick().await;

            let stats = router.stats();
            let events_this_period = stats.events_published - last_published;
            last_published = stats.events_published;

            info!(
                "📊 System Health - {} connections | {} events/min | {} handlers | {} queued | {} failures",
                registry.len(),
                events_this_period,
                stats.total_handlers,
                stats.queue_depth,
                stats.handler_failures
            );

            if events_this_period > 10000 {
                info!(
                    "🔥 High activity detected - {} events processed this minute",
                    events_this_period
                );
            }
        }
    })
}

fn log_final_statistics(router: &EventRouter) {
    let stats = router.stats();
    info!("📊 Final Statistics:");
    info!("  - Events published: {}", stats.events_published);
    info!("  - Events delivered: {}", stats.events_delivered);
    info!("  - Handler failures: {}", stats.handler_failures);
}
