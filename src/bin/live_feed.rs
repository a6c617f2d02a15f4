//! Live feed for the medical-supply dashboard
//!
//! Connects to the realtime server, reconciles every inbound event into the
//! configured viewer's dashboard and logs the outcome until Ctrl+C.
//!
//! Usage: `live-feed [config.yaml]` (default `$CONFIG_PATH` or
//! `config/dashboard.yaml`).

use anyhow::{Context, Result};
use medsupply_live::bin_common::{
    config_type_from_args, init_logging_with_level, load_config_from_env, parse_args,
    BinaryRunner, RunConfig, ShutdownSignal,
};
use medsupply_live::livesocket::{MessageChannel, SubscriptionAdapter};
use medsupply_live::medsupply::{
    Announcement, DashboardConfig, DashboardState, EventReconciler, LogNotifier,
    ReconcilingSubscriber, SessionAnnouncer, SharedDashboard,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

struct LiveFeedApp {
    config: DashboardConfig,
    run_config: RunConfig,
    shutdown: ShutdownSignal,
    dashboard: SharedDashboard,
    subscriber: Arc<ReconcilingSubscriber>,
    channel: Option<MessageChannel>,
    announcer: Option<Arc<SessionAnnouncer>>,
}

impl LiveFeedApp {
    fn new(config: DashboardConfig) -> Self {
        let dashboard = DashboardState::shared();
        let reconciler =
            EventReconciler::new(config.viewer.clone(), dashboard.clone(), Arc::new(LogNotifier))
                .with_dedupe_capacity(config.reconciler.dedupe_capacity);

        Self {
            run_config: RunConfig::new("Medsupply Live Feed").with_heartbeat(60),
            shutdown: ShutdownSignal::new(),
            subscriber: Arc::new(ReconcilingSubscriber::new(reconciler)),
            dashboard,
            channel: None,
            announcer: None,
            config,
        }
    }
}

impl BinaryRunner for LiveFeedApp {
    async fn run(&mut self) -> Result<()> {
        self.shutdown.spawn_signal_handler();

        let channel = MessageChannel::new(self.config.realtime.manager_builder())?;
        self.channel = Some(channel.clone());

        // Registered before the adapter connects so the first link is announced too
        let announcer = Arc::new(SessionAnnouncer::new(
            &channel,
            Announcement::new(&self.config.viewer, self.config.session_token.clone()),
        ));
        let announcer_id = channel.subscribe(announcer.clone());
        self.announcer = Some(announcer);

        let mut adapter = SubscriptionAdapter::new(channel.clone())
            .with_consumer(self.subscriber.clone())
            .with_inbox_capacity(self.config.realtime.inbox_capacity);
        adapter.connect(&self.config.realtime.url)?;

        let status_every = Duration::from_secs(self.run_config.heartbeat_interval_secs);
        let mut last_status = Instant::now();
        let mut was_connected = false;

        while self.shutdown.is_running() {
            let connected = adapter.is_connected();
            if !connected && was_connected {
                warn!("Live feed disconnected, waiting for reconnect");
            }
            was_connected = connected;

            if last_status.elapsed() >= status_every {
                let stats = self.subscriber.stats();
                info!(
                    "Heartbeat: {} | last '{}' | applied {} filtered {} duplicates {}",
                    if connected { "connected" } else { "disconnected" },
                    adapter
                        .last_message()
                        .map(|e| e.kind().to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    stats.applied,
                    stats.filtered,
                    stats.duplicates
                );
                if let Some(error) = adapter.error() {
                    warn!("Last channel error: {}", error);
                }
                last_status = Instant::now();
            }

            self.shutdown.interruptible_sleep(POLL_INTERVAL).await;
        }

        channel.unsubscribe(announcer_id);
        adapter.close();
        Ok(())
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn stats(&self) -> Option<String> {
        let stats = self.subscriber.stats();
        let dashboard = self.dashboard.read();
        let mut lines = vec![
            format!(
                "Reconciled: {} applied, {} filtered, {} duplicates, {} ignored, {} rejected",
                stats.applied, stats.filtered, stats.duplicates, stats.ignored, stats.rejected
            ),
            format!(
                "Dashboard: {} orders, {} pending",
                dashboard.orders().len(),
                dashboard.pending_orders()
            ),
        ];

        if let Some(announcer) = &self.announcer {
            lines.push(format!("Announced {} connections", announcer.connects()));
        }

        if let Some(channel) = &self.channel {
            let metrics = channel.metrics();
            lines.push(format!(
                "Channel: {} sent, {} received, {} dropped, {} reconnects",
                metrics.messages_sent,
                metrics.messages_received,
                metrics.dropped_sends,
                metrics.reconnect_count
            ));
        }

        Some(lines.join("\n"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let config_path = load_config_from_env(config_type_from_args(&args));

    // Load config first (before logging is initialized)
    let config = DashboardConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_logging_with_level(&config.log_level);
    config.log();

    let mut app = LiveFeedApp::new(config);
    app.execute().await
}
