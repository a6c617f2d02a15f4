use crate::builder::ConnectionManagerBuilder;
use crate::config::ManagerConfig;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Disconnect reason reported when the local side closes the session
pub const REASON_CLIENT_DISCONNECT: &str = "client disconnect";

/// Disconnect reason reported when the peer sends a close frame
pub const REASON_SERVER_DISCONNECT: &str = "server disconnect";

/// Receives transport events from a [`ConnectionManager`]
///
/// Called from the session task, one call per occurrence, in the order the
/// transport produced them. Implementations must not block for long: the
/// next inbound frame waits until the call returns.
pub trait ConnectionListener: Send + Sync + 'static {
    fn on_connect(&self);
    fn on_disconnect(&self, reason: &str);
    fn on_error(&self, error: &LiveSocketError);
    fn on_frame(&self, frame: Frame);
}

/// Internal command messages for the session task
#[derive(Debug)]
enum SessionCommand {
    /// Frame accepted while link `epoch` was connected
    Send { frame: Frame, epoch: u64 },
    Shutdown,
}

/// Metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub dropped_sends: u64,
    pub connection_state: ConnectionState,
}

/// Handle on one spawned session task
struct Session {
    url: String,
    state: Arc<AtomicConnectionState>,
    /// Run flag - cleared by `disconnect`, checked before every reconnection
    active: Arc<AtomicBool>,
    /// Bumped on every established link
    epoch: Arc<AtomicU64>,
    command_tx: UnboundedSender<SessionCommand>,
    task: tokio::task::JoinHandle<()>,
}

impl Session {
    fn is_live(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.task.is_finished()
    }

    fn stop(&self) {
        self.active.store(false, Ordering::Release);
        self.state.set(ConnectionState::ShuttingDown);
        let _ = self.command_tx.send(SessionCommand::Shutdown);
    }
}

/// Everything the session task needs, cloned out of the manager
struct SessionContext {
    url: String,
    config: Arc<ManagerConfig>,
    listener: Arc<dyn ConnectionListener>,
    state: Arc<AtomicConnectionState>,
    metrics: Arc<AtomicMetrics>,
    last_error: Arc<RwLock<Option<LiveSocketError>>>,
    active: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
}

impl SessionContext {
    #[inline]
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn report_error(&self, err: LiveSocketError) {
        *self.last_error.write() = Some(err.clone());
        if self.is_active() {
            self.listener.on_error(&err);
        }
    }

    /// Discard a frame that was accepted for a link that is gone
    fn drop_stale(&self, epoch: u64) {
        self.metrics.increment_dropped();
        warn!(
            "Dropping frame queued for link {} of {}: link closed before it was written",
            epoch, self.url
        );
    }
}

/// Owns at most one live transport session
///
/// `connect` is a no-op while a session is live; `disconnect` stops it and
/// releases the handle so the next `connect` starts a fresh session with a
/// fresh reconnect budget. Transport failures never surface as `Err` from
/// these calls: they reach the listener's `on_error` and stay readable via
/// [`last_error`](Self::last_error).
pub struct ConnectionManager {
    config: Arc<ManagerConfig>,
    runtime: tokio::runtime::Handle,
    listener: Arc<dyn ConnectionListener>,
    session: Mutex<Option<Session>>,
    metrics: Arc<AtomicMetrics>,
    /// Survives sessions so a give-up keeps its cause visible
    last_error: Arc<RwLock<Option<LiveSocketError>>>,
}

impl ConnectionManager {
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    pub(crate) fn new(
        config: ManagerConfig,
        runtime: tokio::runtime::Handle,
        listener: Arc<dyn ConnectionListener>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
            listener,
            session: Mutex::new(None),
            metrics: Arc::new(AtomicMetrics::new()),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Open a session to `url` unless one is already live
    ///
    /// Returns immediately; the handshake runs on the session task. Only a
    /// malformed URL is reported as `Err`.
    pub fn connect(&self, url: &str) -> Result<()> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(LiveSocketError::Configuration(format!(
                "endpoint must use ws:// or wss://, got '{}'",
                url
            )));
        }

        let mut slot = self.session.lock();

        if let Some(session) = slot.as_ref() {
            if session.is_live() {
                debug!(
                    "Session to {} already active, connect({}) is a no-op",
                    session.url, url
                );
                return Ok(());
            }
        }

        // A session that gave up after exhausting its strategy is replaced
        if let Some(stale) = slot.take() {
            debug!("Replacing finished session to {}", stale.url);
            stale.stop();
        }

        let state = Arc::new(AtomicConnectionState::new(ConnectionState::Connecting));
        let active = Arc::new(AtomicBool::new(true));
        let epoch = Arc::new(AtomicU64::new(0));
        let (command_tx, command_rx) = unbounded_channel();

        let ctx = SessionContext {
            url: url.to_string(),
            config: Arc::clone(&self.config),
            listener: Arc::clone(&self.listener),
            state: Arc::clone(&state),
            metrics: Arc::clone(&self.metrics),
            last_error: Arc::clone(&self.last_error),
            active: Arc::clone(&active),
            epoch: Arc::clone(&epoch),
        };

        info!("Opening session to {}", url);
        let task = self.runtime.spawn(run_session(ctx, command_rx));

        *slot = Some(Session {
            url: url.to_string(),
            state,
            active,
            epoch,
            command_tx,
            task,
        });

        Ok(())
    }

    /// Close the live session, if any
    ///
    /// Idempotent and non-blocking. When the session was connected the
    /// listener gets `on_disconnect("client disconnect")` before this returns.
    pub fn disconnect(&self) {
        let session = self.session.lock().take();

        let Some(session) = session else {
            debug!("disconnect() with no session, nothing to do");
            return;
        };

        // Whoever leaves Connected first reports the disconnect
        let was_connected = session
            .state
            .compare_exchange(ConnectionState::Connected, ConnectionState::ShuttingDown)
            .is_ok();
        info!("Closing session to {}", session.url);
        session.stop();

        if was_connected {
            self.listener.on_disconnect(REASON_CLIENT_DISCONNECT);
        }
    }

    /// Queue a frame on the live session
    ///
    /// Fails with `NotConnected` when no session is connected. The frame is
    /// bound to the link that is up now: if that link closes before the frame
    /// is written, it is dropped rather than sent on a later connection.
    pub fn send(&self, frame: Frame) -> Result<()> {
        let slot = self.session.lock();

        let Some(session) = slot.as_ref() else {
            self.metrics.increment_dropped();
            return Err(LiveSocketError::NotConnected);
        };

        // Epoch first: a newer link can only make the tag stale, never too new
        let epoch = session.epoch.load(Ordering::Acquire);
        if !session.state.is_connected() {
            self.metrics.increment_dropped();
            return Err(LiveSocketError::NotConnected);
        }

        session
            .command_tx
            .send(SessionCommand::Send { frame, epoch })
            .map_err(|e| LiveSocketError::ChannelSend(e.to_string()))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.state.get())
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// Most recent transport error, cleared on every successful connect
    pub fn last_error(&self) -> Option<LiveSocketError> {
        self.last_error.read().clone()
    }

    /// Endpoint of the current session
    pub fn url(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.url.clone())
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            messages_sent: self.metrics.messages_sent(),
            messages_received: self.metrics.messages_received(),
            reconnect_count: self.metrics.reconnect_count(),
            dropped_sends: self.metrics.dropped_sends(),
            connection_state: self.connection_state(),
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.stop();
        }
    }
}

/// Session task: dial, serve, and redial per the reconnection strategy
async fn run_session(ctx: SessionContext, mut command_rx: UnboundedReceiver<SessionCommand>) {
    let mut reconnect_attempt = 0;

    loop {
        if !ctx.is_active() {
            debug!("Session to {} stopped, exiting loop", ctx.url);
            break;
        }

        let dialing = if reconnect_attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        ctx.state.set(dialing);

        let dial = tokio::time::timeout(ctx.config.connect_timeout, connect_async(&ctx.url)).await;

        match dial {
            Ok(Ok((ws_stream, _))) => {
                if !ctx.is_active() {
                    debug!("Session stopped during handshake, dropping stream");
                    break;
                }

                let epoch = ctx.epoch.fetch_add(1, Ordering::AcqRel) + 1;
                if ctx
                    .state
                    .compare_exchange(dialing, ConnectionState::Connected)
                    .is_err()
                {
                    debug!("Session stopped during handshake, dropping stream");
                    break;
                }
                info!("Connected to {} (link {})", ctx.url, epoch);
                *ctx.last_error.write() = None;
                reconnect_attempt = 0;
                ctx.config.reset_strategy();
                ctx.listener.on_connect();

                let reason = match serve_connection(ws_stream, &ctx, &mut command_rx, epoch).await {
                    Ok(reason) => reason,
                    Err(e) => {
                        error!("Connection error: {}", e);
                        let reason = e.to_string();
                        ctx.report_error(e);
                        reason
                    }
                };

                drain_stale_sends(&ctx, &mut command_rx);

                // Lost to `disconnect`, which already reported it
                if ctx
                    .state
                    .compare_exchange(ConnectionState::Connected, ConnectionState::Disconnected)
                    .is_err()
                {
                    break;
                }

                if !ctx.is_active() {
                    break;
                }
                ctx.listener.on_disconnect(&reason);
            }
            Ok(Err(e)) => {
                error!("Failed to connect to {}: {}", ctx.url, e);
                ctx.state.set(ConnectionState::Disconnected);
                ctx.report_error(LiveSocketError::WebSocket(e.to_string()));
            }
            Err(_) => {
                error!(
                    "Handshake with {} timed out after {:?}",
                    ctx.url, ctx.config.connect_timeout
                );
                ctx.state.set(ConnectionState::Disconnected);
                ctx.report_error(LiveSocketError::WebSocket(format!(
                    "handshake timed out after {:?}",
                    ctx.config.connect_timeout
                )));
            }
        }

        if !ctx.is_active() {
            debug!("Session stopped, not reconnecting");
            break;
        }

        match ctx.config.next_delay(reconnect_attempt) {
            Some(delay) => {
                info!(
                    "Reconnecting to {} in {:?} (attempt {})",
                    ctx.url,
                    delay,
                    reconnect_attempt + 1
                );

                if !sleep_while_active(&ctx, delay).await {
                    debug!("Session stopped during reconnection delay");
                    break;
                }

                reconnect_attempt += 1;
                ctx.metrics.increment_reconnects();
            }
            None => {
                warn!(
                    "Reconnection to {} exhausted after {} attempts, giving up until next connect",
                    ctx.url, reconnect_attempt
                );
                break;
            }
        }
    }

    if ctx.is_active() {
        ctx.state.set(ConnectionState::Disconnected);
    }
    debug!("Session task for {} exiting", ctx.url);
}

/// Sleep for `delay`, waking every 100ms to honour a stop request
///
/// Returns false if the session was stopped meanwhile.
async fn sleep_while_active(ctx: &SessionContext, delay: Duration) -> bool {
    let check_interval = Duration::from_millis(100);
    let mut elapsed = Duration::ZERO;

    while elapsed < delay {
        if !ctx.is_active() {
            return false;
        }
        let step = std::cmp::min(check_interval, delay - elapsed);
        tokio::time::sleep(step).await;
        elapsed += step;
    }

    ctx.is_active()
}

/// Drop every frame still queued for a link that has ended
fn drain_stale_sends(ctx: &SessionContext, command_rx: &mut UnboundedReceiver<SessionCommand>) {
    while let Ok(cmd) = command_rx.try_recv() {
        if let SessionCommand::Send { epoch, .. } = cmd {
            ctx.drop_stale(epoch);
        }
    }
}

/// Serve one established connection until it ends
///
/// `Ok(reason)` for an orderly close (either side), `Err` for transport
/// failures.
async fn serve_connection(
    ws_stream: WsStream,
    ctx: &SessionContext,
    command_rx: &mut UnboundedReceiver<SessionCommand>,
    epoch: u64,
) -> Result<String> {
    let (mut write, mut read) = ws_stream.split();

    let mut heartbeat = ctx.config.heartbeat.as_ref().map(|(interval, make_payload)| {
        let mut ticker =
            tokio::time::interval_at(tokio::time::Instant::now() + *interval, *interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        (ticker, Arc::clone(make_payload))
    });

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Peer closed the connection: {:?}", frame);
                        return Ok(REASON_SERVER_DISCONNECT.to_string());
                    }
                    Some(Ok(msg)) => {
                        let Some(frame) = Frame::from_tungstenite(msg) else {
                            continue;
                        };

                        ctx.metrics.increment_received();

                        // Frames racing a disconnect are not delivered
                        if !ctx.is_active() {
                            debug!("Session stopped, discarding inbound frame");
                            continue;
                        }

                        ctx.listener.on_frame(frame);
                    }
                    Some(Err(e)) => {
                        return Err(LiveSocketError::WebSocket(e.to_string()));
                    }
                    None => {
                        warn!("WebSocket stream to {} ended", ctx.url);
                        return Err(LiveSocketError::ConnectionClosed("stream ended".into()));
                    }
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Send { epoch: queued_for, .. }) if queued_for != epoch => {
                        ctx.drop_stale(queued_for);
                    }
                    Some(SessionCommand::Send { frame, .. }) => {
                        write
                            .send(frame.into_tungstenite())
                            .await
                            .map_err(|e| LiveSocketError::WebSocket(e.to_string()))?;
                        ctx.metrics.increment_sent();
                    }
                    Some(SessionCommand::Shutdown) => {
                        info!("Received shutdown command");
                        let _ = write.close().await;
                        return Ok(REASON_CLIENT_DISCONNECT.to_string());
                    }
                    None => {
                        debug!("Command channel closed, closing connection");
                        let _ = write.close().await;
                        return Ok(REASON_CLIENT_DISCONNECT.to_string());
                    }
                }
            }

            payload = async {
                match heartbeat.as_mut() {
                    Some((ticker, make_payload)) => {
                        ticker.tick().await;
                        make_payload()
                    }
                    None => std::future::pending().await,
                }
            } => {
                let payload = match payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Skipping heartbeat, payload could not be built: {}", e);
                        continue;
                    }
                };
                debug!("Heartbeat tick - sending keepalive");
                write
                    .send(payload.into_tungstenite())
                    .await
                    .map_err(|e| LiveSocketError::WebSocket(format!("Failed to send heartbeat: {}", e)))?;
                ctx.metrics.increment_sent();
            }
        }
    }
}
