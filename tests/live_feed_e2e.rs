//! End-to-end: realtime server → channel → adapters → reconcilers
//!
//! Two viewers share one channel, each with its own dashboard.

#[path = "../libs/livesocket/tests/common/mod.rs"]
mod common;

use common::{pause, wait_until, MockWsServer};
use medsupply_live::livesocket::{ConnectionManager, MessageChannel, SubscriptionAdapter};
use medsupply_live::medsupply::{
    Announcement, DashboardState, EventReconciler, GetOrders, LogNotifier, OrderStatus,
    OutboundCommand, ReconcilingSubscriber, Role, SessionAnnouncer, SharedDashboard, Viewer,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

struct Viewpoint {
    dashboard: SharedDashboard,
    subscriber: Arc<ReconcilingSubscriber>,
    adapter: SubscriptionAdapter,
}

fn viewpoint(channel: &MessageChannel, id: &str, role: Role) -> Viewpoint {
    let dashboard = DashboardState::shared();
    let reconciler = EventReconciler::new(Viewer::new(id, role), dashboard.clone(), Arc::new(LogNotifier));
    let subscriber = Arc::new(ReconcilingSubscriber::new(reconciler));
    let adapter = SubscriptionAdapter::new(channel.clone()).with_consumer(subscriber.clone());
    Viewpoint {
        dashboard,
        subscriber,
        adapter,
    }
}

async fn connected_pair(server: &MockWsServer) -> (MessageChannel, Viewpoint, Viewpoint) {
    let channel = MessageChannel::new(
        ConnectionManager::builder().reconnect_policy(5, Duration::from_millis(100)),
    )
    .unwrap();

    let mut admin = viewpoint(&channel, "1", Role::Admin);
    let mut client = viewpoint(&channel, "99", Role::Client);
    admin.adapter.connect(&server.ws_url()).unwrap();
    client.adapter.connect(&server.ws_url()).unwrap();

    assert!(wait_until(WAIT, || admin.adapter.is_connected() && client.adapter.is_connected()).await);
    (channel, admin, client)
}

#[tokio::test]
async fn test_new_order_reaches_admin_but_not_other_client() {
    verbose_println!("Testing new-order-event end to end...");
    let server = MockWsServer::start().await;
    let (_channel, admin, client) = connected_pair(&server).await;

    server.push(
        json!({
            "type": "new-order-event",
            "payload": { "clientId": "3", "id": "77", "status": "pending" },
            "timestamp": 1_700_000_000_000i64
        })
        .to_string(),
    );

    assert!(wait_until(WAIT, || admin.dashboard.read().find_order("77").is_some()).await);
    assert!(wait_until(WAIT, || client.subscriber.stats().filtered == 1).await);

    assert_eq!(admin.dashboard.read().pending_orders(), 1);
    assert!(client.dashboard.read().orders().is_empty());
    assert_eq!(client.dashboard.read().pending_orders(), 0);
}

#[tokio::test]
async fn test_redelivered_dispatch_is_applied_once() {
    let server = MockWsServer::start().await;
    let (_channel, admin, client) = connected_pair(&server).await;

    let new_order = json!({
        "type": "new-order-event",
        "payload": { "clientId": "3", "id": "77", "status": "pending" },
        "timestamp": 1
    });
    let dispatched = json!({
        "type": "set-dispatched-event",
        "payload": { "orderId": "77", "userId": "3", "newStatus": "dispatched" },
        "timestamp": 2
    });

    server.push(new_order.to_string());
    server.push(dispatched.to_string());
    server.push(dispatched.to_string());

    assert!(wait_until(WAIT, || admin.subscriber.stats().duplicates == 1).await);
    pause().await;

    let dashboard = admin.dashboard.read();
    assert_eq!(dashboard.find_order("77").unwrap().status, OrderStatus::Dispatched);
    assert_eq!(dashboard.pending_orders(), 0);

    let stats = client.subscriber.stats();
    assert_eq!(stats.applied, 0);
    assert_eq!(stats.filtered, 2);
}

#[tokio::test]
async fn test_get_orders_command_reaches_server() {
    let server = MockWsServer::start().await;
    let (_channel, admin, _client) = connected_pair(&server).await;

    let envelope = GetOrders { token: "session-token".into() }.to_envelope().unwrap();
    assert!(admin.adapter.send_message(&envelope));

    assert!(wait_until(WAIT, || server.received().len() == 1).await);
    let sent: Value = serde_json::from_str(&server.received()[0]).unwrap();
    assert_eq!(sent["type"], json!("get-orders"));
    assert_eq!(sent["payload"], json!({ "token": "session-token" }));
}

#[tokio::test]
async fn test_every_reconnect_is_announced_and_refetches_orders() {
    let server = MockWsServer::start().await;
    let channel = MessageChannel::new(
        ConnectionManager::builder().reconnect_policy(5, Duration::from_millis(50)),
    )
    .unwrap();
    let announcer = Arc::new(SessionAnnouncer::new(
        &channel,
        Announcement::new(&Viewer::new("1", Role::Admin), Some("session-token".into())),
    ));
    channel.subscribe(announcer.clone());

    let mut admin = viewpoint(&channel, "1", Role::Admin);
    admin.adapter.connect(&server.ws_url()).unwrap();
    assert!(wait_until(WAIT, || server.received().len() == 2).await);

    // Dropped and back well inside any polling interval
    server.kick();
    assert!(wait_until(WAIT, || server.accepted() == 2 && announcer.connects() == 2).await);
    assert!(wait_until(WAIT, || server.received().len() == 4).await);

    let kinds: Vec<String> = server
        .received()
        .iter()
        .map(|text| {
            let sent: Value = serde_json::from_str(text).unwrap();
            sent["type"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds, vec!["greeting", "get-orders", "greeting", "get-orders"]);
}
