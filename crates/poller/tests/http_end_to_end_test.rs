// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use notification_poller::{
    ConnectionStatus, HttpNotificationClient, NotificationCenter, NotificationKind,
    PollerSettings, PollingArbiter, VisibilityGate,
};
use test_assets::{
    assert_while_retry, empty_list_response, notifications_list_response,
    NOTIFICATION_ID_APPROVED, NOTIFICATION_ID_REMINDER, NOTIFICATION_ID_REVIEW,
};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn portal() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications-list"))
        .and(header("Cache-Control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_json(notifications_list_response()))
        .mount(&mock_server)
        .await;
    mock_server
}

fn mount(mock_server: &MockServer) -> NotificationCenter {
    let client = HttpNotificationClient::for_base_url(&format!("{}/api/", mock_server.uri()))
        .expect("mock server uri is a valid url");
    NotificationCenter::mount(
        Arc::new(client),
        Arc::new(PollingArbiter::new()),
        VisibilityGate::default(),
        PollerSettings::default(),
    )
}

#[test_log::test(tokio::test)]
async fn test_loads_notifications_from_portal() {
    let mock_server = portal().await;
    let center = mount(&mock_server);

    assert_while_retry!(center.state().notifications.is_empty());

    let state = center.state();
    assert_eq!(state.unread_count, 2);
    assert_eq!(state.connection_status, ConnectionStatus::Connected);
    assert!(state.last_updated.is_some());
    let review = &state.notifications[0];
    assert_eq!(review.id, NOTIFICATION_ID_REVIEW);
    assert_eq!(review.kind, NotificationKind::ReviewRequested);
    assert_eq!(review.submitter(), Some("Operations Desk"));
    let reminder = &state.notifications[2];
    assert_eq!(reminder.id, NOTIFICATION_ID_REMINDER);
    assert!(reminder.is_read);

    center.unmount().await;
}

#[tokio::test]
async fn test_mark_as_read_hits_portal() {
    let mock_server = portal().await;
    Mock::given(method("POST"))
        .and(path(format!(
            "/api/notifications/{NOTIFICATION_ID_APPROVED}/mark-read"
        )))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    let center = mount(&mock_server);
    assert_while_retry!(center.state().notifications.is_empty());

    center.mark_as_read(NOTIFICATION_ID_APPROVED).await;

    assert_eq!(center.unread_count(), 1);
    center.unmount().await;
    mock_server.verify().await;
}

#[tokio::test]
async fn test_expired_session_stops_polling() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications-list"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    let center = mount(&mock_server);

    assert_while_retry!(center.state().connection_status != ConnectionStatus::AuthError);

    assert!(!center.is_polling());
    center.unmount().await;
    mock_server.verify().await;
}

#[tokio::test]
async fn test_refetch_picks_up_portal_changes() {
    let mock_server = MockServer::start().await;
    let listed = Mock::given(method("GET"))
        .and(path("/api/notifications-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(notifications_list_response()))
        .mount_as_scoped(&mock_server)
        .await;
    let center = mount(&mock_server);
    assert_while_retry!(center.state().notifications.is_empty());
    drop(listed);

    Mock::given(method("GET"))
        .and(path("/api/notifications-list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_list_response()))
        .mount(&mock_server)
        .await;
    center.refetch().await;

    let state = center.state();
    assert!(state.notifications.is_empty());
    assert_eq!(state.unread_count, 0);
    assert_eq!(state.connection_status, ConnectionStatus::Connected);
    center.unmount().await;
}
