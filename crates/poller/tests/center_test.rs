// Copyright 2023-, Edge & Node, GraphOps, and Semiotic Labs.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use notification_poller::{
    test_utils::{page, record, Scripted, ScriptedApi},
    ConnectionStatus, NotificationCenter, PollerSettings, PollingArbiter, VisibilityGate,
};
use rstest::{fixture, rstest};
use tokio::time::sleep;

const SETTLE: Duration = Duration::from_millis(10);

#[fixture]
fn api() -> Arc<ScriptedApi> {
    let api = ScriptedApi::new();
    api.set_fallback(Scripted::Page(page(vec![
        record("a", false),
        record("b", false),
        record("c", true),
    ])));
    api
}

fn mount_with(
    api: &Arc<ScriptedApi>,
    arbiter: &Arc<PollingArbiter>,
    settings: PollerSettings,
) -> NotificationCenter {
    NotificationCenter::mount(
        api.clone(),
        arbiter.clone(),
        VisibilityGate::default(),
        settings,
    )
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_only_one_instance_polls(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let mut centers: Vec<_> = (0..3)
        .map(|_| mount_with(&api, &arbiter, PollerSettings::default()))
        .collect();
    sleep(SETTLE).await;

    assert_eq!(api.list_calls(), 1);
    assert_eq!(centers.iter().filter(|c| c.is_polling()).count(), 1);
    let owner = arbiter.owner().expect("someone owns the token");
    let owner_index = centers
        .iter()
        .position(|c| c.instance() == owner)
        .expect("owner is one of the mounted instances");
    assert!(centers[owner_index].is_polling());

    // standby instances do not poll on their own schedule
    sleep(Duration::from_secs(31)).await;
    assert_eq!(api.list_calls(), 2);

    centers.remove(owner_index).unmount().await;
    sleep(SETTLE).await;

    assert_eq!(centers.iter().filter(|c| c.is_polling()).count(), 1);
    let new_owner = arbiter.owner().expect("a standby instance took over");
    assert_ne!(new_owner, owner);
    assert_eq!(api.list_calls(), 3);

    for center in centers {
        center.unmount().await;
    }
    assert_eq!(arbiter.owner(), None);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_standby_refetch_does_not_fetch(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let first = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;
    let second = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;

    second.refetch().await;

    assert_eq!(api.list_calls(), 1);
    assert!(!second.is_polling());
    assert!(!second.state().is_loading);

    first.unmount().await;
    second.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_mark_as_read_decrements_once(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;
    assert_eq!(center.unread_count(), 2);

    center.mark_as_read("a").await;
    center.mark_as_read("a").await;

    assert_eq!(center.unread_count(), 1);
    assert_eq!(api.mark_read_calls(), vec!["a".to_string(), "a".to_string()]);
    let state = center.state();
    assert!(state.notifications.iter().find(|n| n.id == "a").unwrap().is_read);

    // already read on arrival
    center.mark_as_read("c").await;
    assert_eq!(center.unread_count(), 1);

    center.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_failed_mutations_are_swallowed(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;
    api.fail_mutations(true);

    center.mark_as_read("b").await;
    center.mark_all_as_read().await;

    let state = center.state();
    assert_eq!(state.unread_count, 2);
    assert_eq!(state.error, None);
    assert_eq!(state.connection_status, ConnectionStatus::Connected);
    assert!(center.is_polling());

    center.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_mark_all_as_read(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;

    center.mark_all_as_read().await;

    let state = center.state();
    assert_eq!(api.mark_all_read_calls(), 1);
    assert_eq!(state.unread_count, 0);
    assert!(state.notifications.iter().all(|n| n.is_read));

    center.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_disabled_notifications_stay_inert(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(
        &api,
        &arbiter,
        PollerSettings {
            can_show_notifications: false,
            ..Default::default()
        },
    );

    sleep(Duration::from_secs(600)).await;
    center.refetch().await;
    center.mark_as_read("a").await;
    center.mark_all_as_read().await;

    assert_eq!(api.list_calls(), 0);
    assert!(api.mark_read_calls().is_empty());
    assert_eq!(api.mark_all_read_calls(), 0);
    assert_eq!(arbiter.owner(), None);
    assert!(!center.is_polling());

    let state = center.state();
    assert!(!state.is_loading);
    assert!(state.notifications.is_empty());
    assert_eq!(state.connection_status, ConnectionStatus::Disconnected);

    center.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_listeners_follow_changes_until_dropped(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let subscription = center.on_change({
        let seen = seen.clone();
        move |state| seen.lock().unwrap().push(state.unread_count)
    });
    sleep(SETTLE).await;
    assert_eq!(seen.lock().unwrap().last(), Some(&2));

    center.mark_as_read("a").await;
    sleep(SETTLE).await;
    assert_eq!(seen.lock().unwrap().last(), Some(&1));

    subscription.unsubscribe();
    let seen_before = seen.lock().unwrap().len();
    center.mark_as_read("b").await;
    sleep(SETTLE).await;
    assert_eq!(seen.lock().unwrap().len(), seen_before);

    center.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_unread_count_watcher(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;
    let mut unread = center.watch_unread_count();
    assert_eq!(*unread.borrow_and_update(), 2);

    center.mark_all_as_read().await;

    unread.changed().await.unwrap();
    assert_eq!(*unread.borrow(), 0);

    center.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_dropping_the_handle_releases_the_token(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;
    assert!(arbiter.owner().is_some());

    drop(center);
    sleep(SETTLE).await;

    assert_eq!(arbiter.owner(), None);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_takeover_ignores_reveal_seen_on_standby(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    let visibility = VisibilityGate::default();
    let mount = || {
        NotificationCenter::mount(
            api.clone(),
            arbiter.clone(),
            visibility.clone(),
            PollerSettings::default(),
        )
    };
    let owner = mount();
    sleep(SETTLE).await;
    let standby = mount();
    sleep(SETTLE).await;
    assert_eq!(api.list_calls(), 1);

    visibility.set_visible(false);
    visibility.set_visible(true);
    sleep(SETTLE).await;
    assert_eq!(api.list_calls(), 2);

    api.set_fallback(Scripted::Stall);
    owner.unmount().await;
    sleep(SETTLE).await;

    assert!(standby.is_polling());
    assert_eq!(api.list_calls(), 3);
    assert!(standby.state().is_loading);

    standby.unmount().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_mounted_gate_outlives_callers_handle(api: Arc<ScriptedApi>) {
    let arbiter = Arc::new(PollingArbiter::new());
    // the caller keeps no clone of the gate
    let center = mount_with(&api, &arbiter, PollerSettings::default());
    sleep(SETTLE).await;
    assert_eq!(api.list_calls(), 1);

    center.visibility().set_visible(false);
    sleep(Duration::from_secs(95)).await;
    assert_eq!(api.list_calls(), 1);

    center.visibility().set_visible(true);
    sleep(SETTLE).await;
    assert_eq!(api.list_calls(), 2);

    center.unmount().await;
}
