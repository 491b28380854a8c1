// src/core/tests/scheduler_tests.rs

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use super::super::clock::FixedClock;
use super::super::scheduler::{effective_delay, Deps, Scheduler, SessionState};
use crate::error::{EngageError, Result};
use crate::memory::{KeyValueStore, Ledger, MemoryKv, SessionOutcome, Storage};
use crate::models::{ActionKind, Badge, RawItem};
use crate::providers::page::{Control, Page, Presenter, StatusUpdate};
use crate::providers::relay::{ActionRequest, Relay, RelayMessage, RelayResponse};
use crate::settings::Settings;

const ACCOUNT: &str = "operator";

struct FakePage {
    items: Vec<RawItem>,
    missing: HashSet<Control>,
    confirm: bool,
    scrolls: Mutex<u32>,
}

impl FakePage {
    fn new(items: Vec<RawItem>) -> Self {
        Self {
            items,
            missing: HashSet::new(),
            confirm: true,
            scrolls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn scan(&self) -> Vec<RawItem> {
        self.items.clone()
    }

    fn on_notifications(&self) -> bool {
        false
    }

    async fn find(&self, _target: &str, control: Control) -> bool {
        !self.missing.contains(&control)
    }

    async fn wait_for(&self, _target: &str, _control: Control, timeout: Duration) -> bool {
        if !self.confirm {
            tokio::time::sleep(timeout).await;
        }
        self.confirm
    }

    async fn scroll(&self) {
        *self.scrolls.lock().unwrap() += 1;
    }
}

#[derive(Default)]
struct FakeRelay {
    fail: HashSet<ActionKind>,
    messages: Mutex<Vec<RelayMessage>>,
}

impl FakeRelay {
    fn failing(kind: ActionKind) -> Self {
        Self {
            fail: HashSet::from([kind]),
            ..Self::default()
        }
    }

    fn actions(&self) -> Vec<ActionRequest> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                RelayMessage::PerformAction(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Relay for FakeRelay {
    async fn send(&self, message: RelayMessage) -> Result<RelayResponse> {
        self.messages.lock().unwrap().push(message.clone());
        match message {
            RelayMessage::GetTabId => Ok(RelayResponse::TabId("tab-1".into())),
            RelayMessage::PerformAction(request) if self.fail.contains(&request.kind) => {
                Err(EngageError::Relay("timed out".into()))
            }
            _ => Ok(RelayResponse::Ok),
        }
    }
}

#[derive(Default)]
struct FakePresenter {
    marks: Mutex<Vec<(String, Badge)>>,
    updates: Mutex<Vec<StatusUpdate>>,
}

impl Presenter for FakePresenter {
    fn mark(&self, id: &str, badge: Badge) {
        self.marks.lock().unwrap().push((id.to_string(), badge));
    }

    fn status(&self, update: StatusUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

fn item(n: u32, text: &str) -> RawItem {
    RawItem {
        permalink: Some(format!("https://x.com/user{n}/status/{n}")),
        handle: format!("user{n}"),
        display_name: "Alice".into(),
        text: text.into(),
        ..Default::default()
    }
}

fn quiet_settings(session: u32) -> Settings {
    Settings {
        session_min: session,
        session_max: session,
        reply_like_chance: 0,
        extra_like_chance: 0,
        ..Settings::default()
    }
}

struct Harness {
    page: Arc<FakePage>,
    relay: Arc<FakeRelay>,
    presenter: Arc<FakePresenter>,
    store: Arc<MemoryKv>,
    scheduler: Scheduler<StdRng>,
}

async fn harness(settings: Settings, page: FakePage, relay: FakeRelay) -> Harness {
    let store = Arc::new(MemoryKv::default());
    Storage::new(store.clone()).save_settings(&settings).await.unwrap();

    let page = Arc::new(page);
    let relay = Arc::new(relay);
    let presenter = Arc::new(FakePresenter::default());
    let deps = Deps {
        page: page.clone(),
        relay: relay.clone(),
        presenter: presenter.clone(),
        store: store.clone() as Arc<dyn KeyValueStore>,
        clock: Arc::new(FixedClock {
            now: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            hour: 9,
        }),
    };

    Harness {
        page,
        relay,
        presenter,
        store,
        scheduler: Scheduler::new(deps, StdRng::seed_from_u64(7)),
    }
}

fn stop_after(cancel: &CancellationToken, after: Duration) {
    let stop = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        stop.cancel();
    });
}

#[test]
fn test_effective_delay_bounds() {
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..200 {
        let delay = effective_delay(1_000, 1.0, &mut rng);
        assert!(delay >= Duration::from_millis(900) && delay <= Duration::from_millis(1_100));
    }

    let slow = Settings { speed: 0, ..Settings::default() };
    let fast = Settings { speed: 100, ..Settings::default() };
    assert_eq!(slow.speed_factor(), 2.0);
    assert_eq!(fast.speed_factor(), 0.5);
    let scaled = effective_delay(1_000, slow.speed_factor(), &mut rng);
    assert!(scaled >= Duration::from_millis(1_800) && scaled <= Duration::from_millis(2_200));
}

#[tokio::test(start_paused = true)]
async fn test_session_completes_at_target() {
    let items = (1..=5).map(|n| item(n, "gm fam")).collect();
    let mut h = harness(quiet_settings(5), FakePage::new(items), FakeRelay::default()).await;

    let report = h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.target, 5);
    assert_eq!(report.completed, 5);
    assert_eq!(h.scheduler.state(), SessionState::Completed);
    assert_eq!(h.relay.actions().len(), 5, "Exactly one reply per decision");

    let flags: u64 = (1..=5)
        .map(|n| {
            let d = h.scheduler.decisions().get(&format!("status:{n}")).unwrap();
            assert!(d.sent);
            u64::from(d.should_like) + u64::from(d.should_retweet) + u64::from(d.should_reply)
        })
        .sum();
    assert_eq!(report.totals.total(), flags);
    assert_eq!(report.totals.replies, 5);

    let storage = Storage::new(h.store.clone());
    let analytics = storage.load_analytics().await;
    assert_eq!(analytics.sessions, 1);
    assert_eq!(analytics.totals, report.totals);
    assert_eq!(analytics.accounts[ACCOUNT].totals, report.totals);
    assert_eq!(analytics.history.back().unwrap().outcome, SessionOutcome::Completed);

    let ledger = storage.load_ledger().await;
    assert_eq!(ledger.ids(ACCOUNT).len(), 5);
    assert!(!storage.is_running("tab-1").await, "Running flag is cleared on settle");

    let stats = h.relay.messages.lock().unwrap().iter().any(|m| matches!(m, RelayMessage::Stats(s) if s.account == ACCOUNT));
    assert!(stats, "Session stats are relayed");
    assert_eq!(h.presenter.updates.lock().unwrap().last(), Some(&StatusUpdate::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_each_item_dispatched_once() {
    let items = (1..=3).map(|n| item(n, "gm fam")).collect();
    let mut h = harness(quiet_settings(10), FakePage::new(items), FakeRelay::default()).await;

    let cancel = CancellationToken::new();
    stop_after(&cancel, Duration::from_secs(300));
    let report = h.scheduler.run_session(ACCOUNT, cancel).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(h.scheduler.state(), SessionState::Stopped);
    assert_eq!(report.completed, 3);

    let targets: Vec<String> = h.relay.actions().into_iter().map(|a| a.target_id).collect();
    let unique: HashSet<&String> = targets.iter().collect();
    assert_eq!(targets.len(), 3);
    assert_eq!(unique.len(), 3, "No item may be dispatched twice: {:?}", targets);
    assert!(*h.page.scrolls.lock().unwrap() > 0, "Empty queue triggers scrolling");
    assert_eq!(h.presenter.updates.lock().unwrap().last(), Some(&StatusUpdate::Stopped));
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_order() {
    let mut settings = quiet_settings(1);
    settings.reply_like_chance = 100;
    settings.follow_check = true;
    settings.retweet.enabled = true;

    let mut popular = item(1, "gm fam");
    popular.replies = Some("10".into());
    popular.retweets = Some("1.2K".into());
    popular.likes = Some("30K".into());

    let mut h = harness(settings, FakePage::new(vec![popular]), FakeRelay::default()).await;
    h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();

    let actions = h.relay.actions();
    let kinds: Vec<ActionKind> = actions.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionKind::Like, ActionKind::Retweet, ActionKind::Reply, ActionKind::Follow]);
    assert!(actions[2].message.is_some(), "Replies carry the generated message");
    assert!(actions[0].message.is_none());
    assert_eq!(actions[3].target_id, "user1", "Follow targets the author");
}

#[tokio::test(start_paused = true)]
async fn test_relay_failure_keeps_item_out_of_ledger() {
    let mut h = harness(quiet_settings(1), FakePage::new(vec![item(1, "gm fam")]), FakeRelay::failing(ActionKind::Reply)).await;

    let cancel = CancellationToken::new();
    stop_after(&cancel, Duration::from_secs(120));
    let report = h.scheduler.run_session(ACCOUNT, cancel).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert_eq!(report.completed, 0);
    assert_eq!(h.relay.actions().len(), 1, "Failed actions are not retried in-session");

    let decision = h.scheduler.decisions().get("status:1").unwrap();
    assert!(!decision.sent);
    assert!(decision.attempted);

    let ledger = Storage::new(h.store.clone()).load_ledger().await;
    assert!(ledger.ids(ACCOUNT).is_empty(), "Failed items stay eligible for the next scan");
}

#[tokio::test(start_paused = true)]
async fn test_missing_confirmation_abandons_retweet() {
    let mut settings = quiet_settings(1);
    settings.retweet.enabled = true;

    let mut popular = item(1, "nice chart");
    popular.replies = Some("10".into());
    popular.retweets = Some("20".into());
    popular.likes = Some("30".into());

    let mut page = FakePage::new(vec![popular]);
    page.confirm = false;
    let mut h = harness(settings, page, FakeRelay::default()).await;

    let report = h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.totals.retweets, 0);
    assert_eq!(report.totals.likes, 1);
    let kinds: Vec<ActionKind> = h.relay.actions().iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ActionKind::Like]);
    assert!(h.scheduler.decisions().get("status:1").unwrap().sent, "Abandoned retweets still complete the item");
    assert_eq!(Storage::new(h.store.clone()).load_ledger().await.ids(ACCOUNT), vec!["status:1"]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_control_is_skipped() {
    let mut settings = quiet_settings(1);
    settings.reply_like_chance = 100;

    let mut page = FakePage::new(vec![item(1, "gm fam")]);
    page.missing.insert(Control::Like);
    let mut h = harness(settings, page, FakeRelay::default()).await;

    let report = h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.totals.likes, 0);
    assert_eq!(report.totals.replies, 1);
    assert!(h.scheduler.decisions().get("status:1").unwrap().sent);
}

#[tokio::test(start_paused = true)]
async fn test_ledger_items_from_earlier_runs_are_skipped() {
    let items = vec![item(1, "gm fam"), item(2, "gm fam")];
    let mut h = harness(quiet_settings(1), FakePage::new(items), FakeRelay::default()).await;

    let mut ledger = Ledger::default();
    ledger.append(ACCOUNT, "status:1");
    Storage::new(h.store.clone()).save_ledger(&ledger).await.unwrap();

    h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();

    let targets: Vec<String> = h.relay.actions().into_iter().map(|a| a.target_id).collect();
    assert_eq!(targets, vec!["status:2"]);
    assert!(h
        .presenter
        .marks
        .lock()
        .unwrap()
        .contains(&("status:1".to_string(), Badge::Completed)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_first_tick() {
    let mut h = harness(quiet_settings(3), FakePage::new(vec![item(1, "gm fam")]), FakeRelay::default()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = h.scheduler.run_session(ACCOUNT, cancel).await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Stopped);
    assert!(h.relay.actions().is_empty());

    let analytics = Storage::new(h.store.clone()).load_analytics().await;
    assert_eq!(analytics.history.len(), 1);
    assert_eq!(analytics.history[0].outcome, SessionOutcome::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_sessions_can_restart() {
    let items = (1..=4).map(|n| item(n, "gm fam")).collect();
    let mut h = harness(quiet_settings(2), FakePage::new(items), FakeRelay::default()).await;

    let first = h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();
    let second = h.scheduler.run_session(ACCOUNT, CancellationToken::new()).await.unwrap();

    assert_eq!(first.outcome, SessionOutcome::Completed);
    assert_eq!(second.outcome, SessionOutcome::Completed);

    let targets: HashSet<String> = h.relay.actions().into_iter().map(|a| a.target_id).collect();
    assert_eq!(targets.len(), 4, "Second session only picks up items the first one left");
    assert_eq!(Storage::new(h.store.clone()).load_analytics().await.sessions, 2);
}
