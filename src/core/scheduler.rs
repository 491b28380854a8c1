use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::clock::Clock;
use crate::core::evaluator::{EvalContext, Evaluation, Evaluator};
use crate::error::{EngageError, Result};
use crate::memory::{Counters, KeyValueStore, Ledger, OpenSession, SessionOutcome, Storage};
use crate::models::{ActionKind, Badge, Candidate, Decision};
use crate::providers::page::{Control, Page, Presenter, StatusUpdate};
use crate::providers::relay::{ActionRequest, Relay, StatsReport};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Stopped,
}

/// What happened to one sub-action of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    /// The control was not on the page.
    NotFound,
    /// Retweet confirmation never showed up.
    Abandoned,
    /// The relay rejected the request.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub target: u32,
    pub completed: u32,
    pub totals: Counters,
}

pub struct Deps {
    pub page: Arc<dyn Page>,
    pub relay: Arc<dyn Relay>,
    pub presenter: Arc<dyn Presenter>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// Decisions for one session, keyed by item id, in discovery order.
#[derive(Default, Debug)]
pub struct DecisionSet {
    order: Vec<String>,
    entries: HashMap<String, Decision>,
}

impl DecisionSet {
    pub fn insert(&mut self, decision: Decision) -> bool {
        if self.entries.contains_key(&decision.id) {
            return false;
        }
        self.order.push(decision.id.clone());
        self.entries.insert(decision.id.clone(), decision);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Decision> {
        self.entries.get(id)
    }

    pub fn next_pending(&self) -> Option<String> {
        self.order
            .iter()
            .find(|id| self.entries.get(*id).is_some_and(Decision::is_pending))
            .cloned()
    }

    pub fn completed(&self) -> u32 {
        self.entries.values().filter(|d| d.sent).count() as u32
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// `base × speed factor × jitter`, with jitter drawn from [0.9, 1.1].
pub fn effective_delay<R: Rng + ?Sized>(base_ms: u64, speed_factor: f64, rng: &mut R) -> Duration {
    let jitter: f64 = rng.gen_range(0.9..=1.1);
    Duration::from_millis((base_ms as f64 * speed_factor * jitter).round() as u64)
}

fn interval<R: Rng + ?Sized>(min_ms: u64, max_ms: u64, rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(min_ms..=max_ms.max(min_ms)))
}

/// Sleeps unless the session is cancelled first. Returns false on cancel.
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

pub struct Scheduler<R> {
    deps: Deps,
    storage: Storage<Arc<dyn KeyValueStore>>,
    rng: R,
    state: SessionState,
    decisions: DecisionSet,
}

impl<R: Rng + Send> Scheduler<R> {
    pub fn new(deps: Deps, rng: R) -> Self {
        let storage = Storage::new(deps.store.clone());
        Self {
            deps,
            storage,
            rng,
            state: SessionState::Idle,
            decisions: DecisionSet::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Decisions of the current or most recent session.
    pub fn decisions(&self) -> &DecisionSet {
        &self.decisions
    }

    /// Runs one session until it reaches its target or `cancel` fires.
    /// Cancelling lets an in-flight dispatch finish before the session stops.
    pub async fn run_session(&mut self, account: &str, cancel: CancellationToken) -> Result<SessionReport> {
        if self.state == SessionState::Running {
            return Err(EngageError::AlreadyRunning(account.to_string()));
        }
        self.state = SessionState::Idle;

        let settings = self.storage.load_settings().await;
        let mut ledger = self.storage.load_ledger().await;
        let (min, max) = settings.session_bounds();
        let target = self.rng.gen_range(min..=max);

        let tab = match self.deps.relay.tab_id().await {
            Ok(tab) => Some(tab),
            Err(e) => {
                warn!(error = %e, "Could not resolve tab id");
                None
            }
        };
        if let Some(tab) = &tab {
            if let Err(e) = self.storage.set_running(tab, true).await {
                warn!(tab, error = %e, "Failed to set running flag");
            }
        }

        let mut session = OpenSession::open(account, target, self.deps.clock.now());
        let mut evaluator = Evaluator::new(
            settings.clone(),
            self.deps.clock.clone(),
            StdRng::seed_from_u64(self.rng.gen()),
        );
        self.decisions = DecisionSet::default();
        self.state = SessionState::Running;
        self.deps.presenter.status(StatusUpdate::Running { target });
        info!(account, session_target = target, "Session started");

        let delays = &settings.delays;
        let outcome = loop {
            if cancel.is_cancelled() {
                break SessionOutcome::Stopped;
            }

            self.discover(&mut evaluator, &ledger, account).await;

            let completed = self.decisions.completed();
            if completed >= target {
                break SessionOutcome::Completed;
            }

            match self.decisions.next_pending() {
                Some(id) => {
                    self.dispatch(&settings, account, &id, &mut ledger, &mut session).await;
                    let wait = interval(delays.tick_min_ms, delays.tick_max_ms, &mut self.rng);
                    if !pause(wait, &cancel).await {
                        break SessionOutcome::Stopped;
                    }
                }
                None => {
                    debug!(completed, session_target = target, "Queue empty, scrolling");
                    self.deps.page.scroll().await;
                    let wait = interval(delays.scroll_min_ms, delays.scroll_max_ms, &mut self.rng);
                    if !pause(wait, &cancel).await {
                        break SessionOutcome::Stopped;
                    }
                }
            }
        };

        self.settle(outcome, session, &ledger, tab.as_deref()).await
    }

    async fn discover<G: Rng>(&mut self, evaluator: &mut Evaluator<G>, ledger: &Ledger, account: &str) {
        let items = self.deps.page.scan().await;
        let ctx = EvalContext {
            account,
            on_notifications: self.deps.page.on_notifications(),
        };
        let now = self.deps.clock.now();

        for raw in &items {
            let candidate = Candidate::from_raw(raw, now);
            match evaluator.evaluate(&candidate, &ctx, ledger) {
                Evaluation::Queue(decision) => {
                    self.deps.presenter.mark(&decision.id, Badge::Actionable);
                    self.decisions.insert(decision);
                }
                Evaluation::AlreadyDone(id) => self.deps.presenter.mark(&id, Badge::Completed),
                Evaluation::Seen(_) | Evaluation::Skip(_) => {}
            }
        }
    }

    async fn dispatch(
        &mut self,
        settings: &Settings,
        account: &str,
        id: &str,
        ledger: &mut Ledger,
        session: &mut OpenSession,
    ) {
        let Some(decision) = self.decisions.entries.get_mut(id) else {
            return;
        };
        decision.attempted = true;
        let decision = decision.clone();

        let delays = &settings.delays;
        let mut steps = Vec::with_capacity(4);
        if decision.should_like {
            steps.push((ActionKind::Like, delays.like_ms));
        }
        if decision.should_retweet {
            steps.push((ActionKind::Retweet, delays.retweet_ms));
        }
        if decision.should_reply {
            steps.push((ActionKind::Reply, delays.reply_ms));
            if settings.follow_check {
                steps.push((ActionKind::Follow, delays.follow_ms));
            }
        }

        let mut relay_failed = false;
        for (kind, base_ms) in steps {
            match self.perform(settings, &decision, kind, base_ms).await {
                ActionOutcome::Done => {
                    session.totals.record(kind);
                    self.deps.presenter.status(StatusUpdate::Action(kind));
                }
                ActionOutcome::Failed => relay_failed = true,
                ActionOutcome::NotFound | ActionOutcome::Abandoned => {}
            }
        }

        if relay_failed {
            warn!(id, "Relay failed, leaving item out of the ledger");
            return;
        }

        if let Some(entry) = self.decisions.entries.get_mut(id) {
            entry.sent = true;
        }
        ledger.append(account, id);
        if let Err(e) = self.storage.save_ledger(ledger).await {
            warn!(id, error = %e, "Failed to persist ledger");
        }
        self.deps.presenter.mark(id, Badge::Completed);
        info!(id, "Decision completed");
    }

    async fn perform(&mut self, settings: &Settings, decision: &Decision, kind: ActionKind, base_ms: u64) -> ActionOutcome {
        sleep(effective_delay(base_ms, settings.speed_factor(), &mut self.rng)).await;

        let item = match kind {
            ActionKind::Follow => decision.handle.as_str(),
            _ => decision.id.as_str(),
        };
        let page = &self.deps.page;

        if !page.find(item, Control::from(kind)).await {
            debug!(item, action = ?kind, "Control not found, skipping");
            return ActionOutcome::NotFound;
        }

        if kind == ActionKind::Retweet {
            let timeout = Duration::from_millis(settings.delays.confirm_timeout_ms);
            if !page.wait_for(item, Control::RetweetConfirm, timeout).await {
                warn!(item, "Retweet confirmation missing, abandoning");
                return ActionOutcome::Abandoned;
            }
        }

        let (message, image) = match kind {
            ActionKind::Reply => (decision.message.clone(), decision.image.clone()),
            _ => (None, None),
        };
        let request = ActionRequest {
            kind,
            target_id: item.to_string(),
            message,
            image,
        };

        match self.deps.relay.perform(request).await {
            Ok(()) => ActionOutcome::Done,
            Err(e) => {
                warn!(item, action = ?kind, error = %e, "Action failed");
                ActionOutcome::Failed
            }
        }
    }

    async fn settle(
        &mut self,
        outcome: SessionOutcome,
        session: OpenSession,
        ledger: &Ledger,
        tab: Option<&str>,
    ) -> Result<SessionReport> {
        if let Err(e) = self.storage.save_ledger(ledger).await {
            warn!(error = %e, "Failed to flush ledger");
        }

        let account = session.account.clone();
        let completed = self.decisions.completed();
        let record = session.finish(outcome, completed, self.deps.clock.now());
        let report = SessionReport {
            outcome,
            target: record.target,
            completed,
            totals: record.totals,
        };

        let mut analytics = self.storage.load_analytics().await;
        analytics.close_session(record);
        if let Err(e) = self.storage.save_analytics(&analytics).await {
            warn!(error = %e, "Failed to flush analytics");
        }

        let stats = StatsReport {
            account: account.clone(),
            counts: report.totals,
        };
        if let Err(e) = self.deps.relay.report_stats(stats).await {
            warn!(error = %e, "Failed to relay session stats");
        }

        if let Some(tab) = tab {
            if let Err(e) = self.storage.set_running(tab, false).await {
                warn!(tab, error = %e, "Failed to clear running flag");
            }
        }

        self.state = match outcome {
            SessionOutcome::Completed => SessionState::Completed,
            SessionOutcome::Stopped => SessionState::Stopped,
        };
        self.deps.presenter.status(match outcome {
            SessionOutcome::Completed => StatusUpdate::Completed,
            SessionOutcome::Stopped => StatusUpdate::Stopped,
        });
        info!(
            account = %account,
            ?outcome,
            completed,
            session_target = report.target,
            actions = report.totals.total(),
            "Session finished"
        );

        Ok(report)
    }
}
