use std::collections::BTreeSet;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use super::reducer::{reduce, settle, Action};
use super::state::{Operation, SessionState};
use crate::config::StalePolicy;
use crate::error::{AppError, AppResult};

/// Generations handed out so far and the ones still running.
#[derive(Debug, Default)]
struct Ledger {
    latest: u64,
    pending: BTreeSet<u64>,
}

impl Ledger {
    fn loading(&self, policy: StalePolicy) -> bool {
        match policy {
            // older operations can no longer commit, so only the newest counts
            StalePolicy::LatestStarted => self.pending.contains(&self.latest),
            StalePolicy::LastCompleted => !self.pending.is_empty(),
        }
    }
}

/// Owner of the shared `SessionState`.
///
/// The store is the only writer: every change goes through `dispatch`, which runs
/// the reducer and publishes the result on a watch channel. Consumers read
/// snapshots or subscribe for change notifications.
pub struct SessionStore {
    policy: StalePolicy,
    ledger: Mutex<Ledger>,
    tx: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new(policy: StalePolicy) -> Self {
        let (tx, _rx) = watch::channel(SessionState::initial());
        Self { policy, ledger: Mutex::new(Ledger::default()), tx }
    }

    pub fn policy(&self) -> StalePolicy {
        self.policy
    }

    pub fn snapshot(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every published state. Call `changed()` to wait.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Starts an operation: allocates its generation, flips loading on, clears the error.
    pub fn begin(&self, op: Operation) -> OperationGuard<'_> {
        let mut ledger = self.ledger.lock();
        ledger.latest += 1;
        let generation = ledger.latest;
        ledger.pending.insert(generation);
        let cur = self.snapshot();
        self.publish(reduce(&cur, &Action::Begin(op)));
        debug!(target: "textbook::session", op = op.as_str(), generation, "operation started");
        OperationGuard { store: self, op, generation, settled: false }
    }

    /// Applies an action that is not tied to an in-flight operation.
    pub fn dispatch(&self, action: Action) {
        let ledger = self.ledger.lock();
        let cur = self.snapshot();
        let loading = ledger.loading(self.policy);
        let next = reduce(&cur, &action);
        // keep the loading flag owned by whatever is still running
        self.publish(SessionState { is_loading: loading, ..next });
    }

    fn finish(&self, op: Operation, generation: u64, action: Option<Action>) -> AppResult<()> {
        let mut ledger = self.ledger.lock();
        ledger.pending.remove(&generation);
        // A sign-out always lands. Under LatestStarted it also retires everything
        // still in flight, so no earlier login can restore the session afterwards.
        let sign_out = op == Operation::Logout && action.is_some();
        if sign_out {
            ledger.latest += 1;
        }
        let stale = !sign_out && self.policy == StalePolicy::LatestStarted && generation != ledger.latest;
        let loading = ledger.loading(self.policy);
        let cur = self.snapshot();
        let next = match (&action, stale) {
            (Some(a), false) => reduce(&cur, a),
            _ => cur,
        };
        self.publish(settle(next, loading));
        if stale && action.is_some() {
            debug!(target: "textbook::session", op = op.as_str(), generation, latest = ledger.latest, "stale completion discarded");
            return Err(AppError::superseded(
                "superseded".to_string(),
                format!("{} result discarded: a newer session operation started", op.as_str()),
            ));
        }
        Ok(())
    }

    fn publish(&self, next: SessionState) {
        debug_assert!(next.is_consistent(), "inconsistent session state: {:?}", next);
        self.tx.send_if_modified(|s| {
            if *s == next {
                return false;
            }
            *s = next;
            true
        });
    }
}

/// Scope of one running operation.
///
/// Committing hands the terminal action to the store. Dropping an uncommitted
/// guard (early return, panic, cancelled future) still releases the generation so
/// loading cannot stay stuck on.
pub struct OperationGuard<'a> {
    store: &'a SessionStore,
    op: Operation,
    generation: u64,
    settled: bool,
}

impl OperationGuard<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Applies the terminal action unless a newer operation superseded this one.
    pub fn commit(mut self, action: Action) -> AppResult<()> {
        self.settled = true;
        self.store.finish(self.op, self.generation, Some(action))
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(target: "textbook::session", op = self.op.as_str(), generation = self.generation, "operation abandoned");
            let _ = self.store.finish(self.op, self.generation, None);
        }
    }
}
