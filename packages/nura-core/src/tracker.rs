/// Per-card time accrual.
///
/// [`TimeTracker`] is the Stopped/Running state machine: each tick adds one
/// second, every `commit_every` ticks the running total is written to the card's
/// `timeLogged`, and stopping always writes the final total. [`spawn`] drives a
/// tracker from a tokio interval and hands back a [`TrackerHandle`]; dropping the
/// handle stops the timer and commits, so no tick outlives its view.
///
/// The card is looked up by id within its board before every write, so a
/// tracked card keeps accruing after being dragged to another list.

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::config::TrackerConfig;
use crate::store::{BoardStore, SharedStore, StoreError};
use crate::types::CardPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub struct TimeTracker {
    board_id: String,
    list_id: String,
    card_id: String,
    state: TrackerState,
    elapsed: u64,
    ticks: u64,
    commit_every: u32,
}

impl TimeTracker {
    pub fn new(board_id: &str, list_id: &str, card_id: &str) -> Self {
        Self {
            board_id: board_id.to_string(),
            list_id: list_id.to_string(),
            card_id: card_id.to_string(),
            state: TrackerState::Stopped,
            elapsed: 0,
            ticks: 0,
            commit_every: TrackerConfig::default().commit_every_ticks,
        }
    }

    pub fn with_config(mut self, config: &TrackerConfig) -> Self {
        self.commit_every = config.commit_every_ticks.max(1);
        self
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TrackerState::Running
    }

    /// Seconds accrued, including the seed taken from the card on start.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn card_id(&self) -> &str {
        &self.card_id
    }

    /// List the card was in at the last write.
    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    /// Follow the card if it moved to another list since the last write.
    fn relocate(&mut self, store: &BoardStore) {
        if let Some(list_id) = store.locate_card(&self.board_id, &self.card_id) {
            if list_id != self.list_id {
                log::debug!(
                    "[nura.tracker] Card {} moved from list {} to {}",
                    self.card_id,
                    self.list_id,
                    list_id
                );
                self.list_id = list_id.to_string();
            }
        }
    }

    fn commit(&mut self, store: &mut BoardStore, patch: CardPatch) -> Result<(), StoreError> {
        self.relocate(store);
        store.update_card(&self.board_id, &self.list_id, &self.card_id, patch)
    }

    /// Stopped → Running. Seeds the counter from the card's stored `timeLogged`.
    pub fn start(&mut self, store: &mut BoardStore) -> Result<(), StoreError> {
        if self.is_running() {
            return Ok(());
        }
        self.relocate(store);
        let seed = store
            .find_card(&self.board_id, &self.list_id, &self.card_id)
            .map(|c| c.time_logged);
        self.commit(
            store,
            CardPatch {
                is_tracking: Some(true),
                ..CardPatch::default()
            },
        )?;
        self.elapsed = seed.unwrap_or_default();
        self.ticks = 0;
        self.state = TrackerState::Running;
        log::debug!(
            "[nura.tracker] Started card {} at {}s",
            self.card_id,
            self.elapsed
        );
        Ok(())
    }

    /// One second passed. Commits on every `commit_every`-th tick.
    /// A card that vanished while running stops the tracker.
    pub fn tick(&mut self, store: &mut BoardStore) -> u64 {
        if !self.is_running() {
            return self.elapsed;
        }
        self.elapsed += 1;
        self.ticks += 1;
        if self.ticks % u64::from(self.commit_every) == 0 {
            if let Err(e) = self.commit(store, CardPatch::time_logged(self.elapsed)) {
                log::warn!(
                    "[nura.tracker] Stopping tracker for card {}: {}",
                    self.card_id,
                    e
                );
                self.state = TrackerState::Stopped;
            }
        }
        self.elapsed
    }

    /// Running → Stopped, committing the full counter.
    pub fn stop(&mut self, store: &mut BoardStore) -> Result<(), StoreError> {
        if !self.is_running() {
            return Ok(());
        }
        self.state = TrackerState::Stopped;
        log::debug!(
            "[nura.tracker] Stopped card {} at {}s",
            self.card_id,
            self.elapsed
        );
        let elapsed = self.elapsed;
        self.commit(
            store,
            CardPatch {
                time_logged: Some(elapsed),
                is_tracking: Some(false),
                ..CardPatch::default()
            },
        )
    }
}

/// Owner of a running tracker task.
pub struct TrackerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<TimeTracker>,
}

impl TrackerHandle {
    /// Stop ticking and wait until the final total is committed.
    pub async fn stop(self) -> Result<TimeTracker, JoinError> {
        let _ = self.stop_tx.send(true);
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn with_store<T>(store: &SharedStore, f: impl FnOnce(&mut BoardStore) -> T) -> T {
    let mut guard = store.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

/// Start `tracker` and tick it on the current tokio runtime with the period and
/// commit cadence from `config`.
pub fn spawn(store: SharedStore, tracker: TimeTracker, config: &TrackerConfig) -> TrackerHandle {
    let mut tracker = tracker.with_config(config);
    let period = config.tick_period();
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        if let Err(e) = with_store(&store, |s| tracker.start(s)) {
            log::warn!(
                "[nura.tracker] Could not start tracker for card {}: {}",
                tracker.card_id(),
                e
            );
            return tracker;
        }

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    with_store(&store, |s| tracker.tick(s));
                    if !tracker.is_running() {
                        break;
                    }
                }
                // Ok: stop requested. Err: handle dropped.
                _ = stop_rx.changed() => break,
            }
        }

        if let Err(e) = with_store(&store, |s| tracker.stop(s)) {
            log::warn!(
                "[nura.tracker] Final commit for card {} failed: {}",
                tracker.card_id(),
                e
            );
        }
        tracker
    });
    TrackerHandle { stop_tx, task }
}
