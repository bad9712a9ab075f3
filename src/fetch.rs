//! Background fetch lifecycle shared by both screens.
//!
//! Requests run on short-lived worker threads and report back over a channel
//! that the UI thread drains once per tick, so drawing never waits on the
//! network. Every request is stamped with the [`MountId`] of the screen that
//! issued it and that screen's [`CancelToken`]. Callers drop any outcome whose
//! token was cancelled or whose mount has left the navigation stack, which
//! keeps a slow response from an old screen from overwriting newer state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::api::{FetchError, SheetSource};
use crate::models::{Recommendation, SheetDetail, SheetSummary};

/// Identity of one mounted screen instance. Pushing the detail screen twice
/// for the same sheet still yields two different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MountId(u64);

impl MountId {
    pub fn get(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        MountId(raw)
    }
}

/// Hands out increasing mount ids.
#[derive(Debug, Default)]
pub struct MountCounter {
    next: u64,
}

impl MountCounter {
    pub fn next_id(&mut self) -> MountId {
        self.next += 1;
        MountId(self.next)
    }
}

/// Shared invalidation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tri-state view model for anything that is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Loading,
    Loaded(T),
    Failed(FetchError),
}

impl<T> LoadState<T> {
    pub fn from_result(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(value) => LoadState::Loaded(value),
            Err(err) => LoadState::Failed(err),
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }
}

/// What a worker produced.
#[derive(Debug)]
pub enum FetchPayload {
    Sheets(Result<Vec<SheetSummary>, FetchError>),
    Detail(Result<SheetDetail, FetchError>),
    Recommendations(Result<Vec<Recommendation>, FetchError>),
}

impl FetchPayload {
    fn kind(&self) -> &'static str {
        match self {
            FetchPayload::Sheets(_) => "sheets",
            FetchPayload::Detail(_) => "detail",
            FetchPayload::Recommendations(_) => "recommendations",
        }
    }
}

/// A finished request on its way back to the UI thread.
#[derive(Debug)]
pub struct FetchOutcome {
    pub mount: MountId,
    pub token: CancelToken,
    pub payload: FetchPayload,
}

impl FetchOutcome {
    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawns request workers and collects their outcomes.
pub struct Fetcher {
    source: Arc<dyn SheetSource>,
    tx: Sender<FetchOutcome>,
    rx: Receiver<FetchOutcome>,
    in_flight: usize,
}

impl Fetcher {
    pub fn new(source: Arc<dyn SheetSource>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Run `job` on a worker thread. The outcome is always delivered, even
    /// when the token gets cancelled meanwhile, so `in_flight` stays accurate;
    /// filtering happens on the receiving side.
    pub fn spawn<F>(&mut self, mount: MountId, token: CancelToken, job: F)
    where
        F: FnOnce(&dyn SheetSource) -> FetchPayload + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let payload = job(source.as_ref());
            if token.is_cancelled() {
                debug!(
                    mount = mount.get(),
                    kind = payload.kind(),
                    "request finished after its screen was invalidated"
                );
            }
            if tx.send(FetchOutcome { mount, token, payload }).is_err() {
                warn!(mount = mount.get(), "fetch receiver dropped before delivery");
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Collect every outcome that has already arrived without blocking.
    pub fn drain(&mut self) -> Vec<FetchOutcome> {
        let outcomes: Vec<FetchOutcome> = self.rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(outcomes.len());
        outcomes
    }

    /// Block until every spawned request is back or `timeout` elapses.
    pub fn wait_all(&mut self, timeout: Duration) -> Vec<FetchOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(outcome) => {
                    self.in_flight -= 1;
                    outcomes.push(outcome);
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        outcomes
    }
}
