//! Turn bookkeeping for one conversation.
//!
//! [`SessionController`] builds each turn's request from the current settings, drives the chat
//! stream, and reports progress to a [`TurnObserver`].  The most recently started turn is the
//! tracked one: [`SessionController::cancel`] targets it, and an older turn finishing never clears
//! it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::observability::{SESSION_TURNS, SESSION_TURNS_SUPERSEDED, SESSION_TURN_FAILURES};
use crate::settings::SharedSettings;
use crate::stream::ChatBackend;
use crate::types::{ChatEvent, ChatTurnRequest, InterruptOption, Resource};

/// Identifies one turn within a session.  Later turns have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnId(u64);

impl TurnId {
    pub fn get(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn first() -> Self {
        TurnId(1)
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-send options.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Answer to a previous interrupt.  Takes precedence over the selected feedback.
    pub interrupt_feedback: Option<String>,
    /// Resources attached to the message.
    pub resources: Vec<Resource>,
}

/// How a turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The stream closed normally after `events` events.
    Completed { events: usize },
    /// The turn was cancelled.
    Cancelled,
    /// The stream failed.  The error has already been passed to [`TurnObserver::on_error`].
    Failed(Error),
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TurnOutcome::Cancelled)
    }
}

/// Receives the progress of every turn.
///
/// Callbacks run on the task driving [`SessionController::send`] and should return quickly.
pub trait TurnObserver: Send + Sync {
    /// The request is about to be sent.
    fn on_start(&self, turn: TurnId, request: &ChatTurnRequest) {
        _ = (turn, request);
    }

    /// An event arrived.
    fn on_event(&self, turn: TurnId, event: &ChatEvent) {
        _ = (turn, event);
    }

    /// The stream failed for a reason other than cancellation.
    fn on_error(&self, turn: TurnId, error: &Error) {
        _ = (turn, error);
    }

    /// The turn is over.
    fn on_finish(&self, turn: TurnId, outcome: &TurnOutcome) {
        _ = (turn, outcome);
    }
}

/// An observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

#[derive(Debug)]
struct InFlight {
    turn: TurnId,
    cancel: CancellationToken,
}

/// Clears the tracked turn when a send finishes or its future is dropped, unless a newer turn
/// has taken over.
struct TurnGuard<'a> {
    in_flight: &'a Mutex<Option<InFlight>>,
    turn: TurnId,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight.as_ref().is_some_and(|f| f.turn == self.turn) {
            *in_flight = None;
        }
    }
}

/// Drives the turns of one conversation thread.
pub struct SessionController<B: ChatBackend> {
    backend: B,
    settings: SharedSettings,
    observer: Arc<dyn TurnObserver>,
    thread_id: String,
    next_turn: AtomicU64,
    in_flight: Mutex<Option<InFlight>>,
    feedback: Mutex<Option<InterruptOption>>,
}

impl<B: ChatBackend> SessionController<B> {
    /// Creates a controller for `thread_id` that reads turn defaults from `settings`.
    pub fn new(backend: B, settings: SharedSettings, thread_id: impl Into<String>) -> Self {
        Self {
            backend,
            settings,
            observer: Arc::new(NoopObserver),
            thread_id: thread_id.into(),
            next_turn: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            feedback: Mutex::new(None),
        }
    }

    /// Report turn progress to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Send `message` as a new turn and stream the response to the observer.
    ///
    /// A turn already in flight keeps running, but the new turn becomes the tracked one.  Never
    /// fails: stream errors are logged, passed to [`TurnObserver::on_error`] and returned as
    /// [`TurnOutcome::Failed`].
    pub async fn send(&self, message: impl Into<String>, options: SendOptions) -> TurnOutcome {
        let turn = TurnId(self.next_turn.fetch_add(1, Ordering::Relaxed) + 1);
        let cancel = CancellationToken::new();
        let previous = self.lock_in_flight().replace(InFlight {
            turn,
            cancel: cancel.clone(),
        });
        let _guard = TurnGuard {
            in_flight: &self.in_flight,
            turn,
        };
        SESSION_TURNS.click();
        if let Some(previous) = previous {
            SESSION_TURNS_SUPERSEDED.click();
            tracing::debug!(
                turn = %turn,
                previous = %previous.turn,
                "turn started while another was in flight"
            );
        }

        let request = self.build_request(message.into(), options);
        self.observer.on_start(turn, &request);
        let mut stream = self.backend.chat_stream(&request, cancel);
        let mut events = 0;
        let outcome = loop {
            match stream.next().await {
                Some(Ok(event)) => {
                    events += 1;
                    self.observer.on_event(turn, &event);
                }
                Some(Err(err)) if err.is_cancelled() => break TurnOutcome::Cancelled,
                Some(Err(err)) => {
                    SESSION_TURN_FAILURES.click();
                    tracing::warn!(turn = %turn, error = %err, "chat turn failed");
                    self.observer.on_error(turn, &err);
                    break TurnOutcome::Failed(err);
                }
                None => break TurnOutcome::Completed { events },
            }
        };
        self.observer.on_finish(turn, &outcome);
        outcome
    }

    /// Cancel the tracked turn, if any.
    pub fn cancel(&self) {
        if let Some(in_flight) = self.lock_in_flight().take() {
            tracing::debug!(turn = %in_flight.turn, "cancelling turn");
            in_flight.cancel.cancel();
        }
    }

    /// The tracked turn.
    pub fn current_turn(&self) -> Option<TurnId> {
        self.lock_in_flight().as_ref().map(|f| f.turn)
    }

    /// Whether a turn is being tracked.
    pub fn is_responding(&self) -> bool {
        self.current_turn().is_some()
    }

    /// Select the feedback sent with later turns that do not supply their own.
    pub fn set_feedback(&self, option: InterruptOption) {
        *self.lock_feedback() = Some(option);
    }

    pub fn clear_feedback(&self) {
        *self.lock_feedback() = None;
    }

    pub fn feedback(&self) -> Option<InterruptOption> {
        self.lock_feedback().clone()
    }

    fn build_request(&self, message: String, options: SendOptions) -> ChatTurnRequest {
        let defaults = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .turn_defaults();
        let interrupt_feedback = options
            .interrupt_feedback
            .or_else(|| self.feedback().map(|option| option.value));
        ChatTurnRequest {
            message,
            thread_id: self.thread_id.clone(),
            resources: options.resources,
            planning_limits: defaults.planning_limits(),
            flags: defaults.flags(),
            report_style: Some(defaults.general.report_style),
            interrupt_feedback,
            mcp_settings: defaults.mcp_settings,
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, Option<InFlight>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_feedback(&self) -> std::sync::MutexGuard<'_, Option<InterruptOption>> {
        self.feedback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
