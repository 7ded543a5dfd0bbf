//! Session actor: an isolated Tokio task that owns one quiz attempt.
//!
//! Each session runs in its own task, communicating with the outside
//! world through channels. This is the "actor model" — no shared mutable
//! state, just message passing — and it is what gives the runtime its
//! ordering guarantee: all transitions for one session are applied
//! strictly one at a time, in arrival order, while different sessions
//! proceed fully in parallel.
//!
//! Two channels feed the actor's `select!` loop:
//! - the command channel (attach/detach/client actions), and
//! - the timer channel (ticks and expiry from the session's countdown).
//!
//! Because both drain through the same loop, a timer expiry and a
//! `submit_quiz` arriving together can never double-complete a session.

use std::time::Instant;

use proctor_protocol::{
    ClientMessage, CompletionReason, QuestionId, QuestionView, QuizInfo,
    ServerMessage, SessionId, SessionStatus,
};
use proctor_store::{Question, Quiz, QuizStore};
use proctor_timer::TimerEvent;
use tokio::sync::{mpsc, oneshot};

use crate::{scoring, EngineError, SharedRegistry, SharedTimers};

/// Size of the per-session timer event channel. Small on purpose — at
/// one tick per second it never builds a backlog.
const TIMER_CHANNEL_SIZE: usize = 8;

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    /// Attach a connection: the actor sends `connected` (and resumes the
    /// countdown for an in-progress session), then emits everything to
    /// `outbound` until detached.
    Attach {
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },

    /// The connection went away. Session state and countdown keep going.
    Detach,

    /// A client action to validate and apply.
    Action(ClientMessage),

    /// Stop the actor (server shutdown).
    Shutdown,
}

/// Handle to a running session actor. Cheap to clone — it's just an
/// `mpsc::Sender` wrapper. The `SessionEngine` holds one per session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// The session this handle talks to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Attaches a connection's outbound channel to the session.
    pub async fn attach(
        &self,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Attach {
                outbound,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id.clone()))?
    }

    /// Detaches the current connection (fire-and-forget).
    pub async fn detach(&self) -> Result<(), EngineError> {
        self.sender
            .send(SessionCommand::Detach)
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id.clone()))
    }

    /// Forwards a client action to the actor.
    pub async fn action(
        &self,
        msg: ClientMessage,
    ) -> Result<(), EngineError> {
        self.sender
            .send(SessionCommand::Action(msg))
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id.clone()))
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.sender
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| EngineError::Unavailable(self.session_id.clone()))
    }
}

/// The internal session actor state. Runs inside a Tokio task.
struct SessionActor<S: QuizStore> {
    session_id: SessionId,
    quiz: Quiz,
    /// The quiz's questions in question order, loaded once at spawn —
    /// quizzes are immutable, so this never goes stale.
    questions: Vec<Question>,
    registry: SharedRegistry,
    store: S,
    timers: SharedTimers,
    /// The bound connection's outbound channel, if any. Messages emitted
    /// while detached are dropped, not queued.
    outbound: Option<mpsc::UnboundedSender<ServerMessage>>,
    commands: mpsc::Receiver<SessionCommand>,
    timer_rx: mpsc::Receiver<TimerEvent>,
    /// Cloned into each countdown we start. Holding one end here also
    /// keeps `timer_rx` open between countdowns.
    timer_tx: mpsc::Sender<TimerEvent>,
    /// Stopwatch for per-question time tracking. Reset whenever a
    /// question is (re)shown and after each recorded answer, so the
    /// accumulated totals never double-count an interval.
    question_shown: Instant,
    /// The final `quiz_complete` message, kept so repeat submissions
    /// re-emit the identical result.
    cached_result: Option<ServerMessage>,
}

impl<S: QuizStore> SessionActor<S> {
    /// Runs the actor loop, processing commands and timer events until
    /// shutdown — or until the session has completed and no connection
    /// remains to serve.
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "session actor started");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Attach { outbound, reply }) => {
                        let result = self.handle_attach(outbound).await;
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Detach) => {
                        self.outbound = None;
                    }
                    Some(SessionCommand::Action(msg)) => {
                        self.handle_action(msg).await;
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
                Some(event) = self.timer_rx.recv() => {
                    self.handle_timer(event).await;
                }
            }

            // A completed session with no connection has nothing left to
            // do; the engine prunes the stale handle lazily.
            if self.cached_result.is_some() && self.outbound.is_none() {
                break;
            }
        }

        // Belt and braces for the shutdown path — normal completion
        // already cancelled it.
        self.timers.lock().await.cancel(&self.session_id);
        tracing::info!(session_id = %self.session_id, "session actor stopped");
    }

    // ---------------------------------------------------------------------
    // Connection lifecycle
    // ---------------------------------------------------------------------

    async fn handle_attach(
        &mut self,
        outbound: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<(), EngineError> {
        let (snapshot, status, remaining) = {
            let registry = self.registry.lock().await;
            let record = registry.get(&self.session_id).ok_or_else(|| {
                EngineError::SessionNotFound(self.session_id.clone())
            })?;
            (record.snapshot(), record.status, record.time_remaining)
        };

        self.outbound = Some(outbound);
        self.question_shown = Instant::now();

        self.emit(ServerMessage::Connected {
            quiz: QuizInfo {
                id: self.quiz.id.clone(),
                title: self.quiz.title.clone(),
                description: self.quiz.description.clone(),
                time_limit_seconds: self.quiz.time_limit_seconds,
                question_count: self.questions.len() as u32,
            },
            session: snapshot,
        });

        // Reconnection to an in-progress session resumes the
        // authoritative countdown from the last persisted value.
        if status == SessionStatus::InProgress {
            let mut timers = self.timers.lock().await;
            if !timers.is_running(&self.session_id) {
                if let Err(e) = timers.start(
                    self.session_id.clone(),
                    remaining,
                    self.timer_tx.clone(),
                ) {
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "countdown resume failed"
                    );
                }
            }
        }

        tracing::info!(session_id = %self.session_id, %status, "connection attached");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Client actions
    // ---------------------------------------------------------------------

    async fn handle_action(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::StartQuiz => self.handle_start().await,
            ClientMessage::Answer {
                question_id,
                answer,
            } => self.handle_answer(question_id, answer).await,
            ClientMessage::NextQuestion { current } => {
                // The client reports where it thinks it is; the server's
                // recorded position is what navigation actually uses.
                tracing::debug!(
                    session_id = %self.session_id,
                    client_current = current,
                    "next_question"
                );
                self.handle_step(1).await;
            }
            ClientMessage::PrevQuestion { current } => {
                tracing::debug!(
                    session_id = %self.session_id,
                    client_current = current,
                    "prev_question"
                );
                self.handle_step(-1).await;
            }
            ClientMessage::GoToQuestion { question_number } => {
                self.handle_goto(i64::from(question_number)).await;
            }
            ClientMessage::SubmitQuiz => self.handle_submit().await,
        }
    }

    async fn handle_start(&mut self) {
        let begun = {
            let mut registry = self.registry.lock().await;
            registry.begin(&self.session_id).map(|r| r.time_remaining)
        };

        let remaining = match begun {
            Ok(remaining) => remaining,
            Err(proctor_registry::RegistryError::InvalidState { .. }) => {
                return self.emit_error("quiz already started");
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "start failed"
                );
                return self.emit_error("failed to start quiz");
            }
        };

        {
            let mut timers = self.timers.lock().await;
            if let Err(e) = timers.start(
                self.session_id.clone(),
                remaining,
                self.timer_tx.clone(),
            ) {
                // begin() above rejects double-starts, so this can only
                // race a stale finished entry.
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "countdown start refused"
                );
            }
        }

        self.question_shown = Instant::now();
        self.emit_question(1).await;
    }

    async fn handle_answer(&mut self, question_id: QuestionId, answer: String) {
        match self.status().await {
            Some(SessionStatus::InProgress) => {}
            Some(SessionStatus::NotStarted) => {
                return self.emit_error("quiz not started");
            }
            Some(SessionStatus::Completed) => {
                return self.emit_error("session already completed");
            }
            None => return self.emit_error("session not found"),
        }

        // Validate before touching anything: the question must belong to
        // this quiz and the answer must be one of its options.
        let valid_option = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .map(|q| q.has_option(&answer));
        match valid_option {
            None => return self.emit_error("invalid question"),
            Some(false) => return self.emit_error("invalid answer"),
            Some(true) => {}
        }

        let time_spent = self.question_shown.elapsed().as_secs() as u32;

        if let Err(e) = self
            .store
            .record_response(&self.session_id, &question_id, &answer, time_spent)
            .await
        {
            tracing::error!(
                session_id = %self.session_id,
                %question_id,
                error = %e,
                "failed to record response"
            );
            return self.emit_error("failed to record answer");
        }

        // Restart the stopwatch only after a successful write — the
        // stored time accumulates, so intervals must stay disjoint.
        self.question_shown = Instant::now();
        self.emit(ServerMessage::AnswerReceived {
            question_id,
            time_spent,
        });
    }

    /// Relative navigation from the server's recorded position.
    async fn handle_step(&mut self, step: i64) {
        let state = {
            let registry = self.registry.lock().await;
            registry
                .get(&self.session_id)
                .map(|r| (r.status, r.current_question))
        };
        let current = match state {
            Some((SessionStatus::InProgress, current)) => current,
            Some((SessionStatus::NotStarted, _)) => {
                return self.emit_error("quiz not started");
            }
            Some((SessionStatus::Completed, _)) => {
                return self.emit_error("session already completed");
            }
            None => return self.emit_error("session not found"),
        };

        self.goto(i64::from(current) + step).await;
    }

    async fn handle_goto(&mut self, target: i64) {
        match self.status().await {
            Some(SessionStatus::InProgress) => {}
            Some(SessionStatus::NotStarted) => {
                return self.emit_error("quiz not started");
            }
            Some(SessionStatus::Completed) => {
                return self.emit_error("session already completed");
            }
            None => return self.emit_error("session not found"),
        }
        self.goto(target).await;
    }

    /// Validates the target ordinal and moves there. On a bad target the
    /// position is left exactly where it was.
    async fn goto(&mut self, target: i64) {
        if target < 1 || target > self.questions.len() as i64 {
            return self.emit_error("question number out of range");
        }
        let target = target as u32;

        let set_result = self
            .registry
            .lock()
            .await
            .set_current_question(&self.session_id, target);
        if let Err(e) = set_result {
            tracing::warn!(
                session_id = %self.session_id,
                error = %e,
                "navigation not persisted"
            );
            return self.emit_error("failed to change question");
        }

        self.question_shown = Instant::now();
        self.emit_question(target).await;
    }

    async fn handle_submit(&mut self) {
        // Idempotent: once completed, every further submit re-emits the
        // identical cached result.
        if let Some(cached) = self.cached_result.clone() {
            self.emit(cached);
            return;
        }

        let state = {
            let registry = self.registry.lock().await;
            registry
                .get(&self.session_id)
                .map(|r| (r.status, r.completion))
        };
        match state {
            Some((SessionStatus::InProgress, _)) => {
                self.complete(CompletionReason::Submitted).await;
            }
            Some((SessionStatus::NotStarted, _)) => {
                self.emit_error("quiz not started");
            }
            Some((SessionStatus::Completed, completion)) => {
                // The actor restarted after the session completed (e.g.
                // server restart): rebuild the result from the durable
                // records and cache it again.
                let reason =
                    completion.unwrap_or(CompletionReason::Submitted);
                self.rebuild_result(reason).await;
            }
            None => self.emit_error("session not found"),
        }
    }

    // ---------------------------------------------------------------------
    // Timer events
    // ---------------------------------------------------------------------

    async fn handle_timer(&mut self, event: TimerEvent) {
        // A tick that raced an explicit submit: the session is already
        // final, nothing to apply.
        if self.cached_result.is_some() {
            return;
        }

        match event {
            TimerEvent::Tick { remaining } => {
                // Persist first — the stored value is what a reconnect
                // snapshot reads — then relay to the client if one is
                // bound. Ticks with no connection are dropped.
                if let Err(e) = self
                    .registry
                    .lock()
                    .await
                    .set_time_remaining(&self.session_id, remaining)
                {
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "tick not persisted"
                    );
                    return;
                }
                self.emit(ServerMessage::TimerTick {
                    time_remaining: remaining,
                });
            }
            TimerEvent::Expired => {
                self.complete(CompletionReason::TimeExpired).await;
            }
        }
    }

    // ---------------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------------

    /// The one and only completion path: score, persist, cancel the
    /// countdown, emit the final result. Guarded so submit and expiry
    /// can both call it without double-completing.
    async fn complete(&mut self, reason: CompletionReason) {
        if self.cached_result.is_some() {
            return;
        }

        let responses = match self.store.get_responses(&self.session_id).await
        {
            Ok(responses) => responses,
            Err(e) => {
                // Surfaced, not advanced: the session stays in progress
                // rather than completing with a bogus score.
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "failed to load responses for scoring"
                );
                self.emit_error("failed to finalize quiz");
                return;
            }
        };

        let report = scoring::score_session(&self.questions, &responses);

        {
            let mut registry = self.registry.lock().await;
            if let Err(e) = registry.complete(
                &self.session_id,
                reason,
                report.summary.percentage,
            ) {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "completion not persisted"
                );
                return;
            }
        }

        self.timers.lock().await.cancel(&self.session_id);

        let msg = ServerMessage::QuizComplete {
            reason,
            score: report.summary,
            results: report.results,
        };
        self.cached_result = Some(msg.clone());
        self.emit(msg);
    }

    /// Re-scores an already-completed session to repopulate the cache.
    /// Scoring is deterministic, so this reproduces the original result.
    async fn rebuild_result(&mut self, reason: CompletionReason) {
        match self.store.get_responses(&self.session_id).await {
            Ok(responses) => {
                let report =
                    scoring::score_session(&self.questions, &responses);
                let msg = ServerMessage::QuizComplete {
                    reason,
                    score: report.summary,
                    results: report.results,
                };
                self.cached_result = Some(msg.clone());
                self.emit(msg);
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "failed to rebuild result"
                );
                self.emit_error("failed to load result");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Emission
    // ---------------------------------------------------------------------

    /// Sends a question message for the given ordinal, decorated with
    /// the student's existing answer so revisits show what's recorded.
    async fn emit_question(&mut self, number: u32) {
        let (view, question_id) =
            match self.questions.get(number as usize - 1) {
                Some(q) => (
                    QuestionView {
                        id: q.id.clone(),
                        text: q.text.clone(),
                        options: q.options.clone(),
                    },
                    q.id.clone(),
                ),
                // Callers validate the range; nothing to show otherwise.
                None => return,
            };

        let existing_answer =
            match self.store.get_responses(&self.session_id).await {
                Ok(responses) => responses
                    .into_iter()
                    .find(|r| r.question_id == question_id)
                    .map(|r| r.answer),
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "could not load existing answer"
                    );
                    None
                }
            };

        self.emit(ServerMessage::Question {
            question_number: number,
            total_questions: self.questions.len() as u32,
            question: view,
            existing_answer,
        });
    }

    /// Sends a message to the bound connection, if any. A send failure
    /// means the receiver is gone — drop the binding locally; the
    /// gateway's own cleanup handles the registry side.
    fn emit(&mut self, msg: ServerMessage) {
        if let Some(tx) = &self.outbound {
            if tx.send(msg).is_err() {
                self.outbound = None;
            }
        }
    }

    fn emit_error(&mut self, message: &str) {
        self.emit(ServerMessage::Error {
            message: message.to_string(),
        });
    }

    async fn status(&self) -> Option<SessionStatus> {
        self.registry
            .lock()
            .await
            .get(&self.session_id)
            .map(|r| r.status)
    }
}

/// Spawns a new session actor task and returns a handle to it.
///
/// `channel_size` bounds the command channel — if a client floods
/// actions faster than the actor applies them, the gateway's forwarding
/// awaits rather than buffering without limit.
pub(crate) fn spawn_session<S: QuizStore>(
    session_id: SessionId,
    quiz: Quiz,
    questions: Vec<Question>,
    registry: SharedRegistry,
    store: S,
    timers: SharedTimers,
    channel_size: usize,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let (timer_tx, timer_rx) = mpsc::channel(TIMER_CHANNEL_SIZE);

    let actor = SessionActor {
        session_id: session_id.clone(),
        quiz,
        questions,
        registry,
        store,
        timers,
        outbound: None,
        commands: rx,
        timer_rx,
        timer_tx,
        question_shown: Instant::now(),
        cached_result: None,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
