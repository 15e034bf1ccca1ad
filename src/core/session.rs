//! Conversation session state machine
//!
//! A session owns the message log, the draft input and the throttle clock.
//! Every change, from an operation or from a reveal tick, is published through
//! a `watch` channel so a presentation layer can re-render from a snapshot.
//!
//! Admission of a submission is checked in order:
//! 1. a reply still revealing makes the session `Busy`
//! 2. less than the throttle window since the last accepted submission
//! 3. an empty draft after trimming
//! 4. a draft longer than the character limit

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{CharacterProfile, CharacterRoster, SessionSettings};
use crate::conversation::Message;

use super::reply::{compose_reply, ReplyTask};

/// Where the session is in the reply cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingReply(ReplyStage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStage {
    /// Simulated latency before the first word
    Pending,
    Revealing,
}

impl Phase {
    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self, Phase::AwaitingReply(_))
    }

    pub fn is_revealing(&self) -> bool {
        matches!(self, Phase::AwaitingReply(ReplyStage::Revealing))
    }
}

/// Reasons a submission is refused. Shown to the user, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Please wait for the reply to finish.")]
    Busy,

    #[error("Please wait {window_secs} seconds between messages.")]
    Throttled { window_secs: u64 },

    #[error("Message cannot be empty.")]
    EmptyInput,

    #[error("Message cannot exceed {limit} characters.")]
    TooLong { limit: usize },
}

impl SubmitError {
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::Busy => "busy",
            SubmitError::Throttled { .. } => "throttled",
            SubmitError::EmptyInput => "empty_input",
            SubmitError::TooLong { .. } => "too_long",
        }
    }
}

/// Serialized form of a `SubmitError`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
    pub kind: &'static str,
    pub message: String,
}

impl From<&SubmitError> for ErrorView {
    fn from(error: &SubmitError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Mutable state of a session, held inside the watch channel
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) messages: Vec<Message>,
    pub(crate) draft: String,
    pub(crate) phase: Phase,
    pub(crate) last_submit: Option<Instant>,
    pub(crate) active_error: Option<SubmitError>,
    pub(crate) character: String,
}

impl SessionState {
    fn new(character: String) -> Self {
        Self {
            messages: vec![Message::welcome()],
            draft: String::new(),
            phase: Phase::Idle,
            last_submit: None,
            active_error: None,
            character,
        }
    }

    /// Trimmed draft if a submission at `now` would be accepted
    fn admit(&self, now: Instant, settings: &SessionSettings) -> Result<String, SubmitError> {
        if self.phase.is_revealing() {
            return Err(SubmitError::Busy);
        }

        if let Some(last) = self.last_submit {
            if now.saturating_duration_since(last) < settings.throttle_window {
                return Err(SubmitError::Throttled {
                    window_secs: settings.throttle_window.as_millis().div_ceil(1000) as u64,
                });
            }
        }

        let trimmed = self.draft.trim();
        if trimmed.is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        if trimmed.chars().count() > settings.max_chars {
            return Err(SubmitError::TooLong {
                limit: settings.max_chars,
            });
        }

        Ok(trimmed.to_string())
    }
}

/// A message as rendered by the front-end
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub display_time: String,
}

/// Read-only view of a session at one instant
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub messages: Vec<MessageView>,
    pub draft: String,
    pub draft_chars: usize,
    pub max_chars: usize,
    pub phase: Phase,
    pub awaiting_reply: bool,
    pub revealing: bool,
    pub can_submit: bool,
    pub error: Option<ErrorView>,
    pub character: String,
    pub profile: CharacterProfile,
}

impl SessionSnapshot {
    pub fn capture(
        id: Uuid,
        state: &SessionState,
        settings: &SessionSettings,
        roster: &CharacterRoster,
    ) -> Self {
        Self {
            id,
            messages: state
                .messages
                .iter()
                .map(|m| MessageView {
                    display_time: m.display_time(),
                    message: m.clone(),
                })
                .collect(),
            draft: state.draft.clone(),
            draft_chars: state.draft.chars().count(),
            max_chars: settings.max_chars,
            phase: state.phase,
            awaiting_reply: state.phase.is_awaiting_reply(),
            revealing: state.phase.is_revealing(),
            can_submit: !state.draft.trim().is_empty() && !state.phase.is_awaiting_reply(),
            error: state.active_error.as_ref().map(ErrorView::from),
            character: state.character.clone(),
            profile: roster.resolve(&state.character).clone(),
        }
    }
}

/// One chat view's conversation with a character
pub struct ConversationSession {
    id: Uuid,
    state: Arc<watch::Sender<SessionState>>,
    settings: SessionSettings,
    roster: Arc<CharacterRoster>,
    reply: Option<ReplyTask>,
    last_active: Instant,
}

impl ConversationSession {
    /// New session seeded with the welcome message
    pub fn new(
        character: impl Into<String>,
        settings: SessionSettings,
        roster: Arc<CharacterRoster>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::new(character.into()));
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(state),
            settings,
            roster,
            reply: None,
            last_active: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Replace the draft input; no validation happens here
    pub fn edit_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|s| s.draft = text);
    }

    /// Switch the counterpart persona. History and in-flight replies are kept.
    pub fn select_character(&self, identity: impl Into<String>) {
        let identity = identity.into();
        tracing::debug!(session = %self.id, character = %identity, "Character selected");
        self.state.send_modify(|s| s.character = identity);
    }

    /// Submit the draft. On refusal the error is also kept as the active
    /// error and nothing else changes.
    pub fn submit(&mut self) -> Result<(), SubmitError> {
        let now = Instant::now();
        self.last_active = now;
        let settings = self.settings;
        let mut outcome = Err(SubmitError::EmptyInput);

        self.state.send_modify(|s| match s.admit(now, &settings) {
            Ok(text) => {
                let reply = compose_reply(&text, &s.character);
                s.messages.push(Message::user(text));
                s.draft.clear();
                s.phase = Phase::AwaitingReply(ReplyStage::Pending);
                s.active_error = None;
                s.last_submit = Some(now);
                outcome = Ok(reply);
            }
            Err(error) => {
                s.active_error = Some(error.clone());
                outcome = Err(error);
            }
        });

        match outcome {
            Ok(reply) => {
                tracing::debug!(session = %self.id, "Message accepted");
                if let Some(previous) = self.reply.take() {
                    previous.cancel();
                }
                self.reply = Some(ReplyTask::spawn(
                    Arc::clone(&self.state),
                    reply,
                    self.settings,
                ));
                Ok(())
            }
            Err(error) => {
                tracing::debug!(session = %self.id, kind = error.kind(), "Message refused");
                Err(error)
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(self.id, &self.state.borrow(), &self.settings, &self.roster)
    }

    /// Current state, for callers that don't need the rendered view
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> SessionWatch {
        SessionWatch {
            id: self.id,
            receiver: self.state.subscribe(),
            settings: self.settings,
            roster: Arc::clone(&self.roster),
        }
    }

    /// Mark the session as used by a client
    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// True when nobody watches the session and no client touched it for
    /// `timeout`
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        self.state.receiver_count() == 0
            && now.saturating_duration_since(self.last_active) >= timeout
    }

    /// Tear the session down, cancelling any pending reply
    pub fn close(&mut self) {
        if let Some(task) = self.reply.take() {
            if !task.is_finished() {
                tracing::info!(session = %self.id, "Cancelling pending reply");
            }
            task.cancel();
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Change feed of one session
pub struct SessionWatch {
    id: Uuid,
    receiver: watch::Receiver<SessionState>,
    settings: SessionSettings,
    roster: Arc<CharacterRoster>,
}

impl SessionWatch {
    /// Snapshot as of now, marking it seen
    pub fn current(&mut self) -> SessionSnapshot {
        let state = self.receiver.borrow_and_update();
        SessionSnapshot::capture(self.id, &state, &self.settings, &self.roster)
    }

    /// Wait for the next change; `None` once the session is gone
    pub async fn next(&mut self) -> Option<SessionSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.current())
    }
}
