//! Simulated character replies
//!
//! A reply is composed up front from the user's text and the character, then
//! revealed into the session one word at a time by a background task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::conversation::Message;

use super::session::{Phase, ReplyStage, SessionState};

/// Canned reply standing in for a model call. Pure in its inputs.
pub fn compose_reply(user_text: &str, character: &str) -> String {
    format!(
        "Thanks for your message: \"{}\". This is a demo response from {}. In a real app, this would come from an AI API!",
        user_text, character
    )
}

/// Whitespace-delimited words of a reply
pub fn tokenize(reply: &str) -> Vec<&str> {
    reply.split_whitespace().collect()
}

/// Space-joined first `n` words
pub fn reveal_prefix(words: &[&str], n: usize) -> String {
    words[..n.min(words.len())].join(" ")
}

/// Handle to an in-flight reply sequence
pub struct ReplyTask {
    handle: JoinHandle<()>,
    state: Arc<watch::Sender<SessionState>>,
    cancelled: Arc<AtomicBool>,
}

impl ReplyTask {
    /// Start revealing `reply` into `state` after the configured delay
    pub fn spawn(
        state: Arc<watch::Sender<SessionState>>,
        reply: String,
        settings: SessionSettings,
    ) -> Self {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_reveal(
            Arc::clone(&state),
            reply,
            settings,
            Arc::clone(&cancelled),
        ));
        Self {
            handle,
            state,
            cancelled,
        }
    }

    /// Stop the sequence; no state update happens after this returns
    pub fn cancel(&self) {
        // Raised under the channel's write lock so it serialises with `apply`.
        self.state.send_if_modified(|_| {
            self.cancelled.store(true, Ordering::SeqCst);
            false
        });
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

async fn run_reveal(
    state: Arc<watch::Sender<SessionState>>,
    reply: String,
    settings: SessionSettings,
    cancelled: Arc<AtomicBool>,
) {
    sleep(settings.reply_delay).await;

    let placeholder = Message::placeholder();
    let message_id = placeholder.id;
    let words = tokenize(&reply);

    let started = apply(&state, &cancelled, |s| {
        s.messages.push(placeholder);
        s.phase = if words.is_empty() {
            Phase::Idle
        } else {
            Phase::AwaitingReply(ReplyStage::Revealing)
        };
    });
    if !started {
        tracing::warn!("Reply cancelled before reveal");
        return;
    }

    for revealed in 1..=words.len() {
        sleep(settings.reveal_interval).await;

        let content = reveal_prefix(&words, revealed);
        let done = revealed == words.len();
        let applied = apply(&state, &cancelled, |s| {
            set_content(s, message_id, content);
            if done {
                s.phase = Phase::Idle;
            }
        });
        if !applied {
            tracing::warn!(revealed = revealed - 1, total = words.len(), "Reveal cancelled");
            return;
        }
        tracing::debug!(revealed, total = words.len(), "Reveal tick");
    }

    tracing::debug!(words = words.len(), "Reply revealed");
}

/// Run `update` unless the task was cancelled; the flag is read under the
/// same lock the update holds.
fn apply<F>(state: &watch::Sender<SessionState>, cancelled: &AtomicBool, update: F) -> bool
where
    F: FnOnce(&mut SessionState),
{
    state.send_if_modified(|s| {
        if cancelled.load(Ordering::SeqCst) {
            return false;
        }
        update(s);
        true
    })
}

fn set_content(state: &mut SessionState, id: Uuid, content: String) {
    if let Some(message) = state.messages.iter_mut().rev().find(|m| m.id == id) {
        message.content = content;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_reply_is_deterministic() {
        let first = compose_reply("Hello", "Alan Turing");
        let second = compose_reply("Hello", "Alan Turing");
        assert_eq!(first, second);
        assert_eq!(
            first,
            "Thanks for your message: \"Hello\". This is a demo response from Alan Turing. In a real app, this would come from an AI API!"
        );
    }

    #[test]
    fn test_compose_reply_depends_on_character() {
        assert_ne!(
            compose_reply("Hello", "Alan Turing"),
            compose_reply("Hello", "Ada Lovelace")
        );
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  one\ttwo \n three "), vec!["one", "two", "three"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_reveal_prefix() {
        let words = vec!["a", "b", "c"];
        assert_eq!(reveal_prefix(&words, 0), "");
        assert_eq!(reveal_prefix(&words, 2), "a b");
        assert_eq!(reveal_prefix(&words, 5), "a b c");
    }
}
