//! Owns every live session, serializes messages per session and runs
//! generation when a session has collected enough.

use super::heuristics::SatisfactionRules;
use super::{Session, SessionReply, Transition};
use crate::llm::Orchestrator;
use crate::store::{ExpiringStore, Lookup};
use bugbot_core::{CanonicalReport, Clock, PipelineError};
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const EXPIRED_MESSAGE: &str = "Sorry! This bug report session has expired. \
Please start a new bug report if you still need help.";

pub const BUSY_MESSAGE: &str =
    "I'm still working on your report. Please wait for it to finish before sending more details.";

pub const COMPLETED_MESSAGE: &str = "Here's your polished bug report. Review it, then open the \
bug form with everything pre-filled.";

/// (user, thread). A reporter has at most one session per thread.
type SessionKey = (String, String);

type SessionSlot = Arc<Mutex<Session>>;

fn session_key(user_id: &str, thread_id: &str) -> SessionKey {
    (user_id.to_string(), thread_id.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// The author has no session in this thread.
    Ignored,
    Expired { message: String },
    /// A previous message from this session is still being processed.
    Busy { message: String },
    Reply(SessionReply),
    Completed {
        report: CanonicalReport,
        message: String,
    },
    /// The session was removed while generation ran; nothing to deliver.
    Discarded,
}

impl MessageOutcome {
    /// Text to show the reporter, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            MessageOutcome::Ignored | MessageOutcome::Discarded => None,
            MessageOutcome::Expired { message }
            | MessageOutcome::Busy { message }
            | MessageOutcome::Completed { message, .. } => Some(message),
            MessageOutcome::Reply(reply) => Some(&reply.message),
        }
    }

    /// True once the conversation is over and the session is gone.
    pub fn ends_session(&self) -> bool {
        match self {
            MessageOutcome::Reply(reply) => reply.end_session,
            MessageOutcome::Expired { .. }
            | MessageOutcome::Completed { .. }
            | MessageOutcome::Discarded => true,
            MessageOutcome::Ignored | MessageOutcome::Busy { .. } => false,
        }
    }
}

pub struct SessionManager {
    sessions: ExpiringStore<SessionKey, SessionSlot>,
    /// Sessions removed without their owner hearing about it. The owner's
    /// next message gets the expired reply once; markers age out on the same TTL.
    ended: ExpiringStore<SessionKey, ()>,
    orchestrator: Arc<Orchestrator>,
    rules: SatisfactionRules,
}

impl SessionManager {
    pub fn new(orchestrator: Arc<Orchestrator>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: ExpiringStore::new(ttl, clock.clone()),
            ended: ExpiringStore::new(ttl, clock),
            orchestrator,
            rules: SatisfactionRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: SatisfactionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Start (or restart) `user_id`'s session in a thread and return the first prompt.
    /// Sessions other users hold in the same thread are left alone.
    pub fn start_session(
        &self,
        user_id: &str,
        thread_id: &str,
        summary: &str,
        severity: Option<String>,
    ) -> &'static str {
        let key = session_key(user_id, thread_id);
        let session = Session::new(user_id, thread_id, summary, severity, self.sessions.now());
        self.ended.remove(&key);
        self.sessions.insert(key, Arc::new(Mutex::new(session)));
        tracing::info!(thread = thread_id, user = user_id, "bug report session started");
        Session::opening_prompt()
    }

    /// Route one message from `user_id` in `thread_id`.
    pub async fn handle_message(&self, user_id: &str, thread_id: &str, text: &str) -> MessageOutcome {
        let key = session_key(user_id, thread_id);
        let slot = match self.sessions.lookup(&key) {
            Lookup::Live(slot) => slot,
            Lookup::Expired(_) => {
                tracing::info!(thread = thread_id, "message arrived for an expired session");
                return expired();
            }
            Lookup::Missing => {
                if self.ended.remove(&key).is_some() {
                    tracing::info!(thread = thread_id, "message arrived for a removed session");
                    return expired();
                }
                return MessageOutcome::Ignored;
            }
        };

        let Ok(mut session) = slot.clone().try_lock_owned() else {
            tracing::debug!(thread = thread_id, "session busy; rejecting message");
            return MessageOutcome::Busy {
                message: BUSY_MESSAGE.to_string(),
            };
        };

        self.sessions.touch(&key);
        session.touch(self.sessions.now());

        match session.accept_message(text, &self.rules) {
            Transition::Prompt(message) => MessageOutcome::Reply(SessionReply::continue_with(message)),
            Transition::End(message) => {
                self.finish(&key, &slot);
                tracing::info!(thread = thread_id, "ending session; requested details could not be collected");
                MessageOutcome::Reply(SessionReply::end_with(message))
            }
            Transition::Generate => self.generate(&key, &slot, &mut session).await,
        }
    }

    async fn generate(&self, key: &SessionKey, slot: &SessionSlot, session: &mut Session) -> MessageOutcome {
        let thread = key.1.as_str();
        tracing::info!(thread, "generating bug report");
        let result = self.orchestrator.generate(&session.to_input()).await;

        if !self.is_current(key, slot) {
            tracing::debug!(thread, "session ended during generation; discarding result");
            return MessageOutcome::Discarded;
        }

        match result {
            Ok(report) => {
                self.finish(key, slot);
                tracing::info!(thread, title = %report.title, "bug report generated");
                MessageOutcome::Completed {
                    report,
                    message: COMPLETED_MESSAGE.to_string(),
                }
            }
            Err(PipelineError::Insufficient(signal)) => {
                let reply = session.handle_insufficiency(&signal);
                if reply.end_session {
                    self.finish(key, slot);
                    tracing::info!(thread, "ending session after repeated requests for information");
                } else {
                    self.sessions.touch(key);
                    session.touch(self.sessions.now());
                }
                MessageOutcome::Reply(reply)
            }
            Err(err) => {
                tracing::error!(thread, error = %err, "failed to generate bug report");
                self.finish(key, slot);
                MessageOutcome::Reply(session.failure_reply())
            }
        }
    }

    fn is_current(&self, key: &SessionKey, slot: &SessionSlot) -> bool {
        matches!(self.sessions.lookup(key), Lookup::Live(current) if Arc::ptr_eq(&current, slot))
    }

    /// Remove `slot` if it is still the session under `key`, and remember that it ended.
    fn finish(&self, key: &SessionKey, slot: &SessionSlot) {
        if self
            .sessions
            .remove_if(key, |current| Arc::ptr_eq(current, slot))
            .is_some()
        {
            self.ended.insert(key.clone(), ());
        }
    }

    /// Drop `user_id`'s session in a thread (reporter cancelled, thread closed).
    pub fn abandon(&self, user_id: &str, thread_id: &str) -> bool {
        let key = session_key(user_id, thread_id);
        let removed = self.sessions.remove(&key).is_some();
        if removed {
            self.ended.insert(key, ());
            tracing::info!(thread = thread_id, user = user_id, "bug report session abandoned");
        }
        removed
    }

    pub fn sweep_expired(&self) -> usize {
        let swept = self.sessions.drain_expired();
        for key in &swept {
            self.ended.insert(key.clone(), ());
        }
        let forgotten = self.ended.sweep_expired();
        if !swept.is_empty() || forgotten > 0 {
            tracing::warn!(swept = swept.len(), forgotten, "expired bug report sessions removed");
        }
        swept.len()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Copy of a session's state, waiting for any in-flight message to finish.
    pub async fn snapshot(&self, user_id: &str, thread_id: &str) -> Option<Session> {
        let slot = self.sessions.get(&session_key(user_id, thread_id))?;
        let session = slot.lock().await;
        Some(session.clone())
    }
}

fn expired() -> MessageOutcome {
    MessageOutcome::Expired {
        message: EXPIRED_MESSAGE.to_string(),
    }
}
