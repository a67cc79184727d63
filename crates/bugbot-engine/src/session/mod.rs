//! Conversational slot-filling: collect description, steps and environment
//! one message at a time, then generate. Backend requests for more
//! information route the conversation back to the matching step.

pub mod heuristics;
pub mod manager;

use bugbot_core::{InsufficiencySignal, ReportField, ReportInput};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use heuristics::{FieldPredicate, SatisfactionRules};
pub use manager::{MessageOutcome, SessionManager};

/// Repeated requests for already-asked fields tolerated before giving up.
pub const REPEAT_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStep {
    Description,
    Steps,
    Environment,
    /// Generation is running or the session has finished.
    Done,
}

impl SessionStep {
    /// The step that collects `field`.
    pub fn for_field(field: ReportField) -> SessionStep {
        match field {
            ReportField::Description | ReportField::DetailedDescription => SessionStep::Description,
            ReportField::StepsToReproduce => SessionStep::Steps,
            _ => SessionStep::Environment,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStep::Description => "description",
            SessionStep::Steps => "steps",
            SessionStep::Environment => "environment",
            SessionStep::Done => "done",
        }
    }

    fn prompt(&self) -> &'static str {
        match self {
            SessionStep::Description => DESCRIPTION_PROMPT,
            SessionStep::Steps => STEPS_PROMPT,
            SessionStep::Environment => ENVIRONMENT_PROMPT,
            SessionStep::Done => GENERATING_MESSAGE,
        }
    }
}

/// What the presentation layer should say, and whether the conversation is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReply {
    pub message: String,
    pub end_session: bool,
}

impl SessionReply {
    pub fn continue_with(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            end_session: false,
        }
    }

    pub fn end_with(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            end_session: true,
        }
    }
}

/// Result of feeding one user message into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Reply and wait for the next message.
    Prompt(String),
    /// Everything needed is collected; run generation on [`Session::to_input`].
    Generate,
    /// Give up on collecting more; the message carries the manual template.
    End(String),
}

const DESCRIPTION_PROMPT: &str = "**Step 1 - What happened?**\n\
Describe the bug in as much detail as you can: what you were doing, what you expected, and what went wrong.";

const STEPS_PROMPT: &str = "Got it!\n\n\
**Step 2 - Steps to reproduce**\n\
Please list the steps someone should follow to reliably see this bug, one per line.\n\n\
Example:\n\
1. Join a voice channel\n\
2. Mute and unmute yourself\n\
3. Wait 2 minutes";

const ENVIRONMENT_PROMPT: &str = "Perfect, thanks!\n\n\
**Step 3 - Environment details**\n\
Tell me about your setup. For example:\n\
- Platform (Desktop / iOS / Android / Web?)\n\
- OS version (e.g. Windows 11, macOS 14, iOS 17)\n\
- App version or browser and version\n\
- Anything special about your network (VPN, proxies, etc.)";

pub const GENERATING_MESSAGE: &str = "Thanks! Generating a polished bug report...";

const EMPTY_ANSWER_MESSAGE: &str =
    "I didn't catch anything there. Could you send that again with a bit more detail?";

const REPEATED_REQUEST_MESSAGE: &str = "The AI is asking for more info it already requested. \
Could you clarify or expand the environment and steps so I can finish the report?";

const GIVE_UP_MESSAGE: &str = "The AI keeps requesting information we've already tried to collect. \
To avoid repeating, please paste any remaining details into the bug form yourself using this template.";

pub const FAILURE_MESSAGE: &str = "Sorry, I couldn't generate the bug report automatically. \
Here's a basic template you can copy into the bug form:";

/// Conversation state for one reporter in one thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    user_id: String,
    thread_id: String,
    step: SessionStep,
    summary: String,
    severity: Option<String>,
    detailed_description: Option<String>,
    steps: Vec<String>,
    environment_notes: Option<String>,
    outstanding: Vec<ReportField>,
    asked: Vec<ReportField>,
    repeat_count: u32,
    last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
        summary: impl Into<String>,
        severity: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            step: SessionStep::Description,
            summary: summary.into(),
            severity: severity.filter(|s| !s.trim().is_empty()),
            detailed_description: None,
            steps: Vec::new(),
            environment_notes: None,
            outstanding: Vec::new(),
            asked: Vec::new(),
            repeat_count: 0,
            last_activity: now,
        }
    }

    pub fn opening_prompt() -> &'static str {
        DESCRIPTION_PROMPT
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn step(&self) -> SessionStep {
        self.step
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn environment_notes(&self) -> Option<&str> {
        self.environment_notes.as_deref()
    }

    /// Fields the backend asked for that are still unanswered.
    pub fn outstanding_fields(&self) -> &[ReportField] {
        &self.outstanding
    }

    pub fn asked_fields(&self) -> &[ReportField] {
        &self.asked
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    fn in_followup(&self) -> bool {
        !self.asked.is_empty()
    }

    fn clear_outstanding(&mut self, step: SessionStep) {
        self.outstanding
            .retain(|field| SessionStep::for_field(*field) != step);
    }

    /// After an answer: jump to the next outstanding field's step, generate if
    /// a follow-up round is satisfied, or continue the normal progression.
    fn advance(&mut self, normal_next: SessionStep) -> Transition {
        if let Some(next) = self.outstanding.first().copied() {
            self.step = SessionStep::for_field(next);
            return Transition::Prompt(format!(
                "Thanks! The AI still needs **{}** to finish the report. Please provide it now.",
                next.label()
            ));
        }
        if self.in_followup() || normal_next == SessionStep::Done {
            self.step = SessionStep::Done;
            return Transition::Generate;
        }
        self.step = normal_next;
        Transition::Prompt(normal_next.prompt().to_string())
    }

    /// Feed one message from the session owner into the state machine.
    pub fn accept_message(&mut self, text: &str, rules: &SatisfactionRules) -> Transition {
        let text = text.trim();
        if text.is_empty() {
            return Transition::Prompt(EMPTY_ANSWER_MESSAGE.to_string());
        }

        match self.step {
            SessionStep::Description => {
                self.detailed_description = Some(match self.detailed_description.take() {
                    Some(existing) => format!("{}\n\n{}", existing, text),
                    None => text.to_string(),
                });
                self.clear_outstanding(SessionStep::Description);
                self.advance(SessionStep::Steps)
            }
            SessionStep::Steps => {
                self.steps.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
                self.clear_outstanding(SessionStep::Steps);
                self.advance(SessionStep::Environment)
            }
            SessionStep::Environment => {
                let merged = self.to_input().with_environment_notes(text);
                self.environment_notes = merged.environment_notes;
                self.outstanding = rules.unsatisfied(&self.outstanding, text);
                if !self.outstanding.is_empty() {
                    self.repeat_count += 1;
                    if self.repeat_count > REPEAT_THRESHOLD {
                        self.step = SessionStep::Done;
                        return Transition::End(self.give_up_message());
                    }
                }
                self.advance(SessionStep::Done)
            }
            SessionStep::Done => Transition::Prompt(GENERATING_MESSAGE.to_string()),
        }
    }

    /// React to a backend request for more information after a generation attempt.
    pub fn handle_insufficiency(&mut self, signal: &InsufficiencySignal) -> SessionReply {
        let new_fields: Vec<ReportField> = signal
            .missing_fields()
            .iter()
            .copied()
            .filter(|field| !self.asked.contains(field))
            .collect();

        if new_fields.is_empty() {
            self.repeat_count += 1;
            if self.repeat_count > REPEAT_THRESHOLD {
                self.step = SessionStep::Done;
                return SessionReply::end_with(self.give_up_message());
            }
            self.step = SessionStep::Environment;
            return SessionReply::continue_with(REPEATED_REQUEST_MESSAGE);
        }

        self.asked.extend(new_fields.iter().copied());
        self.outstanding = new_fields;
        let first = self.outstanding[0];
        self.step = SessionStep::for_field(first);

        let labels: Vec<&str> = self.outstanding.iter().map(|f| f.label()).collect();
        SessionReply::continue_with(format!(
            "The AI needs more information before it can finish the report. Please provide: **{}**.\n\nStart by giving **{}** details now.",
            labels.join(", "),
            self.step.as_str()
        ))
    }

    /// Copy-paste template assembled from everything collected so far.
    pub fn manual_template(&self) -> String {
        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| format!("{}. {}", i + 1, step))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "**Template:**\n**Title:** {}\n**What happened:** {}\n**Steps to reproduce:**\n{}\n\n**Environment:** {}",
            self.summary,
            self.detailed_description.as_deref().unwrap_or(""),
            if steps.is_empty() { "1. ..." } else { steps.as_str() },
            self.environment_notes.as_deref().unwrap_or("")
        )
    }

    fn give_up_message(&self) -> String {
        format!("{}\n\n{}", GIVE_UP_MESSAGE, self.manual_template())
    }

    /// Reply used when generation fails for a reason other than insufficiency.
    pub fn failure_reply(&self) -> SessionReply {
        SessionReply::end_with(format!("{}\n\n{}", FAILURE_MESSAGE, self.manual_template()))
    }

    /// Snapshot of the collected material as generation input.
    pub fn to_input(&self) -> ReportInput {
        ReportInput {
            raw_summary: self.summary.clone(),
            detailed_description: self.detailed_description.clone(),
            steps: self.steps.clone(),
            environment_notes: self.environment_notes.clone(),
            severity: self.severity.clone(),
            component: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("user-1", "thread-1", "Voice drops", None, Utc::now())
    }

    fn rules() -> SatisfactionRules {
        SatisfactionRules::default()
    }

    #[test]
    fn test_happy_path_walks_three_steps_then_generates() {
        let mut s = session();
        assert_eq!(s.step(), SessionStep::Description);

        let t = s.accept_message("Voice cuts out every two minutes in any channel", &rules());
        assert!(matches!(t, Transition::Prompt(ref m) if m.contains("Step 2")));
        assert_eq!(s.step(), SessionStep::Steps);

        let t = s.accept_message("1. Join voice\n\n2. Wait two minutes\n", &rules());
        assert!(matches!(t, Transition::Prompt(ref m) if m.contains("Step 3")));
        assert_eq!(s.steps(), &["1. Join voice", "2. Wait two minutes"]);

        assert_eq!(s.accept_message("Windows 11, stable 483861", &rules()), Transition::Generate);
        assert_eq!(s.step(), SessionStep::Done);
        let input = s.to_input();
        assert_eq!(input.environment_notes.as_deref(), Some("Windows 11, stable 483861"));
        assert_eq!(input.raw_summary, "Voice drops");
    }

    #[test]
    fn test_empty_message_does_not_advance() {
        let mut s = session();
        assert!(matches!(s.accept_message("   ", &rules()), Transition::Prompt(_)));
        assert_eq!(s.step(), SessionStep::Description);
    }

    #[test]
    fn test_new_fields_recorded_as_outstanding_and_asked() {
        let mut s = session();
        let reply = s.handle_insufficiency(&InsufficiencySignal::new(
            [ReportField::AppVersion, ReportField::Os],
            None,
        ));
        assert!(!reply.end_session);
        assert!(reply.message.contains("app or browser version"));
        assert_eq!(s.step(), SessionStep::Environment);
        assert_eq!(s.outstanding_fields(), &[ReportField::AppVersion, ReportField::Os]);
        assert_eq!(s.asked_fields(), &[ReportField::AppVersion, ReportField::Os]);
    }

    #[test]
    fn test_steps_request_routes_to_steps_and_then_generates() {
        let mut s = session();
        s.accept_message("Voice cuts out every two minutes", &rules());
        s.accept_message("Join voice", &rules());
        s.accept_message("Windows 11", &rules());

        s.handle_insufficiency(&InsufficiencySignal::new([ReportField::StepsToReproduce], None));
        assert_eq!(s.step(), SessionStep::Steps);
        assert_eq!(s.accept_message("Mute\nUnmute", &rules()), Transition::Generate);
        assert_eq!(s.steps(), &["Join voice", "Mute", "Unmute"]);
    }

    #[test]
    fn test_environment_answer_removes_satisfied_fields_and_appends_notes() {
        let mut s = session();
        s.accept_message("Voice cuts out every two minutes", &rules());
        s.accept_message("Join voice", &rules());
        s.accept_message("Desktop app", &rules());

        s.handle_insufficiency(&InsufficiencySignal::new(
            [ReportField::AppVersion, ReportField::StepsToReproduce],
            None,
        ));
        assert_eq!(s.step(), SessionStep::Environment);
        let t = s.accept_message("stable 483861 (57c4cd6)", &rules());
        assert!(matches!(t, Transition::Prompt(ref m) if m.contains("steps to reproduce")));
        assert_eq!(s.step(), SessionStep::Steps);
        assert_eq!(s.outstanding_fields(), &[ReportField::StepsToReproduce]);
        assert_eq!(
            s.environment_notes(),
            Some("Desktop app | stable 483861 (57c4cd6)")
        );
    }

    #[test]
    fn test_unsatisfied_environment_field_is_asked_for() {
        let mut s = session();
        s.accept_message("Voice cuts out every two minutes", &rules());
        s.accept_message("Join voice", &rules());
        s.accept_message("Desktop app", &rules());

        s.handle_insufficiency(&InsufficiencySignal::new(
            [ReportField::Os, ReportField::AppVersion],
            None,
        ));
        let t = s.accept_message("stable 483861 (57c4cd6)", &rules());
        assert!(matches!(t, Transition::Prompt(ref m) if m.contains("operating system")));
        assert_eq!(s.step(), SessionStep::Environment);
        assert_eq!(s.outstanding_fields(), &[ReportField::Os]);

        assert_eq!(s.accept_message("Windows 11", &rules()), Transition::Generate);
        assert!(s.outstanding_fields().is_empty());
    }

    #[test]
    fn test_unanswerable_environment_field_ends_with_template() {
        let mut s = session();
        s.accept_message("Voice cuts out every two minutes", &rules());
        s.accept_message("Join voice", &rules());
        s.accept_message("Desktop app", &rules());
        s.handle_insufficiency(&InsufficiencySignal::new([ReportField::Os], None));

        for _ in 0..REPEAT_THRESHOLD {
            assert!(matches!(
                s.accept_message("no idea, sorry", &rules()),
                Transition::Prompt(_)
            ));
        }
        match s.accept_message("still not sure", &rules()) {
            Transition::End(message) => assert!(message.contains("**Template:**")),
            other => panic!("unexpected transition: {:?}", other),
        }
        assert_eq!(s.step(), SessionStep::Done);
    }

    #[test]
    fn test_repeated_requests_terminate_with_template() {
        let mut s = session();
        s.handle_insufficiency(&InsufficiencySignal::new([ReportField::Os], None));

        let repeat = InsufficiencySignal::new([ReportField::Os], None);
        let first = s.handle_insufficiency(&repeat);
        assert!(!first.end_session);
        assert!(first.message.contains("Could you clarify"));
        let second = s.handle_insufficiency(&repeat);
        assert!(!second.end_session);
        let third = s.handle_insufficiency(&repeat);
        assert!(third.end_session);
        assert!(third.message.contains("**Template:**"));
        assert!(third.message.contains("**Title:** Voice drops"));
    }

    #[test]
    fn test_unactionable_signal_counts_as_repeat() {
        let mut s = session();
        let reply = s.handle_insufficiency(&InsufficiencySignal::new(Vec::new(), None));
        assert!(!reply.end_session);
        assert_eq!(s.repeat_count(), 1);
        assert_eq!(s.step(), SessionStep::Environment);
    }

    #[test]
    fn test_manual_template_numbers_steps() {
        let mut s = session();
        s.accept_message("Voice cuts out every two minutes", &rules());
        s.accept_message("Join voice\nWait", &rules());
        let template = s.manual_template();
        assert!(template.contains("1. Join voice\n2. Wait"));
        assert!(template.contains("**What happened:** Voice cuts out"));
    }
}
