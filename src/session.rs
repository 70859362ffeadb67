//! Per-session chat state and the event dispatcher that drives a turn.
//!
//! A [`ChatSession`] is an explicit value owned by whoever hosts the UI; the
//! [`CoachService`] holds the shared collaborators (completion backend, turn
//! log, admin gate) and handles one [`SessionEvent`] at a time.
//!
//! Session lifecycle:
//!
//! ```text
//! INIT -> AWAITING_INPUT -> STREAMING_REPLY -> AWAITING_INPUT -> ...
//!   ^_____________________ reset ______________________|
//! ```

use crate::admin::{AdminCheck, AdminGate, AdminPanel, LogExport};
use crate::ai::backend_from_config;
use crate::arbiter::{InputCycle, QuickReply, Utterance};
use crate::config::CoachConfig;
use crate::streamer::CompletionStreamer;
use crate::transcript::Transcript;
use crate::turn_log::{CsvTurnLog, LogError, LogRole, TurnLogger};
use crate::types::ChatMessage;
use std::sync::Arc;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, warn};

pub const SYSTEM_PROMPT: &str = r#"
【最高安全指令】
你现在的身份通过硬编码设定为【社区运动健康指导员】。
1. **语气要求**：使用尊称"您"，语气亲切、耐心。
2. **拒绝无关话题**：如果不聊健康，礼貌拒绝。
3. **流程**：先问年龄/病史 -> 再开处方 -> 最后问是否要四周计划。
4. **格式**：手机屏幕小，**请不要输出长篇大论**。尽量分点说明，关键信息加粗。
"#;

/// Shown above an empty conversation. Never sent to the model.
pub const GREETING: &str = "您好！我是您的专属运动指导员。💪";

/// The only error text users ever see for a failed reply.
pub const NETWORK_ERROR_NOTICE: &str = "网络信号不太好，请重新点一下按钮。";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Init,
    AwaitingInput,
    StreamingReply,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatSession {
    transcript: Transcript,
    state: SessionState,
    origin_address: Option<String>,
}

impl ChatSession {
    pub fn new(origin_address: Option<String>) -> Self {
        Self {
            origin_address,
            ..Self::default()
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn origin_address(&self) -> Option<&str> {
        self.origin_address.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::StreamingReply
    }

    /// Runs at the start of every render cycle: restores the persona and
    /// leaves `Init`.
    pub fn prepare(&mut self, system_prompt: &str) {
        self.transcript.ensure_system_prompt(system_prompt);
        if self.state == SessionState::Init {
            self.state = SessionState::AwaitingInput;
        }
    }

    /// Clears the transcript back to empty. The turn log is untouched.
    pub fn reset(&mut self) {
        self.transcript.reset();
        self.state = SessionState::Init;
    }

    fn begin_turn(&mut self, system_prompt: &str, utterance: &str) -> bool {
        self.prepare(system_prompt);
        if self.is_streaming() {
            return false;
        }
        self.transcript.append(ChatMessage::user(utterance));
        self.state = SessionState::StreamingReply;
        true
    }

    fn commit_reply(&mut self, reply: String) {
        self.transcript.append(ChatMessage::assistant(reply));
        self.state = SessionState::AwaitingInput;
    }

    fn abort_turn(&mut self) {
        self.state = SessionState::AwaitingInput;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SubmitText(String),
    PressQuickReply(QuickReply),
    Reset,
    AdminAuth(String),
}

impl SessionEvent {
    /// At most one chat event per cycle; a pressed button beats typed text.
    pub fn from_cycle(cycle: InputCycle) -> Option<Self> {
        cycle.resolve().map(|utterance| match utterance {
            Utterance::QuickReply(trigger) => SessionEvent::PressQuickReply(trigger),
            Utterance::FreeText(text) => SessionEvent::SubmitText(text),
        })
    }
}

/// Live updates while a turn runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnProgress<'a> {
    /// The utterance was appended to the transcript.
    UserAccepted(&'a str),
    /// Reply so far, with the streaming cursor.
    Partial(&'a str),
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventOutcome {
    Replied(String),
    ReplyFailed { notice: &'static str },
    /// Blank input, or a turn requested while another is streaming.
    Ignored,
    Reset,
    Admin(AdminPanel),
}

pub struct CoachService {
    streamer: CompletionStreamer,
    logger: TurnLogger,
    admin: AdminGate,
    system_prompt: String,
}

impl CoachService {
    pub fn new(streamer: CompletionStreamer, logger: TurnLogger, admin: AdminGate) -> Self {
        Self {
            streamer,
            logger,
            admin,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn from_config(config: &CoachConfig) -> Self {
        let backend = backend_from_config(&config.provider);
        let streamer =
            CompletionStreamer::new(backend, config.provider.model(), config.temperature);
        let logger = TurnLogger::new(Arc::new(CsvTurnLog::new(config.log_path.clone())));
        Self::new(streamer, logger, AdminGate::new(&config.admin_secret))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn new_session(&self, origin_address: Option<String>) -> ChatSession {
        let mut session = ChatSession::new(origin_address);
        session.prepare(&self.system_prompt);
        session
    }

    /// Handles one event to completion. Nothing here returns an error: reply
    /// failures become [`EventOutcome::ReplyFailed`] and log failures are
    /// only traced.
    pub async fn dispatch<F>(
        &self,
        session: &mut ChatSession,
        event: SessionEvent,
        progress: F,
    ) -> EventOutcome
    where
        F: FnMut(TurnProgress<'_>),
    {
        match event {
            SessionEvent::SubmitText(text) => match InputCycle::free_text(text).resolve() {
                Some(utterance) => self.run_turn(session, utterance.into_text(), progress).await,
                None => EventOutcome::Ignored,
            },
            SessionEvent::PressQuickReply(trigger) => {
                self.run_turn(session, trigger.utterance().to_string(), progress)
                    .await
            }
            SessionEvent::Reset => {
                session.reset();
                info!("session reset");
                EventOutcome::Reset
            }
            SessionEvent::AdminAuth(input) => EventOutcome::Admin(self.admin_panel(&input)),
        }
    }

    async fn run_turn<F>(
        &self,
        session: &mut ChatSession,
        utterance: String,
        mut progress: F,
    ) -> EventOutcome
    where
        F: FnMut(TurnProgress<'_>),
    {
        if !session.begin_turn(&self.system_prompt, &utterance) {
            debug!("turn ignored while a reply is streaming");
            return EventOutcome::Ignored;
        }
        progress(TurnProgress::UserAccepted(&utterance));

        let origin = session.origin_address().map(str::to_string);
        self.record(LogRole::User, &utterance, origin.as_deref());

        let result = self
            .streamer
            .complete(session.transcript().messages(), |partial| {
                progress(TurnProgress::Partial(partial))
            })
            .await;

        match result {
            Ok(reply) => {
                session.commit_reply(reply.clone());
                self.record(LogRole::Ai, &reply, origin.as_deref());
                info!(
                    model = self.streamer.model(),
                    chars = reply.chars().count(),
                    "turn completed"
                );
                EventOutcome::Replied(reply)
            }
            Err(err) => {
                session.abort_turn();
                warn!(error = %err, "completion failed; turn aborted");
                EventOutcome::ReplyFailed {
                    notice: NETWORK_ERROR_NOTICE,
                }
            }
        }
    }

    fn record(&self, role: LogRole, content: &str, origin_address: Option<&str>) {
        if let Err(err) = self.logger.log(role, content, origin_address) {
            warn!(role = %role, error = %err, "turn log append failed");
        }
    }

    pub fn admin_panel(&self, input: &str) -> AdminPanel {
        match self.admin.check(input) {
            AdminCheck::Idle => AdminPanel::Idle,
            AdminCheck::Rejected => {
                info!("admin password rejected");
                AdminPanel::Rejected
            }
            AdminCheck::Granted => {
                let export = self.load_export().unwrap_or_else(|err| {
                    warn!(error = %err, "could not read turn log for export");
                    None
                });
                AdminPanel::Granted { export }
            }
        }
    }

    fn load_export(&self) -> Result<Option<LogExport>, LogError> {
        let Some(bytes) = self.logger.export()? else {
            return Ok(None);
        };
        let rows = self.logger.row_count()?.unwrap_or(0);
        Ok(Some(LogExport::new(local_today(), bytes, rows)))
    }
}

fn local_today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
