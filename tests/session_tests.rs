//! Integration tests for the coach conversation flow
//!
//! A scripted backend stands in for the completion endpoint and in-memory
//! sinks stand in for the CSV log, so every turn runs without the network.

use async_trait::async_trait;
use futures::StreamExt;
use health_coach::admin::{AdminGate, AdminPanel, AdminSecret};
use health_coach::ai::{ChatError, ChatResult, CompletionBackend, CompletionRequest, DeltaStream};
use health_coach::arbiter::{InputCycle, QuickReply};
use health_coach::session::{
    CoachService, EventOutcome, NETWORK_ERROR_NOTICE, SYSTEM_PROMPT, SessionEvent, SessionState,
    TurnProgress,
};
use health_coach::streamer::{CompletionStreamer, STREAMING_CURSOR};
use health_coach::turn_log::{CsvTurnLog, LogEntry, LogError, LogRole, TurnLogger, TurnSink};
use health_coach::types::{ChatMessage, Role};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy)]
enum Step {
    Delta(&'static str),
    Fail,
}

/// Replays a fixed script and remembers every transcript it was sent.
struct ScriptedBackend {
    script: Vec<Step>,
    refuse: bool,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    fn replying(script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script,
            refuse: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            script: Vec::new(),
            refuse: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream(&self, request: CompletionRequest<'_>) -> ChatResult<DeltaStream> {
        self.seen.lock().unwrap().push(request.messages.to_vec());
        if self.refuse {
            return Err(ChatError::Remote("connection refused".to_string()));
        }
        let items = self
            .script
            .iter()
            .map(|step| match step {
                Step::Delta(text) => Ok(text.to_string()),
                Step::Fail => Err(ChatError::Remote("stream reset".to_string())),
            })
            .collect::<Vec<_>>();
        Ok(futures::stream::iter(items).boxed())
    }
}

#[derive(Default)]
struct MemorySink {
    rows: Mutex<Vec<(LogRole, String, Option<String>)>>,
}

impl MemorySink {
    fn rows(&self) -> Vec<(LogRole, String, Option<String>)> {
        self.rows.lock().unwrap().clone()
    }
}

impl TurnSink for MemorySink {
    fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        self.rows.lock().unwrap().push((
            entry.role,
            entry.content.clone(),
            entry.origin_address.clone(),
        ));
        Ok(())
    }

    fn row_count(&self) -> Result<Option<usize>, LogError> {
        let rows = self.rows.lock().unwrap().len();
        Ok((rows > 0).then_some(rows))
    }

    fn export(&self) -> Result<Option<Vec<u8>>, LogError> {
        let rows = self.rows.lock().unwrap();
        if rows.is_empty() {
            return Ok(None);
        }
        let body = rows
            .iter()
            .map(|(role, content, _)| format!("{role},{content}\n"))
            .collect::<String>();
        Ok(Some(body.into_bytes()))
    }
}

/// Sink whose disk is always full.
struct BrokenSink;

impl TurnSink for BrokenSink {
    fn append(&self, _entry: &LogEntry) -> Result<(), LogError> {
        Err(LogError::Io(std::io::Error::other("disk full")))
    }

    fn row_count(&self) -> Result<Option<usize>, LogError> {
        Err(LogError::Io(std::io::Error::other("disk full")))
    }

    fn export(&self) -> Result<Option<Vec<u8>>, LogError> {
        Err(LogError::Io(std::io::Error::other("disk full")))
    }
}

fn service_with(backend: Arc<ScriptedBackend>, sink: Arc<dyn TurnSink>) -> CoachService {
    CoachService::new(
        CompletionStreamer::new(backend, "deepseek-chat", 0.5),
        TurnLogger::new(sink),
        AdminGate::new(&AdminSecret::Plain("admin".to_string())),
    )
}

mod turn_tests {
    use super::*;

    #[tokio::test]
    async fn deltas_concatenate_into_one_assistant_message() {
        let backend = ScriptedBackend::replying(vec![
            Step::Delta("您好"),
            Step::Delta("，"),
            Step::Delta("请问您今年多大年纪？"),
        ]);
        let sink = Arc::new(MemorySink::default());
        let service = service_with(backend.clone(), sink.clone());
        let mut session = service.new_session(Some("192.168.0.8".to_string()));

        let mut partials = Vec::new();
        let outcome = service
            .dispatch(
                &mut session,
                SessionEvent::SubmitText("  我想锻炼身体  ".to_string()),
                |progress| {
                    if let TurnProgress::Partial(text) = progress {
                        partials.push(text.to_string());
                    }
                },
            )
            .await;

        assert_eq!(
            outcome,
            EventOutcome::Replied("您好，请问您今年多大年纪？".to_string())
        );
        assert_eq!(partials.len(), 3);
        assert!(partials.iter().all(|p| p.ends_with(STREAMING_CURSOR)));

        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], ChatMessage::system(SYSTEM_PROMPT));
        assert_eq!(messages[1], ChatMessage::user("我想锻炼身体"));
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(session.state(), SessionState::AwaitingInput);

        let rows = sink.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, LogRole::User);
        assert_eq!(rows[1].0, LogRole::Ai);
        assert_eq!(rows[1].1, "您好，请问您今年多大年纪？");
        assert_eq!(rows[0].2.as_deref(), Some("192.168.0.8"));
    }

    #[tokio::test]
    async fn quick_reply_sends_its_canned_utterance() {
        let backend = ScriptedBackend::replying(vec![Step::Delta("好的")]);
        let service = service_with(backend.clone(), Arc::new(MemorySink::default()));
        let mut session = service.new_session(None);

        let event = SessionEvent::from_cycle(InputCycle {
            quick_reply: Some(QuickReply::KneePain),
            free_text: Some("ignored".to_string()),
        })
        .unwrap();
        service.dispatch(&mut session, event, |_| {}).await;

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert_eq!(sent[0].role, Role::System);
        assert_eq!(
            sent.last().map(|m| m.content.as_str()),
            Some(QuickReply::KneePain.utterance())
        );
    }

    #[tokio::test]
    async fn follow_up_turn_sends_the_whole_history() {
        let backend = ScriptedBackend::replying(vec![Step::Delta("收到")]);
        let service = service_with(backend.clone(), Arc::new(MemorySink::default()));
        let mut session = service.new_session(None);

        service
            .dispatch(&mut session, SessionEvent::SubmitText("一".to_string()), |_| {})
            .await;
        service
            .dispatch(&mut session, SessionEvent::SubmitText("二".to_string()), |_| {})
            .await;

        let requests = backend.requests();
        let roles = requests[1].iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
    }

    #[tokio::test]
    async fn blank_text_is_ignored_without_calling_the_backend() {
        let backend = ScriptedBackend::replying(vec![Step::Delta("x")]);
        let service = service_with(backend.clone(), Arc::new(MemorySink::default()));
        let mut session = service.new_session(None);

        let outcome = service
            .dispatch(&mut session, SessionEvent::SubmitText("   ".to_string()), |_| {})
            .await;

        assert_eq!(outcome, EventOutcome::Ignored);
        assert!(backend.requests().is_empty());
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_yields_one_notice_and_no_reply() {
        let sink = Arc::new(MemorySink::default());
        let service = service_with(ScriptedBackend::unreachable(), sink.clone());
        let mut session = service.new_session(None);

        let outcome = service
            .dispatch(
                &mut session,
                SessionEvent::PressQuickReply(QuickReply::WeightLoss),
                |_| {},
            )
            .await;

        assert_eq!(
            outcome,
            EventOutcome::ReplyFailed {
                notice: NETWORK_ERROR_NOTICE
            }
        );
        let messages = session.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(session.state(), SessionState::AwaitingInput);

        let rows = sink.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, LogRole::User);
    }

    #[tokio::test]
    async fn mid_stream_failure_drops_the_partial_reply() {
        let backend = ScriptedBackend::replying(vec![Step::Delta("先做"), Step::Fail]);
        let service = service_with(backend, Arc::new(MemorySink::default()));
        let mut session = service.new_session(None);

        let outcome = service
            .dispatch(&mut session, SessionEvent::SubmitText("血压高".to_string()), |_| {})
            .await;

        assert!(matches!(outcome, EventOutcome::ReplyFailed { .. }));
        assert!(
            session
                .transcript()
                .messages()
                .iter()
                .all(|m| m.role != Role::Assistant)
        );
    }

    #[tokio::test]
    async fn broken_log_does_not_change_the_reply() {
        let backend = ScriptedBackend::replying(vec![Step::Delta("没问题")]);
        let service = service_with(backend, Arc::new(BrokenSink));
        let mut session = service.new_session(None);

        let outcome = service
            .dispatch(&mut session, SessionEvent::SubmitText("你好".to_string()), |_| {})
            .await;

        assert_eq!(outcome, EventOutcome::Replied("没问题".to_string()));
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn reset_empties_the_transcript_and_next_turn_restores_persona() {
        let backend = ScriptedBackend::replying(vec![Step::Delta("好")]);
        let sink = Arc::new(MemorySink::default());
        let service = service_with(backend.clone(), sink.clone());
        let mut session = service.new_session(None);

        service
            .dispatch(&mut session, SessionEvent::SubmitText("一".to_string()), |_| {})
            .await;
        let outcome = service.dispatch(&mut session, SessionEvent::Reset, |_| {}).await;

        assert_eq!(outcome, EventOutcome::Reset);
        assert_eq!(session.transcript().len(), 0);
        assert_eq!(sink.rows().len(), 2);

        service
            .dispatch(&mut session, SessionEvent::SubmitText("二".to_string()), |_| {})
            .await;
        let requests = backend.requests();
        assert_eq!(requests[1].len(), 2);
        assert_eq!(requests[1][0], ChatMessage::system(SYSTEM_PROMPT));
    }
}

mod admin_tests {
    use super::*;

    #[tokio::test]
    async fn admin_panel_follows_password_input() {
        let sink = Arc::new(MemorySink::default());
        let service = service_with(ScriptedBackend::replying(vec![Step::Delta("好")]), sink);
        let mut session = service.new_session(None);

        assert_eq!(service.admin_panel(""), AdminPanel::Idle);
        assert_eq!(service.admin_panel("guess"), AdminPanel::Rejected);
        assert_eq!(
            service.admin_panel("admin"),
            AdminPanel::Granted { export: None }
        );

        service
            .dispatch(&mut session, SessionEvent::SubmitText("你好".to_string()), |_| {})
            .await;

        let outcome = service
            .dispatch(&mut session, SessionEvent::AdminAuth("admin".to_string()), |_| {})
            .await;
        let EventOutcome::Admin(AdminPanel::Granted { export: Some(export) }) = outcome else {
            panic!("expected an export after a logged turn");
        };
        assert_eq!(export.row_count, 2);
        assert_eq!(export.row_count_label(), "当前累计数据：2 条");
        assert!(export.file_name.starts_with("health_logs_"));
        assert!(export.file_name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn admin_event_reports_rows_logged_since_last_check() {
        let service = service_with(
            ScriptedBackend::replying(vec![Step::Delta("好")]),
            Arc::new(MemorySink::default()),
        );
        let mut session = service.new_session(None);
        let rows_now = |outcome: EventOutcome| match outcome {
            EventOutcome::Admin(AdminPanel::Granted { export }) => export.map(|e| e.row_count),
            other => panic!("unexpected outcome: {other:?}"),
        };

        let before = service
            .dispatch(&mut session, SessionEvent::AdminAuth("admin".to_string()), |_| {})
            .await;
        assert_eq!(rows_now(before), None);

        for text in ["一", "二"] {
            service
                .dispatch(&mut session, SessionEvent::SubmitText(text.to_string()), |_| {})
                .await;
        }
        let after = service
            .dispatch(&mut session, SessionEvent::AdminAuth("admin".to_string()), |_| {})
            .await;
        assert_eq!(rows_now(after), Some(4));

        let rejected = service
            .dispatch(&mut session, SessionEvent::AdminAuth("admin ".to_string()), |_| {})
            .await;
        assert_eq!(rejected, EventOutcome::Admin(AdminPanel::Rejected));
    }

    #[test]
    fn unreadable_log_still_grants_access() {
        let service = service_with(
            ScriptedBackend::replying(Vec::new()),
            Arc::new(BrokenSink),
        );
        assert_eq!(
            service.admin_panel("admin"),
            AdminPanel::Granted { export: None }
        );
    }
}

mod csv_log_tests {
    use super::*;

    #[tokio::test]
    async fn csv_log_counts_multiline_replies_as_single_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("chat_history.csv");
        let backend = ScriptedBackend::replying(vec![
            Step::Delta("1. **热身**\n"),
            Step::Delta("2. 快走, 每天 30 分钟"),
        ]);
        let service = service_with(backend, Arc::new(CsvTurnLog::new(&path)));
        let mut session = service.new_session(Some("10.0.0.2".to_string()));

        service
            .dispatch(
                &mut session,
                SessionEvent::PressQuickReply(QuickReply::FourWeekPlan),
                |_| {},
            )
            .await;

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(text.starts_with("timestamp,origin_address,role,content"));
        assert!(text.contains(",10.0.0.2,User,"));
        assert!(text.contains(",10.0.0.2,AI,"));

        let AdminPanel::Granted { export: Some(export) } = service.admin_panel("admin") else {
            panic!("expected an export");
        };
        assert_eq!(export.row_count, 2);
    }
}
