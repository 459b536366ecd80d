use async_trait::async_trait;
use config::{ErrorLocale, FailedTurnPolicy, SessionOptions};
use futures::{StreamExt, stream};
use llm::{ChatChunk, ChatMessage, ChatModel, ChatPayload, ChatRequest, ChatStream, ContentBlock, Role};
use reverie_audio::{ActiveCapture, AudioError, AudioSource, CapturedAudio};
use reverie_core::persona::{FALLBACK_EN, FALLBACK_ZH, IMAGE_PLACEHOLDER, MICROPHONE_ALERT};
use reverie_core::{
    Attachment, AttachmentKind, Message, SendOutcome, SessionController, SessionError, SessionEvent,
    SkipReason, TurnStatus,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// One scripted reply per call
enum Reply {
    Text(&'static str),
    Fragments(Vec<&'static str>),
    FragmentsThenError(Vec<&'static str>),
    /// First fragment, then the stream stays open until notified
    HeldOpen(&'static str, Arc<Notify>, &'static str),
    Fail,
}

struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    fn gated(replies: Vec<Reply>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    async fn next(&self, request: &ChatRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.replies.lock().unwrap().pop_front().expect("unexpected call")
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

fn chunk(text: &str) -> anyhow::Result<ChatChunk> {
    Ok(ChatChunk::assistant(ChatPayload::text(text)))
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatMessage> {
        match self.next(request).await {
            Reply::Text(text) => Ok(ChatMessage::assistant(ChatPayload::text(text))),
            Reply::Fail => Err(anyhow::anyhow!("Request failed with status 503")),
            _ => panic!("streaming reply scripted for a batch call"),
        }
    }

    async fn stream_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        match self.next(request).await {
            Reply::Fragments(fragments) => Ok(Box::pin(stream::iter(
                fragments.into_iter().map(chunk).collect::<Vec<_>>(),
            ))),
            Reply::FragmentsThenError(fragments) => {
                let mut items: Vec<_> = fragments.into_iter().map(chunk).collect();
                items.push(Err(anyhow::anyhow!("Error reading stream chunk")));
                Ok(Box::pin(stream::iter(items)))
            }
            Reply::HeldOpen(head, hold, tail) => {
                let rest = stream::once(async move {
                    hold.notified().await;
                    chunk(tail)
                });
                Ok(Box::pin(stream::iter(vec![chunk(head)]).chain(rest)))
            }
            Reply::Fail => Err(anyhow::anyhow!("connection refused")),
            Reply::Text(_) => panic!("batch reply scripted for a streaming call"),
        }
    }
}

struct ScriptedSource {
    chunks: Vec<Vec<f32>>,
    deny: bool,
}

struct ScriptedCapture(Vec<Vec<f32>>);

impl ActiveCapture for ScriptedCapture {
    fn stop(self: Box<Self>) -> Result<CapturedAudio, AudioError> {
        Ok(CapturedAudio::new(16000, self.0))
    }
}

impl AudioSource for ScriptedSource {
    fn open(&self) -> Result<Box<dyn ActiveCapture>, AudioError> {
        if self.deny {
            return Err(AudioError::AccessDenied("permission refused".to_string()));
        }
        Ok(Box::new(ScriptedCapture(self.chunks.clone())))
    }
}

fn no_mic() -> Arc<ScriptedSource> {
    Arc::new(ScriptedSource {
        chunks: Vec::new(),
        deny: true,
    })
}

fn batch() -> SessionOptions {
    SessionOptions {
        streaming: false,
        ..Default::default()
    }
}

fn session(model: Arc<ScriptedModel>, options: SessionOptions) -> SessionController {
    SessionController::new(model, no_mic(), options)
}

fn text_of(message: &ChatMessage) -> String {
    message.get_text()
}

#[tokio::test]
async fn test_hello_scenario_batch() {
    let model = ScriptedModel::new(vec![Reply::Text("Hi there")]);
    let session = session(model.clone(), batch());

    session.set_text("Hello");
    let outcome = session.send().await;
    assert!(matches!(outcome, SendOutcome::Replied));

    let request = model.last_request();
    assert_eq!(request.messages(), &[ChatMessage::user(ChatPayload::text("Hello"))]);

    assert_eq!(
        session.messages(),
        vec![Message::user("Hello"), Message::model("Hi there")]
    );
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(text_of(&history[1]), "Hi there");
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_successful_turns_keep_views_balanced() {
    let model = ScriptedModel::new(vec![
        Reply::Fragments(vec!["One"]),
        Reply::Fragments(vec!["Two"]),
        Reply::Fragments(vec!["Three"]),
    ]);
    let session = session(model.clone(), SessionOptions::default());

    for text in ["a", "b", "c"] {
        session.set_text(text);
        assert!(matches!(session.send().await, SendOutcome::Replied));
    }

    let messages = session.messages();
    let users = messages.iter().filter(|m| m.role == reverie_core::MessageRole::User).count();
    assert_eq!(users, 3);
    assert_eq!(messages.len(), 6);
    assert_eq!(session.history().len(), 6);

    // The third request replays the first two exchanges in order
    let replayed: Vec<String> = model.last_request().messages().iter().map(text_of).collect();
    assert_eq!(replayed, vec!["a", "One", "b", "Two", "c"]);
}

#[tokio::test]
async fn test_streaming_fragments_build_one_message() {
    let model = ScriptedModel::new(vec![Reply::Fragments(vec!["Hello", ", ", "world"])]);
    let session = session(model, SessionOptions::default());
    let mut events = session.subscribe();

    session.set_text("hi");
    assert!(matches!(session.send().await, SendOutcome::Replied));

    assert_eq!(
        session.messages(),
        vec![Message::user("hi"), Message::model("Hello, world")]
    );
    assert_eq!(text_of(&session.history()[1]), "Hello, world");

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            SessionEvent::MessageAppended { index: 0, message: Message::user("hi") },
            SessionEvent::LoadingChanged(true),
            SessionEvent::LoadingChanged(false),
            SessionEvent::MessageAppended { index: 1, message: Message::model("Hello") },
            SessionEvent::MessageUpdated { index: 1, delta: ", ".to_string() },
            SessionEvent::MessageUpdated { index: 1, delta: "world".to_string() },
        ]
    );
}

#[tokio::test]
async fn test_empty_fragments_do_not_open_a_bubble() {
    let model = ScriptedModel::new(vec![Reply::Fragments(vec!["", "Mm", "", "."])]);
    let session = session(model, SessionOptions::default());

    session.set_text("hi");
    session.send().await;

    assert_eq!(session.messages()[1], Message::model("Mm."));
}

#[tokio::test]
async fn test_empty_batch_reply_appends_one_fallback() {
    let model = ScriptedModel::new(vec![Reply::Text("")]);
    let session = session(model, batch());

    session.set_text("Hello");
    let outcome = session.send().await;
    assert!(matches!(outcome, SendOutcome::Failed(SessionError::AnalysisFailure(_))));

    assert_eq!(
        session.messages(),
        vec![Message::user("Hello"), Message::model(FALLBACK_EN)]
    );
    assert!(session.history().is_empty());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_empty_stream_is_analysis_failure() {
    let model = ScriptedModel::new(vec![Reply::Fragments(vec![])]);
    let session = session(model, SessionOptions::default());

    session.set_text("為什麼");
    let outcome = session.send().await;

    assert!(matches!(outcome, SendOutcome::Failed(SessionError::AnalysisFailure(_))));
    assert_eq!(session.messages()[1], Message::model(FALLBACK_ZH));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_send_while_loading_is_blocked() {
    let gate = Arc::new(Notify::new());
    let model = ScriptedModel::gated(vec![Reply::Text("first")], gate.clone());
    let session = session(model.clone(), batch());

    session.set_text("one");
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.send().await }
    });

    while !session.is_loading() {
        tokio::task::yield_now().await;
    }

    session.set_text("two");
    let second = session.send().await;
    assert!(matches!(second, SendOutcome::Skipped(SkipReason::InFlight)));
    assert_eq!(session.messages(), vec![Message::user("one")]);

    gate.notify_one();
    assert!(matches!(first.await.unwrap(), SendOutcome::Replied));
    assert_eq!(model.calls(), 1);
    assert_eq!(session.messages().len(), 2);
    // The blocked text is still staged for the next send
    assert_eq!(session.pending().text, "two");
}

#[tokio::test]
async fn test_open_stream_blocks_send_after_first_fragment() {
    let hold = Arc::new(Notify::new());
    let model = ScriptedModel::new(vec![
        Reply::HeldOpen("Perhaps", hold.clone(), " we begin there."),
        Reply::Fragments(vec!["Go on."]),
    ]);
    let session = session(model.clone(), SessionOptions::default());

    session.set_text("one");
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.send().await }
    });

    while session.messages().len() < 2 {
        tokio::task::yield_now().await;
    }
    assert!(!session.is_loading());

    session.set_text("two");
    assert!(matches!(
        session.send().await,
        SendOutcome::Skipped(SkipReason::InFlight)
    ));
    assert_eq!(model.calls(), 1);

    hold.notify_one();
    assert!(matches!(first.await.unwrap(), SendOutcome::Replied));
    assert_eq!(session.messages()[1].content, "Perhaps we begin there.");

    assert!(matches!(session.send().await, SendOutcome::Replied));
    let roles: Vec<Role> = model.last_request().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
}

#[tokio::test]
async fn test_cancelled_send_releases_the_session() {
    let gate = Arc::new(Notify::new());
    let model = ScriptedModel::gated(vec![Reply::Text("Go on.")], gate.clone());
    let session = session(model.clone(), batch());
    let mut events = session.subscribe();

    session.set_text("one");
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.send().await }
    });

    while !session.is_loading() {
        tokio::task::yield_now().await;
    }
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    assert!(!session.is_loading());
    let statuses: Vec<TurnStatus> = session.turn_log().turns().iter().map(|t| t.status).collect();
    assert_eq!(statuses, vec![TurnStatus::Failed]);
    assert!(session.history().is_empty());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.last(), Some(&SessionEvent::LoadingChanged(false)));

    gate.notify_one();
    session.set_text("two");
    assert!(matches!(session.send().await, SendOutcome::Replied));
    assert_eq!(model.calls(), 2);
    assert_eq!(model.last_request().messages().len(), 1);
    assert_eq!(text_of(&model.last_request().messages()[0]), "two");
}

#[tokio::test]
async fn test_nothing_pending_is_skipped() {
    let model = ScriptedModel::new(vec![]);
    let session = session(model.clone(), batch());

    session.set_text("   ");
    assert!(matches!(
        session.send().await,
        SendOutcome::Skipped(SkipReason::NothingPending)
    ));
    assert!(session.messages().is_empty());
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_image_only_turn_uses_placeholder() {
    let model = ScriptedModel::new(vec![Reply::Text("What do you see in it?")]);
    let session = session(model.clone(), batch());

    session
        .set_image_data_url("data:image/png;base64,aW1hZ2U=")
        .unwrap();
    session.send().await;

    assert_eq!(session.messages()[0], Message::user(IMAGE_PLACEHOLDER));
    let request = model.last_request();
    let parts = &request.messages()[0].payload.content;
    assert_eq!(parts, &vec![ContentBlock::image("aW1hZ2U=", "image/png")]);
    assert!(request.messages()[0].get_text().is_empty());
}

#[tokio::test]
async fn test_parts_keep_text_image_audio_order() {
    let model = ScriptedModel::new(vec![Reply::Text("ok"), Reply::Text("ok")]);
    let session = session(model.clone(), batch());

    session.set_audio(Attachment::new("YXVkaW8=", "audio/wav"));
    session.set_image_data_url("data:image/jpeg;base64,aW1n").unwrap();
    session.set_text(" look ");
    session.send().await;

    let expected = vec![
        ContentBlock::text("look"),
        ContentBlock::image("aW1n", "image/jpeg"),
        ContentBlock::audio("YXVkaW8=", "audio/wav"),
    ];
    assert_eq!(model.last_request().messages()[0].payload.content, expected);
    assert!(session.pending().is_empty());

    // Replayed unchanged on the next turn
    session.set_text("again");
    session.send().await;
    assert_eq!(model.last_request().messages()[0].payload.content, expected);
}

#[tokio::test]
async fn test_request_carries_persona_config() {
    let model = ScriptedModel::new(vec![Reply::Text("ok"), Reply::Text("ok")]);
    let session = session(model.clone(), batch());

    session.set_text("hi");
    session.send().await;
    let config = model.last_request().config().clone();
    assert!(config.system_instruction.is_some());
    assert_eq!(config.safety_settings.len(), 4);

    let model = ScriptedModel::new(vec![Reply::Text("ok")]);
    let session = self::session(
        model.clone(),
        SessionOptions {
            safety_override: false,
            ..batch()
        },
    );
    session.set_text("hi");
    session.send().await;
    assert!(model.last_request().config().safety_settings.is_empty());
}

#[tokio::test]
async fn test_failed_turn_omitted_from_context() {
    let model = ScriptedModel::new(vec![Reply::Fail, Reply::Text("Welcome back")]);
    let session = session(model.clone(), batch());

    session.set_text("first");
    assert!(matches!(session.send().await, SendOutcome::Failed(_)));
    session.set_text("second");
    assert!(matches!(session.send().await, SendOutcome::Replied));

    assert_eq!(session.messages().len(), 4);
    let replayed: Vec<String> = model.last_request().messages().iter().map(text_of).collect();
    assert_eq!(replayed, vec!["second"]);

    let statuses: Vec<TurnStatus> = session.turn_log().turns().iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![
            TurnStatus::Failed,
            TurnStatus::Failed,
            TurnStatus::Committed,
            TurnStatus::Committed
        ]
    );
}

#[tokio::test]
async fn test_failed_turn_recorded_keeps_alternation() {
    let model = ScriptedModel::new(vec![Reply::Fail, Reply::Text("ok")]);
    let session = session(
        model.clone(),
        SessionOptions {
            failed_turn: FailedTurnPolicy::Record,
            error_locale: ErrorLocale::Bilingual,
            ..batch()
        },
    );

    session.set_text("first");
    session.send().await;
    session.set_text("second");
    session.send().await;

    let roles: Vec<Role> = model.last_request().messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    assert!(text_of(&model.last_request().messages()[1]).contains(FALLBACK_ZH));
}

#[tokio::test]
async fn test_mid_stream_error_keeps_partial_visible() {
    let model = ScriptedModel::new(vec![Reply::FragmentsThenError(vec!["Perhaps", " the"])]);
    let session = session(
        model,
        SessionOptions {
            retry_attempts: 3,
            ..Default::default()
        },
    );

    session.set_text("why");
    let outcome = session.send().await;
    assert!(matches!(outcome, SendOutcome::Failed(SessionError::AnalysisFailure(_))));

    assert_eq!(
        session.messages(),
        vec![
            Message::user("why"),
            Message::model("Perhaps the"),
            Message::model(FALLBACK_EN),
        ]
    );
    assert!(session.history().is_empty());
    assert!(!session.is_loading());
}

#[tokio::test]
async fn test_retry_before_visible_content() {
    let model = ScriptedModel::new(vec![Reply::Fail, Reply::Fragments(vec!["Again."])]);
    let session = session(
        model.clone(),
        SessionOptions {
            retry_attempts: 1,
            ..Default::default()
        },
    );

    session.set_text("hello");
    assert!(matches!(session.send().await, SendOutcome::Replied));
    assert_eq!(model.calls(), 2);
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn test_input_cleared_even_on_failure() {
    let model = ScriptedModel::new(vec![Reply::Fail, Reply::Fail]);
    let session = session(model, batch());

    session.set_text("lost");
    session.send().await;
    assert!(session.pending().is_empty());

    let model = ScriptedModel::new(vec![Reply::Fail]);
    let session = self::session(
        model,
        SessionOptions {
            restore_input_on_failure: true,
            ..batch()
        },
    );
    session.set_text("kept");
    session.set_image_data_url("data:image/png;base64,aW1n").unwrap();
    session.send().await;
    let pending = session.pending();
    assert_eq!(pending.text, "kept");
    assert!(pending.image.is_some());
}

#[tokio::test]
async fn test_recording_stages_wav_audio() {
    let model = ScriptedModel::new(vec![Reply::Text("I hear you.")]);
    let mic = Arc::new(ScriptedSource {
        chunks: vec![vec![0.2; 320], vec![-0.2; 320]],
        deny: false,
    });
    let session = SessionController::new(model.clone(), mic, batch());
    let mut events = session.subscribe();

    session.toggle_recording().await.unwrap();
    assert!(session.is_recording());
    session.toggle_recording().await.unwrap();
    assert!(!session.is_recording());

    let audio = session.pending().audio.unwrap();
    assert_eq!(audio.mime_type, "audio/wav");

    assert_eq!(events.try_recv().unwrap(), SessionEvent::RecordingChanged(true));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::RecordingChanged(false));
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::AttachmentStaged(AttachmentKind::Audio)
    );

    session.send().await;
    assert_eq!(session.messages()[0].content, "[Voice note shared]");
}

#[tokio::test]
async fn test_zero_chunk_recording_stages_nothing() {
    let model = ScriptedModel::new(vec![]);
    let mic = Arc::new(ScriptedSource {
        chunks: Vec::new(),
        deny: false,
    });
    let session = SessionController::new(model, mic, batch());

    session.start_recording().await.unwrap();
    let staged = session.stop_recording().await.unwrap();

    assert!(staged.is_none());
    assert!(session.pending().audio.is_none());
    assert!(matches!(
        session.send().await,
        SendOutcome::Skipped(SkipReason::NothingPending)
    ));
}

#[tokio::test]
async fn test_denied_microphone_alerts_and_stays_idle() {
    let session = session(ScriptedModel::new(vec![]), batch());
    let mut events = session.subscribe();

    let result = session.start_recording().await;
    assert!(matches!(result, Err(SessionError::PermissionDenied(_))));
    assert!(!session.is_recording());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Alert(MICROPHONE_ALERT.to_string())
    );

    // Stop while idle is a no-op
    assert!(session.stop_recording().await.unwrap().is_none());
}

#[tokio::test]
async fn test_bad_image_is_not_staged() {
    let session = session(ScriptedModel::new(vec![]), batch());

    assert!(session.set_image_data_url("data:audio/wav;base64,aW1n").is_err());
    assert!(session.set_image("/definitely/not/here.png").await.is_err());
    assert!(session.pending().image.is_none());
}
