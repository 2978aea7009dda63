//! End-to-end scenarios through the application context and router.
//!
//! Each test builds a fresh `AppContext` in a temp dir around a scripted LLM,
//! so no network or shared state is involved.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use aurora::app::AppContext;
use aurora::channels::{ChannelKind, IncomingMessage, RETRY_APOLOGY};
use aurora::config::AuroraConfig;
use aurora::error::LlmError;
use aurora::learning::LearningDomain;
use aurora::llm::{ChatMessage, LlmProvider};
use aurora::pipeline::{ActionType, Intent, Node};
use aurora::security::SurfaceKind;
use aurora::security::access::PUBLIC_GUIDE_REDIRECT;
use aurora::security::topic_guard::REDACTION_NOTICE;

/// Returns a fixed reply and counts calls.
struct ScriptedLlm {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

struct OfflineLlm;

#[async_trait]
impl LlmProvider for OfflineLlm {
    fn model_name(&self) -> &str {
        "offline"
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        Err(LlmError::Unavailable {
            provider: "offline".into(),
            reason: "connection refused".into(),
        })
    }
}

async fn app(dir: &std::path::Path, llm: Arc<dyn LlmProvider>) -> AppContext {
    AppContext::with_llm(AuroraConfig::with_data_dir(dir), llm)
        .await
        .unwrap()
}

fn founder_on(surface: &str, kind: SurfaceKind, text: &str) -> IncomingMessage {
    IncomingMessage::new(ChannelKind::Discord, "u-founder", text)
        .with_sender_name("Sam")
        .on_surface("c-1", surface, kind)
        .with_roles(["Founder"])
        .with_session("s1")
}

#[tokio::test]
async fn member_on_public_surface_gets_guide_redirect() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new("hello!");
    let app = app(dir.path(), llm.clone()).await;

    let msg = IncomingMessage::new(ChannelKind::Discord, "u-member", "hi")
        .on_surface("c-2", "general", SurfaceKind::Shared)
        .with_roles(["member"]);
    let ctx = app.router.security_context(&msg);

    let (allowed, redirect) = app.orchestrator.decide(&ctx).into_parts();
    assert!(!allowed);
    assert_eq!(redirect.as_deref(), Some(PUBLIC_GUIDE_REDIRECT));

    let reply = app.router.handle_incoming(&msg, &ctx).await;
    assert_eq!(reply, PUBLIC_GUIDE_REDIRECT);
    assert_eq!(llm.calls(), 0);
    assert_eq!(app.orchestrator.active_sessions().await, 0);
}

#[tokio::test]
async fn founder_task_request_runs_actions() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("Got it.")).await;

    let msg = founder_on(
        "aurora-forester",
        SurfaceKind::Shared,
        "create a task to water the plants",
    );
    let reply = app.router.route(&msg).await;
    assert!(reply.starts_with("Got it."));
    assert!(reply.contains("Added \"water the plants\" to your tasks."));

    let state = app.orchestrator.session_state("s1").await.unwrap();
    assert_eq!(state.intent, Intent::Task);
    assert!(state.has_visited(Node::ExecuteActions));
    assert_eq!(state.actions.len(), 1);
    assert_eq!(state.actions[0].action_type, ActionType::TaskOperation);
    assert_eq!(app.dispatcher.tasks().open_tasks().await.len(), 1);
}

#[tokio::test]
async fn founder_direct_message_mentioning_protected_project_is_redacted() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        dir.path(),
        ScriptedLlm::new("Quick update: sector7 staging went well, and the garden is thriving."),
    )
    .await;

    let msg = founder_on("", SurfaceKind::Direct, "how was your day?");
    let reply = app.router.route(&msg).await;
    assert_eq!(reply, REDACTION_NOTICE);
    assert!(!reply.contains("garden"));
}

#[tokio::test]
async fn break_reminder_rides_along_with_unrelated_reply() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("Here's the outline.")).await;

    let started = Utc::now() - Duration::minutes(95);
    app.wellbeing.record_focus_start_at(started).await;
    let now = Utc::now();
    assert!(app.wellbeing.check_break_needed_at(now).await.unwrap().is_some());
    assert!(app.wellbeing.check_break_needed_at(now).await.unwrap().is_some());

    let msg = founder_on("aurora-forester", SurfaceKind::Shared, "outline the grant proposal?");
    let reply = app.router.route(&msg).await;
    assert!(reply.starts_with("Here's the outline."));
    assert!(reply.contains("P.S. You've been focused for"));
}

#[tokio::test]
async fn backend_failure_becomes_retry_apology() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Arc::new(OfflineLlm)).await;

    let msg = founder_on("aurora-forester", SurfaceKind::Shared, "what's next?");
    assert_eq!(app.router.route(&msg).await, RETRY_APOLOGY);

    let state = app.orchestrator.session_state("s1").await.unwrap();
    assert_eq!(state.messages.len(), 1);
}

#[tokio::test]
async fn refused_domain_leaves_pattern_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("ok")).await;

    let before = app.patterns.domain_summary().await;
    let added = app
        .patterns
        .add_pattern("finance", "habit", "Reviews invoices on Fridays", vec![], None)
        .await
        .unwrap();
    assert!(added.is_none());
    assert_eq!(app.patterns.domain_summary().await, before);
    assert!(!dir.path().join("learning/patterns/finance_patterns.jsonl").exists());
}

#[tokio::test]
async fn observations_wait_for_positive_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("Noted.")).await;
    assert!(app.patterns.gate().feedback_required);

    for text in ["add a task to stretch", "add a task to eat lunch"] {
        app.router
            .route(&founder_on("aurora-forester", SurfaceKind::Shared, text))
            .await;
    }
    assert!(app.patterns.pending_observations().await.is_empty());

    let reply = app
        .router
        .route(&founder_on("aurora-forester", SurfaceKind::Shared, "/feedback positive"))
        .await;
    assert_eq!(reply, "Thanks, noted.");
    let pending = app.patterns.pending_observations().await;
    assert_eq!(pending.len(), 1);

    let promoted = app
        .patterns
        .promote(pending[0].id, "time", "habit")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promoted.domain, LearningDomain::Time);
    assert!(app.patterns.pending_observations().await.is_empty());
}

#[tokio::test]
async fn slash_commands_skip_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let llm = ScriptedLlm::new("unused");
    let app = app(dir.path(), llm.clone()).await;

    let capture = app
        .router
        .route(&founder_on(
            "aurora-forester",
            SurfaceKind::Shared,
            "/capture A tool library for members",
        ))
        .await;
    assert!(capture.contains("Captured to Think Tank"));
    let ideas = std::fs::read_to_string(dir.path().join("think_tank.jsonl")).unwrap();
    assert!(ideas.contains("A tool library for members"));

    let spawn = app
        .router
        .route(&founder_on("aurora-forester", SurfaceKind::Shared, "/spawn Grant Writing"))
        .await;
    assert!(spawn.contains("grant-writing-agent"));

    let agents = app
        .router
        .route(&founder_on("aurora-forester", SurfaceKind::Shared, "/agents"))
        .await;
    assert!(agents.contains("grant-writing-agent"));

    let status = app
        .router
        .route(&founder_on("aurora-forester", SurfaceKind::Shared, "/status"))
        .await;
    assert!(status.contains("**Spawned Agents:** 1"));
    assert!(status.contains("scripted"));

    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn slash_commands_are_gated_too() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("unused")).await;

    let msg = IncomingMessage::new(ChannelKind::Discord, "u-member", "/status")
        .on_surface("c-1", "aurora-forester", SurfaceKind::Shared);
    let reply = app.router.route(&msg).await;
    assert!(reply.starts_with("This is a private channel."));
}

#[tokio::test]
async fn protected_topic_in_command_arguments_is_deflected() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("unused")).await;

    let dev = IncomingMessage::new(ChannelKind::Discord, "u-dev", "/capture sector7 cutover plan")
        .on_surface("c-3", "dev-chat", SurfaceKind::Shared)
        .with_roles(["Developer"])
        .with_session("s-dev");
    let reply = app.router.route(&dev).await;
    assert_eq!(reply, "This is a protected project. I can't discuss it here.");
    assert!(!dir.path().join("think_tank.jsonl").exists());

    let dm = founder_on("", SurfaceKind::Direct, "/spawn sector7 ops");
    let reply = app.router.route(&dm).await;
    assert!(!reply.contains("sector7"));
    assert!(app.dispatcher.agents().active().await.is_empty());
}

#[tokio::test]
async fn command_replies_are_redacted_off_secure_surface() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), ScriptedLlm::new("unused")).await;

    let spawn = app
        .router
        .route(&founder_on("aurora-forester", SurfaceKind::Shared, "/spawn sector7 ops"))
        .await;
    assert!(spawn.contains("sector7-ops-agent"));

    let agents = app
        .router
        .route(&founder_on("", SurfaceKind::Direct, "/agents"))
        .await;
    assert_eq!(agents, REDACTION_NOTICE);
}
