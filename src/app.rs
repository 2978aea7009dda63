//! Application context: every long-lived component, built once at startup.

use std::sync::Arc;

use tracing::info;

use crate::actions::{ActionDispatcher, AgentRegistry, TaskBoard};
use crate::channels::MessageRouter;
use crate::channels::cli::TERMINAL_SURFACE;
use crate::commands::CommandHandler;
use crate::config::AuroraConfig;
use crate::error::Result;
use crate::learning::{ContextAssembler, LearningGate, PatternStore};
use crate::llm::{LlmProvider, create_provider};
use crate::pipeline::{Orchestrator, PipelineDeps};
use crate::profile::{FileProfileStore, ProfileManager};
use crate::security::{AccessPolicy, TopicGuard};
use crate::wellbeing::WellbeingMonitor;

pub struct AppContext {
    pub config: Arc<AuroraConfig>,
    pub llm: Arc<dyn LlmProvider>,
    pub profile: Arc<ProfileManager>,
    pub patterns: Arc<PatternStore>,
    pub wellbeing: Arc<WellbeingMonitor>,
    pub dispatcher: Arc<ActionDispatcher>,
    pub orchestrator: Arc<Orchestrator>,
    pub router: Arc<MessageRouter>,
}

impl AppContext {
    /// Build with the configured inference backend.
    pub async fn build(config: AuroraConfig) -> Result<Self> {
        let llm = create_provider(&config.llm)?;
        Self::with_llm(config, llm).await
    }

    /// Build around an existing provider.
    pub async fn with_llm(config: AuroraConfig, llm: Arc<dyn LlmProvider>) -> Result<Self> {
        let config = Arc::new(config);

        let store = FileProfileStore::open(config.profile_dir()).await?;
        let profile = Arc::new(ProfileManager::new(Arc::new(store)));

        let gate = LearningGate {
            learning_enabled: config.learning_enabled,
            feedback_required: config.feedback_required,
        };
        let patterns = Arc::new(PatternStore::open(config.patterns_dir(), gate).await?);

        let wellbeing = Arc::new(
            WellbeingMonitor::open(
                profile.clone(),
                config.meal_reminder_interval,
                config.profile_dir(),
            )
            .await?
            .with_default_focus(config.default_focus_minutes),
        );

        let guard = TopicGuard::default();
        let context = Arc::new(
            ContextAssembler::open(config.context_dir.clone(), guard.clone(), config.max_context_chars)
                .await,
        );

        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::new(TaskBoard::new()),
            Arc::new(AgentRegistry::new()),
        ));

        let deps = PipelineDeps {
            llm: llm.clone(),
            profile: profile.clone(),
            patterns: patterns.clone(),
            context,
            wellbeing: wellbeing.clone(),
            dispatcher: dispatcher.clone(),
        };
        let policy = AccessPolicy::default().with_secure_surface(TERMINAL_SURFACE);
        let orchestrator = Arc::new(Orchestrator::new(config.clone(), policy, guard, deps));

        let commands = Arc::new(CommandHandler::new(
            config.clone(),
            llm.model_name(),
            orchestrator.clone(),
            patterns.clone(),
            wellbeing.clone(),
            dispatcher.clone(),
        ));
        let router = Arc::new(MessageRouter::new(orchestrator.clone(), commands));

        info!(
            agent = %config.agent_name,
            data_dir = %config.data_dir.display(),
            model = %llm.model_name(),
            "Application context ready"
        );

        Ok(Self {
            config,
            llm,
            profile,
            patterns,
            wellbeing,
            dispatcher,
            orchestrator,
            router,
        })
    }
}
