//! Routes inbound messages from any adapter through the access gate, then to
//! slash commands or the pipeline.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{error, info, warn};

use crate::commands::{Command, CommandHandler};
use crate::error::ChannelError;
use crate::pipeline::Orchestrator;
use crate::security::{AccessDecision, SecurityContext};

use super::channel::{Channel, IncomingMessage, OutgoingResponse};

/// Reply sent when a turn fails for any reason.
pub const RETRY_APOLOGY: &str =
    "I ran into an issue processing that. Could you try again, or rephrase?";

pub struct MessageRouter {
    orchestrator: Arc<Orchestrator>,
    commands: Arc<CommandHandler>,
}

impl MessageRouter {
    pub fn new(orchestrator: Arc<Orchestrator>, commands: Arc<CommandHandler>) -> Self {
        Self {
            orchestrator,
            commands,
        }
    }

    /// Fresh security context for one message.
    pub fn security_context(&self, msg: &IncomingMessage) -> SecurityContext {
        self.orchestrator.policy().context(
            &msg.sender_id,
            &msg.sender_name,
            &msg.surface_id,
            &msg.surface_name,
            msg.surface_kind,
            msg.roles.clone(),
        )
    }

    /// Build the sender's context and handle the message.
    pub async fn route(&self, msg: &IncomingMessage) -> String {
        let ctx = self.security_context(msg);
        self.handle_incoming(msg, &ctx).await
    }

    /// Reply text for `msg`. Never fails: errors become [`RETRY_APOLOGY`].
    pub async fn handle_incoming(&self, msg: &IncomingMessage, ctx: &SecurityContext) -> String {
        if let AccessDecision::Redirect(text) = self.orchestrator.decide(ctx) {
            return text;
        }

        let session_id = msg.session_key();
        let result = match Command::parse(&msg.content) {
            Some(command) => {
                if let Some(deflection) = self.orchestrator.deflection(&msg.content, ctx) {
                    warn!(
                        sender = %ctx.sender_name,
                        "Protected topic in a command off a secure surface"
                    );
                    return deflection;
                }
                self.commands
                    .execute(command, &session_id)
                    .await
                    .map(|reply| self.orchestrator.redact(&reply, ctx))
            }
            None => self
                .orchestrator
                .process_message(&msg.content, msg.channel.as_str(), &session_id, ctx)
                .await
                .map_err(Into::into),
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    channel = %msg.channel,
                    session = %session_id,
                    error = %e,
                    "Error handling message"
                );
                RETRY_APOLOGY.to_string()
            }
        }
    }

    /// Serve one adapter until its stream ends or `/quit` arrives.
    pub async fn run(&self, channel: &dyn Channel) -> Result<(), ChannelError> {
        let mut messages = channel.start().await?;
        info!(channel = %channel.name(), "Channel ready and listening");

        while let Some(msg) = messages.next().await {
            let quit = Command::parse(&msg.content) == Some(Command::Quit);
            let reply = self.route(&msg).await;
            if !reply.is_empty() {
                let response = OutgoingResponse::text(reply).in_session(msg.session_key());
                if let Err(e) = channel.respond(&msg, response).await {
                    error!(channel = %channel.name(), error = %e, "Failed to send response");
                }
            }
            if quit && self.security_context(&msg).level.has_full_access() {
                info!("Shutdown command received, exiting...");
                break;
            }
        }

        channel.shutdown().await
    }
}
