//! Terminal channel: stdin/stdout REPL for the operator.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::channels::{Channel, ChannelKind, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;
use crate::security::SurfaceKind;

/// Surface name the terminal reports. Add it to the secure allow-list to
/// give the operator full access.
pub const TERMINAL_SURFACE: &str = "terminal";

/// Reads lines from stdin as the local operator and prints replies to stdout.
pub struct CliChannel {
    sender_name: String,
    roles: HashSet<String>,
}

impl CliChannel {
    /// Operator with the founder role.
    pub fn new(sender_name: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            roles: HashSet::from(["founder".to_string()]),
        }
    }

    /// Build the message a typed line turns into.
    pub fn message(&self, line: &str) -> IncomingMessage {
        IncomingMessage::new(ChannelKind::Terminal, "local-operator", line)
            .with_sender_name(&self.sender_name)
            .on_surface(TERMINAL_SURFACE, TERMINAL_SURFACE, SurfaceKind::Shared)
            .with_roles(self.roles.iter().cloned())
    }
}

/// Write one reply block to `out`.
async fn write_reply<W>(out: &mut W, content: &str) -> Result<(), ChannelError>
where
    W: AsyncWrite + Unpin,
{
    let block = format!("\n{content}\n\n");
    let sent = async {
        out.write_all(block.as_bytes()).await?;
        out.flush().await
    };
    sent.await.map_err(|e| ChannelError::SendFailed {
        name: "terminal".to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "terminal"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let template = self.message("");
        let stream = stream::unfold(rx, move |mut rx| {
            let template = template.clone();
            async move {
                let line = rx.recv().await?;
                let mut msg = template;
                msg.id = uuid::Uuid::new_v4();
                msg.content = line;
                msg.received_at = chrono::Utc::now();
                Some((msg, rx))
            }
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        write_reply(&mut tokio::io::stdout(), &response.content).await?;
        eprint!("> ");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{AccessPolicy, SecurityLevel};

    #[test]
    fn terminal_operator_is_founder_on_shared_surface() {
        let cli = CliChannel::new("Sam");
        let msg = cli.message("hello");
        assert_eq!(msg.channel, ChannelKind::Terminal);
        assert_eq!(msg.surface_kind, SurfaceKind::Shared);
        assert_eq!(msg.sender_name, "Sam");

        let policy = AccessPolicy::default().with_secure_surface(TERMINAL_SURFACE);
        let ctx = policy.context(
            &msg.sender_id,
            &msg.sender_name,
            &msg.surface_id,
            &msg.surface_name,
            msg.surface_kind,
            msg.roles.clone(),
        );
        assert_eq!(ctx.level, SecurityLevel::Founder);
        assert!(ctx.is_secure_surface);
    }

    struct ClosedPipe;

    impl AsyncWrite for ClosedPipe {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn reply_is_written_as_a_block() {
        let mut out = Vec::new();
        write_reply(&mut out, "hello").await.unwrap();
        assert_eq!(out, b"\nhello\n\n");
    }

    #[tokio::test]
    async fn write_failure_is_a_send_error() {
        let err = write_reply(&mut ClosedPipe, "hello").await.unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed { ref name, .. } if name == "terminal"));
    }

    #[test]
    fn terminal_is_not_secure_unless_listed() {
        let msg = CliChannel::new("Sam").message("hello");
        assert!(!AccessPolicy::default().is_secure_surface(&msg.surface_name));
    }
}
