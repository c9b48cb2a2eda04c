//! Per-command handle (L7): the one-shot request/reply side of a connection,
//! an explicit `Open → AwaitingReply → {Done, Trapped, Fatal, Cancelled}`
//! state machine with in-band cancellation.

use mikrotik_proto::{Command, CommandBuilder, CommandResponse, ReplyResponse};
use tokio::sync::mpsc;

use crate::connector::Connector;
use crate::error::{DeviceError, DeviceResult};

/// Lifecycle of one [`Channel`]. Every terminal variant is reached exactly
/// once; after that, the tag is released and no further replies are
/// delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Open,
    Terminal,
}

/// A one-shot request/reply handle over a [`Connector`].
///
/// Construction allocates a tag from the connection's actor, submits the
/// request, and registers for its replies. [`Channel::wait`] collects every
/// `!re` row until the command terminates.
pub struct Channel {
    connector: Connector,
    tag: u16,
    rx: mpsc::Receiver<DeviceResult<CommandResponse>>,
    state: ChannelState,
}

impl Channel {
    /// Opens a channel for one command. `build_request` receives the tag
    /// allocated for this command and must produce the [`Command`] carrying
    /// it (typically via `CommandBuilder::with_tag(tag)...`).
    pub async fn open(
        connector: &Connector,
        build_request: impl FnOnce(u16) -> Command,
    ) -> DeviceResult<Self> {
        let tag = connector.allocate_tag().await?;
        let command = build_request(tag);
        let (tx, rx) = mpsc::channel(16);
        connector.submit(command, tx).await?;
        Ok(Self { connector: connector.clone(), tag, rx, state: ChannelState::Open })
    }

    /// The tag this channel's command was assigned.
    pub fn tag(&self) -> u16 {
        self.tag
    }

    /// Waits for the command to terminate, returning every `!re` row
    /// collected along the way.
    ///
    /// Consumes `self`: per invariant 5, a Channel's terminal transition
    /// happens exactly once.
    pub async fn wait(mut self) -> DeviceResult<Vec<ReplyResponse>> {
        let mut rows = Vec::new();
        loop {
            match self.next_response().await? {
                CommandResponse::Reply(reply) => rows.push(reply),
                CommandResponse::Done(_) => return Ok(rows),
                CommandResponse::Trap(trap) => return Err(DeviceError::Trap(trap)),
                CommandResponse::Fatal(_) => return Err(DeviceError::ConnectionLost),
            }
        }
    }

    /// Cancels the command in-band and waits for the router's acknowledgement.
    ///
    /// Idempotent after the channel has already reached a terminal state.
    /// Per §5, this is never "best effort": it waits for
    /// `!trap message=interrupted` plus `!done` on the original tag before
    /// returning, so a late `!re` can never be misrouted to a freshly
    /// recycled tag.
    pub async fn close(mut self) -> DeviceResult<()> {
        if self.state == ChannelState::Terminal {
            return Ok(());
        }

        let cancel_tag = self.connector.allocate_tag().await?;
        let cancel = CommandBuilder::with_tag(cancel_tag)
            .command("/cancel")?
            .attribute("tag", Some(&self.tag.to_string()))?
            .build();
        let (cancel_tx, mut cancel_rx) = mpsc::channel(4);
        self.connector.submit(cancel, cancel_tx).await?;

        loop {
            match self.rx.recv().await {
                Some(Ok(CommandResponse::Done(_))) => break,
                Some(Ok(CommandResponse::Trap(_))) | Some(Ok(CommandResponse::Reply(_))) => continue,
                Some(Ok(CommandResponse::Fatal(_))) | Some(Err(_)) | None => break,
            }
        }
        self.state = ChannelState::Terminal;

        // Drain the /cancel command's own reply; its tag is never reused.
        let _ = cancel_rx.recv().await;
        Ok(())
    }

    async fn next_response(&mut self) -> DeviceResult<CommandResponse> {
        if self.state == ChannelState::Terminal {
            return Err(DeviceError::StreamClosed);
        }
        let response = self.rx.recv().await.ok_or(DeviceError::ConnectionLost)??;
        if matches!(
            response,
            CommandResponse::Done(_) | CommandResponse::Trap(_) | CommandResponse::Fatal(_)
        ) {
            self.state = ChannelState::Terminal;
        }
        Ok(response)
    }
}
