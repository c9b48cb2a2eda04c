//! Long-lived channel (L8): wraps the same tag-subscription machinery as
//! [`Channel`](crate::channel::Channel) but supports pause/resume/stop,
//! section batching and empty-data debouncing for streaming commands such as
//! `/tool/torch` or `/ip/address/listen`.

use std::sync::Arc;
use std::time::Duration;

use mikrotik_proto::{Command, CommandBuilder, CommandResponse, ReplyResponse};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use crate::connector::Connector;
use crate::error::{DeviceError, DeviceResult};

/// Quiescence timer for section batching (§4.8).
const SECTION_QUIESCENCE: Duration = Duration::from_millis(300);

/// Builds the wire [`Command`] for a given tag. Stored so `resume()` can
/// re-issue the exact same request on the exact same tag.
pub type RequestFactory = Arc<dyn Fn(u16) -> Command + Send + Sync>;

/// Lifecycle of a [`Stream`], per §3/§4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Paused,
    Stopped,
    Trapped,
}

/// One batch of rows delivered to a stream consumer.
///
/// `Data` carries either a single `!re` row (no `.section`) or a full
/// section's worth of rows flushed together; `Empty` is the synthesized
/// debounce tick when `=interval=` was set and nothing arrived in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Rows delivered either individually or batched by `.section`.
    Data(Vec<ReplyResponse>),
    /// No data arrived within `interval*1000 + 300` ms of the last sentence.
    Empty,
}

/// A long-lived, pausable/resumable subscription to a streaming command.
pub struct Stream {
    connector: Connector,
    tag: u16,
    request: RequestFactory,
    rx: mpsc::Receiver<DeviceResult<CommandResponse>>,
    state: StreamState,
    empty_data_interval: Option<Duration>,
    last_activity: Instant,
    pending_section: Option<String>,
    pending_rows: Vec<ReplyResponse>,
}

impl Stream {
    /// Opens a stream for a long-lived request. `empty_data_interval`
    /// corresponds to the request's `=interval=<seconds>` attribute, if any
    /// — pass `None` for commands with no such attribute.
    pub async fn open(
        connector: &Connector,
        empty_data_interval: Option<Duration>,
        request: RequestFactory,
    ) -> DeviceResult<Self> {
        let tag = connector.allocate_tag().await?;
        let command = request(tag);
        let (tx, rx) = mpsc::channel(64);
        connector.submit(command, tx).await?;
        Ok(Self {
            connector: connector.clone(),
            tag,
            request,
            rx,
            state: StreamState::Streaming,
            empty_data_interval,
            last_activity: Instant::now(),
            pending_section: None,
            pending_rows: Vec::new(),
        })
    }

    /// Current lifecycle state, for callers that want to branch without
    /// calling `recv`/`pause`/`resume`/`stop`.
    pub fn is_stopped(&self) -> bool {
        matches!(self.state, StreamState::Stopped | StreamState::Trapped)
    }

    /// Waits for the next batch of data (or a synthesized empty tick).
    ///
    /// Only valid while `Streaming`; returns [`DeviceError::StreamClosed`]
    /// once the stream has stopped or trapped.
    pub async fn recv(&mut self) -> DeviceResult<StreamEvent> {
        loop {
            if self.state != StreamState::Streaming {
                return Err(DeviceError::StreamClosed);
            }

            let debounce_deadline = self
                .empty_data_interval
                .map(|interval| self.last_activity + interval + Duration::from_millis(300));
            let section_deadline =
                (!self.pending_rows.is_empty()).then(|| self.last_activity + SECTION_QUIESCENCE);

            tokio::select! {
                biased;

                maybe_response = self.rx.recv() => match maybe_response {
                    Some(Ok(CommandResponse::Reply(reply))) => {
                        self.last_activity = Instant::now();
                        if let Some(batch) = self.ingest_reply(reply) {
                            return Ok(StreamEvent::Data(batch));
                        }
                    }
                    Some(Ok(CommandResponse::Trap(trap))) if trap.is_interrupted() => {
                        // Only seen mid in-flight pause/stop, which drain the
                        // channel themselves; a bare recv() shouldn't usually
                        // observe this, but treat it as a no-op rather than
                        // panicking on an unexpected wire sequence.
                        continue;
                    }
                    Some(Ok(CommandResponse::Trap(_))) => {
                        self.state = StreamState::Trapped;
                        return Err(DeviceError::StreamClosed);
                    }
                    Some(Ok(CommandResponse::Done(_))) => {
                        self.state = StreamState::Stopped;
                        if !self.pending_rows.is_empty() {
                            return Ok(StreamEvent::Data(std::mem::take(&mut self.pending_rows)));
                        }
                        return Err(DeviceError::StreamClosed);
                    }
                    Some(Ok(CommandResponse::Fatal(_))) | Some(Err(_)) | None => {
                        self.state = StreamState::Trapped;
                        return Err(DeviceError::ConnectionLost);
                    }
                },

                _ = sleep_until_or_pending(section_deadline) => {
                    self.last_activity = Instant::now();
                    return Ok(StreamEvent::Data(std::mem::take(&mut self.pending_rows)));
                }

                _ = sleep_until_or_pending(debounce_deadline), if section_deadline.is_none() => {
                    self.last_activity = Instant::now();
                    return Ok(StreamEvent::Empty);
                }
            }
        }
    }

    /// Buffers `reply` by `.section`, returning a flushed batch if the
    /// section identifier just changed.
    fn ingest_reply(&mut self, reply: ReplyResponse) -> Option<Vec<ReplyResponse>> {
        match &reply.section {
            None => {
                // No sectioning in use for this command: deliver rows
                // one at a time.
                Some(vec![reply])
            }
            Some(section) => {
                if self.pending_section.as_deref() != Some(section.as_str()) {
                    let flushed = (!self.pending_rows.is_empty()).then(|| std::mem::take(&mut self.pending_rows));
                    self.pending_section = Some(section.clone());
                    self.pending_rows.push(reply);
                    flushed
                } else {
                    self.pending_rows.push(reply);
                    None
                }
            }
        }
    }

    /// Pauses the stream: cancels the in-flight request in-band and waits
    /// for the router's acknowledgement, without releasing the tag.
    pub async fn pause(&mut self) -> DeviceResult<()> {
        if self.state != StreamState::Streaming {
            return Err(DeviceError::StreamClosed);
        }
        self.cancel_in_band().await?;
        self.state = StreamState::Paused;
        Ok(())
    }

    /// Resumes a paused stream by re-issuing the original request on the
    /// same tag.
    pub async fn resume(&mut self) -> DeviceResult<()> {
        if self.state != StreamState::Paused {
            return Err(DeviceError::StreamClosed);
        }
        let command = (self.request)(self.tag);
        let (tx, rx) = mpsc::channel(64);
        self.connector.submit(command, tx).await?;
        self.rx = rx;
        self.last_activity = Instant::now();
        self.pending_section = None;
        self.pending_rows.clear();
        self.state = StreamState::Streaming;
        Ok(())
    }

    /// Stops the stream permanently, releasing its tag.
    pub async fn stop(&mut self) -> DeviceResult<()> {
        if self.state == StreamState::Stopped {
            return Ok(());
        }
        if self.state == StreamState::Streaming {
            self.cancel_in_band().await?;
        }
        self.state = StreamState::Stopped;
        Ok(())
    }

    /// Sends `/cancel =tag=<original>` on a fresh tag and waits for
    /// `!trap message=interrupted` plus `!done` on the original tag, per
    /// §4.7/§8 S4. Cancellation is never best-effort: the tag is not reused
    /// until the router has acknowledged.
    async fn cancel_in_band(&mut self) -> DeviceResult<()> {
        let cancel_tag = self.connector.allocate_tag().await?;
        let cancel = CommandBuilder::with_tag(cancel_tag)
            .command("/cancel")?
            .attribute("tag", Some(&self.tag.to_string()))?
            .build();
        let (cancel_tx, mut cancel_rx) = mpsc::channel(4);
        self.connector.submit(cancel, cancel_tx).await?;

        loop {
            match self.rx.recv().await {
                Some(Ok(CommandResponse::Trap(trap))) if trap.is_interrupted() => continue,
                Some(Ok(CommandResponse::Done(_))) => break,
                Some(Ok(CommandResponse::Reply(_))) | Some(Ok(CommandResponse::Trap(_))) => continue,
                Some(Ok(CommandResponse::Fatal(_))) | Some(Err(_)) | None => break,
            }
        }
        let _ = cancel_rx.recv().await;
        Ok(())
    }
}

async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(at: Instant) {
    let now = Instant::now();
    if at > now {
        sleep(at - now).await;
    }
}
