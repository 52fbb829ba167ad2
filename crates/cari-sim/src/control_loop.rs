//! Control loop task
//!
//! The [`ControlLoop`] owns the control channel, the device model and the
//! dispatcher. Each iteration waits up to one poll interval for a request,
//! answers it, and moves on. A bad request only affects its own iteration.
//!
//! [`ControlLoop::run`] drives the loop with a `select!` over:
//! - requests arriving on the control channel
//! - [`LoopCommand`]s from the owner (fault injection, model updates, shutdown)
//!
//! Every handled request is reported on an optional broadcast channel as a
//! [`ControlEvent`].

use std::time::Duration;

use cari_protocol::{DeviceFaults, FrameError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, ControlChannel};
use crate::device::{DeviceModel, Subdevice};
use crate::dispatcher::Dispatcher;

/// Number of leading request bytes kept for diagnostics
const LAST_REQUEST_PREVIEW: usize = 8;

/// Shortest receive wait of one iteration; a zero wait would spin
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Commands accepted by a running control loop
#[derive(Debug, Clone)]
pub enum LoopCommand {
    /// Change the fault bitmask reported by PING
    SetFaults(DeviceFaults),
    /// Replace one subdevice between two dispatch cycles
    UpdateSubdevice { index: usize, subdevice: Subdevice },
    /// Stop the loop
    Shutdown,
}

/// Event emitted for every handled request and model change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A reply was sent
    Replied { command: u8, len: usize },
    /// The request was malformed and not answered
    Dropped { reason: FrameError },
    /// A subdevice was replaced
    ModelUpdated { index: usize },
}

/// Result of one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived within the poll interval
    Idle,
    /// A reply was sent
    Replied { command: u8, len: usize },
    /// The request was dropped
    Dropped(FrameError),
}

/// Counters kept across iterations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Requests received
    pub requests: u64,
    /// Replies sent
    pub replies: u64,
    /// Requests dropped as malformed
    pub dropped: u64,
    /// First bytes of the most recent request
    pub last_request: Vec<u8>,
}

/// Control loop context: one channel, one device, one request at a time
pub struct ControlLoop<C> {
    channel: C,
    model: DeviceModel,
    dispatcher: Dispatcher,
    poll_interval: Duration,
    stats: LoopStats,
    events: Option<broadcast::Sender<ControlEvent>>,
}

impl<C: ControlChannel> ControlLoop<C> {
    /// Create a loop; `poll_interval` is raised to [`MIN_POLL_INTERVAL`] if shorter
    pub fn new(channel: C, model: DeviceModel, poll_interval: Duration) -> Self {
        Self {
            channel,
            model,
            dispatcher: Dispatcher::new(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            stats: LoopStats::default(),
            events: None,
        }
    }

    /// Publish a [`ControlEvent`] for every handled request
    pub fn with_events(mut self, events: broadcast::Sender<ControlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn model(&self) -> &DeviceModel {
        &self.model
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Run one iteration: wait for a request and answer it
    pub async fn poll_once(&mut self) -> Result<PollOutcome, ChannelError> {
        match self.channel.recv(self.poll_interval).await? {
            Some(request) => self.handle_request(&request).await,
            None => Ok(PollOutcome::Idle),
        }
    }

    async fn handle_request(&mut self, request: &[u8]) -> Result<PollOutcome, ChannelError> {
        self.stats.requests += 1;
        self.stats.last_request = request.iter().take(LAST_REQUEST_PREVIEW).copied().collect();
        debug!("CARI request: {:02X?}", self.stats.last_request);

        let device = self.model.snapshot();
        match self.dispatcher.handle(&device, request) {
            Ok(reply) => {
                self.channel.send(&reply).await?;
                self.stats.replies += 1;

                let command = reply[0];
                debug!("CARI reply: {:02X?}", reply);
                self.emit(ControlEvent::Replied {
                    command,
                    len: reply.len(),
                });
                Ok(PollOutcome::Replied {
                    command,
                    len: reply.len(),
                })
            }
            Err(reason) => {
                self.stats.dropped += 1;
                self.emit(ControlEvent::Dropped {
                    reason: reason.clone(),
                });
                Ok(PollOutcome::Dropped(reason))
            }
        }
    }

    fn apply_update(&mut self, index: usize, subdevice: Subdevice) {
        match self.model.replace_subdevice(index, subdevice) {
            Ok(()) => {
                info!("Subdevice {} updated", index);
                self.emit(ControlEvent::ModelUpdated { index });
            }
            Err(e) => warn!("Rejected subdevice update: {}", e),
        }
    }

    fn emit(&self, event: ControlEvent) {
        if let Some(events) = &self.events {
            // No subscribers is fine
            let _ = events.send(event);
        }
    }

    /// Run until shutdown, the command channel closing, or the control
    /// channel closing. Returns the final counters.
    pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<LoopCommand>) -> LoopStats {
        info!(
            "Control loop started, poll interval {} ms",
            self.poll_interval.as_millis()
        );

        loop {
            tokio::select! {
                result = self.channel.recv(self.poll_interval) => {
                    match result {
                        Ok(Some(request)) => {
                            if let Err(e) = self.handle_request(&request).await {
                                warn!("Failed to send CARI reply: {}", e);
                            }
                        }
                        Ok(None) => {}
                        Err(ChannelError::Closed) => {
                            info!("Control channel closed");
                            break;
                        }
                        Err(e) => {
                            warn!("Control channel receive error: {}", e);
                            tokio::time::sleep(self.poll_interval).await;
                        }
                    }
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(LoopCommand::SetFaults(faults)) => {
                            info!("Fault bitmask set to 0x{:08X}", faults.to_wire());
                            self.dispatcher.set_faults(faults);
                        }
                        Some(LoopCommand::UpdateSubdevice { index, subdevice }) => {
                            self.apply_update(index, subdevice);
                        }
                        Some(LoopCommand::Shutdown) => {
                            info!("Control loop shutdown requested");
                            break;
                        }
                        None => {
                            debug!("Control loop command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            "Control loop ended: {} requests, {} replies, {} dropped",
            self.stats.requests, self.stats.replies, self.stats.dropped
        );
        self.stats
    }
}
