//! Device channels
//!
//! The CARI control channel is message-oriented: one received message is one
//! candidate frame, and each reply goes back to the peer that sent the request
//! it answers. [`ControlChannel`] captures exactly that, so the control loop
//! does not care whether messages travel over UDP or an in-memory queue.
//!
//! The device also exposes three data channels (downlink, uplink,
//! supervision). They are bound and their status tracked, but they carry no
//! CARI commands.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use cari_protocol::frame::MAX_FRAME_LEN;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::config::ChannelConfig;

/// Receive buffer size on the control channel
///
/// One byte more than the largest frame the length field can describe, so a
/// longer datagram arrives with a length that no header can declare and is
/// dropped instead of being cut to a valid-looking frame.
pub const MAX_MESSAGE_LEN: usize = MAX_FRAME_LEN + 1;

/// Channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Socket could not be bound
    #[error("failed to bind {channel} channel on {addr}: {source}")]
    Bind {
        channel: ChannelKind,
        addr: String,
        #[source]
        source: io::Error,
    },

    /// I/O error on a bound channel
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Reply with no request to answer
    #[error("no peer to reply to")]
    NoPeer,

    /// The other end went away
    #[error("channel closed")]
    Closed,
}

/// The four channels a device exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Request/reply CARI control channel
    Control,
    /// Publish-only data towards the client
    Downlink,
    /// Subscribe-only data from the client
    Uplink,
    /// Publish-only supervision data
    Supervision,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 4] = [
        Self::Control,
        Self::Downlink,
        Self::Uplink,
        Self::Supervision,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Downlink => "downlink",
            Self::Uplink => "uplink",
            Self::Supervision => "supervision",
        }
    }

    fn port(&self, config: &ChannelConfig) -> u16 {
        match self {
            Self::Control => config.control_port,
            Self::Downlink => config.downlink_port,
            Self::Uplink => config.uplink_port,
            Self::Supervision => config.supervision_port,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bind outcome of one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    /// Bound and usable
    Bound { local_addr: SocketAddr },
    /// Bind failed; the channel is left idle
    Failed { reason: String },
}

impl ChannelStatus {
    pub fn is_bound(&self) -> bool {
        matches!(self, Self::Bound { .. })
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bound { local_addr } => write!(f, "OK ({})", local_addr),
            Self::Failed { reason } => write!(f, "IDLE ({})", reason),
        }
    }
}

/// Message-oriented request/reply channel
#[allow(async_fn_in_trait)]
pub trait ControlChannel {
    /// Wait up to `timeout` for the next request
    ///
    /// Returns `Ok(None)` when the timeout expires with nothing received.
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ChannelError>;

    /// Send a reply to the peer of the most recent request
    async fn send(&mut self, reply: &[u8]) -> Result<(), ChannelError>;
}

/// Control channel over UDP datagrams
///
/// Each datagram is one message. Replies go to the source address of the
/// last received datagram.
#[derive(Debug)]
pub struct UdpControlChannel {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer: Option<SocketAddr>,
    buf: Vec<u8>,
}

impl UdpControlChannel {
    /// Bind to a local address such as `"0.0.0.0:17001"`
    pub async fn bind(addr: &str) -> Result<Self, ChannelError> {
        let socket = bind_socket(ChannelKind::Control, addr).await?;
        Self::from_socket(socket)
    }

    /// Wrap an already bound socket
    pub fn from_socket(socket: UdpSocket) -> Result<Self, ChannelError> {
        let local_addr = socket.local_addr()?;
        Ok(Self::with_addr(socket, local_addr))
    }

    fn with_addr(socket: UdpSocket, local_addr: SocketAddr) -> Self {
        Self {
            socket,
            local_addr,
            peer: None,
            buf: vec![0u8; MAX_MESSAGE_LEN],
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Source address of the last request
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl ControlChannel for UdpControlChannel {
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ChannelError> {
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut self.buf)).await {
            Ok(Ok((n, src))) => {
                trace!(local = %self.local_addr, remote = %src, bytes = n, "Received datagram");
                self.peer = Some(src);
                Ok(Some(self.buf[..n].to_vec()))
            }
            Ok(Err(e)) => Err(ChannelError::Io(e)),
            Err(_) => Ok(None),
        }
    }

    async fn send(&mut self, reply: &[u8]) -> Result<(), ChannelError> {
        let peer = self.peer.ok_or(ChannelError::NoPeer)?;
        self.socket.send_to(reply, peer).await?;
        trace!(local = %self.local_addr, remote = %peer, bytes = reply.len(), "Sent datagram");
        Ok(())
    }
}

/// In-memory control channel, device side
///
/// Created with [`memory_channel`]; the matching [`MemoryClient`] plays the
/// part of the controlling application.
#[derive(Debug)]
pub struct MemoryControlChannel {
    requests: mpsc::Receiver<Vec<u8>>,
    replies: mpsc::Sender<Vec<u8>>,
}

/// In-memory control channel, client side
#[derive(Debug)]
pub struct MemoryClient {
    requests: mpsc::Sender<Vec<u8>>,
    replies: mpsc::Receiver<Vec<u8>>,
}

/// Create a connected in-memory channel pair
pub fn memory_channel(buffer: usize) -> (MemoryControlChannel, MemoryClient) {
    let (req_tx, req_rx) = mpsc::channel(buffer);
    let (rep_tx, rep_rx) = mpsc::channel(buffer);
    (
        MemoryControlChannel {
            requests: req_rx,
            replies: rep_tx,
        },
        MemoryClient {
            requests: req_tx,
            replies: rep_rx,
        },
    )
}

impl ControlChannel for MemoryControlChannel {
    async fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ChannelError> {
        match tokio::time::timeout(timeout, self.requests.recv()).await {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => Err(ChannelError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn send(&mut self, reply: &[u8]) -> Result<(), ChannelError> {
        self.replies
            .send(reply.to_vec())
            .await
            .map_err(|_| ChannelError::Closed)
    }
}

impl MemoryClient {
    /// Send one request message
    pub async fn send(&self, request: &[u8]) -> Result<(), ChannelError> {
        self.requests
            .send(request.to_vec())
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Wait up to `timeout` for a reply
    pub async fn recv(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        tokio::time::timeout(timeout, self.replies.recv())
            .await
            .ok()
            .flatten()
    }
}

/// All device channels after binding
///
/// A channel that failed to bind is kept as a `Failed` status so the rest of
/// the device can carry on.
#[derive(Debug)]
pub struct DeviceChannels {
    control: Option<UdpControlChannel>,
    data: Vec<(ChannelKind, UdpSocket)>,
    statuses: Vec<(ChannelKind, ChannelStatus)>,
}

impl DeviceChannels {
    /// Bind every channel, recording failures instead of aborting
    pub async fn bind(config: &ChannelConfig) -> Self {
        let mut control = None;
        let mut data = Vec::new();
        let mut statuses = Vec::new();

        for kind in ChannelKind::ALL {
            let addr = format!("{}:{}", config.bind_host, kind.port(config));
            let bound = bind_socket(kind, &addr).await.and_then(|socket| {
                let local_addr = socket.local_addr()?;
                Ok((socket, local_addr))
            });

            match bound {
                Ok((socket, local_addr)) => {
                    info!("{} channel bound on {}", kind, local_addr);
                    statuses.push((kind, ChannelStatus::Bound { local_addr }));
                    if kind == ChannelKind::Control {
                        control = Some(UdpControlChannel::with_addr(socket, local_addr));
                    } else {
                        data.push((kind, socket));
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    statuses.push((
                        kind,
                        ChannelStatus::Failed {
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }

        Self {
            control,
            data,
            statuses,
        }
    }

    /// Status of one channel
    pub fn status(&self, kind: ChannelKind) -> Option<&ChannelStatus> {
        self.statuses
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, status)| status)
    }

    /// Statuses of all channels in bind order
    pub fn statuses(&self) -> &[(ChannelKind, ChannelStatus)] {
        &self.statuses
    }

    /// Local address of a bound data channel
    pub fn data_addr(&self, kind: ChannelKind) -> Option<SocketAddr> {
        self.data
            .iter()
            .find(|(k, _)| *k == kind)
            .and_then(|(_, socket)| socket.local_addr().ok())
    }

    /// Hand out the control channel, if it bound
    pub fn take_control(&mut self) -> Option<UdpControlChannel> {
        self.control.take()
    }
}

async fn bind_socket(kind: ChannelKind, addr: &str) -> Result<UdpSocket, ChannelError> {
    debug!(channel = %kind, addr = %addr, "Binding UDP socket");
    UdpSocket::bind(addr)
        .await
        .map_err(|source| ChannelError::Bind {
            channel: kind,
            addr: addr.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ephemeral_config() -> ChannelConfig {
        ChannelConfig {
            bind_host: "127.0.0.1".to_string(),
            control_port: 0,
            downlink_port: 0,
            uplink_port: 0,
            supervision_port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_memory_channel_roundtrip() {
        let (mut device, mut client) = memory_channel(4);

        client.send(&[0x80, 0x03, 0x00]).await.unwrap();
        let request = device.recv(Duration::from_millis(100)).await.unwrap();
        assert_eq!(request, Some(vec![0x80, 0x03, 0x00]));

        device.send(&[0x80, 0x04, 0x00, b'x']).await.unwrap();
        let reply = client.recv(Duration::from_millis(100)).await;
        assert_eq!(reply, Some(vec![0x80, 0x04, 0x00, b'x']));
    }

    #[tokio::test]
    async fn test_memory_channel_timeout() {
        let (mut device, _client) = memory_channel(4);
        let request = device.recv(Duration::from_millis(10)).await.unwrap();
        assert_eq!(request, None);
    }

    #[tokio::test]
    async fn test_memory_channel_closed() {
        let (mut device, client) = memory_channel(4);
        drop(client);
        assert!(matches!(
            device.recv(Duration::from_millis(10)).await,
            Err(ChannelError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_udp_reply_goes_to_requester() {
        let mut device = UdpControlChannel::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client
            .send_to(&[0x00, 0x03, 0x00], device.local_addr())
            .await
            .unwrap();
        let request = device.recv(Duration::from_secs(1)).await.unwrap();
        assert_eq!(request, Some(vec![0x00, 0x03, 0x00]));
        assert_eq!(device.peer(), Some(client.local_addr().unwrap()));

        device.send(&[0x00, 0x07, 0x00, 0, 0, 0, 0]).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x00, 0x07, 0x00, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_udp_large_frame_arrives_whole() {
        let mut device = UdpControlChannel::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let request = cari_protocol::frame::encode(0x01, &[0xAB; 1097]).unwrap();
        assert_eq!(request.len(), 1100);
        client.send_to(&request, device.local_addr()).await.unwrap();

        let received = device.recv(Duration::from_secs(1)).await.unwrap();
        assert_eq!(received, Some(request));
    }

    #[tokio::test]
    async fn test_udp_oversize_datagram_not_cut_down() {
        let mut device = UdpControlChannel::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        // Header declares 1024 bytes, datagram carries 1500
        let mut datagram = vec![0x80, 0x00, 0x04];
        datagram.resize(1500, 0x55);
        client.send_to(&datagram, device.local_addr()).await.unwrap();

        let received = device.recv(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(received.len(), 1500);
    }

    #[tokio::test]
    async fn test_udp_send_without_request() {
        let mut device = UdpControlChannel::bind("127.0.0.1:0").await.unwrap();
        assert!(matches!(
            device.send(&[0x00]).await,
            Err(ChannelError::NoPeer)
        ));
    }

    #[tokio::test]
    async fn test_bind_all_channels() {
        let mut channels = DeviceChannels::bind(&ephemeral_config()).await;

        for kind in ChannelKind::ALL {
            assert!(channels.status(kind).unwrap().is_bound(), "{}", kind);
        }
        assert!(channels.data_addr(ChannelKind::Downlink).is_some());
        assert!(channels.data_addr(ChannelKind::Control).is_none());
        assert!(channels.take_control().is_some());
        assert!(channels.take_control().is_none());
    }

    #[tokio::test]
    async fn test_failed_bind_marks_only_that_channel() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ChannelConfig {
            supervision_port: taken.local_addr().unwrap().port(),
            ..ephemeral_config()
        };

        let mut channels = DeviceChannels::bind(&config).await;

        assert!(matches!(
            channels.status(ChannelKind::Supervision),
            Some(ChannelStatus::Failed { .. })
        ));
        assert!(channels.status(ChannelKind::Control).unwrap().is_bound());
        assert!(channels.status(ChannelKind::Downlink).unwrap().is_bound());
        assert!(channels.take_control().is_some());
    }

    #[tokio::test]
    async fn test_failed_control_bind_leaves_no_control_channel() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ChannelConfig {
            control_port: taken.local_addr().unwrap().port(),
            ..ephemeral_config()
        };

        let mut channels = DeviceChannels::bind(&config).await;

        assert!(!channels.status(ChannelKind::Control).unwrap().is_bound());
        assert!(channels.take_control().is_none());
        assert!(channels.status(ChannelKind::Uplink).unwrap().is_bound());
    }
}
