use std::net::SocketAddr;
use anyhow::Context;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::config::SenderConfig;
use crate::frame::{Frame, RECV_BUFFER_LEN};

/// Builds the complete outbound sequence for one session: `Start(0)`, one
///  `Data` frame per record numbered from 1, and `Stop(N+1)`. The sequence is
///  immutable once built - retransmission re-sends these exact frames.
pub fn build_outbound(records: Vec<String>) -> Vec<Frame> {
    let mut outbound = Vec::with_capacity(records.len() + 2);

    outbound.push(Frame::Start { seq: 0 });
    for (i, record) in records.into_iter().enumerate() {
        outbound.push(Frame::Data { seq: (i + 1) as u64, payload: record });
    }
    outbound.push(Frame::Stop { seq: outbound.len() as u64 });

    outbound
}

/// The explicit result of one bounded wait for a reply.
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    Reply(Frame),
    TimedOut,
}

/// What handling an ack decided.
#[derive(Debug, PartialEq, Eq)]
pub enum AckOutcome {
    /// the window edge moved (or was re-confirmed by a stale ack)
    Advanced,
    /// the ack was numbered ahead of the oldest pending frame - the window
    ///  will be re-sent from there
    SequencingFault,
}

/// What handling a timeout decided.
#[derive(Debug, PartialEq, Eq)]
pub enum TimeoutOutcome {
    /// the window will be re-sent on the next send phase
    Retransmit,
    /// too many consecutive timeouts - the session is abandoned
    Abort,
}

/// All send-side session state, owned by the transmit loop.
///
/// Invariant: `pending_ack <= next_to_send <= outbound.len()`, and the number
///  of frames in flight (`next_to_send - pending_ack`) never exceeds the
///  window size.
pub struct SendWindow {
    outbound: Vec<Frame>,
    window_size: usize,
    /// index of the next frame to transmit; reset to `pending_ack` whenever
    ///  the window has to be re-sent
    next_to_send: usize,
    /// index of the oldest frame not yet acknowledged; the session is
    ///  complete once this reaches `outbound.len()`
    pending_ack: usize,
    consecutive_timeouts: u32,
    max_consecutive_timeouts: u32,
}

impl SendWindow {
    pub fn new(outbound: Vec<Frame>, window_size: usize, max_consecutive_timeouts: u32) -> SendWindow {
        SendWindow {
            outbound,
            window_size,
            next_to_send: 0,
            pending_ack: 0,
            consecutive_timeouts: 0,
            max_consecutive_timeouts,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending_ack >= self.outbound.len()
    }

    pub fn pending_ack(&self) -> usize {
        self.pending_ack
    }

    pub fn in_flight(&self) -> usize {
        self.next_to_send.saturating_sub(self.pending_ack)
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    /// The next frame eligible for transmission, if the window has room.
    ///  Calling this repeatedly until `None` is one send phase; after a window
    ///  reset it yields the whole unacknowledged window again, not just new
    ///  frames.
    pub fn next_eligible(&mut self) -> Option<&Frame> {
        if self.next_to_send < self.outbound.len() && self.in_flight() < self.window_size {
            let frame = &self.outbound[self.next_to_send];
            self.next_to_send += 1;
            Some(frame)
        }
        else {
            None
        }
    }

    /// Handles one `Ack(seq)` reply.
    ///
    /// NB: an ack numbered *ahead* of the oldest pending frame is treated as a
    ///  sequencing fault and forces a window re-send - it is never trusted to
    ///  advance the window. This inverts the textbook cumulative-ack rule;
    ///  the peer behaves the same way, so keep both ends aligned before
    ///  changing it. Symmetrically, an ack at or below the pending frame
    ///  always sets `pending_ack = seq + 1`, even when that moves the window
    ///  edge backward.
    pub fn on_ack(&mut self, seq: u64) -> AckOutcome {
        // any decoded reply counts as liveness, in-order or not
        self.consecutive_timeouts = 0;

        if seq > self.pending_ack as u64 {
            debug!("ack {} is ahead of pending frame {} - re-sending the window", seq, self.pending_ack);
            self.next_to_send = self.pending_ack;
            AckOutcome::SequencingFault
        }
        else {
            trace!("ack {} received, pending frame {} -> {}", seq, self.pending_ack, seq + 1);
            self.pending_ack = seq as usize + 1;
            AckOutcome::Advanced
        }
    }

    /// Handles an expired reply timer.
    pub fn on_timeout(&mut self) -> TimeoutOutcome {
        self.consecutive_timeouts += 1;

        if self.consecutive_timeouts >= self.max_consecutive_timeouts {
            TimeoutOutcome::Abort
        }
        else {
            debug!("timeout {}/{} - re-sending the window from frame {}",
                self.consecutive_timeouts, self.max_consecutive_timeouts, self.pending_ack);
            self.next_to_send = self.pending_ack;
            TimeoutOutcome::Retransmit
        }
    }
}

/// How a sender session ended.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// every frame through `Stop` was acknowledged
    Completed,
    /// abandoned after the configured number of consecutive timeouts
    AbortedMaxTimeouts,
}

/// The active side of the protocol: owns the socket and drives the
///  send / wait / update loop for one session.
pub struct Sender {
    socket: UdpSocket,
    config: SenderConfig,
}

impl Sender {
    /// Binds an ephemeral local port in the peer's address family. The socket
    ///  is released when the `Sender` is dropped, whichever way the session
    ///  ends.
    pub async fn bind(config: SenderConfig) -> anyhow::Result<Sender> {
        config.validate()?;

        let local_addr = if config.peer_addr.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };
        let socket = UdpSocket::bind(local_addr).await
            .context("binding send socket")?;
        info!("bound send socket to {}", socket.local_addr()?);

        Ok(Sender { socket, config })
    }

    /// Runs one session to completion or abort.
    pub async fn run_session(&self, window: &mut SendWindow) -> anyhow::Result<SessionOutcome> {
        loop {
            if window.is_complete() {
                info!("all frames acknowledged - session complete");
                return Ok(SessionOutcome::Completed);
            }

            while let Some(frame) = window.next_eligible() {
                trace!("sending {:?}", frame);
                self.socket.send_to(&frame.ser(), self.config.peer_addr).await
                    .context("sending frame")?;
            }

            match self.wait_for_reply().await {
                PollOutcome::Reply(Frame::Ack { seq }) => {
                    window.on_ack(seq);
                }
                PollOutcome::Reply(other) => {
                    warn!("expected an ack, got {:?} - ignoring", other);
                }
                PollOutcome::TimedOut => {
                    if window.on_timeout() == TimeoutOutcome::Abort {
                        warn!("{} consecutive timeouts with frame {} still pending - abandoning the session",
                            window.consecutive_timeouts(), window.pending_ack());
                        return Ok(SessionOutcome::AbortedMaxTimeouts);
                    }
                }
            }
        }
    }

    /// One bounded wait for a decodable reply. The deadline covers the whole
    ///  wait, so undecodable datagrams cannot extend it.
    async fn wait_for_reply(&self) -> PollOutcome {
        let deadline = Instant::now() + self.config.timeout_after;
        let mut buf = [0u8; RECV_BUFFER_LEN];

        loop {
            let (num_read, from) = match timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                Err(_) => return PollOutcome::TimedOut,
                Ok(Err(e)) => {
                    error!("socket error while waiting for a reply: {}", e);
                    continue;
                }
                Ok(Ok(received)) => received,
            };

            trace!("received {} bytes from {}", num_read, from);
            match Frame::deser(&buf[..num_read]) {
                Ok(frame) => return PollOutcome::Reply(frame),
                Err(e) => warn!("discarding undecodable reply from {}: {:#}", from, e),
            }
        }
    }
}
