use tokio::net::UdpSocket;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};
use anyhow::Context;

use crate::config::ReceiverConfig;
use crate::fault::{FaultInjector, ReplyAction, ReplyInterceptor};
use crate::frame::{Frame, RECV_BUFFER_LEN};
use crate::records::RecordSink;

/// What dispatching one inbound frame did to the session, beyond the reply.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// the session continues unchanged
    Continue,
    /// a `Start` frame reset the session
    SessionStarted,
    /// a `Stop` frame ended the session; the accepted records are ready to
    ///  be flushed
    SessionEnded,
}

/// All receive-side session state, owned by the receive loop. Dispatch is
///  pure frame-in / reply-out - flushing and fault injection happen in the
///  loop around it.
pub struct ReceiverSession {
    /// the sequence number the session will accept next; 0 only outside a
    ///  session, 1 right after `Start`
    next_expected: u64,
    /// payloads accepted in order, append-only within a session
    accepted: Vec<String>,
}

impl ReceiverSession {
    pub fn new() -> ReceiverSession {
        ReceiverSession {
            next_expected: 0,
            accepted: Vec::new(),
        }
    }

    pub fn next_expected(&self) -> u64 {
        self.next_expected
    }

    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    pub fn take_accepted(&mut self) -> Vec<String> {
        std::mem::take(&mut self.accepted)
    }

    /// Dispatches one inbound frame, returning at most one reply.
    pub fn handle_frame(&mut self, frame: Frame) -> (Option<Frame>, SessionEvent) {
        match frame {
            Frame::Start { .. } => {
                debug!("session start - resetting receiver state");
                self.accepted.clear();
                self.next_expected = 1;
                (Some(Frame::Ack { seq: 0 }), SessionEvent::SessionStarted)
            }
            Frame::Data { seq, payload } => {
                if seq == self.next_expected {
                    trace!("accepting data frame {}", seq);
                    self.accepted.push(payload);
                    self.next_expected += 1;
                }
                else {
                    debug!("discarding data frame: expected {}, got {}", self.next_expected, seq);
                }

                // the cumulative ack - the highest contiguous sequence accepted
                //  so far, whether or not this frame was one of them
                (Some(Frame::Ack { seq: self.next_expected.saturating_sub(1) }), SessionEvent::Continue)
            }
            Frame::Stop { seq } => {
                info!("session stop at frame {} with {} accepted records", seq, self.accepted.len());
                (Some(Frame::Ack { seq }), SessionEvent::SessionEnded)
            }
            Frame::Ack { seq } => {
                warn!("received an ack frame ({}) on the receiving side - ignoring", seq);
                (None, SessionEvent::Continue)
            }
        }
    }
}

/// The passive side of the protocol: binds the configured endpoint and
///  processes one inbound frame at a time until a `Stop` ends the session.
pub struct Receiver {
    socket: UdpSocket,
    sink: Box<dyn RecordSink>,
    interceptor: Option<Box<dyn ReplyInterceptor>>,
}

impl Receiver {
    /// Binding is the first thing the receiver does; on failure the receive
    ///  loop is never entered. The socket is released when the `Receiver` is
    ///  dropped.
    pub async fn bind(config: ReceiverConfig, sink: Box<dyn RecordSink>) -> anyhow::Result<Receiver> {
        config.validate()?;

        let socket = UdpSocket::bind(config.bind_addr).await
            .with_context(|| format!("binding receive socket to {}", config.bind_addr))?;
        info!("listening on {}", socket.local_addr()?);

        let interceptor = config.faults
            .map(|faults| Box::new(FaultInjector::new(faults)) as Box<dyn ReplyInterceptor>);

        Ok(Receiver { socket, sink, interceptor })
    }

    pub fn local_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocks for inbound frames, replying to the address each one came from,
    ///  until a `Stop` frame has been processed for the current session.
    pub async fn run_session(&mut self) -> anyhow::Result<()> {
        let mut session = ReceiverSession::new();
        let mut buf = [0u8; RECV_BUFFER_LEN];

        loop {
            let (num_read, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!("socket error: {}", e);
                    continue;
                }
            };
            trace!("received {} bytes from {}", num_read, from);

            let frame = match Frame::deser(&buf[..num_read]) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("discarding undecodable frame from {} (expecting {}): {:#}",
                        from, session.next_expected(), e);
                    continue;
                }
            };

            let (reply, event) = session.handle_frame(frame);

            match event {
                SessionEvent::SessionStarted => {
                    if let Some(interceptor) = &mut self.interceptor {
                        interceptor.on_session_start();
                    }
                }
                SessionEvent::SessionEnded => {
                    self.sink.write_records(&session.take_accepted())?;
                }
                SessionEvent::Continue => {}
            }

            if let Some(reply) = reply {
                let action = match &mut self.interceptor {
                    Some(interceptor) => interceptor.intercept(reply),
                    None => ReplyAction::Send(reply),
                };

                match action {
                    ReplyAction::Send(reply) => {
                        trace!("replying {:?} to {}", reply, from);
                        self.socket.send_to(&reply.ser(), from).await
                            .context("sending reply")?;
                    }
                    ReplyAction::Suppress { hold } => {
                        sleep(hold).await;
                    }
                }
            }

            if event == SessionEvent::SessionEnded {
                info!("session ended");
                return Ok(());
            }
        }
    }
}
