use std::net::SocketAddr;
use std::time::Duration;
use anyhow::bail;

/// Configuration of the sending side of a session.
pub struct SenderConfig {
    /// The receiver's endpoint.
    pub peer_addr: SocketAddr,

    /// The maximum number of frames that may be outstanding (sent but not yet
    ///  acknowledged) at any time. This counts *every* unacknowledged frame,
    ///  the `Start` and `Stop` frames included.
    pub window_size: usize,

    /// How long the sender waits for a reply before treating the window as
    ///  lost. This bounded wait is the protocol's retransmission timer - there
    ///  is no per-frame timer.
    pub timeout_after: Duration,

    /// The number of *consecutive* timeouts after which the session is
    ///  abandoned. Any decoded reply resets the count.
    pub max_consecutive_timeouts: u32,
}

impl SenderConfig {
    pub fn new(peer_addr: SocketAddr) -> SenderConfig {
        SenderConfig {
            peer_addr,
            window_size: 5,
            timeout_after: Duration::from_secs(2),
            max_consecutive_timeouts: 3,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.window_size < 1 {
            bail!("window size must be at least 1");
        }
        if self.timeout_after.is_zero() {
            bail!("reply timeout must be non-zero");
        }
        if self.max_consecutive_timeouts < 1 {
            bail!("maximum consecutive timeouts must be at least 1");
        }
        Ok(())
    }
}

/// Configuration of the receiving side.
pub struct ReceiverConfig {
    /// The local endpoint to bind. Binding this is the first thing the
    ///  receiver does; failure is fatal and the receive loop is never entered.
    pub bind_addr: SocketAddr,

    /// Fault injection on the reply path. `None` means the reply path has no
    ///  decorator at all.
    pub faults: Option<FaultConfig>,
}

impl ReceiverConfig {
    pub fn new(bind_addr: SocketAddr) -> ReceiverConfig {
        ReceiverConfig {
            bind_addr,
            faults: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(faults) = &self.faults {
            if faults.corrupt_ack_trigger == faults.suppress_reply_trigger {
                bail!("fault triggers must be distinct ack values");
            }
        }
        Ok(())
    }
}

/// Deliberate, single-shot faults on the receiver's reply path. Both triggers
///  are keyed on the *value* of the outgoing ack's sequence number, fire at
///  most once per session, and re-arm when the next session starts.
#[derive(Clone, Debug)]
pub struct FaultConfig {
    /// The first reply whose ack equals this value has its sequence number
    ///  replaced with an out-of-range sentinel, exercising the sender's
    ///  sequencing-fault path.
    pub corrupt_ack_trigger: u64,

    /// The first reply whose ack equals this value is dropped entirely,
    ///  exercising the sender's timeout path.
    pub suppress_reply_trigger: u64,

    /// How long the receiver holds the session before dropping a suppressed
    ///  reply, so the sender's timer observably expires first.
    pub suppress_hold: Duration,
}

impl Default for FaultConfig {
    fn default() -> FaultConfig {
        FaultConfig {
            corrupt_ack_trigger: 2,
            suppress_reply_trigger: 8,
            suppress_hold: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn sender_config() -> SenderConfig {
        SenderConfig::new(SocketAddr::from(([127, 0, 0, 1], 10000)))
    }

    #[rstest]
    fn test_sender_defaults_are_valid() {
        assert!(sender_config().validate().is_ok());
    }

    #[rstest]
    #[case::zero_window(0, Duration::from_secs(2), 3)]
    #[case::zero_timeout(5, Duration::ZERO, 3)]
    #[case::zero_max_timeouts(5, Duration::from_secs(2), 0)]
    fn test_sender_validate_rejects(
        #[case] window_size: usize,
        #[case] timeout_after: Duration,
        #[case] max_consecutive_timeouts: u32,
    ) {
        let mut config = sender_config();
        config.window_size = window_size;
        config.timeout_after = timeout_after;
        config.max_consecutive_timeouts = max_consecutive_timeouts;
        assert!(config.validate().is_err());
    }

    #[rstest]
    fn test_receiver_validate_rejects_colliding_triggers() {
        let mut config = ReceiverConfig::new(SocketAddr::from(([127, 0, 0, 1], 10000)));
        assert!(config.validate().is_ok());

        config.faults = Some(FaultConfig::default());
        assert!(config.validate().is_ok());

        config.faults = Some(FaultConfig {
            corrupt_ack_trigger: 4,
            suppress_reply_trigger: 4,
            ..FaultConfig::default()
        });
        assert!(config.validate().is_err());
    }
}
