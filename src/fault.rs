use std::time::Duration;
use tracing::{debug, info};
use crate::config::FaultConfig;
use crate::frame::Frame;

/// The sequence number a corrupted ack is rewritten to. Far outside any real
///  session, so the sender always classifies it as a sequencing fault.
pub const CORRUPT_SEQ_SENTINEL: u64 = 99_999;

/// What to do with a reply that is about to go out.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReplyAction {
    /// hand the (possibly rewritten) reply to the socket
    Send(Frame),
    /// drop the reply without sending, holding the session for `hold` first
    Suppress { hold: Duration },
}

/// Decorator around the receiver's reply-send step. The dispatch core never
///  sees this - a receiver built without a fault config has no interceptor
///  at all.
pub trait ReplyInterceptor: Send {
    fn intercept(&mut self, reply: Frame) -> ReplyAction;

    /// called when a `Start` frame opens a new session
    fn on_session_start(&mut self);
}

/// Fault injector with the two single-shot triggers, both keyed on the value
///  of the outgoing ack's sequence number.
pub struct FaultInjector {
    config: FaultConfig,
    corrupt_armed: bool,
    suppress_armed: bool,
}

impl FaultInjector {
    pub fn new(config: FaultConfig) -> FaultInjector {
        FaultInjector {
            config,
            corrupt_armed: true,
            suppress_armed: true,
        }
    }
}

impl ReplyInterceptor for FaultInjector {
    fn intercept(&mut self, reply: Frame) -> ReplyAction {
        match reply {
            Frame::Ack { seq } if self.corrupt_armed && seq == self.config.corrupt_ack_trigger => {
                self.corrupt_armed = false;
                info!("injecting ack corruption: rewriting ack {} to {}", seq, CORRUPT_SEQ_SENTINEL);
                ReplyAction::Send(Frame::Ack { seq: CORRUPT_SEQ_SENTINEL })
            }
            Frame::Ack { seq } if self.suppress_armed && seq == self.config.suppress_reply_trigger => {
                self.suppress_armed = false;
                info!("injecting timeout: suppressing the reply for ack {}", seq);
                ReplyAction::Suppress { hold: self.config.suppress_hold }
            }
            other => ReplyAction::Send(other),
        }
    }

    fn on_session_start(&mut self) {
        debug!("new session - re-arming fault triggers");
        self.corrupt_armed = true;
        self.suppress_armed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn injector() -> FaultInjector {
        FaultInjector::new(FaultConfig {
            corrupt_ack_trigger: 2,
            suppress_reply_trigger: 8,
            suppress_hold: Duration::from_millis(5),
        })
    }

    #[rstest]
    fn test_corrupt_trigger_fires_once() {
        let mut injector = injector();

        assert_eq!(injector.intercept(Frame::Ack { seq: 0 }), ReplyAction::Send(Frame::Ack { seq: 0 }));
        assert_eq!(
            injector.intercept(Frame::Ack { seq: 2 }),
            ReplyAction::Send(Frame::Ack { seq: CORRUPT_SEQ_SENTINEL }),
        );
        // consumed - the same ack value now passes through untouched
        assert_eq!(injector.intercept(Frame::Ack { seq: 2 }), ReplyAction::Send(Frame::Ack { seq: 2 }));
    }

    #[rstest]
    fn test_suppress_trigger_fires_once() {
        let mut injector = injector();

        assert_eq!(
            injector.intercept(Frame::Ack { seq: 8 }),
            ReplyAction::Suppress { hold: Duration::from_millis(5) },
        );
        assert_eq!(injector.intercept(Frame::Ack { seq: 8 }), ReplyAction::Send(Frame::Ack { seq: 8 }));
    }

    #[rstest]
    fn test_triggers_are_independent() {
        let mut injector = injector();

        assert!(matches!(injector.intercept(Frame::Ack { seq: 8 }), ReplyAction::Suppress { .. }));
        // the corrupt trigger is still armed after the suppress trigger fired
        assert_eq!(
            injector.intercept(Frame::Ack { seq: 2 }),
            ReplyAction::Send(Frame::Ack { seq: CORRUPT_SEQ_SENTINEL }),
        );
    }

    #[rstest]
    fn test_session_start_re_arms() {
        let mut injector = injector();

        injector.intercept(Frame::Ack { seq: 2 });
        injector.intercept(Frame::Ack { seq: 8 });
        injector.on_session_start();

        assert_eq!(
            injector.intercept(Frame::Ack { seq: 2 }),
            ReplyAction::Send(Frame::Ack { seq: CORRUPT_SEQ_SENTINEL }),
        );
        assert!(matches!(injector.intercept(Frame::Ack { seq: 8 }), ReplyAction::Suppress { .. }));
    }

    #[rstest]
    fn test_keyed_on_value_not_frame_count() {
        let mut injector = injector();

        // any number of non-matching replies leaves both triggers armed
        for seq in [0, 1, 3, 4, 5, 6, 7, 9, 10] {
            assert_eq!(injector.intercept(Frame::Ack { seq }), ReplyAction::Send(Frame::Ack { seq }));
        }
        assert_eq!(
            injector.intercept(Frame::Ack { seq: 2 }),
            ReplyAction::Send(Frame::Ack { seq: CORRUPT_SEQ_SENTINEL }),
        );
    }
}
