use anyhow::{anyhow, bail, Context};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Size of the receive buffer on both sides. Frames are small (a type tag, a
///  sequence number and one text record), so a few KB is plenty.
pub const RECV_BUFFER_LEN: usize = 4096;

/// The wire tag for a frame's kind. The concrete values are protocol-internal
///  but must be identical on both ends.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FrameKind {
    Start = 1,
    Data = 2,
    Stop = 3,
    Ack = 4,
}

/// The unit exchanged on the wire - one variant per kind, and only `Data`
///  carries a payload, so invalid field combinations cannot be represented.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Frame {
    /// opens a session, resetting all receiver state
    Start { seq: u64 },
    /// one opaque text record
    Data { seq: u64, payload: String },
    /// closes the session, flushing accepted records on the receiver
    Stop { seq: u64 },
    /// cumulative acknowledgment of all frames up to and including `seq`
    Ack { seq: u64 },
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Start { .. } => FrameKind::Start,
            Frame::Data { .. } => FrameKind::Data,
            Frame::Stop { .. } => FrameKind::Stop,
            Frame::Ack { .. } => FrameKind::Ack,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Frame::Start { seq }
            | Frame::Data { seq, .. }
            | Frame::Stop { seq }
            | Frame::Ack { seq } => *seq,
        }
    }

    pub fn ser(&self) -> Vec<u8> {
        let wire = WireFrame {
            kind: self.kind().into(),
            sequence_number: self.seq(),
            data: match self {
                Frame::Data { payload, .. } => Some(payload.clone()),
                _ => None,
            },
        };
        serde_json::to_vec(&wire)
            .expect("a wire frame has no unserializable fields")
    }

    pub fn deser(buf: &[u8]) -> anyhow::Result<Frame> {
        let wire: WireFrame = serde_json::from_slice(buf)
            .context("malformed frame")?;

        let kind = FrameKind::try_from(wire.kind)
            .map_err(|_| anyhow!("unknown frame type tag {}", wire.kind))?;

        match kind {
            FrameKind::Data => {
                let payload = wire.data
                    .ok_or_else(|| anyhow!("data frame without a payload"))?;
                Ok(Frame::Data { seq: wire.sequence_number, payload })
            }
            _ => {
                if wire.data.is_some() {
                    bail!("{:?} frame must not carry a payload", kind);
                }
                Ok(match kind {
                    FrameKind::Start => Frame::Start { seq: wire.sequence_number },
                    FrameKind::Stop => Frame::Stop { seq: wire.sequence_number },
                    FrameKind::Ack => Frame::Ack { seq: wire.sequence_number },
                    FrameKind::Data => unreachable!(),
                })
            }
        }
    }
}

/// The flat on-the-wire representation - the tagged [Frame] enum is the
///  API, this is what serde sees.
#[derive(Serialize, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: u8,
    sequence_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case::start(Frame::Start { seq: 0 })]
    #[case::data(Frame::Data { seq: 3, payload: "alice".to_string() })]
    #[case::data_empty_record(Frame::Data { seq: 1, payload: "".to_string() })]
    #[case::stop(Frame::Stop { seq: 17 })]
    #[case::ack(Frame::Ack { seq: 99_999 })]
    fn test_ser_deser(#[case] frame: Frame) {
        let buf = frame.ser();
        let deser = Frame::deser(&buf).unwrap();
        assert_eq!(deser, frame);
    }

    #[rstest]
    #[case::not_json(b"not json at all".as_slice())]
    #[case::empty(b"".as_slice())]
    #[case::wrong_shape(br#"{"type": "START", "sequence_number": 0}"#.as_slice())]
    #[case::missing_seq(br#"{"type": 1}"#.as_slice())]
    #[case::unknown_tag(br#"{"type": 9, "sequence_number": 0}"#.as_slice())]
    #[case::data_without_payload(br#"{"type": 2, "sequence_number": 1}"#.as_slice())]
    #[case::ack_with_payload(br#"{"type": 4, "sequence_number": 1, "data": "x"}"#.as_slice())]
    #[case::negative_seq(br#"{"type": 1, "sequence_number": -1}"#.as_slice())]
    fn test_deser_rejects(#[case] buf: &[u8]) {
        assert!(Frame::deser(buf).is_err());
    }

    #[rstest]
    fn test_payload_only_on_data() {
        let encoded = String::from_utf8(Frame::Ack { seq: 2 }.ser()).unwrap();
        assert!(!encoded.contains("data"));

        let encoded = String::from_utf8(Frame::Data { seq: 2, payload: "bob".to_string() }.ser()).unwrap();
        assert!(encoded.contains(r#""data":"bob""#));
    }
}
