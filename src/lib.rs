//! A simplified Go-Back-N ARQ protocol over UDP: a windowed sender transmits an
//!  ordered sequence of frames to a cumulative-acknowledgment receiver, recovering
//!  from loss by re-sending the entire unacknowledged window.
//!
//! ## Design
//!
//! * Two independent single-threaded processes, one session at a time, message
//!   passing only - no shared state
//!   * the sender drives the only active polling loop; its bounded wait for a
//!     reply doubles as the retransmission timer
//!   * the receiver blocks on its socket with no timeout and is inert between
//!     frames; it runs until it has processed a `Stop` frame
//! * The abstraction is sending / receiving *frames* - small typed control/data
//!   units, one per UDP datagram, no chunking or reassembly
//! * Acknowledgments are cumulative: `Ack(n)` confirms every frame up to and
//!   including sequence number `n`
//! * On a timeout or a sequencing fault the sender goes back to the oldest
//!   unacknowledged frame and re-sends the whole window from there
//!   * out-of-order data is discarded by the receiver, never buffered - the
//!     window re-send is the only recovery mechanism
//! * NB: an ack numbered *ahead* of the oldest pending frame is treated as a
//!   sequencing fault and forces a window re-send instead of advancing the
//!   window. This inverts the textbook cumulative-ack rule and is kept as-is
//!   because both ends of the observed protocol behave this way.
//! * The receiver's reply path can be decorated with a fault injector that
//!   corrupts or drops exactly one reply per session, to exercise the sender's
//!   recovery paths; the dispatch core is unaware of it
//!
//! ## Frames
//!
//! Four kinds, self-describing JSON on the wire, one frame per datagram:
//! ```ascii
//! { "type": 1, "sequence_number": 0 }                    START - opens a session
//! { "type": 2, "sequence_number": n, "data": "record" }  DATA  - one text record
//! { "type": 3, "sequence_number": n }                    STOP  - closes the session
//! { "type": 4, "sequence_number": n }                    ACK   - cumulative ack
//! ```
//!
//! A session is one `Start`, `Data(1..=N)`, `Stop(N+1)` exchange. The receiver
//!  resets all of its session state whenever a `Start` arrives and flushes the
//!  accepted records to its sink when the `Stop` arrives.

pub mod config;
pub mod fault;
pub mod frame;
pub mod receiver;
pub mod records;
pub mod sender;
