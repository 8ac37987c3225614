//! Network transport layer for RTSP signaling and RTP media reception.
//!
//! RTSP uses a split transport model:
//!
//! - **TCP** ([`tcp`]): carries RTSP request/response signaling. One task
//!   per connection. RTP set up as interleaved (RFC 2326 §10.12) shares the
//!   connection using `$` framing.
//!
//! - **UDP** ([`udp`]): carries RTP media packets. A single socket receives
//!   the packets of every publisher that set up UDP.

pub mod tcp;
pub mod udp;

pub use udp::UdpTransport;
