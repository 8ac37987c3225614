//! Media model and RTP codecs.
//!
//! This module holds everything that describes or carries media, independent
//! of the RTSP signaling layer:
//!
//! - [`rtp`]: RTP packet parsing and serialization (RFC 3550).
//! - [`h264`]: H.264 RTP depacketizer and packetizer (RFC 6184).
//! - [`format`]: negotiated per-payload-type formats.
//! - [`description`]: the session description announced by a publisher.
//!
//! ## RTP overview (RFC 3550)
//!
//! Every RTP packet carries a 12-byte fixed header containing:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit): media clock, typically 90 kHz for video.
//! - **SSRC** (32-bit): randomly chosen to identify the sender.
//! - **Marker bit**: set on the last packet of an access unit (frame).
//!
//! ## Supported codecs
//!
//! | Codec | Module | RFC | Processing |
//! |-------|--------|-----|------------|
//! | H.264 | [`h264`] | [RFC 6184](https://tools.ietf.org/html/rfc6184) | decode, remux, re-encode |
//! | other | | | pass-through |

pub mod description;
pub mod format;
pub mod h264;
pub mod rtp;

pub use description::{Media, MediaType, SessionDescription};
pub use format::{Format, GenericFormat, H264Format};
pub use rtp::RtpPacket;
