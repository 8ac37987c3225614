//! Codec-dependent processing applied to every packet entering a stream.
//!
//! A [`Processor`] owns everything a single track needs to normalize its
//! media: the negotiated [`Format`] (whose parameter sets it keeps current),
//! and whatever depacketizer/packetizer state the codec requires.
//!
//! ## Implementing a new codec
//!
//! 1. Create a new module (e.g. `formatprocessor/opus.rs`)
//! 2. Implement `Processor` for your type
//! 3. Add a match arm in [`new`]

pub mod generic;
pub mod h264;

use std::time::SystemTime;

use crate::error::Result;
use crate::media::{Format, RtpPacket};
use crate::unit::Unit;

/// Codec-dependent part of the processing that happens inside a
/// [`Stream`](crate::stream::Stream).
pub trait Processor: Send {
    /// Process a unit produced by a non-RTP publisher, filling its RTP
    /// packets.
    fn process_unit(&mut self, unit: &mut Unit) -> Result<()>;

    /// Process an RTP packet and convert it into a unit.
    ///
    /// `has_non_rtsp_readers` tells whether anyone needs the decoded access
    /// unit; when false and no re-encoding is active, decoding is skipped.
    fn process_rtp_packet(
        &mut self,
        pkt: RtpPacket,
        ntp: SystemTime,
        pts: i64,
        has_non_rtsp_readers: bool,
    ) -> Result<Unit>;

    /// Format as currently negotiated, including refreshed parameters.
    fn format(&self) -> Format;
}

/// Allocate the processor matching `format`.
///
/// `generate_rtp_packets` is set when the publisher produces access units
/// rather than RTP packets, so the processor must originate packets itself.
pub fn new(
    udp_max_payload_size: usize,
    format: Format,
    generate_rtp_packets: bool,
) -> Result<Box<dyn Processor>> {
    let processor: Box<dyn Processor> = match format {
        Format::H264(forma) => Box::new(h264::H264Processor::new(
            udp_max_payload_size,
            forma,
            generate_rtp_packets,
        )?),
        other => Box::new(generic::GenericProcessor::new(
            udp_max_payload_size,
            other,
        )),
    };
    Ok(processor)
}
