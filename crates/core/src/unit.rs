//! Normalized media samples produced by format processors.

use std::time::SystemTime;

use bytes::Bytes;

use crate::media::RtpPacket;

/// One timestamped media sample.
///
/// `rtp_packets` serves transport-level readers (the original packet,
/// padding-stripped, or its re-encoded replacement). `access_unit` serves
/// everything else and is `None` while a fragmented access unit is still
/// being assembled, or when nothing needed decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub rtp_packets: Vec<RtpPacket>,
    /// Wall-clock reception time.
    pub ntp: SystemTime,
    /// Presentation timestamp in clock-rate units of the format.
    pub pts: i64,
    /// Codec units of one sample (NAL units for H.264).
    pub access_unit: Option<Vec<Bytes>>,
}

impl Unit {
    /// A unit carrying only RTP packets.
    pub fn from_rtp(packets: Vec<RtpPacket>, ntp: SystemTime, pts: i64) -> Self {
        Self {
            rtp_packets: packets,
            ntp,
            pts,
            access_unit: None,
        }
    }

    /// A unit carrying only an access unit, to be packetized by the processor.
    pub fn from_access_unit(au: Vec<Bytes>, ntp: SystemTime, pts: i64) -> Self {
        Self {
            rtp_packets: Vec::new(),
            ntp,
            pts,
            access_unit: Some(au),
        }
    }

    /// Total size of the access unit payload, zero when absent.
    pub fn access_unit_size(&self) -> usize {
        self.access_unit
            .as_ref()
            .map(|au| au.iter().map(Bytes::len).sum())
            .unwrap_or(0)
    }
}
