use std::time::SystemTime;

use super::Processor;
use crate::error::{CodecError, Result};
use crate::media::{Format, RtpPacket};
use crate::unit::Unit;

/// Pass-through processor for formats whose payload is never inspected.
#[derive(Debug)]
pub struct GenericProcessor {
    udp_max_payload_size: usize,
    format: Format,
}

impl GenericProcessor {
    pub fn new(udp_max_payload_size: usize, format: Format) -> Self {
        Self {
            udp_max_payload_size,
            format,
        }
    }

    fn check_packet(&self, pkt: &mut RtpPacket) -> Result<()> {
        pkt.strip_padding();

        let size = pkt.marshal_size();
        if size > self.udp_max_payload_size {
            return Err(CodecError::PayloadTooBig {
                size,
                max: self.udp_max_payload_size,
            }
            .into());
        }
        Ok(())
    }
}

impl Processor for GenericProcessor {
    fn process_unit(&mut self, unit: &mut Unit) -> Result<()> {
        if unit.rtp_packets.is_empty() {
            return Err(CodecError::NoRtpPackets.into());
        }
        for pkt in &mut unit.rtp_packets {
            self.check_packet(pkt)?;
        }
        Ok(())
    }

    fn process_rtp_packet(
        &mut self,
        mut pkt: RtpPacket,
        ntp: SystemTime,
        pts: i64,
        _has_non_rtsp_readers: bool,
    ) -> Result<Unit> {
        self.check_packet(&mut pkt)?;
        Ok(Unit::from_rtp(vec![pkt], ntp, pts))
    }

    fn format(&self) -> Format {
        self.format.clone()
    }
}
