use std::time::SystemTime;

use bytes::Bytes;
use rand::RngExt;

use super::Processor;
use crate::error::{Error, Result};
use crate::media::h264::{self, Decoder, Encoder, nalu_type};
use crate::media::rtp::FIXED_HEADER_SIZE;
use crate::media::{Format, H264Format, RtpPacket};
use crate::unit::Unit;

/// H.264 track processor.
///
/// Keeps SPS/PPS current from in-band parameter sets, decodes packets into
/// access units when someone needs them, and re-packetizes the stream when
/// the publisher's packets exceed the configured UDP payload size.
#[derive(Debug)]
pub struct H264Processor {
    udp_max_payload_size: usize,
    format: H264Format,
    encoder: Option<Encoder>,
    decoder: Option<Decoder>,
    random_start: u32,
}

impl H264Processor {
    pub fn new(
        udp_max_payload_size: usize,
        format: H264Format,
        generate_rtp_packets: bool,
    ) -> Result<Self> {
        if udp_max_payload_size <= FIXED_HEADER_SIZE + 2 {
            return Err(Error::Config(format!(
                "UDP max payload size {udp_max_payload_size} leaves no room for H.264 payloads"
            )));
        }

        let mut processor = Self {
            udp_max_payload_size,
            format,
            encoder: None,
            decoder: None,
            random_start: 0,
        };

        if generate_rtp_packets {
            processor.create_encoder(None, None)?;
            processor.random_start = rand::rng().random();
        }

        Ok(processor)
    }

    fn create_encoder(&mut self, ssrc: Option<u32>, initial_sequence: Option<u16>) -> Result<()> {
        self.encoder = Some(Encoder::new(
            self.udp_max_payload_size - FIXED_HEADER_SIZE,
            self.format.payload_type,
            self.format.packetization_mode,
            ssrc,
            initial_sequence,
        )?);
        Ok(())
    }

    /// Store newly seen parameter sets. Returns whether the format changed.
    fn apply_params(&mut self, sps: Option<Bytes>, pps: Option<Bytes>) -> bool {
        let sps_changed = sps
            .as_ref()
            .is_some_and(|s| self.format.sps.as_ref() != Some(s));
        let pps_changed = pps
            .as_ref()
            .is_some_and(|p| self.format.pps.as_ref() != Some(p));

        if !sps_changed && !pps_changed {
            return false;
        }

        let sps = sps.or_else(|| self.format.sps.clone());
        let pps = pps.or_else(|| self.format.pps.clone());
        self.format.set_params(sps, pps);

        tracing::debug!(
            payload_type = self.format.payload_type,
            profile_level_id = ?self.format.profile_level_id(),
            "H.264 parameter sets updated"
        );
        true
    }

    fn update_track_parameters_from_rtp_packet(&mut self, payload: &Bytes) -> bool {
        let (sps, pps) = h264::extract_params(payload);
        self.apply_params(sps, pps)
    }

    fn update_track_parameters_from_access_unit(&mut self, au: &[Bytes]) -> bool {
        let mut sps = None;
        let mut pps = None;
        for nalu in au {
            match h264::nalu_type_of(nalu) {
                Some(nalu_type::SPS) => sps = Some(nalu.clone()),
                Some(nalu_type::PPS) => pps = Some(nalu.clone()),
                _ => {}
            }
        }
        self.apply_params(sps, pps)
    }

    /// Drop parameter sets and delimiters; put the cached SPS/PPS in front of
    /// key frames.
    fn remux_access_unit(&self, au: Vec<Bytes>) -> Option<Vec<Bytes>> {
        let mut key_frame = false;
        let mut filtered = Vec::with_capacity(au.len() + 2);

        for nalu in au {
            match h264::nalu_type_of(&nalu) {
                None
                | Some(nalu_type::SPS)
                | Some(nalu_type::PPS)
                | Some(nalu_type::ACCESS_UNIT_DELIMITER) => continue,
                Some(nalu_type::IDR) => key_frame = true,
                _ => {}
            }
            filtered.push(nalu);
        }

        if filtered.is_empty() {
            return None;
        }

        if key_frame && let (Some(sps), Some(pps)) = (&self.format.sps, &self.format.pps) {
            filtered.splice(0..0, [sps.clone(), pps.clone()]);
        }

        Some(filtered)
    }
}

impl Processor for H264Processor {
    fn process_unit(&mut self, unit: &mut Unit) -> Result<()> {
        let Some(au) = unit.access_unit.take() else {
            return Ok(());
        };

        self.update_track_parameters_from_access_unit(&au);
        unit.access_unit = self.remux_access_unit(au);

        if self.encoder.is_none() {
            self.create_encoder(None, None)?;
            self.random_start = rand::rng().random();
        }

        let timestamp = self.random_start.wrapping_add(unit.pts as u32);
        if let (Some(au), Some(encoder)) = (&unit.access_unit, self.encoder.as_mut()) {
            let mut packets = encoder.encode(au)?;
            for packet in &mut packets {
                packet.header.timestamp = packet.header.timestamp.wrapping_add(timestamp);
            }
            unit.rtp_packets = packets;
        }

        Ok(())
    }

    fn process_rtp_packet(
        &mut self,
        mut pkt: RtpPacket,
        ntp: SystemTime,
        pts: i64,
        has_non_rtsp_readers: bool,
    ) -> Result<Unit> {
        let mut unit = Unit::from_rtp(Vec::new(), ntp, pts);

        self.update_track_parameters_from_rtp_packet(&pkt.payload);

        if self.encoder.is_none() {
            pkt.strip_padding();

            let size = pkt.marshal_size();
            if size > self.udp_max_payload_size {
                tracing::info!(
                    size,
                    max = self.udp_max_payload_size,
                    "RTP packets are too big, remuxing them into smaller ones"
                );
                self.create_encoder(Some(pkt.header.ssrc), Some(pkt.header.sequence_number))?;
            }
        }

        if has_non_rtsp_readers || self.decoder.is_some() || self.encoder.is_some() {
            let mut decoder = match self.decoder.take() {
                Some(decoder) => decoder,
                None => Decoder::new(self.format.packetization_mode)?,
            };
            let decoded = decoder.decode(&pkt);
            self.decoder = Some(decoder);

            match decoded {
                Ok(au) => unit.access_unit = self.remux_access_unit(au),
                Err(e) if e.is_incomplete() => {
                    if self.encoder.is_none() {
                        unit.rtp_packets.push(pkt);
                    }
                    return Ok(unit);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let Some(encoder) = self.encoder.as_mut() else {
            unit.rtp_packets.push(pkt);
            return Ok(unit);
        };

        if let Some(au) = &unit.access_unit {
            let mut packets = encoder.encode(au)?;
            for packet in &mut packets {
                packet.header.timestamp = pkt.header.timestamp;
            }
            unit.rtp_packets = packets;
        }

        Ok(unit)
    }

    fn format(&self) -> Format {
        Format::H264(self.format.clone())
    }
}
