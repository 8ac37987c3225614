//! H.264 over RTP (RFC 6184).
//!
//! Three payload structures are handled:
//!
//! - **Single NAL Unit** (§5.6): the payload is one NAL unit.
//! - **STAP-A** (§5.7.1): several small NAL units aggregated, each prefixed
//!   by a 16-bit size.
//! - **FU-A** (§5.8): a large NAL unit split across packets, each fragment
//!   carrying a 2-byte FU header:
//!
//!   ```text
//!   FU indicator:  [F|NRI|Type=28]     (1 byte)
//!   FU header:     [S|E|R|NAL_Type]    (1 byte)
//!   Fragment data: [...]
//!   ```
//!
//! [`Decoder`] turns packets back into access units (lists of NAL units),
//! [`Encoder`] does the reverse.

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngExt;

use super::rtp::{RtpHeader, RtpPacket};
use crate::error::CodecError;

/// Maximum size of an access unit accepted by the decoder.
pub const MAX_ACCESS_UNIT_SIZE: usize = 8 * 1024 * 1024;

/// Maximum number of NAL units in one access unit.
pub const MAX_NALUS_PER_ACCESS_UNIT: usize = 21;

/// H.264 NAL unit types relevant to RTP processing (ITU-T H.264 Table 7-1,
/// RFC 6184 Table 1).
pub mod nalu_type {
    pub const IDR: u8 = 5;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const ACCESS_UNIT_DELIMITER: u8 = 9;
    pub const STAP_A: u8 = 24;
    pub const STAP_B: u8 = 25;
    pub const MTAP16: u8 = 26;
    pub const MTAP24: u8 = 27;
    pub const FU_A: u8 = 28;
    pub const FU_B: u8 = 29;
}

/// NAL unit type from the first byte of a NAL unit.
pub fn nalu_type_of(nalu: &[u8]) -> Option<u8> {
    nalu.first().map(|b| b & 0x1f)
}

/// Extract SPS and PPS from an RTP payload without decoding it.
///
/// Looks at single NAL unit payloads and STAP-A aggregates; fragments are
/// ignored. A malformed STAP-A yields nothing.
pub fn extract_params(payload: &Bytes) -> (Option<Bytes>, Option<Bytes>) {
    match nalu_type_of(payload) {
        Some(nalu_type::SPS) => (Some(payload.clone()), None),
        Some(nalu_type::PPS) => (None, Some(payload.clone())),
        Some(nalu_type::STAP_A) => {
            let mut sps = None;
            let mut pps = None;
            let mut offset = 1usize;

            while payload.len() >= offset + 2 {
                let size = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
                offset += 2;

                if size == 0 {
                    break;
                }
                if offset + size > payload.len() {
                    return (None, None);
                }

                let nalu = payload.slice(offset..offset + size);
                offset += size;

                match nalu_type_of(&nalu) {
                    Some(nalu_type::SPS) => sps = Some(nalu),
                    Some(nalu_type::PPS) => pps = Some(nalu),
                    _ => {}
                }
            }

            (sps, pps)
        }
        _ => (None, None),
    }
}

/// Sum of NAL unit sizes.
fn access_unit_size(nalus: &[Bytes]) -> usize {
    nalus.iter().map(Bytes::len).sum()
}

/// RTP → access unit depacketizer.
///
/// NAL units are buffered until a packet with the marker bit set closes the
/// access unit. Until then [`decode`](Self::decode) returns
/// [`CodecError::MorePacketsNeeded`].
#[derive(Debug, Default)]
pub struct Decoder {
    first_packet_received: bool,
    fragments: Vec<Bytes>,
    fragments_size: usize,
    fragment_next_seq: u16,
    frame: Vec<Bytes>,
    frame_size: usize,
}

impl Decoder {
    /// Create a decoder for the given `packetization-mode` (RFC 6184 §6.2).
    /// Interleaved mode (2) is not supported.
    pub fn new(packetization_mode: u8) -> Result<Self, CodecError> {
        if packetization_mode >= 2 {
            return Err(CodecError::UnsupportedPacketizationMode(packetization_mode));
        }
        Ok(Self::default())
    }

    fn reset_fragments(&mut self) {
        self.fragments.clear();
        self.fragments_size = 0;
    }

    fn reset_frame(&mut self) {
        self.frame.clear();
        self.frame_size = 0;
    }

    fn join_fragments(&mut self) -> Bytes {
        let mut nalu = BytesMut::with_capacity(self.fragments_size);
        for fragment in &self.fragments {
            nalu.put_slice(fragment);
        }
        self.reset_fragments();
        nalu.freeze()
    }

    fn decode_nalus(&mut self, pkt: &RtpPacket) -> Result<Vec<Bytes>, CodecError> {
        let payload = &pkt.payload;
        let Some(typ) = nalu_type_of(payload) else {
            self.reset_fragments();
            return Err(CodecError::PayloadTooShort);
        };

        match typ {
            nalu_type::FU_A => {
                if payload.len() < 2 {
                    self.reset_fragments();
                    return Err(CodecError::PayloadTooShort);
                }

                let start = payload[1] & 0x80 != 0;
                let end = payload[1] & 0x40 != 0;

                if start {
                    self.reset_fragments();
                    let nri = payload[0] & 0x60;
                    let header = nri | (payload[1] & 0x1f);
                    self.fragments.push(Bytes::copy_from_slice(&[header]));
                    self.fragments.push(payload.slice(2..));
                    self.fragments_size = payload.len() - 1;
                    self.fragment_next_seq = pkt.header.sequence_number.wrapping_add(1);
                    self.first_packet_received = true;

                    // Start and end in the same FU violates §5.8 but is emitted
                    // by some cameras for small P-frames.
                    if end {
                        return Ok(vec![self.join_fragments()]);
                    }
                    return Err(CodecError::MorePacketsNeeded);
                }

                if self.fragments_size == 0 {
                    if !self.first_packet_received {
                        return Err(CodecError::NonStartingPacketAndNoPrevious);
                    }
                    return Err(CodecError::InvalidAggregate("FU-A (non-starting)"));
                }

                if pkt.header.sequence_number != self.fragment_next_seq {
                    self.reset_fragments();
                    return Err(CodecError::PacketMissing);
                }

                self.fragments_size += payload.len() - 2;
                if self.fragments_size > MAX_ACCESS_UNIT_SIZE {
                    let size = self.fragments_size;
                    self.reset_fragments();
                    return Err(CodecError::AccessUnitTooBig {
                        size,
                        max: MAX_ACCESS_UNIT_SIZE,
                    });
                }

                self.fragments.push(payload.slice(2..));
                self.fragment_next_seq = self.fragment_next_seq.wrapping_add(1);

                if !end {
                    return Err(CodecError::MorePacketsNeeded);
                }
                Ok(vec![self.join_fragments()])
            }

            nalu_type::STAP_A => {
                self.reset_fragments();

                let mut nalus = Vec::new();
                let mut offset = 1usize;
                loop {
                    if payload.len() < offset + 2 {
                        return Err(CodecError::InvalidAggregate("STAP-A (invalid size)"));
                    }
                    let size = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
                    offset += 2;

                    // trailing padding
                    if size == 0 {
                        break;
                    }
                    if offset + size > payload.len() {
                        return Err(CodecError::InvalidAggregate("STAP-A (invalid size)"));
                    }

                    nalus.push(payload.slice(offset..offset + size));
                    offset += size;

                    if offset == payload.len() {
                        break;
                    }
                }

                if nalus.is_empty() {
                    return Err(CodecError::InvalidAggregate("STAP-A (no NALUs)"));
                }

                self.first_packet_received = true;
                Ok(nalus)
            }

            nalu_type::STAP_B | nalu_type::MTAP16 | nalu_type::MTAP24 | nalu_type::FU_B => {
                self.reset_fragments();
                Err(CodecError::UnsupportedPacketType(typ))
            }

            _ => {
                self.reset_fragments();
                self.first_packet_received = true;
                Ok(vec![payload.clone()])
            }
        }
    }

    /// Feed one RTP packet; returns a complete access unit once the packet
    /// carrying the marker bit has been received.
    pub fn decode(&mut self, pkt: &RtpPacket) -> Result<Vec<Bytes>, CodecError> {
        let nalus = self.decode_nalus(pkt)?;

        let count = self.frame.len() + nalus.len();
        if count > MAX_NALUS_PER_ACCESS_UNIT {
            self.reset_frame();
            return Err(CodecError::TooManyNalus {
                count,
                max: MAX_NALUS_PER_ACCESS_UNIT,
            });
        }

        let size = self.frame_size + access_unit_size(&nalus);
        if size > MAX_ACCESS_UNIT_SIZE {
            self.reset_frame();
            return Err(CodecError::AccessUnitTooBig {
                size,
                max: MAX_ACCESS_UNIT_SIZE,
            });
        }

        self.frame.extend(nalus);
        self.frame_size = size;

        if !pkt.header.marker {
            return Err(CodecError::MorePacketsNeeded);
        }

        self.frame_size = 0;
        Ok(std::mem::take(&mut self.frame))
    }
}

/// Access unit → RTP packetizer.
///
/// In non-interleaved mode (1), consecutive NAL units that fit together are
/// aggregated into STAP-A packets, NAL units larger than the payload budget
/// are fragmented into FU-A, and everything else is sent as a single NAL unit
/// packet. Single NAL unit mode (0) only emits single NAL unit packets. The
/// marker bit is set on the last packet of the access unit.
///
/// Emitted packets carry timestamp 0; the caller stamps them.
#[derive(Debug)]
pub struct Encoder {
    payload_max_size: usize,
    payload_type: u8,
    packetization_mode: u8,
    ssrc: u32,
    sequence: u16,
}

impl Encoder {
    /// Create an encoder. A missing SSRC or initial sequence number is drawn
    /// at random (RFC 3550 §5.1, §8.1).
    pub fn new(
        payload_max_size: usize,
        payload_type: u8,
        packetization_mode: u8,
        ssrc: Option<u32>,
        initial_sequence: Option<u16>,
    ) -> Result<Self, CodecError> {
        if packetization_mode >= 2 {
            return Err(CodecError::UnsupportedPacketizationMode(packetization_mode));
        }

        let ssrc = ssrc.unwrap_or_else(|| rand::rng().random());
        let sequence = initial_sequence.unwrap_or_else(|| rand::rng().random());
        tracing::debug!(
            payload_type,
            payload_max_size,
            packetization_mode,
            ssrc = format_args!("{:#010X}", ssrc),
            sequence,
            "H.264 encoder created"
        );
        Ok(Self {
            payload_max_size,
            payload_type,
            packetization_mode,
            ssrc,
            sequence,
        })
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Encode an access unit into RTP packets.
    pub fn encode(&mut self, nalus: &[Bytes]) -> Result<Vec<RtpPacket>, CodecError> {
        if self.packetization_mode == 0 {
            return self.encode_single_nal_units(nalus);
        }

        let mut packets = Vec::new();
        let mut batch: Vec<Bytes> = Vec::new();

        for nalu in nalus {
            if nalu.is_empty() {
                continue;
            }
            if aggregated_len(&batch, nalu) <= self.payload_max_size {
                batch.push(nalu.clone());
            } else {
                if !batch.is_empty() {
                    self.write_batch(&batch, false, &mut packets);
                }
                batch = vec![nalu.clone()];
            }
        }

        if !batch.is_empty() {
            self.write_batch(&batch, true, &mut packets);
        }

        tracing::trace!(
            nalu_count = nalus.len(),
            rtp_packets = packets.len(),
            seq = self.sequence,
            "access unit packetized"
        );

        Ok(packets)
    }

    fn encode_single_nal_units(&mut self, nalus: &[Bytes]) -> Result<Vec<RtpPacket>, CodecError> {
        let nalus: Vec<&Bytes> = nalus.iter().filter(|n| !n.is_empty()).collect();
        if let Some(nalu) = nalus.iter().find(|n| n.len() > self.payload_max_size) {
            return Err(CodecError::NaluTooBig {
                size: nalu.len(),
                max: self.payload_max_size,
            });
        }

        let last = nalus.len().saturating_sub(1);
        Ok(nalus
            .into_iter()
            .enumerate()
            .map(|(i, nalu)| self.packet(nalu.clone(), i == last))
            .collect())
    }

    fn write_batch(&mut self, batch: &[Bytes], marker: bool, out: &mut Vec<RtpPacket>) {
        if let [nalu] = batch {
            if nalu.len() <= self.payload_max_size {
                let packet = self.packet(nalu.clone(), marker);
                out.push(packet);
            } else {
                self.write_fragmented(nalu, marker, out);
            }
            return;
        }

        let mut payload = BytesMut::with_capacity(aggregated_len(batch, &Bytes::new()));
        payload.put_u8(nalu_type::STAP_A);
        for nalu in batch {
            payload.put_u16(nalu.len() as u16);
            payload.put_slice(nalu);
        }
        let packet = self.packet(payload.freeze(), marker);
        out.push(packet);
    }

    fn write_fragmented(&mut self, nalu: &Bytes, marker: bool, out: &mut Vec<RtpPacket>) {
        let nal_header = nalu[0];
        let nal_type = nal_header & 0x1f;
        let nri = nal_header & 0x60;

        // FU indicator: NRI from original NAL, type = 28 (FU-A)
        let fu_indicator = nri | nalu_type::FU_A;
        let body = nalu.slice(1..);

        let max_fragment = self.payload_max_size - 2;
        let mut offset = 0usize;
        let mut first = true;

        while offset < body.len() {
            let remaining = body.len() - offset;
            let last_fragment = remaining <= max_fragment;
            let chunk_size = std::cmp::min(max_fragment, remaining);

            // FU header: S=start, E=end, R=0, Type=original NAL type
            let start_bit = if first { 0x80 } else { 0x00 };
            let end_bit = if last_fragment { 0x40 } else { 0x00 };

            let mut payload = BytesMut::with_capacity(2 + chunk_size);
            payload.put_u8(fu_indicator);
            payload.put_u8(start_bit | end_bit | nal_type);
            payload.put_slice(&body[offset..offset + chunk_size]);

            let packet = self.packet(payload.freeze(), marker && last_fragment);
            out.push(packet);

            offset += chunk_size;
            first = false;
        }
    }

    fn packet(&mut self, payload: Bytes, marker: bool) -> RtpPacket {
        let packet = RtpPacket {
            header: RtpHeader {
                marker,
                payload_type: self.payload_type,
                sequence_number: self.sequence,
                timestamp: 0,
                ssrc: self.ssrc,
                ..Default::default()
            },
            payload,
            ..Default::default()
        };
        self.sequence = self.sequence.wrapping_add(1);
        packet
    }
}

/// Size of a STAP-A payload holding `batch` plus `extra`.
fn aggregated_len(batch: &[Bytes], extra: &Bytes) -> usize {
    let mut len = 1;
    for nalu in batch {
        len += 2 + nalu.len();
    }
    if !extra.is_empty() {
        len += 2 + extra.len();
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u16, marker: bool, payload: &[u8]) -> RtpPacket {
        RtpPacket {
            header: RtpHeader {
                marker,
                payload_type: 96,
                sequence_number: seq,
                timestamp: 3000,
                ssrc: 0x11223344,
                ..Default::default()
            },
            payload: Bytes::copy_from_slice(payload),
            ..Default::default()
        }
    }

    // --- parameter extraction ---

    #[test]
    fn extract_single_sps() {
        let payload = Bytes::from_static(&[0x67, 0x42, 0x00, 0x1e]);
        let (sps, pps) = extract_params(&payload);
        assert_eq!(sps.unwrap(), payload);
        assert!(pps.is_none());
    }

    #[test]
    fn extract_from_stap_a() {
        let payload = Bytes::from_static(&[
            24, 0, 3, 0x67, 0x42, 0x00, 0, 2, 0x68, 0xce, 0, 2, 0x65, 0x88,
        ]);
        let (sps, pps) = extract_params(&payload);
        assert_eq!(sps.unwrap().as_ref(), &[0x67, 0x42, 0x00]);
        assert_eq!(pps.unwrap().as_ref(), &[0x68, 0xce]);
    }

    #[test]
    fn extract_from_truncated_stap_a() {
        let payload = Bytes::from_static(&[24, 0, 9, 0x67, 0x42]);
        assert_eq!(extract_params(&payload), (None, None));
    }

    #[test]
    fn extract_ignores_slices() {
        let payload = Bytes::from_static(&[0x65, 0x88]);
        assert_eq!(extract_params(&payload), (None, None));
    }

    // --- decoding ---

    #[test]
    fn decode_single_nalu_with_marker() {
        let mut d = Decoder::new(1).unwrap();
        let au = d.decode(&packet(1, true, &[0x65, 1, 2, 3])).unwrap();
        assert_eq!(au, vec![Bytes::from_static(&[0x65, 1, 2, 3])]);
    }

    #[test]
    fn decode_accumulates_until_marker() {
        let mut d = Decoder::new(1).unwrap();
        assert_eq!(
            d.decode(&packet(1, false, &[0x67, 0x42])),
            Err(CodecError::MorePacketsNeeded)
        );
        let au = d.decode(&packet(2, true, &[0x65, 0xAA])).unwrap();
        assert_eq!(au.len(), 2);
        assert_eq!(au[0].as_ref(), &[0x67, 0x42]);
    }

    #[test]
    fn decode_fu_a() {
        let mut d = Decoder::new(1).unwrap();
        // NRI=3, type 5, split in three fragments
        assert_eq!(
            d.decode(&packet(10, false, &[0x7c, 0x85, 1, 2])),
            Err(CodecError::MorePacketsNeeded)
        );
        assert_eq!(
            d.decode(&packet(11, false, &[0x7c, 0x05, 3, 4])),
            Err(CodecError::MorePacketsNeeded)
        );
        let au = d.decode(&packet(12, true, &[0x7c, 0x45, 5])).unwrap();
        assert_eq!(au, vec![Bytes::from_static(&[0x65, 1, 2, 3, 4, 5])]);
    }

    #[test]
    fn decode_fu_a_start_and_end() {
        let mut d = Decoder::new(1).unwrap();
        let au = d.decode(&packet(1, true, &[0x7c, 0xC5, 9])).unwrap();
        assert_eq!(au, vec![Bytes::from_static(&[0x65, 9])]);
    }

    #[test]
    fn decode_non_starting_fragment_first() {
        let mut d = Decoder::new(1).unwrap();
        let err = d.decode(&packet(5, false, &[0x7c, 0x05, 1])).unwrap_err();
        assert_eq!(err, CodecError::NonStartingPacketAndNoPrevious);
        assert!(err.is_incomplete());
    }

    #[test]
    fn decode_fu_a_missing_packet() {
        let mut d = Decoder::new(1).unwrap();
        let _ = d.decode(&packet(1, false, &[0x7c, 0x85, 1]));
        let err = d.decode(&packet(3, true, &[0x7c, 0x45, 2])).unwrap_err();
        assert_eq!(err, CodecError::PacketMissing);
        assert!(!err.is_incomplete());
    }

    #[test]
    fn decode_stap_a() {
        let mut d = Decoder::new(1).unwrap();
        let au = d
            .decode(&packet(1, true, &[24, 0, 2, 0x67, 0x42, 0, 2, 0x68, 0xce]))
            .unwrap();
        assert_eq!(au.len(), 2);
        assert_eq!(au[1].as_ref(), &[0x68, 0xce]);
    }

    #[test]
    fn decode_unsupported_types() {
        let mut d = Decoder::new(1).unwrap();
        assert_eq!(
            d.decode(&packet(1, true, &[25, 0])),
            Err(CodecError::UnsupportedPacketType(25))
        );
    }

    #[test]
    fn decode_empty_payload() {
        let mut d = Decoder::new(1).unwrap();
        assert_eq!(
            d.decode(&packet(1, true, &[])),
            Err(CodecError::PayloadTooShort)
        );
    }

    // --- encoding ---

    #[test]
    fn encode_small_nalus_aggregated() {
        let mut e = Encoder::new(1460, 96, 1, Some(0xAABBCCDD), Some(100)).unwrap();
        let au = vec![
            Bytes::from_static(&[0x67, 0x42]),
            Bytes::from_static(&[0x68, 0xce]),
            Bytes::from_static(&[0x65, 0x88]),
        ];
        let packets = e.encode(&au).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload[0], nalu_type::STAP_A);
        assert!(packets[0].header.marker);
        assert_eq!(packets[0].header.sequence_number, 100);
        assert_eq!(packets[0].header.ssrc, 0xAABBCCDD);

        let mut d = Decoder::new(1).unwrap();
        assert_eq!(d.decode(&packets[0]).unwrap(), au);
    }

    #[test]
    fn encode_single_nalu() {
        let mut e = Encoder::new(1460, 96, 1, Some(1), Some(0)).unwrap();
        let packets = e
            .encode(&[Bytes::from_static(&[0x65, 0xAA, 0xBB, 0xCC])])
            .unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload.as_ref(), &[0x65, 0xAA, 0xBB, 0xCC]);
        assert_eq!(packets[0].marshal_size(), 12 + 4);
    }

    #[test]
    fn encode_large_nalu_fragmented() {
        let mut e = Encoder::new(100, 96, 1, Some(1), Some(u16::MAX)).unwrap();
        let mut nalu = vec![0x65];
        nalu.extend(vec![0xAA; 500]);
        let nalu = Bytes::from(nalu);
        let packets = e.encode(std::slice::from_ref(&nalu)).unwrap();
        assert!(packets.len() > 1);

        assert_eq!(packets[0].payload[0] & 0x1f, nalu_type::FU_A);
        assert_eq!(packets[0].payload[1] & 0x80, 0x80);
        assert_eq!(packets[0].header.sequence_number, u16::MAX);
        assert_eq!(packets[1].header.sequence_number, 0);

        let last = packets.last().unwrap();
        assert_eq!(last.payload[1] & 0x40, 0x40);
        assert!(last.header.marker);
        assert!(packets.iter().all(|p| p.payload.len() <= 100));
        assert!(packets[..packets.len() - 1].iter().all(|p| !p.header.marker));

        let mut d = Decoder::new(1).unwrap();
        let mut au = None;
        for p in &packets {
            match d.decode(p) {
                Ok(nalus) => au = Some(nalus),
                Err(e) => assert_eq!(e, CodecError::MorePacketsNeeded),
            }
        }
        assert_eq!(au.unwrap(), vec![nalu]);
    }

    #[test]
    fn encode_empty_access_unit() {
        let mut e = Encoder::new(1460, 96, 1, None, None).unwrap();
        assert!(e.encode(&[]).unwrap().is_empty());
    }

    #[test]
    fn interleaved_mode_unsupported() {
        assert_eq!(
            Encoder::new(1460, 96, 2, None, None).unwrap_err(),
            CodecError::UnsupportedPacketizationMode(2)
        );
        assert_eq!(
            Decoder::new(2).unwrap_err(),
            CodecError::UnsupportedPacketizationMode(2)
        );
        assert!(Decoder::new(0).is_ok());
    }

    #[test]
    fn single_nal_unit_mode_never_aggregates() {
        let mut e = Encoder::new(1460, 96, 0, Some(1), Some(10)).unwrap();
        let au = vec![
            Bytes::from_static(&[0x67, 0x42]),
            Bytes::from_static(&[0x68, 0xce]),
            Bytes::from_static(&[0x65, 0x88]),
        ];
        let packets = e.encode(&au).unwrap();
        assert_eq!(packets.len(), 3);
        for (p, nalu) in packets.iter().zip(&au) {
            assert_eq!(&p.payload, nalu);
        }
        assert_eq!(packets[2].header.sequence_number, 12);
        assert!(packets[2].header.marker);
        assert!(!packets[0].header.marker && !packets[1].header.marker);
    }

    #[test]
    fn single_nal_unit_mode_rejects_large_nalu() {
        let mut e = Encoder::new(100, 96, 0, Some(1), Some(10)).unwrap();
        let mut nalu = vec![0x65];
        nalu.extend(vec![0xAA; 300]);
        let err = e
            .encode(&[Bytes::from_static(&[0x67, 0x42]), Bytes::from(nalu)])
            .unwrap_err();
        assert_eq!(err, CodecError::NaluTooBig { size: 301, max: 100 });

        // nothing was emitted, so the sequence is untouched
        let packets = e.encode(&[Bytes::from_static(&[0x41, 0x9a])]).unwrap();
        assert_eq!(packets[0].header.sequence_number, 10);
    }
}
