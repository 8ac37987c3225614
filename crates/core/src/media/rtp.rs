use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CodecError;

/// Size of the RTP fixed header without CSRCs or extension.
pub const FIXED_HEADER_SIZE: usize = 12;

const VERSION: u8 = 2;

/// RTP fixed header (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       CSRC list (CC × 32 bit)                 |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Version is always 2. The padding bit lives on [`RtpPacket`] because it
/// describes the payload trailer, not the header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpHeader {
    /// Set on the last packet of an access unit (RFC 6184 §5.1 for H.264).
    pub marker: bool,
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    /// 16-bit, wrapping: for reordering and loss detection.
    pub sequence_number: u16,
    /// Media clock, 90 kHz for video.
    pub timestamp: u32,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension: Option<RtpExtension>,
}

/// Header extension (RFC 3550 §5.3.1), kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpExtension {
    pub profile: u16,
    /// Extension body; its length is a multiple of 4 bytes on the wire.
    pub data: Bytes,
}

impl RtpHeader {
    /// Serialized size of this header, including CSRCs and extension.
    pub fn marshal_size(&self) -> usize {
        let mut size = FIXED_HEADER_SIZE + self.csrc.len() * 4;
        if let Some(ext) = &self.extension {
            size += 4 + ext.data.len().div_ceil(4) * 4;
        }
        size
    }
}

/// A complete RTP packet.
///
/// The payload is a [`Bytes`] slice of the received datagram, so cloning a
/// packet or splitting its payload into NAL units does not copy media data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Bytes,
    /// Whether the packet carries padding after the payload.
    pub padding: bool,
    /// Number of padding bytes, including the trailing count byte.
    pub padding_size: u8,
}

impl RtpPacket {
    /// Parse a packet from a received datagram or interleaved frame.
    pub fn parse(data: Bytes) -> Result<Self, CodecError> {
        if data.len() < FIXED_HEADER_SIZE {
            return Err(CodecError::InvalidPacket("header size insufficient"));
        }

        let version = data[0] >> 6;
        if version != VERSION {
            return Err(CodecError::InvalidPacket("unsupported RTP version"));
        }

        let padding = data[0] & 0x20 != 0;
        let has_extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0f) as usize;
        let marker = data[1] & 0x80 != 0;
        let payload_type = data[1] & 0x7f;
        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut offset = FIXED_HEADER_SIZE;
        if data.len() < offset + csrc_count * 4 {
            return Err(CodecError::InvalidPacket("CSRC list truncated"));
        }
        let csrc = (0..csrc_count)
            .map(|i| {
                let at = offset + i * 4;
                u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
            })
            .collect();
        offset += csrc_count * 4;

        let extension = if has_extension {
            if data.len() < offset + 4 {
                return Err(CodecError::InvalidPacket("extension header truncated"));
            }
            let profile = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let words = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4;
            if data.len() < offset + words * 4 {
                return Err(CodecError::InvalidPacket("extension body truncated"));
            }
            let body = data.slice(offset..offset + words * 4);
            offset += words * 4;
            Some(RtpExtension {
                profile,
                data: body,
            })
        } else {
            None
        };

        let mut end = data.len();
        let mut padding_size = 0u8;
        if padding {
            padding_size = data[end - 1];
            if padding_size == 0 || offset + padding_size as usize > end {
                return Err(CodecError::InvalidPacket("invalid padding size"));
            }
            end -= padding_size as usize;
        }

        Ok(Self {
            header: RtpHeader {
                marker,
                payload_type,
                sequence_number,
                timestamp,
                ssrc,
                csrc,
                extension,
            },
            payload: data.slice(offset..end),
            padding,
            padding_size,
        })
    }

    /// Size of the packet once serialized, padding included.
    pub fn marshal_size(&self) -> usize {
        let padding = if self.padding {
            self.padding_size as usize
        } else {
            0
        };
        self.header.marshal_size() + self.payload.len() + padding
    }

    /// Drop any padding trailer, leaving the payload untouched.
    pub fn strip_padding(&mut self) {
        self.padding = false;
        self.padding_size = 0;
    }

    /// Serialize the packet to its wire format.
    pub fn marshal(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.marshal_size());
        let has_padding = self.padding && self.padding_size > 0;

        let mut first = VERSION << 6;
        if has_padding {
            first |= 0x20;
        }
        if self.header.extension.is_some() {
            first |= 0x10;
        }
        first |= (self.header.csrc.len() as u8) & 0x0f;

        buf.put_u8(first);
        buf.put_u8(((self.header.marker as u8) << 7) | (self.header.payload_type & 0x7f));
        buf.put_u16(self.header.sequence_number);
        buf.put_u32(self.header.timestamp);
        buf.put_u32(self.header.ssrc);
        for csrc in &self.header.csrc {
            buf.put_u32(*csrc);
        }

        if let Some(ext) = &self.header.extension {
            let words = ext.data.len().div_ceil(4);
            buf.put_u16(ext.profile);
            buf.put_u16(words as u16);
            buf.put_slice(&ext.data);
            buf.put_bytes(0, words * 4 - ext.data.len());
        }

        buf.put_slice(&self.payload);

        if has_padding {
            buf.put_bytes(0, self.padding_size as usize - 1);
            buf.put_u8(self.padding_size);
        }

        buf.freeze()
    }
}
