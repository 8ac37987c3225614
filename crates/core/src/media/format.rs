use bytes::Bytes;

/// Clock rate of every video format carried over RTP (RFC 3551 §5).
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// A negotiated RTP format, one `a=rtpmap` entry of an SDP media section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    H264(H264Format),
    Generic(GenericFormat),
}

impl Format {
    /// RTP payload type number (RFC 3551).
    pub fn payload_type(&self) -> u8 {
        match self {
            Self::H264(f) => f.payload_type,
            Self::Generic(f) => f.payload_type,
        }
    }

    /// Codec name as used in logs and `a=rtpmap`.
    pub fn codec(&self) -> &str {
        match self {
            Self::H264(_) => "H264",
            Self::Generic(f) => &f.codec,
        }
    }

    /// RTP clock rate in Hz.
    pub fn clock_rate(&self) -> u32 {
        match self {
            Self::H264(_) => VIDEO_CLOCK_RATE,
            Self::Generic(f) => f.clock_rate,
        }
    }
}

/// H.264 format (RFC 6184 §8.1).
///
/// `sps` and `pps` start from `sprop-parameter-sets` and are refreshed by the
/// track's format processor when the publisher sends new parameter sets
/// in-band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264Format {
    pub payload_type: u8,
    pub packetization_mode: u8,
    pub sps: Option<Bytes>,
    pub pps: Option<Bytes>,
}

impl H264Format {
    pub fn new(payload_type: u8) -> Self {
        Self {
            payload_type,
            packetization_mode: 1,
            sps: None,
            pps: None,
        }
    }

    /// Replace both parameter sets.
    pub fn set_params(&mut self, sps: Option<Bytes>, pps: Option<Bytes>) {
        self.sps = sps;
        self.pps = pps;
    }

    /// `profile-level-id` derived from the SPS (bytes 1–3: profile_idc,
    /// constraint flags, level_idc).
    pub fn profile_level_id(&self) -> Option<String> {
        let sps = self.sps.as_deref()?;
        if sps.len() < 4 {
            return None;
        }
        Some(format!("{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
    }
}

/// Any format the server does not inspect; packets are passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericFormat {
    pub payload_type: u8,
    pub codec: String,
    pub clock_rate: u32,
    /// Raw `a=fmtp` parameters, if any.
    pub fmtp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h264_metadata() {
        let f = Format::H264(H264Format::new(96));
        assert_eq!(f.codec(), "H264");
        assert_eq!(f.clock_rate(), 90_000);
        assert_eq!(f.payload_type(), 96);
    }

    #[test]
    fn profile_level_id_from_sps() {
        let mut f = H264Format::new(96);
        assert!(f.profile_level_id().is_none());
        f.set_params(Some(Bytes::from_static(&[0x67, 0x42, 0xc0, 0x1f])), None);
        assert_eq!(f.profile_level_id().as_deref(), Some("42c01f"));
    }
}
