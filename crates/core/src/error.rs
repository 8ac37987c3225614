//! Error types for the ingestion core.

use std::fmt;

/// Errors that can occur in the ingestion core.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Actors**: [`Terminated`](Self::Terminated),
///   [`PublisherNotAssigned`](Self::PublisherNotAssigned),
///   [`InvalidPathName`](Self::InvalidPathName).
/// - **Stream**: [`MediaNotFound`](Self::MediaNotFound),
///   [`FormatNotFound`](Self::FormatNotFound), [`Codec`](Self::Codec).
/// - **Protocol**: [`Parse`](Self::Parse), [`Sdp`](Self::Sdp).
/// - **Transport**: [`Io`](Self::Io).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The actor being called has shut down (or is shutting down).
    #[error("terminated")]
    Terminated,

    /// StartPublisher was called by an author whose binding was replaced.
    #[error("publisher is not assigned to this path anymore")]
    PublisherNotAssigned,

    /// A path name contains forbidden characters or separators.
    #[error("invalid path name '{name}': {reason}")]
    InvalidPathName { name: String, reason: &'static str },

    /// The stream has no media at the given index.
    #[error("media {0} not found in stream")]
    MediaNotFound(usize),

    /// The media has no format with the given RTP payload type.
    #[error("format with payload type {payload_type} not found in media {media}")]
    FormatNotFound { media: usize, payload_type: u8 },

    /// RTP or codec processing failure, fatal to a single packet.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Failed to parse an RTSP request message (RFC 2326 §6).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// Malformed or unsupported session description.
    #[error("invalid SDP: {0}")]
    Sdp(String),

    /// Configuration rejected by [`Config::validate`](crate::conf::Config::validate).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,
}

/// Specific kind of RTSP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// `Content-Length` is not a number or exceeds the allowed body size.
    InvalidContentLength,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::InvalidContentLength => write!(f, "invalid content length"),
        }
    }
}

/// RTP packet and codec failures.
///
/// [`MorePacketsNeeded`](Self::MorePacketsNeeded) and
/// [`NonStartingPacketAndNoPrevious`](Self::NonStartingPacketAndNoPrevious)
/// are flow signals of the depacketizer rather than real failures; see
/// [`is_incomplete`](Self::is_incomplete).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("need more packets")]
    MorePacketsNeeded,

    #[error("received a non-starting fragment without any previous starting fragment")]
    NonStartingPacketAndNoPrevious,

    #[error("invalid RTP packet: {0}")]
    InvalidPacket(&'static str),

    #[error("payload is too short")]
    PayloadTooShort,

    #[error("invalid {0} packet")]
    InvalidAggregate(&'static str),

    #[error("packet type not supported ({0})")]
    UnsupportedPacketType(u8),

    #[error("discarding frame since a RTP packet is missing")]
    PacketMissing,

    #[error("access unit size ({size}) is too big, maximum is {max}")]
    AccessUnitTooBig { size: usize, max: usize },

    #[error("NALU count ({count}) exceeds maximum allowed ({max})")]
    TooManyNalus { count: usize, max: usize },

    #[error("payload size ({size}) is greater than maximum allowed ({max})")]
    PayloadTooBig { size: usize, max: usize },

    #[error("unit does not contain any RTP packet")]
    NoRtpPackets,

    #[error("packetization mode {0} is not supported")]
    UnsupportedPacketizationMode(u8),

    #[error("NALU size ({size}) does not fit a single NAL unit packet, maximum is {max}")]
    NaluTooBig { size: usize, max: usize },
}

impl CodecError {
    /// Whether the error only means that the access unit is not complete yet.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::MorePacketsNeeded | Self::NonStartingPacketAndNoPrevious
        )
    }
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
