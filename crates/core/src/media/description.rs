use std::fmt;

use super::format::Format;

/// Kind of an SDP media section (`m=` line).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
    Application,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Application => write!(f, "application"),
        }
    }
}

/// One media section of a session description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub media_type: MediaType,
    /// `a=control` value, relative or absolute. Empty when absent.
    pub control: String,
    pub formats: Vec<Format>,
}

/// Negotiated session: the medias announced by a publisher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionDescription {
    pub title: String,
    pub medias: Vec<Media>,
}

impl SessionDescription {
    /// Human-readable summary used in logs, e.g. `2 tracks (H264, MPEG4-GENERIC)`.
    pub fn medias_info(&self) -> String {
        let codecs: Vec<&str> = self
            .medias
            .iter()
            .flat_map(|m| m.formats.iter().map(Format::codec))
            .collect();
        let noun = if self.medias.len() == 1 { "track" } else { "tracks" };
        format!("{} {} ({})", self.medias.len(), noun, codecs.join(", "))
    }
}
