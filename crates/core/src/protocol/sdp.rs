//! SDP (Session Description Protocol) parsing (RFC 4566 / RFC 8866).
//!
//! Reads the body of an ANNOUNCE request into a [`SessionDescription`]. A
//! typical announcement:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=- 0 0 IN IP4 127.0.0.1                     ← origin
//! s=Stream                                     ← session name
//! t=0 0                                        ← timing (live stream)
//! m=video 0 RTP/AVP 96                         ← media description
//! a=rtpmap:96 H264/90000                       ← codec/clock rate
//! a=fmtp:96 packetization-mode=1;sprop-parameter-sets=Z0LAH9kA,aM48gA==
//! a=control:trackID=0                          ← track control URL
//! ```
//!
//! Only the lines that shape the negotiated formats are interpreted; the
//! rest are skipped.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;

use crate::error::{Error, Result};
use crate::media::h264::{nalu_type, nalu_type_of};
use crate::media::{Format, GenericFormat, H264Format, Media, MediaType, SessionDescription};

struct Rtpmap {
    codec: String,
    clock_rate: u32,
}

struct PendingMedia {
    media_type: MediaType,
    payload_types: Vec<u8>,
    control: String,
    rtpmaps: HashMap<u8, Rtpmap>,
    fmtps: HashMap<u8, String>,
}

/// Parse an SDP announcement.
pub fn parse(sdp: &str) -> Result<SessionDescription> {
    let mut lines = sdp
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.is_empty());

    if !lines.next().is_some_and(|l| l.starts_with("v=")) {
        return Err(Error::Sdp("missing version line".into()));
    }

    let mut desc = SessionDescription::default();
    let mut current: Option<PendingMedia> = None;

    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::Sdp(format!("invalid line '{line}'")));
        };

        match key {
            "s" if current.is_none() => desc.title = value.to_string(),
            "m" => {
                if let Some(media) = current.take() {
                    desc.medias.push(finish_media(media)?);
                }
                current = Some(parse_media_line(value)?);
            }
            "a" => {
                if let Some(media) = current.as_mut() {
                    parse_attribute(media, value)?;
                }
            }
            _ => {}
        }
    }

    if let Some(media) = current.take() {
        desc.medias.push(finish_media(media)?);
    }

    if desc.medias.is_empty() {
        return Err(Error::Sdp("no media sections".into()));
    }

    Ok(desc)
}

fn parse_media_line(value: &str) -> Result<PendingMedia> {
    let mut fields = value.split_whitespace();

    let media_type = match fields.next() {
        Some("video") => MediaType::Video,
        Some("audio") => MediaType::Audio,
        Some("application") | Some("text") | Some("message") => MediaType::Application,
        other => {
            return Err(Error::Sdp(format!(
                "unsupported media type '{}'",
                other.unwrap_or_default()
            )));
        }
    };

    // port and protocol
    let _port = fields.next();
    let _proto = fields.next();

    let payload_types = fields
        .map(|f| {
            f.parse::<u8>()
                .ok()
                .filter(|pt| *pt < 128)
                .ok_or_else(|| Error::Sdp(format!("invalid payload type '{f}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    if payload_types.is_empty() {
        return Err(Error::Sdp("media without formats".into()));
    }

    Ok(PendingMedia {
        media_type,
        payload_types,
        control: String::new(),
        rtpmaps: HashMap::new(),
        fmtps: HashMap::new(),
    })
}

fn parse_attribute(media: &mut PendingMedia, value: &str) -> Result<()> {
    let (name, rest) = value.split_once(':').unwrap_or((value, ""));

    match name {
        "control" => media.control = rest.trim().to_string(),
        "rtpmap" => {
            let (pt, encoding) = split_payload_type(rest)?;
            let mut parts = encoding.split('/');
            let codec = parts.next().unwrap_or_default().to_string();
            let clock_rate = parts
                .next()
                .and_then(|c| c.trim().parse::<u32>().ok())
                .ok_or_else(|| Error::Sdp(format!("invalid rtpmap '{rest}'")))?;
            media.rtpmaps.insert(pt, Rtpmap { codec, clock_rate });
        }
        "fmtp" => {
            let (pt, params) = split_payload_type(rest)?;
            media.fmtps.insert(pt, params.to_string());
        }
        _ => {}
    }
    Ok(())
}

fn split_payload_type(value: &str) -> Result<(u8, &str)> {
    let (pt, rest) = value.trim().split_once(' ').unwrap_or((value.trim(), ""));
    let pt = pt
        .parse::<u8>()
        .map_err(|_| Error::Sdp(format!("invalid payload type '{pt}'")))?;
    Ok((pt, rest.trim()))
}

/// Codec and clock rate of static payload types (RFC 3551 §6).
fn static_payload_type(pt: u8) -> Option<(&'static str, u32)> {
    match pt {
        0 => Some(("PCMU", 8000)),
        3 => Some(("GSM", 8000)),
        8 => Some(("PCMA", 8000)),
        9 => Some(("G722", 8000)),
        14 => Some(("MPA", 90_000)),
        26 => Some(("JPEG", 90_000)),
        32 => Some(("MPV", 90_000)),
        33 => Some(("MP2T", 90_000)),
        _ => None,
    }
}

fn finish_media(mut media: PendingMedia) -> Result<Media> {
    let mut formats = Vec::with_capacity(media.payload_types.len());

    for pt in &media.payload_types {
        let pt = *pt;
        let fmtp = media.fmtps.remove(&pt);

        let (codec, clock_rate) = match media.rtpmaps.remove(&pt) {
            Some(r) => (r.codec, r.clock_rate),
            None => match static_payload_type(pt) {
                Some((codec, clock_rate)) => (codec.to_string(), clock_rate),
                None => return Err(Error::Sdp(format!("payload type {pt} has no rtpmap"))),
            },
        };

        let format = if codec.eq_ignore_ascii_case("H264") {
            Format::H264(h264_format(pt, fmtp.as_deref())?)
        } else {
            Format::Generic(GenericFormat {
                payload_type: pt,
                codec,
                clock_rate,
                fmtp,
            })
        };
        formats.push(format);
    }

    Ok(Media {
        media_type: media.media_type,
        control: media.control,
        formats,
    })
}

fn h264_format(payload_type: u8, fmtp: Option<&str>) -> Result<H264Format> {
    let mut format = H264Format {
        payload_type,
        packetization_mode: 0,
        sps: None,
        pps: None,
    };

    let Some(fmtp) = fmtp else {
        return Ok(format);
    };

    for param in fmtp.split(';') {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };

        match key.to_ascii_lowercase().as_str() {
            "packetization-mode" => {
                format.packetization_mode = value
                    .parse()
                    .map_err(|_| Error::Sdp(format!("invalid packetization-mode '{value}'")))?;
            }
            "sprop-parameter-sets" => {
                for encoded in value.split(',').filter(|s| !s.is_empty()) {
                    let nalu = STANDARD
                        .decode(encoded)
                        .map_err(|e| Error::Sdp(format!("invalid sprop-parameter-sets: {e}")))?;
                    match nalu_type_of(&nalu) {
                        Some(nalu_type::SPS) => format.sps = Some(Bytes::from(nalu)),
                        Some(nalu_type::PPS) => format.pps = Some(Bytes::from(nalu)),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOUNCE: &str = "v=0\r\n\
        o=- 0 0 IN IP4 127.0.0.1\r\n\
        s=Camera\r\n\
        c=IN IP4 127.0.0.1\r\n\
        t=0 0\r\n\
        m=video 0 RTP/AVP 96\r\n\
        a=rtpmap:96 H264/90000\r\n\
        a=fmtp:96 packetization-mode=1; sprop-parameter-sets=Z0LAH9kA,aM48gA==; profile-level-id=42C01F\r\n\
        a=control:trackID=0\r\n\
        m=audio 0 RTP/AVP 97 0\r\n\
        a=rtpmap:97 MPEG4-GENERIC/44100/2\r\n\
        a=fmtp:97 streamtype=5; config=1210\r\n\
        a=control:trackID=1\r\n";

    #[test]
    fn parses_h264_and_audio() {
        let desc = parse(ANNOUNCE).unwrap();
        assert_eq!(desc.title, "Camera");
        assert_eq!(desc.medias.len(), 2);

        let video = &desc.medias[0];
        assert_eq!(video.media_type, MediaType::Video);
        assert_eq!(video.control, "trackID=0");
        let Format::H264(h264) = &video.formats[0] else {
            panic!("expected H.264");
        };
        assert_eq!(h264.packetization_mode, 1);
        assert_eq!(h264.sps.as_deref(), Some(&[0x67, 0x42, 0xc0, 0x1f, 0xd9, 0x00][..]));
        assert_eq!(h264.pps.as_deref(), Some(&[0x68, 0xce, 0x3c, 0x80][..]));

        let audio = &desc.medias[1];
        assert_eq!(audio.formats.len(), 2);
        assert_eq!(audio.formats[0].codec(), "MPEG4-GENERIC");
        assert_eq!(audio.formats[0].clock_rate(), 44_100);
        assert_eq!(audio.formats[1].codec(), "PCMU");
        assert_eq!(audio.formats[1].clock_rate(), 8000);

        assert_eq!(desc.medias_info(), "2 tracks (H264, MPEG4-GENERIC, PCMU)");
    }

    #[test]
    fn accepts_bare_newlines() {
        let sdp = "v=0\nm=video 0 RTP/AVP 96\na=rtpmap:96 H264/90000\n";
        let desc = parse(sdp).unwrap();
        assert_eq!(desc.medias[0].control, "");
        assert!(matches!(desc.medias[0].formats[0], Format::H264(_)));
    }

    #[test]
    fn rejects_invalid_descriptions() {
        assert!(parse("").is_err());
        assert!(parse("v=0\r\ns=empty\r\n").is_err());
        assert!(parse("v=0\r\nm=video 0 RTP/AVP 96\r\n").is_err());
        assert!(parse("v=0\r\nm=video 0 RTP/AVP abc\r\n").is_err());
        assert!(
            parse("v=0\r\nm=video 0 RTP/AVP 96\r\na=rtpmap:96 H264/90000\r\na=fmtp:96 sprop-parameter-sets=!!!\r\n")
                .is_err()
        );
    }
}
