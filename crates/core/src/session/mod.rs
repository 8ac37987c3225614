//! RTSP publish sessions (RFC 2326 §3, §12.37).
//!
//! A session is created by ANNOUNCE and destroyed by TEARDOWN or when its
//! control connection closes. It tracks:
//!
//! - A unique session ID (hex string, returned in the `Session` header).
//! - The [`Author`] identity it publishes with.
//! - The announced description, the path it is bound to and the transport
//!   negotiated for each media.
//!
//! ## Session lifecycle
//!
//! ```text
//! ANNOUNCE       -> PreRecord   (publisher bound to the path)
//! SETUP          -> PreRecord   (once per media)
//! RECORD         -> Record      (path ready, packets flow to the stream)
//! TEARDOWN       -> (removed)
//! TCP disconnect -> (removed, via cleanup)
//! ```

pub mod transport;

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use crate::conf::{RtspTransport, RtspTransports};
use crate::defs::{AddPublisherReq, Author, PathAccessRequest, RemovePublisherReq, StartPublisherReq};
use crate::error::Error;
use crate::media::{RtpPacket, SessionDescription};
use crate::path::Path;
use crate::path_manager::PathManager;
use crate::protocol::request::split_uri;
use crate::protocol::{RtspRequest, RtspResponse, sdp};
use crate::stream::Stream;
pub use transport::TransportHeader;
use transport::{TransportMode, TransportProtocol};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Default session timeout in seconds (RFC 2326 §12.37).
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60;

/// RTSP session state machine.
///
/// Only the record side is driven by this server; the play states exist so
/// that the state reported for a session is always a real RTSP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initial,
    PrePlay,
    Play,
    PreRecord,
    Record,
}

/// Transport negotiated for one media during SETUP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupTransport {
    Udp {
        /// Address RTP is expected from.
        client_rtp: SocketAddr,
        client_ports: (u16, u16),
    },
    Tcp {
        /// Interleaved RTP and RTCP channels.
        channels: (u8, u8),
    },
}

/// Receives every RTP packet of a recording session with its media index.
pub type PacketHandler = Arc<dyn Fn(usize, RtpPacket) + Send + Sync>;

#[derive(Default)]
struct TimeDecoder {
    prev: Option<u32>,
    pts: i64,
}

impl TimeDecoder {
    /// Presentation timestamp of an RTP timestamp, relative to the first
    /// packet of the track.
    fn decode(&mut self, timestamp: u32) -> i64 {
        if let Some(prev) = self.prev {
            self.pts += i64::from(timestamp.wrapping_sub(prev) as i32);
        }
        self.prev = Some(timestamp);
        self.pts
    }
}

struct SessionInner {
    state: SessionState,
    path_name: String,
    desc: Option<SessionDescription>,
    path: Option<Path>,
    stream: Option<Arc<Stream>>,
    setups: BTreeMap<usize, SetupTransport>,
}

/// A single publish session.
pub struct Session {
    /// Unique session identifier (16-char hex string).
    pub id: String,
    pub author: Author,
    /// Control connection that created the session.
    pub peer: SocketAddr,
    /// Session timeout in seconds (included in the `Session` response header).
    pub timeout_secs: u64,
    inner: Mutex<SessionInner>,
    on_packet: RwLock<Option<PacketHandler>>,
}

impl Session {
    pub fn new(peer: SocketAddr) -> Self {
        let id = SESSION_COUNTER.fetch_add(1, Ordering::SeqCst);
        let session = Session {
            id: format!("{:016X}", id),
            author: Author::next(),
            peer,
            timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            inner: Mutex::new(SessionInner {
                state: SessionState::Initial,
                path_name: String::new(),
                desc: None,
                path: None,
                stream: None,
                setups: BTreeMap::new(),
            }),
            on_packet: RwLock::new(None),
        };
        tracing::info!(session_id = %session.id, %peer, "session created");
        session
    }

    /// Format the `Session` response header value per RFC 2326 §12.37.
    ///
    /// Example: `"0000000000000001;timeout=60"`
    pub fn session_header_value(&self) -> String {
        format!("{};timeout={}", self.id, self.timeout_secs)
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Name of the path the session announced, empty before ANNOUNCE.
    pub fn path_name(&self) -> String {
        self.inner.lock().path_name.clone()
    }

    /// Stream the session publishes to, once recording.
    pub fn stream(&self) -> Option<Arc<Stream>> {
        self.inner.lock().stream.clone()
    }

    /// Whether the session records with at least one media over UDP.
    pub fn is_recording_udp(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == SessionState::Record
            && inner
                .setups
                .values()
                .any(|s| matches!(s, SetupTransport::Udp { .. }))
    }

    /// Hand a received RTP packet to the recording callback. Packets
    /// arriving before RECORD are discarded.
    pub fn deliver_rtp(&self, media: usize, pkt: RtpPacket) {
        let handler = self.on_packet.read().clone();
        if let Some(handler) = handler {
            handler(media, pkt);
        }
    }

    /// Parse the announced description and bind this session's author to
    /// the path.
    pub async fn on_announce(
        &self,
        path_manager: &PathManager,
        request: &RtspRequest,
    ) -> Result<(), RtspResponse> {
        if self.state() != SessionState::Initial {
            return Err(RtspResponse::method_not_valid_in_this_state());
        }

        let (path, query) = request.path_and_query();
        let Some(name) = path.strip_prefix('/') else {
            tracing::warn!(session_id = %self.id, uri = %request.uri, "invalid path");
            return Err(RtspResponse::bad_request());
        };

        let desc = std::str::from_utf8(&request.body)
            .map_err(|_| Error::Sdp("body is not UTF-8".into()))
            .and_then(sdp::parse)
            .map_err(|e| {
                tracing::warn!(session_id = %self.id, error = %e, "invalid ANNOUNCE body");
                RtspResponse::bad_request()
            })?;

        let path = path_manager
            .add_publisher(AddPublisherReq {
                author: self.author,
                access_request: PathAccessRequest {
                    name: name.to_string(),
                    query: query.to_string(),
                    publish: true,
                },
            })
            .await
            .map_err(|e| {
                tracing::warn!(session_id = %self.id, path = name, error = %e, "publish rejected");
                match e {
                    Error::Terminated => RtspResponse::internal_server_error(),
                    _ => RtspResponse::bad_request(),
                }
            })?;

        tracing::info!(
            session_id = %self.id,
            path = name,
            "is announcing, {}",
            desc.medias_info()
        );

        let mut inner = self.inner.lock();
        inner.state = SessionState::PreRecord;
        inner.path_name = name.to_string();
        inner.desc = Some(desc);
        inner.path = Some(path);
        Ok(())
    }

    /// Negotiate the transport of one announced media.
    pub fn on_setup(
        &self,
        request: &RtspRequest,
        transports: &RtspTransports,
    ) -> Result<(usize, SetupTransport), RtspResponse> {
        let mut inner = self.inner.lock();

        if inner.state != SessionState::PreRecord {
            return Err(RtspResponse::method_not_valid_in_this_state());
        }

        let th = request
            .get_header("Transport")
            .and_then(TransportHeader::parse)
            .ok_or_else(|| {
                tracing::warn!(session_id = %self.id, "SETUP with missing or invalid Transport header");
                RtspResponse::bad_request()
            })?;

        if th.mode == Some(TransportMode::Play) {
            return Err(RtspResponse::bad_request());
        }

        let requested = th.rtsp_transport();
        if requested == RtspTransport::UdpMulticast || !transports.contains(requested) {
            tracing::warn!(session_id = %self.id, transport = %requested, "transport not accepted");
            return Err(RtspResponse::unsupported_transport());
        }

        let media = {
            let desc = inner.desc.as_ref().ok_or_else(RtspResponse::bad_request)?;
            let (path, _) = request.path_and_query();
            find_media(desc, &inner.path_name, path).ok_or_else(|| {
                tracing::warn!(session_id = %self.id, uri = %request.uri, "media not found");
                RtspResponse::not_found()
            })?
        };

        if inner.setups.contains_key(&media) {
            return Err(RtspResponse::method_not_valid_in_this_state());
        }

        let setup = match th.protocol {
            TransportProtocol::Tcp => {
                let channels = th.interleaved.ok_or_else(RtspResponse::bad_request)?;
                let taken = inner.setups.values().any(|s| {
                    matches!(s, SetupTransport::Tcp { channels: c } if c.0 == channels.0)
                });
                if taken || channels.0 % 2 != 0 {
                    return Err(RtspResponse::bad_request());
                }
                SetupTransport::Tcp { channels }
            }
            TransportProtocol::Udp => {
                let client_ports = th.client_ports.ok_or_else(RtspResponse::bad_request)?;
                SetupTransport::Udp {
                    client_rtp: SocketAddr::new(self.peer.ip(), client_ports.0),
                    client_ports,
                }
            }
        };

        inner.setups.insert(media, setup);
        tracing::debug!(session_id = %self.id, media, transport = %requested, "media set up");
        Ok((media, setup))
    }

    /// Make the path ready and start forwarding packets to its stream.
    pub async fn on_record(&self) -> Result<(), RtspResponse> {
        let (path, desc) = {
            let inner = self.inner.lock();
            if inner.state != SessionState::PreRecord {
                return Err(RtspResponse::method_not_valid_in_this_state());
            }
            let (Some(path), Some(desc)) = (inner.path.clone(), inner.desc.clone()) else {
                return Err(RtspResponse::method_not_valid_in_this_state());
            };
            if inner.setups.len() != desc.medias.len() {
                tracing::warn!(session_id = %self.id, "not all announced medias have been set up");
                return Err(RtspResponse::method_not_valid_in_this_state());
            }
            (path, desc)
        };

        let stream = path
            .start_publisher(StartPublisherReq {
                author: self.author,
                desc,
                generate_rtp_packets: false,
            })
            .await
            .map_err(|e| {
                tracing::warn!(session_id = %self.id, path = %path.name(), error = %e, "record rejected");
                match e {
                    Error::Terminated => RtspResponse::internal_server_error(),
                    _ => RtspResponse::bad_request(),
                }
            })?;

        *self.on_packet.write() = Some(self.packet_handler(stream.clone()));

        let mut inner = self.inner.lock();
        inner.stream = Some(stream);
        inner.state = SessionState::Record;
        tracing::info!(session_id = %self.id, path = %path.name(), "is recording");
        Ok(())
    }

    fn packet_handler(&self, stream: Arc<Stream>) -> PacketHandler {
        let session_id = self.id.clone();
        let decoders: Mutex<HashMap<(usize, u8), TimeDecoder>> = Mutex::new(HashMap::new());

        Arc::new(move |media, pkt: RtpPacket| {
            let payload_type = pkt.header.payload_type;
            let pts = decoders
                .lock()
                .entry((media, payload_type))
                .or_default()
                .decode(pkt.header.timestamp);

            if let Err(e) = stream.write_rtp_packet(media, payload_type, pkt, SystemTime::now(), pts) {
                tracing::warn!(session_id = %session_id, media, payload_type, error = %e, "RTP packet discarded");
            }
        })
    }

    /// Release the path binding. Safe to call more than once.
    pub async fn on_close(&self, reason: &str) {
        self.on_packet.write().take();

        let path = {
            let mut inner = self.inner.lock();
            inner.stream = None;
            inner.setups.clear();
            inner.state = SessionState::Initial;
            inner.path.take()
        };

        if let Some(path) = path {
            // the path may already be gone with the whole manager
            let _ = path
                .remove_publisher(RemovePublisherReq {
                    author: self.author,
                })
                .await;
        }

        tracing::info!(session_id = %self.id, reason, "session destroyed");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("state", &self.state())
            .finish()
    }
}

/// Index of the media a SETUP request URL refers to.
///
/// Controls may be absolute URLs, relative to the announced path, or absent
/// for single-media sessions.
fn find_media(desc: &SessionDescription, path_name: &str, setup_path: &str) -> Option<usize> {
    let setup_path = setup_path.trim_start_matches('/').trim_end_matches('/');

    let exact = desc.medias.iter().position(|media| {
        let control = media.control.as_str();
        if control.starts_with("rtsp://") || control.starts_with("rtsps://") {
            split_uri(control).0.trim_start_matches('/') == setup_path
        } else if control.is_empty() || control == "*" {
            setup_path == path_name
        } else {
            setup_path == format!("{path_name}/{control}")
        }
    });

    exact.or_else(|| {
        desc.medias.iter().position(|media| {
            let control = media.control.as_str();
            !control.is_empty()
                && !control.contains("://")
                && setup_path.ends_with(&format!("/{control}"))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Format, H264Format, Media, MediaType};

    fn desc(controls: &[&str]) -> SessionDescription {
        SessionDescription {
            title: String::new(),
            medias: controls
                .iter()
                .map(|c| Media {
                    media_type: MediaType::Video,
                    control: c.to_string(),
                    formats: vec![Format::H264(H264Format::new(96))],
                })
                .collect(),
        }
    }

    #[test]
    fn time_decoder_handles_wraparound() {
        let mut d = TimeDecoder::default();
        assert_eq!(d.decode(u32::MAX - 1000), 0);
        assert_eq!(d.decode(u32::MAX), 1000);
        assert_eq!(d.decode(2999), 4000);
        // reordered packet
        assert_eq!(d.decode(1999), 3000);
    }

    #[test]
    fn media_matched_by_control() {
        let d = desc(&["trackID=0", "trackID=1"]);
        assert_eq!(find_media(&d, "cam", "/cam/trackID=0"), Some(0));
        assert_eq!(find_media(&d, "cam", "/cam/trackID=1/"), Some(1));
        assert_eq!(find_media(&d, "cam", "/cam/trackID=2"), None);
        // client that appended the control to a different base
        assert_eq!(find_media(&d, "cam", "/other/trackID=1"), Some(1));

        let d = desc(&["rtsp://10.0.0.1:8554/live/cam/video"]);
        assert_eq!(find_media(&d, "live/cam", "/live/cam/video"), Some(0));

        let d = desc(&[""]);
        assert_eq!(find_media(&d, "cam", "/cam"), Some(0));
    }

    #[test]
    fn session_ids_are_unique() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let a = Session::new(peer);
        let b = Session::new(peer);
        assert_ne!(a.id, b.id);
        assert_ne!(a.author, b.author);
        assert_eq!(a.id.len(), 16);
        assert!(a.session_header_value().ends_with(";timeout=60"));
        assert_eq!(a.state(), SessionState::Initial);
    }

    #[test]
    fn setup_requires_announce() {
        let session = Session::new("127.0.0.1:5000".parse().unwrap());
        let req = RtspRequest::parse(
            "SETUP rtsp://localhost/cam/trackID=0 RTSP/1.0\r\nTransport: RTP/AVP/TCP;interleaved=0-1\r\n\r\n",
        )
        .unwrap();
        let err = session
            .on_setup(&req, &RtspTransports::default())
            .unwrap_err();
        assert_eq!(err.status_code, 455);
    }
}
