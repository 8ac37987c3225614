use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;

use crate::media::RtpPacket;
use crate::protocol::request::RtspRequest;
use crate::protocol::response::RtspResponse;
use crate::server::ServerShared;
use crate::session::{Session, SetupTransport};

/// Handles RTSP method requests for a single TCP connection.
///
/// Tracks which sessions were created on this connection so they can be
/// closed when the connection drops, and which interleaved channels carry
/// RTP for which session media.
pub struct MethodHandler {
    server: Arc<ServerShared>,
    client_addr: SocketAddr,
    /// Sessions created during this connection, for cleanup on disconnect.
    sessions: Vec<Arc<Session>>,
    interleaved: HashMap<u8, (Arc<Session>, usize)>,
}

impl MethodHandler {
    pub(crate) fn new(server: Arc<ServerShared>, client_addr: SocketAddr) -> Self {
        MethodHandler {
            server,
            client_addr,
            sessions: Vec::new(),
            interleaved: HashMap::new(),
        }
    }

    /// Whether a session of this connection records over UDP, in which case
    /// the connection may legitimately stay idle.
    pub fn is_recording_udp(&self) -> bool {
        self.sessions.iter().any(|s| s.is_recording_udp())
    }

    pub async fn handle(&mut self, request: &RtspRequest) -> RtspResponse {
        let cseq = request.cseq().unwrap_or("0").to_string();

        let response = match request.method.as_str() {
            "OPTIONS" => self.handle_options(),
            "ANNOUNCE" => self.handle_announce(request).await,
            "SETUP" => self.handle_setup(request),
            "RECORD" => self.handle_record(request).await,
            "TEARDOWN" => self.handle_teardown(request).await,
            "GET_PARAMETER" => self.handle_get_parameter(request),
            "DESCRIBE" | "PLAY" | "PAUSE" => {
                tracing::debug!(method = %request.method, uri = %request.uri, "reading is not supported");
                RtspResponse::not_implemented()
            }
            _ => {
                tracing::warn!(method = %request.method, %cseq, "unsupported RTSP method");
                RtspResponse::not_implemented()
            }
        };

        response.add_header("CSeq", &cseq)
    }

    fn handle_options(&self) -> RtspResponse {
        tracing::debug!(peer = %self.client_addr, "OPTIONS");
        RtspResponse::ok().add_header(
            "Public",
            "OPTIONS, ANNOUNCE, SETUP, RECORD, TEARDOWN, GET_PARAMETER",
        )
    }

    fn find_session(&self, request: &RtspRequest) -> Option<Arc<Session>> {
        let id = request.session_id()?;
        self.server.find_session(id)
    }

    async fn handle_announce(&mut self, request: &RtspRequest) -> RtspResponse {
        let session = match request.session_id() {
            Some(id) => match self.server.find_session(id) {
                Some(session) => session,
                None => return RtspResponse::session_not_found(),
            },
            None => Arc::new(Session::new(self.client_addr)),
        };

        if let Err(response) = session
            .on_announce(&self.server.path_manager, request)
            .await
        {
            return response;
        }

        if !self.sessions.iter().any(|s| Arc::ptr_eq(s, &session)) {
            self.server.add_session(session.clone());
            self.sessions.push(session.clone());
        }

        RtspResponse::ok().add_header("Session", &session.session_header_value())
    }

    fn handle_setup(&mut self, request: &RtspRequest) -> RtspResponse {
        let Some(session) = self.find_session(request) else {
            tracing::warn!(uri = %request.uri, "SETUP without a valid session");
            return RtspResponse::session_not_found();
        };

        let (media, setup) = match session.on_setup(request, &self.server.conf.transports) {
            Ok(negotiated) => negotiated,
            Err(response) => return response,
        };

        let transport_response = match setup {
            SetupTransport::Tcp { channels } => {
                self.interleaved.insert(channels.0, (session.clone(), media));
                format!("RTP/AVP/TCP;unicast;interleaved={}-{}", channels.0, channels.1)
            }
            SetupTransport::Udp {
                client_rtp,
                client_ports,
            } => {
                let Some(server_port) = self.server.udp_rtp_port else {
                    return RtspResponse::unsupported_transport();
                };
                self.server.add_udp_route(client_rtp, session.clone(), media);
                format!(
                    "RTP/AVP;unicast;client_port={}-{};server_port={}-{}",
                    client_ports.0,
                    client_ports.1,
                    server_port,
                    server_port.wrapping_add(1)
                )
            }
        };

        tracing::info!(
            session_id = %session.id,
            media,
            transport = %transport_response,
            "media set up"
        );

        RtspResponse::ok()
            .add_header("Transport", &transport_response)
            .add_header("Session", &session.session_header_value())
    }

    async fn handle_record(&mut self, request: &RtspRequest) -> RtspResponse {
        let Some(session) = self.find_session(request) else {
            tracing::warn!(uri = %request.uri, "RECORD without a valid session");
            return RtspResponse::session_not_found();
        };

        match session.on_record().await {
            Ok(()) => RtspResponse::ok().add_header("Session", &session.session_header_value()),
            Err(response) => response,
        }
    }

    async fn handle_teardown(&mut self, request: &RtspRequest) -> RtspResponse {
        let Some(session) = self.find_session(request) else {
            tracing::warn!(uri = %request.uri, "TEARDOWN for unknown session");
            return RtspResponse::session_not_found();
        };

        self.forget(&session);
        self.server.close_session(&session, "teardown").await;
        RtspResponse::ok()
    }

    /// GET_PARAMETER is used by clients as a keepalive (RFC 2326 §10.8).
    fn handle_get_parameter(&self, request: &RtspRequest) -> RtspResponse {
        tracing::trace!(peer = %self.client_addr, "GET_PARAMETER keepalive");

        let mut resp = RtspResponse::ok();
        if let Some(session) = self.find_session(request) {
            resp = resp.add_header("Session", &session.session_header_value());
        }
        resp
    }

    /// Route an interleaved frame. Odd channels carry RTCP, which is ignored.
    pub fn handle_interleaved(&self, channel: u8, data: Bytes) {
        if channel % 2 != 0 {
            return;
        }

        let Some((session, media)) = self.interleaved.get(&channel) else {
            tracing::trace!(channel, "frame on a channel that was not set up");
            return;
        };

        match RtpPacket::parse(data) {
            Ok(pkt) => session.deliver_rtp(*media, pkt),
            Err(e) => {
                tracing::debug!(session_id = %session.id, channel, error = %e, "invalid RTP packet")
            }
        }
    }

    fn forget(&mut self, session: &Arc<Session>) {
        self.sessions.retain(|s| !Arc::ptr_eq(s, session));
        self.interleaved
            .retain(|_, (s, _)| !Arc::ptr_eq(s, session));
    }

    /// Close the sessions owned by this connection.
    pub async fn close(&mut self, reason: &str) {
        self.interleaved.clear();
        let sessions: Vec<Arc<Session>> = self.sessions.drain(..).collect();
        if !sessions.is_empty() {
            tracing::info!(peer = %self.client_addr, count = sessions.len(), "closing sessions on disconnect");
        }
        for session in sessions {
            self.server.close_session(&session, reason).await;
        }
    }
}
