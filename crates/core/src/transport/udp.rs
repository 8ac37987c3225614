use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::media::RtpPacket;
use crate::server::ServerShared;

/// Largest datagram read from the socket.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// UDP transport for inbound RTP.
///
/// A single socket receives the RTP of every publisher that set up a media
/// over UDP. Datagrams are routed to sessions by source address, as
/// registered during SETUP; anything else is dropped.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub async fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    pub(crate) async fn receive_loop(self, shared: Arc<ServerShared>, ctx: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (n, from) = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok(received) => received,
                    Err(e) => {
                        tracing::warn!(error = %e, "UDP receive error");
                        continue;
                    }
                },
            };

            let Some((session, media)) = shared.udp_route(&from) else {
                tracing::trace!(%from, "UDP packet from unknown source");
                continue;
            };

            match RtpPacket::parse(Bytes::copy_from_slice(&buf[..n])) {
                Ok(pkt) => session.deliver_rtp(media, pkt),
                Err(e) => {
                    tracing::debug!(session_id = %session.id, %from, error = %e, "invalid RTP packet")
                }
            }
        }

        tracing::debug!("UDP receive loop exited");
    }
}
