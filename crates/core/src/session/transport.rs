use crate::conf::RtspTransport;

/// Lower transport of an RTP/AVP profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProtocol {
    Udp,
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Unicast,
    Multicast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Play,
    Record,
}

/// Parsed client-side `Transport` header (RFC 2326 §12.39).
///
/// ## Wire format examples
///
/// ```text
/// RTP/AVP;unicast;client_port=8000-8001;mode=record
/// RTP/AVP/TCP;unicast;interleaved=0-1;mode=record
/// ```
///
/// When the client lists several alternatives separated by commas, the
/// first one is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportHeader {
    pub protocol: TransportProtocol,
    pub delivery: Option<Delivery>,
    /// Client's RTP and RTCP ports.
    pub client_ports: Option<(u16, u16)>,
    /// Interleaved RTP and RTCP channels.
    pub interleaved: Option<(u8, u8)>,
    pub mode: Option<TransportMode>,
}

impl TransportHeader {
    /// Parse the `Transport` header value.
    ///
    /// ## Examples
    ///
    /// ```
    /// use ingest::session::transport::{TransportHeader, TransportProtocol};
    ///
    /// let th = TransportHeader::parse("RTP/AVP;unicast;client_port=8000-8001").unwrap();
    /// assert_eq!(th.protocol, TransportProtocol::Udp);
    /// assert_eq!(th.client_ports, Some((8000, 8001)));
    ///
    /// assert!(TransportHeader::parse("RAW/RAW/UDP;unicast").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        let first = header.split(',').next()?;
        let mut parts = first.split(';').map(str::trim);

        let protocol = match parts.next()? {
            "RTP/AVP" | "RTP/AVP/UDP" => TransportProtocol::Udp,
            "RTP/AVP/TCP" => TransportProtocol::Tcp,
            _ => return None,
        };

        let mut th = TransportHeader {
            protocol,
            delivery: None,
            client_ports: None,
            interleaved: None,
            mode: None,
        };

        for part in parts {
            if part.eq_ignore_ascii_case("unicast") {
                th.delivery = Some(Delivery::Unicast);
            } else if part.eq_ignore_ascii_case("multicast") {
                th.delivery = Some(Delivery::Multicast);
            } else if let Some(ports) = part.strip_prefix("client_port=") {
                th.client_ports = Some(parse_pair(ports)?);
            } else if let Some(channels) = part.strip_prefix("interleaved=") {
                let (rtp, rtcp) = parse_pair(channels)?;
                th.interleaved = Some((u8::try_from(rtp).ok()?, u8::try_from(rtcp).ok()?));
            } else if let Some(mode) = part.strip_prefix("mode=") {
                let mode = mode.trim_matches('"');
                th.mode = if mode.eq_ignore_ascii_case("record") || mode.eq_ignore_ascii_case("receive") {
                    Some(TransportMode::Record)
                } else if mode.eq_ignore_ascii_case("play") {
                    Some(TransportMode::Play)
                } else {
                    return None;
                };
            }
        }

        Some(th)
    }

    /// Transport as configured in [`Config::transports`](crate::conf::Config::transports).
    pub fn rtsp_transport(&self) -> RtspTransport {
        match (self.protocol, self.delivery) {
            (TransportProtocol::Tcp, _) => RtspTransport::Tcp,
            (TransportProtocol::Udp, Some(Delivery::Multicast)) => RtspTransport::UdpMulticast,
            (TransportProtocol::Udp, _) => RtspTransport::Udp,
        }
    }
}

/// `a-b`, or `a` alone meaning `a-(a+1)`.
fn parse_pair(value: &str) -> Option<(u16, u16)> {
    match value.split_once('-') {
        Some((a, b)) => Some((a.trim().parse().ok()?, b.trim().parse().ok()?)),
        None => {
            let a: u16 = value.trim().parse().ok()?;
            Some((a, a.checked_add(1)?))
        }
    }
}
