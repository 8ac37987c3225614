use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// RTP transport a publisher may negotiate in SETUP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RtspTransport {
    Udp,
    UdpMulticast,
    Tcp,
}

impl fmt::Display for RtspTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => write!(f, "udp"),
            Self::UdpMulticast => write!(f, "multicast"),
            Self::Tcp => write!(f, "tcp"),
        }
    }
}

impl FromStr for RtspTransport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(Self::Udp),
            "multicast" => Ok(Self::UdpMulticast),
            "tcp" => Ok(Self::Tcp),
            other => Err(Error::Config(format!("invalid RTSP transport '{other}'"))),
        }
    }
}

/// Set of accepted RTP transports, e.g. `udp,tcp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspTransports(BTreeSet<RtspTransport>);

impl RtspTransports {
    pub fn contains(&self, transport: RtspTransport) -> bool {
        self.0.contains(&transport)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RtspTransport> + '_ {
        self.0.iter().copied()
    }
}

impl Default for RtspTransports {
    fn default() -> Self {
        Self([RtspTransport::Udp, RtspTransport::Tcp].into_iter().collect())
    }
}

impl FromIterator<RtspTransport> for RtspTransports {
    fn from_iter<I: IntoIterator<Item = RtspTransport>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for RtspTransports {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for RtspTransports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", names.join(","))
    }
}

/// Server configuration.
///
/// Only the values the ingestion core consumes; reading them from a file or
/// the command line is up to the embedding binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address of the RTSP TCP listener.
    pub rtsp_address: String,
    /// Address of the UDP socket receiving RTP from publishers.
    pub udp_rtp_address: String,
    /// Maximum time to wait for the next request on a control connection.
    pub read_timeout: Duration,
    /// Maximum time to write a response.
    pub write_timeout: Duration,
    /// Capacity of each stream reader's queue.
    pub write_queue_size: usize,
    /// Maximum size of an RTP packet, header included.
    pub udp_max_payload_size: usize,
    /// Transports publishers are allowed to use.
    pub transports: RtspTransports,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rtsp_address: "0.0.0.0:8554".to_string(),
            udp_rtp_address: "0.0.0.0:8000".to_string(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            write_queue_size: 512,
            udp_max_payload_size: 1472,
            transports: RtspTransports::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.transports.is_empty() {
            return Err(Error::Config("at least one RTSP transport is required".into()));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(Error::Config("timeouts must be greater than zero".into()));
        }
        if self.write_queue_size == 0 || !self.write_queue_size.is_power_of_two() {
            return Err(Error::Config(format!(
                "write queue size must be a power of two, got {}",
                self.write_queue_size
            )));
        }
        if self.udp_max_payload_size > 1472 {
            return Err(Error::Config(format!(
                "UDP max payload size can't be greater than 1472, got {}",
                self.udp_max_payload_size
            )));
        }
        if self.udp_max_payload_size <= 14 {
            return Err(Error::Config(format!(
                "UDP max payload size is too small, got {}",
                self.udp_max_payload_size
            )));
        }
        Ok(())
    }
}
