use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::conf::{Config, RtspTransport};
use crate::error::{Error, Result};
use crate::path_manager::PathManager;
use crate::session::{Session, SessionState};
use crate::transport::UdpTransport;
use crate::transport::tcp;

/// State shared by the listener, the connections and the UDP receiver.
pub(crate) struct ServerShared {
    pub(crate) conf: Arc<Config>,
    pub(crate) path_manager: PathManager,
    /// Local port of the UDP RTP socket, when UDP is accepted.
    pub(crate) udp_rtp_port: Option<u16>,
    conns: Mutex<HashMap<SocketAddr, Instant>>,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    udp_routes: Mutex<HashMap<SocketAddr, (Arc<Session>, usize)>>,
}

impl ServerShared {
    pub(crate) fn add_conn(&self, peer: SocketAddr) {
        self.conns.lock().insert(peer, Instant::now());
    }

    pub(crate) fn remove_conn(&self, peer: &SocketAddr) -> Option<Instant> {
        self.conns.lock().remove(peer)
    }

    pub(crate) fn add_session(&self, session: Arc<Session>) {
        let mut sessions = self.sessions.lock();
        sessions.insert(session.id.clone(), session);
        tracing::debug!(total_sessions = sessions.len(), "session registered");
    }

    pub(crate) fn find_session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.lock().get(id).cloned()
    }

    /// Route RTP received over UDP from `client_rtp` to a session media.
    pub(crate) fn add_udp_route(&self, client_rtp: SocketAddr, session: Arc<Session>, media: usize) {
        let previous = self.udp_routes.lock().insert(client_rtp, (session, media));
        if let Some((other, _)) = previous {
            tracing::warn!(%client_rtp, session_id = %other.id, "UDP route taken over");
        }
    }

    pub(crate) fn udp_route(&self, addr: &SocketAddr) -> Option<(Arc<Session>, usize)> {
        self.udp_routes.lock().get(addr).cloned()
    }

    /// Unregister a session and release its path binding.
    pub(crate) async fn close_session(&self, session: &Arc<Session>, reason: &str) {
        let removed = self.sessions.lock().remove(&session.id);
        self.udp_routes
            .lock()
            .retain(|_, (s, _)| !Arc::ptr_eq(s, session));

        if removed.is_some() {
            session.on_close(reason).await;
        }
    }
}

/// Information about an open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: String,
    pub peer: SocketAddr,
    pub state: SessionState,
    pub path: String,
    /// Bytes received by the stream the session records to.
    pub bytes_received: u64,
}

/// Clears the starting flag however `start` ends.
struct StartGuard<'a>(&'a AtomicBool);

impl Drop for StartGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Running {
    shared: Arc<ServerShared>,
    ctx: CancellationToken,
    tracker: TaskTracker,
    local_addr: SocketAddr,
}

/// RTSP server accepting publishers.
///
/// Owns the RTSP listener, the UDP RTP socket and the bookkeeping of
/// connections and sessions. Delegates TCP connection handling to
/// [`transport::tcp`](crate::transport::tcp) and RTP reception over UDP to
/// [`UdpTransport`].
pub struct Server {
    conf: Arc<Config>,
    path_manager: PathManager,
    starting: AtomicBool,
    running: Mutex<Option<Running>>,
}

impl Server {
    pub fn new(conf: Arc<Config>, path_manager: PathManager) -> Self {
        Self {
            conf,
            path_manager,
            starting: AtomicBool::new(false),
            running: Mutex::new(None),
        }
    }

    /// Bind the listeners and start accepting connections.
    pub async fn start(&self) -> Result<()> {
        if self.starting.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyRunning);
        }
        let _guard = StartGuard(&self.starting);

        if self.running.lock().is_some() {
            return Err(Error::AlreadyRunning);
        }
        self.conf.validate()?;

        let listener = TcpListener::bind(&self.conf.rtsp_address).await?;
        let local_addr = listener.local_addr()?;

        let udp = if self.conf.transports.contains(RtspTransport::Udp) {
            Some(UdpTransport::bind(&self.conf.udp_rtp_address).await?)
        } else {
            None
        };

        let shared = Arc::new(ServerShared {
            conf: self.conf.clone(),
            path_manager: self.path_manager.clone(),
            udp_rtp_port: udp.as_ref().map(UdpTransport::local_port),
            conns: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            udp_routes: Mutex::new(HashMap::new()),
        });

        let ctx = CancellationToken::new();
        let tracker = TaskTracker::new();

        let mut running = self.running.lock();
        tracing::info!(
            addr = %local_addr,
            transports = %self.conf.transports,
            "RTSP listener opened"
        );

        if let Some(udp) = udp {
            tracing::info!(port = udp.local_port(), "UDP RTP listener opened");
            tracker.spawn(udp.receive_loop(shared.clone(), ctx.clone()));
        }
        tracker.spawn(tcp::accept_loop(
            listener,
            shared.clone(),
            ctx.clone(),
            tracker.clone(),
        ));

        *running = Some(Running {
            shared,
            ctx,
            tracker,
            local_addr,
        });
        Ok(())
    }

    /// Stop accepting, close every connection and wait for their sessions to
    /// be released.
    pub async fn close(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        tracing::info!("server stopping");
        running.ctx.cancel();
        running.tracker.close();
        running.tracker.wait().await;

        let leftover: Vec<Arc<Session>> = running.shared.sessions.lock().values().cloned().collect();
        for session in leftover {
            running.shared.close_session(&session, "server closed").await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Address of the RTSP listener while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.local_addr)
    }

    pub fn connection_count(&self) -> usize {
        self.running
            .lock()
            .as_ref()
            .map(|r| r.shared.conns.lock().len())
            .unwrap_or(0)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        let Some(shared) = self.running.lock().as_ref().map(|r| r.shared.clone()) else {
            return Vec::new();
        };
        let mut list: Vec<SessionInfo> = shared
            .sessions
            .lock()
            .values()
            .map(|s| SessionInfo {
                id: s.id.clone(),
                peer: s.peer,
                state: s.state(),
                path: s.path_name(),
                bytes_received: s.stream().map(|st| st.bytes_received()).unwrap_or(0),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Server {
        let conf = Arc::new(Config {
            rtsp_address: "127.0.0.1:0".into(),
            transports: "tcp".parse().unwrap(),
            ..Default::default()
        });
        Server::new(conf.clone(), PathManager::new(conf))
    }

    #[tokio::test]
    async fn concurrent_start_reports_already_running() {
        let server = server();

        let (a, b) = tokio::join!(server.start(), server.start());
        let errors: Vec<Error> = [a, b].into_iter().filter_map(|r| r.err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], Error::AlreadyRunning));
        assert!(server.is_running());

        assert!(matches!(server.start().await, Err(Error::AlreadyRunning)));

        server.close().await;
        assert!(!server.is_running());
        assert!(server.local_addr().is_none());

        // a closed server can be started again
        server.start().await.unwrap();
        assert!(server.local_addr().is_some());
        server.close().await;
    }
}
