//! Path actor: one named stream and its publisher binding.

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::conf::Config;
use crate::defs::{AddPublisherReq, Author, PathState, RemovePublisherReq, StartPublisherReq};
use crate::error::{Error, Result};
use crate::path_manager::PathParent;
use crate::stream::Stream;

const REQUEST_QUEUE_SIZE: usize = 16;

enum PathRequest {
    AddPublisher {
        req: AddPublisherReq,
        res: oneshot::Sender<Path>,
    },
    StartPublisher {
        req: StartPublisherReq,
        res: oneshot::Sender<Result<Arc<Stream>>>,
    },
    RemovePublisher {
        req: RemovePublisherReq,
        res: oneshot::Sender<()>,
    },
    State {
        res: oneshot::Sender<PathState>,
    },
}

struct PathInner {
    name: String,
    tx: mpsc::Sender<PathRequest>,
    /// Cancelled once the loop has left the registry; callers watch this one.
    ctx: CancellationToken,
    /// Stops the loop.
    terminate: CancellationToken,
    done: CancellationToken,
}

/// Handle to a path actor.
///
/// Handles are cheap to clone; two handles are equal when they refer to the
/// same actor.
#[derive(Clone)]
pub struct Path {
    inner: Arc<PathInner>,
}

impl Path {
    pub(crate) fn spawn(
        name: String,
        conf: Arc<Config>,
        parent_ctx: &CancellationToken,
        parent: PathParent,
    ) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let ctx = parent_ctx.child_token();
        let terminate = ctx.child_token();

        let path = Self {
            inner: Arc::new(PathInner {
                name,
                tx,
                ctx,
                terminate,
                done: CancellationToken::new(),
            }),
        };

        let actor = PathActor {
            path: path.clone(),
            conf,
            parent,
            rx,
            publisher: None,
            query: String::new(),
            stream: None,
            stream_author: None,
            ready_time: None,
        };
        tokio::spawn(actor.run());

        path
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the actor loop has fully exited.
    pub fn is_closed(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// Stop the actor and wait for its loop to exit.
    pub async fn close(&self) {
        self.inner.terminate.cancel();
        self.inner.done.cancelled().await;
    }

    pub(crate) async fn wait_closed(&self) {
        self.inner.done.cancelled().await;
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> PathRequest) -> Result<T> {
        let (res_tx, res_rx) = oneshot::channel();
        tokio::select! {
            biased;
            _ = self.inner.ctx.cancelled() => return Err(Error::Terminated),
            sent = self.inner.tx.send(make(res_tx)) => sent.map_err(|_| Error::Terminated)?,
        }
        res_rx.await.map_err(|_| Error::Terminated)
    }

    /// Bind a publisher, replacing any previous binding.
    pub async fn add_publisher(&self, req: AddPublisherReq) -> Result<Path> {
        self.request(|res| PathRequest::AddPublisher { req, res }).await
    }

    /// Make the path ready with the publisher's media.
    ///
    /// Fails with [`Error::PublisherNotAssigned`] when another publisher has
    /// been bound since `req.author` was.
    pub async fn start_publisher(&self, req: StartPublisherReq) -> Result<Arc<Stream>> {
        self.request(|res| PathRequest::StartPublisher { req, res })
            .await?
    }

    /// Unbind a publisher and tear down the stream it started, if any. Has no
    /// effect for an author that is neither bound nor publishing.
    pub async fn remove_publisher(&self, req: RemovePublisherReq) -> Result<()> {
        self.request(|res| PathRequest::RemovePublisher { req, res })
            .await
    }

    pub async fn state(&self) -> Result<PathState> {
        self.request(|res| PathRequest::State { res }).await
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Path {}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("name", &self.inner.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct PathActor {
    path: Path,
    conf: Arc<Config>,
    parent: PathParent,
    rx: mpsc::Receiver<PathRequest>,
    publisher: Option<Author>,
    query: String,
    stream: Option<Arc<Stream>>,
    /// Publisher that started `stream`; may differ from `publisher` after a
    /// takeover.
    stream_author: Option<Author>,
    ready_time: Option<SystemTime>,
}

impl PathActor {
    async fn run(mut self) {
        let name = self.path.inner.name.clone();
        let terminate = self.path.inner.terminate.clone();
        tracing::debug!(path = %name, "created");

        loop {
            tokio::select! {
                biased;
                _ = terminate.cancelled() => break,
                Some(req) = self.rx.recv() => self.handle(req).await,
            }
        }

        // queued requests are dropped, their callers get Terminated
        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        self.stream = None;
        self.parent.close_path(&self.path).await;
        self.path.inner.ctx.cancel();

        tracing::debug!(path = %name, "destroyed");
        self.path.inner.done.cancel();
    }

    async fn handle(&mut self, req: PathRequest) {
        match req {
            PathRequest::AddPublisher { req, res } => {
                self.publisher = Some(req.author);
                self.query = req.access_request.query;
                tracing::debug!(path = %self.path.name(), author = ?req.author, "publisher bound");
                let _ = res.send(self.path.clone());
            }
            PathRequest::StartPublisher { req, res } => {
                let result = self.start_publisher(req).await;
                let _ = res.send(result);
            }
            PathRequest::RemovePublisher { req, res } => {
                self.remove_publisher(req).await;
                let _ = res.send(());
            }
            PathRequest::State { res } => {
                let _ = res.send(PathState {
                    publisher: self.publisher,
                    query: self.query.clone(),
                    ready: self.stream.is_some(),
                    ready_time: self.ready_time,
                });
            }
        }
    }

    async fn start_publisher(&mut self, req: StartPublisherReq) -> Result<Arc<Stream>> {
        if self.publisher != Some(req.author) {
            return Err(Error::PublisherNotAssigned);
        }

        let medias_info = req.desc.medias_info();
        let stream = Arc::new(Stream::new(
            req.desc,
            self.conf.udp_max_payload_size,
            req.generate_rtp_packets,
            self.conf.write_queue_size,
        )?);

        self.stream = Some(stream.clone());
        self.stream_author = Some(req.author);
        self.ready_time = Some(SystemTime::now());
        self.parent.path_ready(&self.path).await;

        tracing::info!(path = %self.path.name(), "publisher is publishing to path, {medias_info}");
        Ok(stream)
    }

    async fn remove_publisher(&mut self, req: RemovePublisherReq) {
        if self.publisher == Some(req.author) {
            self.publisher = None;
            self.query.clear();
        }

        // the stream belongs to whoever started it, even once the binding moved on
        if self.stream_author == Some(req.author) {
            self.stream_author = None;
            self.stream = None;
            self.ready_time = None;
            self.parent.path_not_ready(&self.path).await;
            tracing::info!(path = %self.path.name(), "publisher stopped publishing");
        }
    }
}
