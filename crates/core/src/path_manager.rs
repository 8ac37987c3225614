//! Path registry actor.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::conf::Config;
use crate::defs::{AddPublisherReq, PathInfo};
use crate::error::{Error, Result};
use crate::path::Path;

const REQUEST_QUEUE_SIZE: usize = 64;

enum ManagerRequest {
    AddPublisher {
        name: String,
        res: oneshot::Sender<Result<Path>>,
    },
    ClosePath {
        path: Path,
    },
    PathReady {
        path: Path,
    },
    PathNotReady {
        path: Path,
    },
    ListPaths {
        res: oneshot::Sender<Vec<PathInfo>>,
    },
}

/// Check a path name: non-empty, made of `[0-9A-Za-z_-/.~:]`, no leading or
/// trailing slash and no empty segment.
pub fn validate_path_name(name: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidPathName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("cannot be empty"));
    }
    if name.starts_with('/') {
        return Err(invalid("can't begin with a slash"));
    }
    if name.ends_with('/') {
        return Err(invalid("can't end with a slash"));
    }
    if name.contains("//") {
        return Err(invalid("can't contain consecutive slashes"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/' | '.' | '~' | ':'))
    {
        return Err(invalid("can contain only alphanumeric characters, underscore, dot, tilde, minus, colon or slash"));
    }
    Ok(())
}

/// Channel from a path actor back to the manager.
#[derive(Clone)]
pub(crate) struct PathParent {
    tx: mpsc::Sender<ManagerRequest>,
    ctx: CancellationToken,
}

impl PathParent {
    async fn notify(&self, req: ManagerRequest) {
        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => {}
            _ = self.tx.send(req) => {}
        }
    }

    pub(crate) async fn close_path(&self, path: &Path) {
        self.notify(ManagerRequest::ClosePath { path: path.clone() })
            .await;
    }

    pub(crate) async fn path_ready(&self, path: &Path) {
        self.notify(ManagerRequest::PathReady { path: path.clone() })
            .await;
    }

    pub(crate) async fn path_not_ready(&self, path: &Path) {
        self.notify(ManagerRequest::PathNotReady { path: path.clone() })
            .await;
    }
}

/// Handle to the path registry.
///
/// Single entry point for publish intents: paths are created on demand the
/// first time a publisher announces a name, and live until the manager is
/// closed or they close themselves.
#[derive(Clone)]
pub struct PathManager {
    tx: mpsc::Sender<ManagerRequest>,
    ctx: CancellationToken,
    done: CancellationToken,
}

impl PathManager {
    /// Start the registry loop. Must be called within a tokio runtime.
    pub fn new(conf: Arc<Config>) -> Self {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE_SIZE);
        let ctx = CancellationToken::new();
        let done = CancellationToken::new();

        let actor = ManagerActor {
            conf,
            ctx: ctx.clone(),
            done: done.clone(),
            parent: PathParent {
                tx: tx.clone(),
                ctx: ctx.clone(),
            },
            rx,
            paths: HashMap::new(),
        };
        tokio::spawn(actor.run());

        Self { tx, ctx, done }
    }

    /// Stop the registry and every path, waiting for all of them to exit.
    pub async fn close(&self) {
        self.ctx.cancel();
        self.done.cancelled().await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ManagerRequest,
    ) -> Result<T> {
        let (res_tx, res_rx) = oneshot::channel();
        tokio::select! {
            biased;
            _ = self.ctx.cancelled() => return Err(Error::Terminated),
            sent = self.tx.send(make(res_tx)) => sent.map_err(|_| Error::Terminated)?,
        }
        res_rx.await.map_err(|_| Error::Terminated)
    }

    /// Bind a publisher to the path named in `req`, creating the path if
    /// needed.
    pub async fn add_publisher(&self, req: AddPublisherReq) -> Result<Path> {
        let name = req.access_request.name.clone();
        let path = self
            .request(|res| ManagerRequest::AddPublisher { name, res })
            .await??;
        path.add_publisher(req).await
    }

    /// Registered paths, sorted by name.
    pub async fn list_paths(&self) -> Result<Vec<PathInfo>> {
        self.request(|res| ManagerRequest::ListPaths { res }).await
    }
}

struct PathEntry {
    path: Path,
    ready: bool,
}

struct ManagerActor {
    conf: Arc<Config>,
    ctx: CancellationToken,
    done: CancellationToken,
    parent: PathParent,
    rx: mpsc::Receiver<ManagerRequest>,
    paths: HashMap<String, PathEntry>,
}

impl ManagerActor {
    async fn run(mut self) {
        let ctx = self.ctx.clone();

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                Some(req) = self.rx.recv() => self.handle(req),
            }
        }

        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        // path contexts are children of ours, so every loop is already stopping
        for entry in self.paths.values() {
            entry.path.wait_closed().await;
        }
        self.paths.clear();

        tracing::debug!("path manager closed");
        self.done.cancel();
    }

    fn handle(&mut self, req: ManagerRequest) {
        match req {
            ManagerRequest::AddPublisher { name, res } => {
                let _ = res.send(self.find_or_create(name));
            }
            ManagerRequest::ClosePath { path } => {
                if self.is_registered(&path) {
                    self.paths.remove(path.name());
                }
            }
            ManagerRequest::PathReady { path } => {
                if let Some(entry) = self.registered_entry(&path) {
                    entry.ready = true;
                }
            }
            ManagerRequest::PathNotReady { path } => {
                if let Some(entry) = self.registered_entry(&path) {
                    entry.ready = false;
                }
            }
            ManagerRequest::ListPaths { res } => {
                let mut list: Vec<PathInfo> = self
                    .paths
                    .iter()
                    .map(|(name, entry)| PathInfo {
                        name: name.clone(),
                        ready: entry.ready,
                    })
                    .collect();
                list.sort_by(|a, b| a.name.cmp(&b.name));
                let _ = res.send(list);
            }
        }
    }

    fn find_or_create(&mut self, name: String) -> Result<Path> {
        validate_path_name(&name)?;

        match self.paths.entry(name) {
            Entry::Occupied(entry) => Ok(entry.get().path.clone()),
            Entry::Vacant(entry) => {
                let path = Path::spawn(
                    entry.key().clone(),
                    self.conf.clone(),
                    &self.ctx,
                    self.parent.clone(),
                );
                entry.insert(PathEntry {
                    path: path.clone(),
                    ready: false,
                });
                Ok(path)
            }
        }
    }

    fn is_registered(&self, path: &Path) -> bool {
        self.paths
            .get(path.name())
            .is_some_and(|entry| entry.path == *path)
    }

    fn registered_entry(&mut self, path: &Path) -> Option<&mut PathEntry> {
        self.paths
            .get_mut(path.name())
            .filter(|entry| entry.path == *path)
    }
}
