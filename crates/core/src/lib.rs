//! RTSP ingestion core.
//!
//! Publishers ANNOUNCE a stream over RTSP, bind it to a named [`Path`] held by
//! the [`PathManager`], and push RTP (UDP or interleaved TCP) into the path's
//! [`Stream`], where each track's format processor normalizes it.

pub mod conf;
pub mod defs;
pub mod error;
pub mod formatprocessor;
pub mod media;
pub mod path;
pub mod path_manager;
pub mod protocol;
pub mod server;
pub mod session;
pub mod stream;
pub mod transport;
pub mod unit;

pub use conf::{Config, RtspTransport, RtspTransports};
pub use defs::{Author, PathInfo, PathState};
pub use error::{CodecError, Error, Result};
pub use path::Path;
pub use path_manager::PathManager;
pub use server::{Server, SessionInfo};
pub use stream::{Stream, StreamReader};
pub use unit::Unit;
