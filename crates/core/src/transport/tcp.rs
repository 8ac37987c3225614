use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{Error, ParseErrorKind, Result};
use crate::protocol::{MethodHandler, RtspRequest, RtspResponse};
use crate::server::ServerShared;

/// Largest accepted request head (request line and headers).
const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Accept RTSP connections until `ctx` is cancelled.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    shared: Arc<ServerShared>,
    ctx: CancellationToken,
    tracker: TaskTracker,
) {
    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    tracker.spawn(Connection::handle(stream, peer, shared.clone(), ctx.child_token()));
                }
                Err(e) => tracing::warn!(error = %e, "TCP accept error"),
            },
        }
    }
    tracing::debug!("accept loop exited");
}

/// Anything a client can send on the control connection.
enum Message {
    Request(RtspRequest),
    /// `$` framed data (RFC 2326 §10.12).
    Interleaved { channel: u8, data: Bytes },
}

/// A single RTSP client connection with its own lifecycle.
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    handler: MethodHandler,
    peer_addr: SocketAddr,
    shared: Arc<ServerShared>,
}

impl Connection {
    /// Entry point: set up a connection and run its request loop.
    async fn handle(
        stream: TcpStream,
        peer_addr: SocketAddr,
        shared: Arc<ServerShared>,
        ctx: CancellationToken,
    ) {
        tracing::info!(peer = %peer_addr, "client connected");
        shared.add_conn(peer_addr);

        let (reader, writer) = stream.into_split();
        let mut conn = Connection {
            reader: BufReader::new(reader),
            writer,
            handler: MethodHandler::new(shared.clone(), peer_addr),
            peer_addr,
            shared: shared.clone(),
        };

        let reason = conn.run(&ctx).await;
        conn.handler.close(reason).await;
        shared.remove_conn(&peer_addr);

        tracing::info!(peer = %peer_addr, reason, "client disconnected");
    }

    /// RTSP request/response loop. Returns the reason for exiting.
    async fn run(&mut self, ctx: &CancellationToken) -> &'static str {
        let read_timeout = self.shared.conf.read_timeout;

        loop {
            // publishers over UDP stay silent on the control connection
            let timed = !self.handler.is_recording_udp();

            let message = tokio::select! {
                biased;
                _ = ctx.cancelled() => return "server shutting down",
                res = async {
                    if timed {
                        timeout(read_timeout, self.read_message()).await.ok()
                    } else {
                        Some(self.read_message().await)
                    }
                } => res,
            };

            let message = match message {
                None => return "read timeout",
                Some(Ok(message)) => message,
                Some(Err(Error::Io(e))) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return "connection closed by client";
                }
                Some(Err(Error::Parse { kind })) => {
                    tracing::warn!(peer = %self.peer_addr, error = %kind, "parse error");
                    let _ = self.write_response(RtspResponse::bad_request()).await;
                    return "parse error";
                }
                Some(Err(_)) => return "read error",
            };

            match message {
                Message::Request(request) => {
                    tracing::debug!(
                        peer = %self.peer_addr,
                        method = %request.method,
                        uri = %request.uri,
                        version = %request.version,
                        "request"
                    );

                    let response = self.handler.handle(&request).await;

                    tracing::debug!(
                        peer = %self.peer_addr,
                        status = response.status_code,
                        "response"
                    );

                    if let Err(reason) = self.write_response(response).await {
                        return reason;
                    }
                }
                Message::Interleaved { channel, data } => {
                    self.handler.handle_interleaved(channel, data);
                }
            }
        }
    }

    async fn write_response(&mut self, response: RtspResponse) -> std::result::Result<(), &'static str> {
        let write_timeout = self.shared.conf.write_timeout;
        match timeout(write_timeout, self.writer.write_all(response.serialize().as_bytes())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err("write error"),
            Err(_) => Err("write timeout"),
        }
    }

    async fn read_message(&mut self) -> Result<Message> {
        let first = loop {
            let b = self.reader.read_u8().await?;
            if b != b'\r' && b != b'\n' {
                break b;
            }
        };

        if first == b'$' {
            let channel = self.reader.read_u8().await?;
            let len = self.reader.read_u16().await? as usize;
            let mut data = vec![0u8; len];
            self.reader.read_exact(&mut data).await?;
            return Ok(Message::Interleaved {
                channel,
                data: Bytes::from(data),
            });
        }

        let mut head = vec![first];
        loop {
            // one byte past the limit tells an overlong head from a full one
            let limit = (MAX_HEAD_SIZE + 1).saturating_sub(head.len()) as u64;
            let mut line = Vec::new();
            let n = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await?;
            head.extend_from_slice(&line);

            if head.len() > MAX_HEAD_SIZE {
                return Err(Error::Parse {
                    kind: ParseErrorKind::InvalidHeader,
                });
            }
            if n == 0 || !line.ends_with(b"\n") {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            if line == b"\r\n" || line == b"\n" {
                break;
            }
        }

        let mut request = RtspRequest::parse(&String::from_utf8_lossy(&head))?;

        let len = request.content_length()?;
        if len > 0 {
            let mut body = vec![0u8; len];
            self.reader.read_exact(&mut body).await?;
            request.body = body;
        }

        Ok(Message::Request(request))
    }
}
