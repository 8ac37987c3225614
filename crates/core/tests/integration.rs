//! Integration tests: publishers driving ANNOUNCE → SETUP → RECORD against a
//! running server.
//!
//! Each test starts its own server on fixed ports and talks to it with a
//! plain TCP client.

use std::sync::Arc;
use std::time::Duration;

use ingest::{Config, PathInfo, PathManager, Server};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::{sleep, timeout};

const SDP: &str = "v=0\r\n\
    o=- 0 0 IN IP4 127.0.0.1\r\n\
    s=Test\r\n\
    t=0 0\r\n\
    m=video 0 RTP/AVP 96\r\n\
    a=rtpmap:96 H264/90000\r\n\
    a=fmtp:96 packetization-mode=1\r\n\
    a=control:trackID=0\r\n";

struct Client {
    stream: BufReader<TcpStream>,
    cseq: u32,
}

struct Response {
    status: u16,
    headers: Vec<(String, String)>,
}

impl Response {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn session(&self) -> String {
        self.header("Session")
            .and_then(|s| s.split(';').next())
            .expect("response without Session header")
            .to_string()
    }
}

impl Client {
    async fn connect(addr: &str) -> Self {
        let stream = timeout(Duration::from_secs(2), TcpStream::connect(addr))
            .await
            .expect("connect timeout")
            .expect("connect to server");
        Self {
            stream: BufReader::new(stream),
            cseq: 0,
        }
    }

    async fn request(&mut self, method: &str, uri: &str, headers: &[(&str, &str)], body: &str) -> Response {
        self.cseq += 1;
        let mut req = format!("{method} {uri} RTSP/1.0\r\nCSeq: {}\r\n", self.cseq);
        for (name, value) in headers {
            req.push_str(&format!("{name}: {value}\r\n"));
        }
        if !body.is_empty() {
            req.push_str("Content-Type: application/sdp\r\n");
            req.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        req.push_str("\r\n");
        req.push_str(body);

        self.stream.get_mut().write_all(req.as_bytes()).await.unwrap();
        timeout(Duration::from_secs(2), self.read_response())
            .await
            .expect("response timeout")
    }

    async fn read_response(&mut self) -> Response {
        let mut status_line = String::new();
        self.stream.read_line(&mut status_line).await.unwrap();
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("invalid status line");

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            self.stream.read_line(&mut line).await.unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').unwrap();
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let response = Response { status, headers };
        if let Some(len) = response.header("Content-Length").and_then(|l| l.parse::<usize>().ok()) {
            let mut body = vec![0u8; len];
            self.stream.read_exact(&mut body).await.unwrap();
        }
        response
    }

    async fn send_interleaved(&mut self, channel: u8, packet: &[u8]) {
        let mut frame = vec![b'$', channel];
        frame.extend_from_slice(&(packet.len() as u16).to_be_bytes());
        frame.extend_from_slice(packet);
        self.stream.get_mut().write_all(&frame).await.unwrap();
    }
}

fn rtp_packet(seq: u16, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0x80, 0x80 | 96];
    pkt.extend_from_slice(&seq.to_be_bytes());
    pkt.extend_from_slice(&90_000u32.to_be_bytes());
    pkt.extend_from_slice(&0x1234_5678u32.to_be_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

async fn start(rtsp: &str, udp: &str, transports: &str) -> (Server, PathManager) {
    let conf = Arc::new(Config {
        rtsp_address: rtsp.to_string(),
        udp_rtp_address: udp.to_string(),
        transports: transports.parse().unwrap(),
        ..Default::default()
    });
    let pm = PathManager::new(conf.clone());
    let server = Server::new(conf, pm.clone());
    server.start().await.expect("server start");
    (server, pm)
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

async fn wait_for_paths(pm: &PathManager, expected: Vec<PathInfo>) {
    for _ in 0..200 {
        if pm.list_paths().await.unwrap() == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("paths never became {expected:?}");
}

fn cam(ready: bool) -> Vec<PathInfo> {
    vec![PathInfo {
        name: "cam".into(),
        ready,
    }]
}

#[tokio::test]
async fn publish_over_tcp() {
    let (server, pm) = start("127.0.0.1:18554", "127.0.0.1:18000", "udp,tcp").await;
    let base = "rtsp://127.0.0.1:18554/cam";
    let mut client = Client::connect("127.0.0.1:18554").await;

    let res = client.request("OPTIONS", base, &[], "").await;
    assert_eq!(res.status, 200);
    assert!(res.header("Public").unwrap().contains("ANNOUNCE"));

    let res = client.request("ANNOUNCE", base, &[], SDP).await;
    assert_eq!(res.status, 200);
    let session = res.session();
    assert_eq!(pm.list_paths().await.unwrap(), cam(false));

    let res = client
        .request(
            "SETUP",
            &format!("{base}/trackID=0"),
            &[
                ("Transport", "RTP/AVP/TCP;unicast;interleaved=0-1;mode=record"),
                ("Session", &session),
            ],
            "",
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(
        res.header("Transport"),
        Some("RTP/AVP/TCP;unicast;interleaved=0-1")
    );

    let res = client
        .request("RECORD", base, &[("Session", &session)], "")
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(pm.list_paths().await.unwrap(), cam(true));

    client
        .send_interleaved(0, &rtp_packet(1, &[0x65, 0x88, 0x84, 0x00]))
        .await;
    // RTCP is ignored
    client.send_interleaved(1, &[0x80, 0xc8, 0x00, 0x00]).await;
    wait_for(|| server.sessions().first().is_some_and(|s| s.bytes_received == 16)).await;

    let res = client
        .request("TEARDOWN", base, &[("Session", &session)], "")
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(pm.list_paths().await.unwrap(), cam(false));
    assert!(server.sessions().is_empty());

    server.close().await;
    pm.close().await;
}

#[tokio::test]
async fn publish_over_udp() {
    let (server, pm) = start("127.0.0.1:18556", "127.0.0.1:18002", "udp,tcp").await;
    let base = "rtsp://127.0.0.1:18556/cam";
    let mut client = Client::connect("127.0.0.1:18556").await;

    let session = client.request("ANNOUNCE", base, &[], SDP).await.session();

    let rtp = UdpSocket::bind("127.0.0.1:18010").await.unwrap();
    let res = client
        .request(
            "SETUP",
            &format!("{base}/trackID=0"),
            &[
                ("Transport", "RTP/AVP;unicast;client_port=18010-18011;mode=record"),
                ("Session", &session),
            ],
            "",
        )
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(
        res.header("Transport"),
        Some("RTP/AVP;unicast;client_port=18010-18011;server_port=18002-18003")
    );

    let res = client
        .request("RECORD", base, &[("Session", &session)], "")
        .await;
    assert_eq!(res.status, 200);

    rtp.send_to(&rtp_packet(1, &[0x41, 0x9a]), "127.0.0.1:18002")
        .await
        .unwrap();
    wait_for(|| server.sessions().first().is_some_and(|s| s.bytes_received == 14)).await;

    // closing the control connection releases the publisher
    drop(client);
    wait_for_paths(&pm, cam(false)).await;
    wait_for(|| server.sessions().is_empty()).await;

    server.close().await;
    pm.close().await;
}

#[tokio::test]
async fn tcp_rejected_when_only_udp_accepted() {
    let (server, pm) = start("127.0.0.1:18558", "127.0.0.1:18004", "udp").await;
    let base = "rtsp://127.0.0.1:18558/cam";
    let mut client = Client::connect("127.0.0.1:18558").await;

    let session = client.request("ANNOUNCE", base, &[], SDP).await.session();
    let res = client
        .request(
            "SETUP",
            &format!("{base}/trackID=0"),
            &[
                ("Transport", "RTP/AVP/TCP;unicast;interleaved=0-1;mode=record"),
                ("Session", &session),
            ],
            "",
        )
        .await;
    assert_eq!(res.status, 461);

    // nothing set up yet
    let res = client
        .request("RECORD", base, &[("Session", &session)], "")
        .await;
    assert_eq!(res.status, 455);
    assert_eq!(pm.list_paths().await.unwrap(), cam(false));

    server.close().await;
    pm.close().await;
}

#[tokio::test]
async fn invalid_announces_rejected() {
    let (server, pm) = start("127.0.0.1:18560", "127.0.0.1:18006", "tcp").await;
    let mut client = Client::connect("127.0.0.1:18560").await;

    let res = client
        .request("ANNOUNCE", "rtsp://127.0.0.1:18560", &[], SDP)
        .await;
    assert_eq!(res.status, 400);

    let res = client
        .request("ANNOUNCE", "rtsp://127.0.0.1:18560/a//b", &[], SDP)
        .await;
    assert_eq!(res.status, 400);

    let res = client
        .request("ANNOUNCE", "rtsp://127.0.0.1:18560/cam", &[], "v=0\r\n")
        .await;
    assert_eq!(res.status, 400);

    let res = client
        .request("DESCRIBE", "rtsp://127.0.0.1:18560/cam", &[], "")
        .await;
    assert_eq!(res.status, 501);

    let res = client
        .request("RECORD", "rtsp://127.0.0.1:18560/cam", &[("Session", "FFFF")], "")
        .await;
    assert_eq!(res.status, 454);

    assert!(pm.list_paths().await.unwrap().is_empty());
    assert!(server.sessions().is_empty());

    server.close().await;
    pm.close().await;
}

#[tokio::test]
async fn second_publisher_takes_over_path() {
    let (server, pm) = start("127.0.0.1:18562", "127.0.0.1:18008", "tcp").await;
    let base = "rtsp://127.0.0.1:18562/cam";
    let setup = [("Transport", "RTP/AVP/TCP;unicast;interleaved=0-1;mode=record")];

    let mut first = Client::connect("127.0.0.1:18562").await;
    let first_session = first.request("ANNOUNCE", base, &[], SDP).await.session();
    let res = first
        .request(
            "SETUP",
            &format!("{base}/trackID=0"),
            &[setup[0], ("Session", &first_session)],
            "",
        )
        .await;
    assert_eq!(res.status, 200);

    let mut second = Client::connect("127.0.0.1:18562").await;
    let second_session = second.request("ANNOUNCE", base, &[], SDP).await.session();

    // the first binding was replaced
    let res = first
        .request("RECORD", base, &[("Session", &first_session)], "")
        .await;
    assert_eq!(res.status, 400);

    let res = second
        .request(
            "SETUP",
            &format!("{base}/trackID=0"),
            &[setup[0], ("Session", &second_session)],
            "",
        )
        .await;
    assert_eq!(res.status, 200);
    let res = second
        .request("RECORD", base, &[("Session", &second_session)], "")
        .await;
    assert_eq!(res.status, 200);
    assert_eq!(pm.list_paths().await.unwrap(), cam(true));

    server.close().await;
    assert!(!server.is_running());
    wait_for_paths(&pm, cam(false)).await;
    pm.close().await;
}

#[tokio::test]
async fn overlong_request_line_closes_connection() {
    let (server, pm) = start("127.0.0.1:18564", "127.0.0.1:18012", "tcp").await;
    let mut client = Client::connect("127.0.0.1:18564").await;
    wait_for(|| server.connection_count() == 1).await;

    // no newline anywhere, one byte past the head limit
    let line = vec![b'A'; 16 * 1024 + 1];
    client.stream.get_mut().write_all(&line).await.unwrap();

    let res = timeout(Duration::from_secs(2), client.read_response())
        .await
        .expect("response timeout");
    assert_eq!(res.status, 400);

    let mut rest = Vec::new();
    let n = timeout(Duration::from_secs(2), client.stream.read_to_end(&mut rest))
        .await
        .expect("connection left open")
        .unwrap();
    assert_eq!(n, 0);
    wait_for(|| server.connection_count() == 0).await;

    server.close().await;
    pm.close().await;
}
