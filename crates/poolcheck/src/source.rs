//! Line-oriented inputs that carry `mining.notify` messages.

use std::collections::VecDeque;
use std::path::PathBuf;

use eyre::WrapErr;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const MINER_DEFAULT_PORT: u16 = 80;
const MINER_LOG_PATH: &str = "/api/ws";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    File(PathBuf),
    Stdin,
    /// A miner at `HOST[:PORT]` streaming its log over a websocket.
    Miner(String),
    /// A Stratum v1 pool at `HOST:PORT`.
    Stratum(String),
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Stdin => write!(f, "stdin"),
            Self::Miner(addr) => write!(f, "miner {addr}"),
            Self::Stratum(addr) => write!(f, "stratum+tcp://{addr}"),
        }
    }
}

/// Credentials sent to Stratum pools after subscribing.
#[derive(Debug, Clone)]
pub struct StratumLogin {
    pub worker: Option<String>,
    pub password: String,
}

/// A newline-framed stream of text lines.
pub struct LineSource {
    inner: Inner,
}

enum Inner {
    Stream {
        lines: Lines<Box<dyn AsyncBufRead + Send + Unpin>>,
        // Dropping the write half would half-close the Stratum session.
        writer: Option<OwnedWriteHalf>,
    },
    Miner(MinerLog),
}

impl LineSource {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self::from_parts(Box::new(reader), None)
    }

    fn from_parts(
        reader: Box<dyn AsyncBufRead + Send + Unpin>,
        writer: Option<OwnedWriteHalf>,
    ) -> Self {
        Self {
            inner: Inner::Stream {
                lines: reader.lines(),
                writer,
            },
        }
    }

    pub async fn open(source: &Source, login: &StratumLogin) -> eyre::Result<Self> {
        match source {
            Source::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("open log file {}", path.display()))?;
                Ok(Self::from_reader(BufReader::new(file)))
            }
            Source::Stdin => Ok(Self::from_reader(BufReader::new(tokio::io::stdin()))),
            Source::Miner(addr) => open_miner(addr).await,
            Source::Stratum(addr) => open_stratum(addr, login).await,
        }
    }

    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        match &mut self.inner {
            Inner::Stream { lines, .. } => lines.next_line().await,
            Inner::Miner(log) => log.next_line().await,
        }
    }

    /// Tell the remote end we are done: a normal-closure frame for miners,
    /// a TCP half-close for Stratum pools.
    pub async fn close(&mut self) {
        match &mut self.inner {
            Inner::Stream {
                writer: Some(writer),
                ..
            } => {
                if let Err(e) = writer.shutdown().await {
                    tracing::debug!(error = %e, "stratum shutdown failed");
                }
            }
            Inner::Stream { writer: None, .. } => {}
            Inner::Miner(log) => log.close().await,
        }
    }
}

// ==============================================================================
// Miner websocket log
// ==============================================================================

/// `ws://HOST:PORT/api/ws` for a miner address, with port 80 when omitted.
fn miner_url(addr: &str) -> eyre::Result<String> {
    let addr = addr.trim();
    let (host, port) = match addr.rsplit_once(':') {
        // A bare IPv6 literal has colons but no port.
        Some((host, port)) if !host.contains(':') || host.ends_with(']') => (host, port),
        _ => (addr, ""),
    };
    if host.is_empty() {
        eyre::bail!("miner address {addr:?} has no host");
    }
    let port = if port.is_empty() {
        MINER_DEFAULT_PORT
    } else {
        port.parse::<u16>()
            .with_context(|| format!("invalid port in miner address {addr:?}"))?
    };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    Ok(format!("ws://{host}:{port}{MINER_LOG_PATH}"))
}

async fn open_miner(addr: &str) -> eyre::Result<LineSource> {
    let url = miner_url(addr)?;
    tracing::info!(%url, "connecting to miner log");
    let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .with_context(|| format!("connect to {url}"))?;
    Ok(LineSource {
        inner: Inner::Miner(MinerLog {
            ws,
            framer: LineFramer::default(),
            ended: false,
        }),
    })
}

struct MinerLog {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    framer: LineFramer,
    ended: bool,
}

impl MinerLog {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if let Some(line) = self.framer.pop() {
                return Ok(Some(line));
            }
            if self.ended {
                return Ok(self.framer.finish());
            }
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => self.framer.push(text.as_bytes()),
                Some(Ok(Message::Binary(data))) => self.framer.push(&data),
                Some(Ok(Message::Close(frame))) => {
                    self.ended = true;
                    if let Some(frame) = frame.filter(|f| !is_clean_close(f)) {
                        return Err(std::io::Error::other(format!(
                            "miner closed the log stream: {} {}",
                            u16::from(frame.code),
                            frame.reason
                        )));
                    }
                    tracing::info!("miner log connection closed");
                }
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    self.ended = true;
                }
                Some(Err(e)) => return Err(std::io::Error::other(e)),
            }
        }
    }

    async fn close(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "shutdown".into(),
        };
        match self.ws.close(Some(frame)).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
            Err(e) => tracing::warn!(error = %e, "closing miner log failed"),
        }
    }
}

fn is_clean_close(frame: &CloseFrame<'_>) -> bool {
    matches!(frame.code, CloseCode::Normal | CloseCode::Away)
}

/// Reassembles newline-terminated lines from message payloads that may
/// split or join lines arbitrarily.
#[derive(Default)]
struct LineFramer {
    partial: Vec<u8>,
    ready: VecDeque<String>,
}

impl LineFramer {
    fn push(&mut self, payload: &[u8]) {
        self.partial.extend_from_slice(payload);
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let rest = self.partial.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.ready.push_back(String::from_utf8_lossy(&line).into_owned());
        }
    }

    fn pop(&mut self) -> Option<String> {
        self.ready.pop_front()
    }

    /// The unterminated tail, once the stream has ended.
    fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let tail = std::mem::take(&mut self.partial);
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

// ==============================================================================
// Stratum pool session
// ==============================================================================

async fn open_stratum(addr: &str, login: &StratumLogin) -> eyre::Result<LineSource> {
    tracing::info!(%addr, "connecting to stratum pool");
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connect to {addr}"))?;
    stream.set_nodelay(true).context("set TCP_NODELAY")?;

    let (reader, mut writer) = stream.into_split();
    for request in handshake(login) {
        writer
            .write_all(request.as_bytes())
            .await
            .with_context(|| format!("send handshake to {addr}"))?;
    }

    Ok(LineSource::from_parts(
        Box::new(BufReader::new(reader)),
        Some(writer),
    ))
}

/// The `mining.subscribe` request, followed by `mining.authorize` when a
/// worker is configured. Each request is newline terminated.
fn handshake(login: &StratumLogin) -> Vec<String> {
    let agent = concat!("poolcheck/", env!("CARGO_PKG_VERSION"));
    let mut requests = vec![serde_json::json!({
        "id": 1,
        "method": "mining.subscribe",
        "params": [agent],
    })];
    if let Some(worker) = &login.worker {
        requests.push(serde_json::json!({
            "id": 2,
            "method": "mining.authorize",
            "params": [worker, login.password],
        }));
    }
    requests.into_iter().map(|r| format!("{r}\n")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

    fn no_login() -> StratumLogin {
        StratumLogin {
            worker: None,
            password: "x".into(),
        }
    }

    // -- miner_url tests -----------------------------------------------------

    #[test]
    fn miner_url_defaults_to_port_80() {
        assert_eq!(
            miner_url("192.168.1.20").expect("valid"),
            "ws://192.168.1.20:80/api/ws"
        );
        assert_eq!(
            miner_url("192.168.1.20:").expect("valid"),
            "ws://192.168.1.20:80/api/ws"
        );
    }

    #[test]
    fn miner_url_keeps_explicit_port() {
        assert_eq!(
            miner_url(" bitaxe.local:8080 ").expect("valid"),
            "ws://bitaxe.local:8080/api/ws"
        );
        assert_eq!(miner_url("[::1]:81").expect("valid"), "ws://[::1]:81/api/ws");
        assert_eq!(miner_url("::1").expect("valid"), "ws://[::1]:80/api/ws");
    }

    #[test]
    fn miner_url_rejects_bad_port_and_empty_host() {
        assert!(miner_url("bitaxe.local:http").is_err());
        assert!(miner_url(":80").is_err());
    }

    // -- LineFramer tests ----------------------------------------------------

    #[test]
    fn framer_joins_lines_split_across_messages() {
        let mut framer = LineFramer::default();
        framer.push(b"I (1) boot\r\nI (2) rx: {\"method\":");
        assert_eq!(framer.pop().as_deref(), Some("I (1) boot"));
        assert_eq!(framer.pop(), None);

        framer.push(b"\"mining.notify\"}\nI (3) ");
        assert_eq!(
            framer.pop().as_deref(),
            Some("I (2) rx: {\"method\":\"mining.notify\"}")
        );
        assert_eq!(framer.pop(), None);
        assert_eq!(framer.finish().as_deref(), Some("I (3) "));
        assert_eq!(framer.finish(), None);
    }

    // -- stratum tests -------------------------------------------------------

    #[test]
    fn handshake_without_worker_only_subscribes() {
        let requests = handshake(&no_login());
        assert_eq!(requests.len(), 1);
        assert!(requests[0].contains("\"mining.subscribe\""));
        assert!(requests[0].ends_with('\n'));
    }

    #[test]
    fn handshake_with_worker_authorizes() {
        let login = StratumLogin {
            worker: Some("bc1qworker.rig1".into()),
            password: "x".into(),
        };
        let requests = handshake(&login);
        assert_eq!(requests.len(), 2);
        let authorize: serde_json::Value =
            serde_json::from_str(requests[1].trim()).expect("valid JSON");
        assert_eq!(authorize["method"], "mining.authorize");
        assert_eq!(authorize["params"], serde_json::json!(["bc1qworker.rig1", "x"]));
    }

    #[tokio::test]
    async fn reader_source_yields_lines() {
        let mut source = LineSource::from_reader(&b"one\ntwo\n"[..]);
        assert_eq!(source.next_line().await.expect("read").as_deref(), Some("one"));
        assert_eq!(source.next_line().await.expect("read").as_deref(), Some("two"));
        assert_eq!(source.next_line().await.expect("read"), None);
    }

    #[tokio::test]
    async fn stratum_source_sends_handshake_and_reads_notify() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr").to_string();

        let pool = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 256];
            let n = socket.read(&mut buf).await.expect("read handshake");
            socket
                .write_all(b"{\"id\":null,\"method\":\"mining.notify\",\"params\":[]}\n")
                .await
                .expect("write notify");
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        let mut source = LineSource::open(&Source::Stratum(addr), &no_login())
            .await
            .expect("connect");
        let line = source.next_line().await.expect("read").expect("a line");
        assert!(line.contains("mining.notify"));

        let received = pool.await.expect("pool task");
        assert!(received.contains("mining.subscribe"));
    }

    // -- miner websocket tests -----------------------------------------------

    async fn miner_listener() -> (tokio::net::TcpListener, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr").to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn miner_source_reads_log_lines_and_closes_normally() {
        let (listener, addr) = miner_listener().await;

        let miner = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut path = String::new();
            let mut ws = tokio_tungstenite::accept_hdr_async(
                socket,
                |req: &Request, resp: Response| {
                    path = req.uri().path().to_owned();
                    Ok::<_, ErrorResponse>(resp)
                },
            )
            .await
            .expect("websocket handshake");

            ws.send(Message::text("I (1) boot\nI (2) stratum_api: rx: {\"method\":"))
                .await
                .expect("send first part");
            ws.send(Message::binary(b"\"mining.notify\"}\n".to_vec()))
                .await
                .expect("send second part");

            let closing = loop {
                match ws.next().await {
                    Some(Ok(Message::Close(frame))) => break frame,
                    Some(Ok(_)) => continue,
                    other => panic!("expected a close frame, got {other:?}"),
                }
            };
            (path, closing.map(|f| f.code))
        });

        let mut source = LineSource::open(&Source::Miner(addr), &no_login())
            .await
            .expect("connect");
        assert_eq!(
            source.next_line().await.expect("read").as_deref(),
            Some("I (1) boot")
        );
        assert_eq!(
            source.next_line().await.expect("read").as_deref(),
            Some("I (2) stratum_api: rx: {\"method\":\"mining.notify\"}")
        );
        source.close().await;

        let (path, code) = miner.await.expect("miner task");
        assert_eq!(path, "/api/ws");
        assert_eq!(code, Some(CloseCode::Normal));
    }

    async fn miner_closing_with(code: CloseCode) -> LineSource {
        let (listener, addr) = miner_listener().await;

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(socket)
                .await
                .expect("websocket handshake");
            ws.send(Message::text("I (9) last words"))
                .await
                .expect("send tail");
            ws.close(Some(CloseFrame {
                code,
                reason: "restart".into(),
            }))
            .await
            .expect("send close");
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        });

        LineSource::open(&Source::Miner(addr), &no_login())
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn going_away_close_ends_the_stream_cleanly() {
        let mut source = miner_closing_with(CloseCode::Away).await;
        assert_eq!(
            source.next_line().await.expect("read").as_deref(),
            Some("I (9) last words")
        );
        assert_eq!(source.next_line().await.expect("clean close"), None);
        source.close().await;
    }

    #[tokio::test]
    async fn abnormal_close_is_an_error() {
        let mut source = miner_closing_with(CloseCode::Error).await;
        let err = source.next_line().await.expect_err("server error close");
        assert!(err.to_string().contains("1011"), "got: {err}");
    }
}
