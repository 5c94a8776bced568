//! Banner grabbing functionality
//!
//! One connection per exchange, driven as a small state machine:
//!
//! ```text
//! Connecting -> PassiveWait -> Captured ----------> Done
//!                     \-> ActiveProbe -> Done
//! ```
//!
//! Every failure ends in `Done` with an empty banner.

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::{debug, instrument, trace};

use supernova_common::{BannerSource, Connector};
use supernova_fingerprint::trim_banner;

use crate::scanner::TcpConnector;

const MAX_BANNER_BYTES: usize = 1024;

/// Payload used to provoke a silent service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePayload {
    HttpHead,
    FtpHelp,
    BlankLine,
}

impl ProbePayload {
    pub fn for_port(port: u16) -> Self {
        match port {
            80 | 443 | 8080 => ProbePayload::HttpHead,
            21 => ProbePayload::FtpHelp,
            _ => ProbePayload::BlankLine,
        }
    }

    pub fn bytes(&self, ip: IpAddr) -> Vec<u8> {
        match self {
            ProbePayload::HttpHead => {
                format!("HEAD / HTTP/1.1\r\nHost: {ip}\r\nConnection: close\r\n\r\n").into_bytes()
            }
            ProbePayload::FtpHelp => b"HELP\r\n".to_vec(),
            ProbePayload::BlankLine => b"\r\n".to_vec(),
        }
    }
}

enum BannerState<S> {
    Connecting { passive: bool },
    PassiveWait(S),
    ActiveProbe(S),
    Captured(String),
    Done(String),
}

enum ReadOutcome {
    Data(String),
    Empty,
    TimedOut,
    Failed,
}

pub struct BannerGrabber<C: Connector = TcpConnector> {
    connector: C,
    timeout: Duration,
    settle_delay: Duration,
}

impl BannerGrabber {
    pub fn new(timeout: Duration) -> Self {
        Self::with_connector(TcpConnector, timeout)
    }
}

impl<C: Connector> BannerGrabber<C> {
    pub fn with_connector(connector: C, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            settle_delay: Duration::from_millis(300),
        }
    }

    /// Pause between the blank-line probe and the final read.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    #[instrument(skip(self))]
    async fn exchange(&self, addr: SocketAddr, passive: bool) -> String {
        let mut state = BannerState::Connecting { passive };
        loop {
            state = match state {
                BannerState::Done(banner) => return banner,
                other => self.step(other, addr).await,
            };
        }
    }

    async fn step(&self, state: BannerState<C::Stream>, addr: SocketAddr) -> BannerState<C::Stream> {
        match state {
            BannerState::Connecting { passive } => {
                match timeout(self.timeout, self.connector.connect(addr)).await {
                    Ok(Ok(stream)) if passive => BannerState::PassiveWait(stream),
                    Ok(Ok(stream)) => BannerState::ActiveProbe(stream),
                    Ok(Err(e)) => {
                        trace!("Banner connect to {} failed: {}", addr, e);
                        BannerState::Done(String::new())
                    }
                    Err(_) => {
                        trace!("Banner connect to {} timed out", addr);
                        BannerState::Done(String::new())
                    }
                }
            }
            BannerState::PassiveWait(mut stream) => match self.read_once(&mut stream).await {
                ReadOutcome::Data(banner) => {
                    debug!("Passive banner from {}: {} bytes", addr, banner.len());
                    self.release(stream).await;
                    BannerState::Captured(banner)
                }
                ReadOutcome::Empty | ReadOutcome::TimedOut => {
                    debug!("No passive banner from {}, trying active probe", addr);
                    BannerState::ActiveProbe(stream)
                }
                ReadOutcome::Failed => {
                    self.release(stream).await;
                    BannerState::Done(String::new())
                }
            },
            BannerState::ActiveProbe(mut stream) => {
                let banner = self.provoke(&mut stream, addr).await;
                self.release(stream).await;
                BannerState::Done(banner)
            }
            BannerState::Captured(banner) => BannerState::Done(banner),
            done @ BannerState::Done(_) => done,
        }
    }

    async fn provoke(&self, stream: &mut C::Stream, addr: SocketAddr) -> String {
        let payload = ProbePayload::for_port(addr.port());
        match timeout(self.timeout, stream.write_all(&payload.bytes(addr.ip()))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("Failed to send {:?} probe to {}: {}", payload, addr, e);
                return String::new();
            }
            Err(_) => {
                debug!("Timed out sending {:?} probe to {}", payload, addr);
                return String::new();
            }
        }

        if payload == ProbePayload::BlankLine {
            tokio::time::sleep(self.settle_delay).await;
        }

        match self.read_once(stream).await {
            ReadOutcome::Data(banner) => {
                debug!("Active banner from {}: {} bytes", addr, banner.len());
                banner
            }
            _ => String::new(),
        }
    }

    async fn read_once(&self, stream: &mut C::Stream) -> ReadOutcome {
        let mut buf = vec![0u8; MAX_BANNER_BYTES];
        match timeout(self.timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => ReadOutcome::Empty,
            Ok(Ok(n)) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                let text = trim_banner(&text);
                if text.is_empty() {
                    ReadOutcome::Empty
                } else {
                    ReadOutcome::Data(text.to_string())
                }
            }
            Ok(Err(e)) => {
                trace!("Banner read error: {}", e);
                ReadOutcome::Failed
            }
            Err(_) => ReadOutcome::TimedOut,
        }
    }

    /// Best-effort orderly shutdown; dropping the stream closes it regardless.
    async fn release(&self, mut stream: C::Stream) {
        let _ = timeout(self.timeout, stream.shutdown()).await;
    }
}

#[async_trait]
impl<C: Connector> BannerSource for BannerGrabber<C> {
    async fn grab(&self, ip: IpAddr, port: u16) -> String {
        self.exchange(SocketAddr::new(ip, port), true).await
    }

    async fn reprobe(&self, ip: IpAddr, port: u16) -> String {
        self.exchange(SocketAddr::new(ip, port), false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use tokio::io::DuplexStream;
    use tokio::net::TcpListener;

    const TEST_TIMEOUT: Duration = Duration::from_millis(150);

    #[derive(Clone, Copy)]
    enum Script {
        /// Sends a greeting on connect.
        Greeting(&'static str),
        /// Says nothing until it receives a probe, then answers with `reply`.
        Silent { reply: Option<&'static str> },
        /// Closes its end immediately.
        Hangup,
        Refuse,
        /// Connect never completes.
        Stall,
    }

    /// Serves one scripted peer per connect over an in-memory duplex pipe.
    #[derive(Clone)]
    struct ScriptedConnector {
        script: Script,
        received: Arc<Mutex<Vec<u8>>>,
        peer_saw_close: Arc<AtomicBool>,
    }

    impl ScriptedConnector {
        fn new(script: Script) -> Self {
            Self {
                script,
                received: Arc::new(Mutex::new(Vec::new())),
                peer_saw_close: Arc::new(AtomicBool::new(false)),
            }
        }

        fn received(&self) -> String {
            String::from_utf8_lossy(&self.received.lock().unwrap()).to_string()
        }
    }

    async fn serve(mut peer: DuplexStream, script: Script, received: Arc<Mutex<Vec<u8>>>, closed: Arc<AtomicBool>) {
        let reply = match script {
            Script::Greeting(text) => {
                let _ = peer.write_all(text.as_bytes()).await;
                None
            }
            Script::Silent { reply } => reply,
            _ => return,
        };

        let mut buf = [0u8; 512];
        loop {
            match peer.read(&mut buf).await {
                Ok(0) | Err(_) => {
                    closed.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(n) => {
                    received.lock().unwrap().extend_from_slice(&buf[..n]);
                    if let Some(reply) = reply {
                        let _ = peer.write_all(reply.as_bytes()).await;
                    }
                }
            }
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Stream = DuplexStream;

        async fn connect(&self, _addr: SocketAddr) -> io::Result<DuplexStream> {
            match self.script {
                Script::Refuse => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
                Script::Stall => std::future::pending().await,
                Script::Hangup => {
                    let (client, _peer) = tokio::io::duplex(4096);
                    Ok(client)
                }
                script => {
                    let (client, peer) = tokio::io::duplex(4096);
                    tokio::spawn(serve(
                        peer,
                        script,
                        self.received.clone(),
                        self.peer_saw_close.clone(),
                    ));
                    Ok(client)
                }
            }
        }
    }

    fn grabber(connector: &ScriptedConnector) -> BannerGrabber<ScriptedConnector> {
        BannerGrabber::with_connector(connector.clone(), TEST_TIMEOUT)
            .with_settle_delay(Duration::from_millis(10))
    }

    fn localhost() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    async fn wait_for_close(flag: &AtomicBool) -> bool {
        for _ in 0..50 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[test]
    fn test_payload_selection() {
        assert_eq!(ProbePayload::for_port(80), ProbePayload::HttpHead);
        assert_eq!(ProbePayload::for_port(443), ProbePayload::HttpHead);
        assert_eq!(ProbePayload::for_port(8080), ProbePayload::HttpHead);
        assert_eq!(ProbePayload::for_port(21), ProbePayload::FtpHelp);
        assert_eq!(ProbePayload::for_port(22), ProbePayload::BlankLine);

        let head = String::from_utf8(ProbePayload::HttpHead.bytes(localhost())).unwrap();
        assert!(head.starts_with("HEAD / HTTP/1.1\r\n"));
        assert!(head.contains("Host: 127.0.0.1"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_passive_banner_sends_nothing() {
        let connector = ScriptedConnector::new(Script::Greeting("SSH-2.0-OpenSSH_8.9\r\n"));
        let banner = grabber(&connector).grab(localhost(), 22).await;

        assert_eq!(banner, "SSH-2.0-OpenSSH_8.9");
        assert!(wait_for_close(&connector.peer_saw_close).await);
        assert_eq!(connector.received(), "");
    }

    #[tokio::test]
    async fn test_whitespace_greeting_counts_as_silence() {
        let connector = ScriptedConnector::new(Script::Greeting("\r\n"));
        let banner = grabber(&connector).grab(localhost(), 7000).await;

        assert_eq!(banner, "");
        assert!(wait_for_close(&connector.peer_saw_close).await);
        assert_eq!(connector.received(), "\r\n");
    }

    #[tokio::test]
    async fn test_silent_web_port_gets_head_request() {
        let connector = ScriptedConnector::new(Script::Silent {
            reply: Some("HTTP/1.1 200 OK\r\nServer: nginx/1.24.0\r\n\r\n"),
        });
        let banner = grabber(&connector).grab(localhost(), 80).await;

        assert_eq!(banner, "HTTP/1.1 200 OK\r\nServer: nginx/1.24.0");
        assert!(connector.received().starts_with("HEAD / HTTP/1.1\r\n"));
        assert!(wait_for_close(&connector.peer_saw_close).await);
    }

    #[tokio::test]
    async fn test_silent_ftp_port_gets_help() {
        let connector = ScriptedConnector::new(Script::Silent {
            reply: Some("214 Help OK"),
        });
        let banner = grabber(&connector).grab(localhost(), 21).await;

        assert_eq!(banner, "214 Help OK");
        assert_eq!(connector.received(), "HELP\r\n");
    }

    #[tokio::test]
    async fn test_silent_service_yields_empty_banner() {
        let connector = ScriptedConnector::new(Script::Silent { reply: None });
        let start = Instant::now();
        let banner = grabber(&connector).grab(localhost(), 9999).await;

        assert_eq!(banner, "");
        // passive wait + settle delay + active wait
        assert!(start.elapsed() >= TEST_TIMEOUT * 2);
        assert!(wait_for_close(&connector.peer_saw_close).await);
        assert_eq!(connector.received(), "\r\n");
    }

    #[tokio::test]
    async fn test_connect_failures_yield_empty_banner() {
        for script in [Script::Refuse, Script::Stall, Script::Hangup] {
            let connector = ScriptedConnector::new(script);
            let start = Instant::now();
            let banner = grabber(&connector).grab(localhost(), 25).await;
            assert_eq!(banner, "");
            assert!(start.elapsed() < Duration::from_secs(2));
        }
    }

    #[tokio::test]
    async fn test_reprobe_skips_passive_wait() {
        let connector = ScriptedConnector::new(Script::Greeting("220 mail ESMTP ready"));
        let banner = grabber(&connector).reprobe(localhost(), 25).await;

        assert_eq!(banner, "220 mail ESMTP ready");
        assert!(wait_for_close(&connector.peer_saw_close).await);
        assert_eq!(connector.received(), "\r\n");
    }

    #[tokio::test]
    async fn test_real_socket_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.write_all(b"220 ProFTPD 1.3.5 Server\r\n").await;
                let mut buf = [0u8; 64];
                let _ = socket.read(&mut buf).await;
            }
        });

        let banner = BannerGrabber::new(Duration::from_secs(1)).grab(localhost(), port).await;
        assert_eq!(banner, "220 ProFTPD 1.3.5 Server");
    }
}
