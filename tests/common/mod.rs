//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A minimal SOCKS5 server (RFC 1928 CONNECT, RFC 1929 user/pass).
pub struct MockSocks {
    pub addr: SocketAddr,
    connects: Arc<AtomicUsize>,
}

impl MockSocks {
    /// Number of CONNECT commands this server has accepted.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

/// Start a SOCKS5 server on an ephemeral port.
///
/// With `credentials`, only username/password auth is offered.
pub async fn start_mock_socks(credentials: Option<(&'static str, &'static str)>) -> MockSocks {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = connects.clone();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let counter = counter.clone();
            tokio::spawn(async move {
                let _ = socks_session(socket, credentials, counter).await;
            });
        }
    });

    MockSocks { addr, connects }
}

async fn socks_session(
    mut client: TcpStream,
    credentials: Option<(&'static str, &'static str)>,
    connects: Arc<AtomicUsize>,
) -> std::io::Result<()> {
    // Greeting
    let mut head = [0u8; 2];
    client.read_exact(&mut head).await?;
    let mut methods = vec![0u8; head[1] as usize];
    client.read_exact(&mut methods).await?;

    let wanted = if credentials.is_some() { 0x02 } else { 0x00 };
    if !methods.contains(&wanted) {
        client.write_all(&[0x05, 0xFF]).await?;
        return Ok(());
    }
    client.write_all(&[0x05, wanted]).await?;

    if let Some((user, pass)) = credentials {
        let mut ver_len = [0u8; 2];
        client.read_exact(&mut ver_len).await?;
        let mut username = vec![0u8; ver_len[1] as usize];
        client.read_exact(&mut username).await?;
        let mut plen = [0u8; 1];
        client.read_exact(&mut plen).await?;
        let mut password = vec![0u8; plen[0] as usize];
        client.read_exact(&mut password).await?;

        if username != user.as_bytes() || password != pass.as_bytes() {
            client.write_all(&[0x01, 0x01]).await?;
            return Ok(());
        }
        client.write_all(&[0x01, 0x00]).await?;
    }

    // Request: VER CMD RSV ATYP
    let mut req = [0u8; 4];
    client.read_exact(&mut req).await?;
    let host = match req[3] {
        0x01 => {
            let mut ip = [0u8; 4];
            client.read_exact(&mut ip).await?;
            Ipv4Addr::from(ip).to_string()
        }
        0x03 => {
            let mut len = [0u8; 1];
            client.read_exact(&mut len).await?;
            let mut name = vec![0u8; len[0] as usize];
            client.read_exact(&mut name).await?;
            String::from_utf8_lossy(&name).into_owned()
        }
        0x04 => {
            let mut ip = [0u8; 16];
            client.read_exact(&mut ip).await?;
            Ipv6Addr::from(ip).to_string()
        }
        _ => return Ok(()),
    };
    let mut port = [0u8; 2];
    client.read_exact(&mut port).await?;
    let port = u16::from_be_bytes(port);

    let target = match TcpStream::connect((host.as_str(), port)).await {
        Ok(target) => target,
        Err(_) => {
            // Connection refused
            client
                .write_all(&[0x05, 0x05, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
                .await?;
            return Ok(());
        }
    };
    connects.fetch_add(1, Ordering::SeqCst);
    client
        .write_all(&[0x05, 0x00, 0x00, 0x01, 127, 0, 0, 1, 0, 0])
        .await?;

    let (mut cr, mut cw) = client.into_split();
    let (mut tr, mut tw) = target.into_split();
    let up = async {
        let _ = tokio::io::copy(&mut cr, &mut tw).await;
        let _ = tw.shutdown().await;
    };
    let down = async {
        let _ = tokio::io::copy(&mut tr, &mut cw).await;
        let _ = cw.shutdown().await;
    };
    tokio::join!(up, down);
    Ok(())
}

/// Start an HTTP backend answering every request with duplicate headers.
///
/// The response carries `X-Multi: one` then `X-Multi: two`, status 201 and
/// a body echoing the request line.
pub async fn start_http_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let text = String::from_utf8_lossy(&buf);
                let request_line = text.lines().next().unwrap_or_default().to_string();
                let body = format!("backend saw: {request_line}");
                let response = format!(
                    "HTTP/1.1 201 Created\r\n\
                     X-Multi: one\r\n\
                     X-Multi: two\r\n\
                     Content-Length: {}\r\n\
                     Connection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start an HTTP backend that waits `delay` after reading the request head
/// before answering `200` with `body`.
pub async fn start_slow_backend(delay: Duration, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                tokio::time::sleep(delay).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a TCP target that echoes bytes back until the peer closes.
pub async fn start_echo_target() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (mut r, mut w) = socket.into_split();
                let _ = tokio::io::copy(&mut r, &mut w).await;
            });
        }
    });

    addr
}

/// Start a TCP target that writes `greeting` and closes immediately.
pub async fn start_closing_target(greeting: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let _ = socket.write_all(greeting).await;
            let _ = socket.shutdown().await;
        }
    });

    addr
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Render a configuration document with one enabled SOCKS5 entry.
pub fn config_yaml(version: &str, dialer_port: u16, proxy: SocketAddr, auth: Option<(&str, &str)>) -> String {
    let mut doc = format!(
        "version: \"{version}\"\n\
         dialer:\n  server: 127.0.0.1\n  port: {dialer_port}\n\
         proxies:\n  - protocol: socks5\n    server: {}\n    port: {}\n    use: true\n",
        proxy.ip(),
        proxy.port()
    );
    if let Some((user, pass)) = auth {
        doc.push_str(&format!("    username: {user}\n    password: {pass}\n"));
    }
    doc
}

/// Replace a file's content in place (same inode, as editors often do).
pub fn overwrite(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

/// Open a raw CONNECT tunnel through the relay and consume the reply head.
///
/// Returns the stream positioned after the blank line and the raw head,
/// terminator included.
pub async fn open_tunnel(relay: SocketAddr, target: SocketAddr) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(relay).await.unwrap();
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let head = read_head(&mut stream).await;
    (stream, head)
}

/// Read one response head byte by byte, so nothing past it is consumed.
pub async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out reading response head")
            .unwrap();
        if n == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Poll `check` until it holds or `deadline` passes.
pub async fn eventually<F: FnMut() -> bool>(deadline: Duration, mut check: F) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
