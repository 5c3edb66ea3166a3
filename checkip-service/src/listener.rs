//! TCP listener whose connections enforce a request-head read deadline and
//! are closed after a period without I/O.

use axum::extract::connect_info::Connected;
use axum::serve::{IncomingStream, Listener};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, Sleep, sleep};

/// Peer address of an accepted connection, exposed to handlers as
/// `ConnectInfo<ClientAddr>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

pub struct TimeoutListener {
    inner: TcpListener,
    read_timeout: Duration,
    idle_timeout: Duration,
}

impl TimeoutListener {
    pub fn new(inner: TcpListener, read_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            inner,
            read_timeout,
            idle_timeout,
        }
    }
}

impl Listener for TimeoutListener {
    type Io = TimeoutStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (stream, addr) = Listener::accept(&mut self.inner).await;
        let stream = TimeoutStream::new(stream, self.read_timeout, self.idle_timeout);
        (stream, addr)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

impl Connected<IncomingStream<'_, TimeoutListener>> for ClientAddr {
    fn connect_info(stream: IncomingStream<'_, TimeoutListener>) -> Self {
        ClientAddr(*stream.remote_addr())
    }
}

/// Where the connection is relative to the current request head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Head {
    /// Head bytes still arriving; `line_start` is set right after a `\n`.
    Reading { line_start: bool },
    /// Blank line seen. Body bytes may follow.
    Complete,
    /// Response bytes written. The next byte read starts a new head.
    Responded,
}

/// Fails pending reads and writes with `TimedOut` once no bytes have moved in
/// either direction for `idle_timeout`, and fails reads when a request head
/// takes longer than `read_timeout` to arrive.
///
/// The first head is timed from accept, later heads from their first byte.
pub struct TimeoutStream<S> {
    inner: S,
    read_timeout: Duration,
    idle_timeout: Duration,
    head: Head,
    head_deadline: Pin<Box<Sleep>>,
    idle_deadline: Pin<Box<Sleep>>,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, read_timeout: Duration, idle_timeout: Duration) -> Self {
        Self {
            inner,
            read_timeout,
            idle_timeout,
            head: Head::Reading { line_start: false },
            head_deadline: Box::pin(sleep(read_timeout)),
            idle_deadline: Box::pin(sleep(idle_timeout)),
        }
    }

    fn touch(&mut self) {
        let next = Instant::now() + self.idle_timeout;
        self.idle_deadline.as_mut().reset(next);
    }

    fn scan_read(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.head == Head::Responded {
            let next = Instant::now() + self.read_timeout;
            self.head_deadline.as_mut().reset(next);
            self.head = Head::Reading { line_start: false };
        }
        let Head::Reading { mut line_start } = self.head else {
            return;
        };
        for &byte in bytes {
            match byte {
                b'\n' if line_start => {
                    self.head = Head::Complete;
                    return;
                }
                b'\n' => line_start = true,
                b'\r' => {}
                _ => line_start = false,
            }
        }
        self.head = Head::Reading { line_start };
    }

    fn note_write(&mut self, written: usize) {
        if written > 0 && self.head == Head::Complete {
            self.head = Head::Responded;
        }
    }

    fn check_idle(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        match self.idle_deadline.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection idle timeout",
            )),
            Poll::Pending => Poll::Pending,
        }
    }

    fn check_head(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        if !matches!(self.head, Head::Reading { .. }) {
            return Poll::Pending;
        }
        match self.head_deadline.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(io::Error::new(
                io::ErrorKind::TimedOut,
                "request head read timeout",
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimeoutStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.touch();
                this.scan_read(&buf.filled()[before..]);
                Poll::Ready(result)
            }
            Poll::Pending => {
                if let Poll::Ready(err) = this.check_idle(cx) {
                    return Poll::Ready(Err(err));
                }
                this.check_head(cx).map(Err)
            }
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimeoutStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(result) => {
                this.touch();
                if let Ok(written) = &result {
                    this.note_write(*written);
                }
                Poll::Ready(result)
            }
            Poll::Pending => this.check_idle(cx).map(Err),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_write_vectored(cx, bufs) {
            Poll::Ready(result) => {
                this.touch();
                if let Ok(written) = &result {
                    this.note_write(*written);
                }
                Poll::Ready(result)
            }
            Poll::Pending => this.check_idle(cx).map(Err),
        }
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    const READ: Duration = Duration::from_secs(5);
    const IDLE: Duration = Duration::from_secs(15);

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (client, _server) = duplex(64);
        let mut stream = TimeoutStream::new(client, READ, IDLE);

        let mut buf = [0u8; 8];
        let err = stream.read(&mut buf).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn traffic_keeps_connection_alive() {
        let (client, mut server) = duplex(64);
        let mut stream = TimeoutStream::new(client, READ, IDLE);
        let mut buf = [0u8; 4];

        server.write_all(b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        let mut head = [0u8; 18];
        stream.read_exact(&mut head).await.unwrap();

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(10)).await;
            server.write_all(b"ping").await.unwrap();
            stream.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"ping");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_head_is_cut_off() {
        let (client, mut server) = duplex(256);
        let mut stream = TimeoutStream::new(client, READ, IDLE);
        let started = Instant::now();

        tokio::spawn(async move {
            let _ = server.write_all(b"GET /health HTTP/1.1\r\n").await;
            for i in 0..4 {
                tokio::time::sleep(Duration::from_secs(2)).await;
                let line = format!("x-slow-{i}: 1\r\n");
                if server.write_all(line.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = server.write_all(b"\r\n").await;
        });

        let mut buf = [0u8; 64];
        let err = loop {
            match stream.read(&mut buf).await {
                Ok(0) => panic!("stream ended before the head deadline"),
                Ok(_) => continue,
                Err(err) => break err,
            }
        };

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= READ && elapsed < READ + Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn next_request_head_gets_a_fresh_deadline() {
        let (client, mut server) = duplex(256);
        let mut stream = TimeoutStream::new(client, READ, IDLE);
        let mut buf = [0u8; 64];

        let head = b"GET / HTTP/1.1\nHost: a\n\n";
        server.write_all(head).await.unwrap();
        let read = stream.read(&mut buf).await.unwrap();
        assert_eq!(read, head.len());

        // Head done: body pauses only count against the idle timeout.
        tokio::time::advance(Duration::from_secs(8)).await;
        server.write_all(b"body").await.unwrap();
        assert_eq!(stream.read(&mut buf).await.unwrap(), 4);

        stream.write_all(b"HTTP/1.1 204 No Content\r\n\r\n").await.unwrap();

        server.write_all(b"GET /health").await.unwrap();
        stream.read(&mut buf).await.unwrap();
        let started = Instant::now();
        let err = stream.read(&mut buf).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        let elapsed = started.elapsed();
        assert!(elapsed >= READ && elapsed < READ + Duration::from_secs(1));
    }
}
