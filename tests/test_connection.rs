use std::cell::{Cell, RefCell};
use std::io::{self, ErrorKind};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::time::Instant;
use wibble::http::assets::AssetRoot;
use wibble::http::connection::{Connection, ConnectionState, is_abort};
use wibble::sim::{SharedSimulation, Simulation};

const TICK: Duration = Duration::from_millis(5);

#[derive(Default)]
struct Recorder {
    inputs: Vec<Vec<u8>>,
}

impl Simulation for Recorder {
    fn do_frame(&mut self, input: &[u8]) -> Vec<u8> {
        self.inputs.push(input.to_vec());
        let mut out = b"frame:".to_vec();
        out.extend_from_slice(input);
        out
    }
}

struct Harness {
    client: DuplexStream,
    conn: Connection<DuplexStream>,
    recorder: Rc<RefCell<Recorder>>,
    _assets: tempfile::TempDir,
}

fn harness(tick: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>hi</html>").unwrap();

    let (client, server) = tokio::io::duplex(64 * 1024);
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let sim: SharedSimulation = recorder.clone();
    let assets = Rc::new(AssetRoot::new(dir.path(), "index.html"));

    Harness {
        client,
        conn: Connection::new(1, server, sim, assets, tick),
        recorder,
        _assets: dir,
    }
}

/// Steps until one response has been written. The request must be complete.
async fn run_cycle(conn: &mut Connection<DuplexStream>) {
    loop {
        assert!(conn.step().await, "connection closed mid-cycle");
        if matches!(conn.state(), ConnectionState::Writing) {
            assert!(conn.step().await);
            assert_eq!(conn.state(), &ConnectionState::AwaitingTick);
            return;
        }
    }
}

/// Reads one response: (head, body).
async fn read_response(client: &mut DuplexStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8(buf[..end].to_vec()).unwrap();
            let length: usize = head
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .expect("Content-Length present")
                .parse()
                .unwrap();

            let body_start = end + 4;
            if buf.len() >= body_start + length {
                return (head, buf[body_start..body_start + length].to_vec());
            }
        }

        let n = client.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before full response");
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[tokio::test]
async fn test_starts_awaiting_tick() {
    let h = harness(TICK);
    assert_eq!(h.conn.state(), &ConnectionState::AwaitingTick);
    assert!(h.conn.is_open());
}

#[tokio::test]
async fn test_frame_round_trip() {
    let mut h = harness(TICK);

    h.client
        .write_all(b"PUT /data HTTP/1.1\r\nContent-Length: 7\r\n\r\nPAYLOAD")
        .await
        .unwrap();
    run_cycle(&mut h.conn).await;

    let (head, body) = read_response(&mut h.client).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Type: application/octet-stream"));
    assert_eq!(body, b"frame:PAYLOAD".to_vec());
    assert_eq!(h.recorder.borrow().inputs, vec![b"PAYLOAD".to_vec()]);
}

#[tokio::test]
async fn test_serves_asset_and_not_found() {
    let mut h = harness(TICK);

    h.client
        .write_all(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    run_cycle(&mut h.conn).await;
    let (head, body) = read_response(&mut h.client).await;
    assert!(head.starts_with("HTTP/1.1 200 OK"));
    assert!(head.contains("Content-Type: text/html"));
    assert_eq!(body, b"<html>hi</html>".to_vec());

    h.client
        .write_all(b"GET /nope.html HTTP/1.1\r\n\r\n")
        .await
        .unwrap();
    run_cycle(&mut h.conn).await;
    let (head, _) = read_response(&mut h.client).await;
    assert!(head.starts_with("HTTP/1.1 404 Not Found"));
    assert!(head.contains("Content-Type: text/html"));
    assert!(h.recorder.borrow().inputs.is_empty());
}

#[tokio::test]
async fn test_split_request_waits_for_more_bytes() {
    let mut h = harness(TICK);

    h.client
        .write_all(b"PUT /data HTTP/1.1\r\nContent-Length: 7\r\n\r\nPAY")
        .await
        .unwrap();

    assert!(h.conn.step().await);
    assert_eq!(h.conn.state(), &ConnectionState::Reading);
    assert!(h.conn.step().await);
    assert_eq!(h.conn.state(), &ConnectionState::AwaitingTick);
    assert!(h.recorder.borrow().inputs.is_empty());
    assert!(h.conn.pending().ends_with(b"PAY"));

    h.client.write_all(b"LOAD").await.unwrap();
    run_cycle(&mut h.conn).await;

    let (_, body) = read_response(&mut h.client).await;
    assert_eq!(body, b"frame:PAYLOAD".to_vec());
    assert!(h.conn.pending().is_empty());
}

#[tokio::test]
async fn test_pipelined_request_dispatched_next_tick() {
    let mut h = harness(TICK);

    h.client
        .write_all(
            b"PUT /data HTTP/1.1\r\nContent-Length: 3\r\n\r\none\
              PUT /data HTTP/1.1\r\nContent-Length: 3\r\n\r\ntwo",
        )
        .await
        .unwrap();

    run_cycle(&mut h.conn).await;
    assert_eq!(h.recorder.borrow().inputs.len(), 1);
    assert!(h.conn.pending().ends_with(b"two"));

    // No new bytes: the buffered request goes straight to dispatch after the tick.
    assert!(h.conn.step().await);
    assert!(matches!(h.conn.state(), ConnectionState::Dispatching(_)));
    run_cycle(&mut h.conn).await;

    assert_eq!(
        h.recorder.borrow().inputs,
        vec![b"one".to_vec(), b"two".to_vec()]
    );
    assert!(h.conn.pending().is_empty());

    let (_, first) = read_response(&mut h.client).await;
    let (_, second) = read_response(&mut h.client).await;
    assert_eq!(first, b"frame:one".to_vec());
    assert_eq!(second, b"frame:two".to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_reads_are_gated_by_timer() {
    let tick = Duration::from_millis(33);
    let mut h = harness(tick);
    let start = Instant::now();

    for i in 1..=3u32 {
        h.client
            .write_all(b"PUT /data HTTP/1.1\r\nContent-Length: 1\r\n\r\nx")
            .await
            .unwrap();
        run_cycle(&mut h.conn).await;
        assert!(start.elapsed() >= tick * i, "frame {i} ran early");
    }

    assert_eq!(h.recorder.borrow().inputs.len(), 3);
}

#[tokio::test]
async fn test_peer_close_closes_connection() {
    let mut h = harness(TICK);
    let status = h.conn.status();
    drop(h.client);

    assert!(h.conn.step().await);
    assert!(h.conn.step().await);
    assert_eq!(h.conn.state(), &ConnectionState::Closed);
    assert!(!status.is_open());

    // Closed is terminal.
    assert!(!h.conn.step().await);
    assert!(!h.conn.step().await);
}

#[tokio::test]
async fn test_run_returns_after_close() {
    let h = harness(TICK);
    let status = h.conn.status();

    let mut client = h.client;
    client
        .write_all(b"GET /index.html HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let task = tokio::spawn(async move {
        let (_, body) = read_response(&mut client).await;
        drop(client);
        body
    });

    h.conn.run().await;

    assert_eq!(task.await.unwrap(), b"<html>hi</html>".to_vec());
    assert!(!status.is_open());
}

#[test]
fn test_abort_classification() {
    use std::io::{Error, ErrorKind};

    assert!(is_abort(&Error::from(ErrorKind::ConnectionAborted)));
    assert!(is_abort(&Error::from(ErrorKind::ConnectionReset)));
    assert!(!is_abort(&Error::from(ErrorKind::BrokenPipe)));
    assert!(!is_abort(&Error::from(ErrorKind::TimedOut)));
}

/// Stream that serves `input` once, then fails reads and/or writes on demand.
struct FaultyStream {
    input: Vec<u8>,
    read_error: Option<ErrorKind>,
    write_error: Option<ErrorKind>,
    shutdown_called: Rc<Cell<bool>>,
}

impl FaultyStream {
    fn failing_reads(kind: ErrorKind) -> Self {
        Self {
            input: Vec::new(),
            read_error: Some(kind),
            write_error: None,
            shutdown_called: Rc::new(Cell::new(false)),
        }
    }

    fn failing_writes(request: &[u8], kind: ErrorKind) -> Self {
        Self {
            input: request.to_vec(),
            read_error: None,
            write_error: Some(kind),
            shutdown_called: Rc::new(Cell::new(false)),
        }
    }
}

impl AsyncRead for FaultyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.input.is_empty() {
            let n = self.input.len().min(buf.remaining());
            buf.put_slice(&self.input[..n]);
            self.input.drain(..n);
            return Poll::Ready(Ok(()));
        }
        match self.read_error {
            Some(kind) => Poll::Ready(Err(kind.into())),
            None => Poll::Pending,
        }
    }
}

impl AsyncWrite for FaultyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.write_error {
            Some(kind) => Poll::Ready(Err(kind.into())),
            None => Poll::Ready(Ok(buf.len())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shutdown_called.set(true);
        Poll::Ready(Ok(()))
    }
}

/// Drives a connection over `stream` for `steps` transitions.
/// Returns whether the stream was shut down locally.
async fn drive_faulty(stream: FaultyStream, steps: usize) -> bool {
    let shutdown_called = stream.shutdown_called.clone();
    let sim: SharedSimulation = Rc::new(RefCell::new(Recorder::default()));
    let assets = Rc::new(AssetRoot::new("unused", "index.html"));
    let mut conn = Connection::new(7, stream, sim, assets, TICK);
    let status = conn.status();

    for _ in 0..steps {
        assert!(conn.step().await);
    }

    assert_eq!(conn.state(), &ConnectionState::Closed);
    assert!(!status.is_open());
    assert!(!conn.step().await);

    shutdown_called.get()
}

#[tokio::test]
async fn test_read_reset_closes_without_shutdown() {
    // AwaitingTick -> Reading -> Closed
    let shutdown = drive_faulty(FaultyStream::failing_reads(ErrorKind::ConnectionReset), 2).await;
    assert!(!shutdown);
}

#[tokio::test]
async fn test_read_aborted_closes_without_shutdown() {
    let shutdown = drive_faulty(FaultyStream::failing_reads(ErrorKind::ConnectionAborted), 2).await;
    assert!(!shutdown);
}

#[tokio::test]
async fn test_read_error_shuts_down_locally() {
    let shutdown = drive_faulty(FaultyStream::failing_reads(ErrorKind::BrokenPipe), 2).await;
    assert!(shutdown);
}

#[tokio::test]
async fn test_write_error_shuts_down_locally() {
    let request = b"PUT /data HTTP/1.1\r\nContent-Length: 2\r\n\r\nhi";
    // AwaitingTick -> Reading -> Dispatching -> Writing -> Closed
    let shutdown = drive_faulty(FaultyStream::failing_writes(request, ErrorKind::BrokenPipe), 4).await;
    assert!(shutdown);
}

#[tokio::test]
async fn test_write_reset_closes_without_shutdown() {
    let request = b"GET /missing HTTP/1.1\r\n\r\n";
    let shutdown =
        drive_faulty(FaultyStream::failing_writes(request, ErrorKind::ConnectionReset), 4).await;
    assert!(!shutdown);
}
