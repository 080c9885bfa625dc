//! Thread-per-connection TCP front end.
//!
//! # Responsibility
//! - Accept client connections and hand each one to its own OS thread.
//! - Frame newline-delimited requests/responses on each connection.
//!
//! # Invariants
//! - Accept and spawn failures are logged; the loop keeps serving.
//! - A failing connection never affects other connections or the process.
//! - Workers share only the `Arc<Dispatcher>`.

use crate::dispatcher::Dispatcher;
use crate::protocol::{error_codes, JsonRpcResponse};
use log::{debug, error, info, warn};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use topicnote_core::{DocumentStore, EnrichmentClient};

pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Bound listener plus the shared dispatcher.
pub struct NoteServer<S: DocumentStore, E: EnrichmentClient> {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher<S, E>>,
    max_request_bytes: usize,
    read_timeout: Option<Duration>,
    active_connections: Arc<AtomicUsize>,
}

impl<S, E> NoteServer<S, E>
where
    S: DocumentStore + 'static,
    E: EnrichmentClient + 'static,
{
    pub fn bind(
        addr: impl ToSocketAddrs,
        dispatcher: Dispatcher<S, E>,
        max_request_bytes: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            dispatcher: Arc::new(dispatcher),
            max_request_bytes,
            read_timeout: Some(Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Closes connections that send nothing for `timeout`; `None` waits forever.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one worker thread per connection.
    pub fn serve(self) {
        info!(
            "event=server_listen module=server status=ok addr={}",
            self.listener
                .local_addr()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|_| "unknown".to_string())
        );

        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(err) => {
                    // Mostly transient (EMFILE, ECONNABORTED).
                    error!("event=server_accept module=server status=error error={err}");
                    continue;
                }
            };

            let conn_id = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
            let conn_tag = format!("C{conn_id:03}");
            let dispatcher = Arc::clone(&self.dispatcher);
            let active = Arc::clone(&self.active_connections);
            let max_request_bytes = self.max_request_bytes;
            if let Err(err) = stream.set_read_timeout(self.read_timeout) {
                warn!("event=conn_timeout module=server status=error peer={peer} error={err}");
            }

            let spawned = thread::Builder::new()
                .name(format!("topicnote-conn-{conn_id}"))
                .spawn(move || {
                    let count = active.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(
                        "event=conn_open module=server conn={conn_tag} peer={peer} active={count}"
                    );
                    if let Err(err) =
                        handle_connection(stream, &*dispatcher, max_request_bytes, &conn_tag)
                    {
                        match err.kind() {
                            io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe => debug!(
                                "event=conn_error module=server conn={conn_tag} status=disconnected error={err}"
                            ),
                            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => debug!(
                                "event=conn_error module=server conn={conn_tag} status=idle_timeout"
                            ),
                            _ => warn!(
                                "event=conn_error module=server conn={conn_tag} status=error error={err}"
                            ),
                        }
                    }
                    let count = active.fetch_sub(1, Ordering::SeqCst) - 1;
                    info!("event=conn_close module=server conn={conn_tag} active={count}");
                });
            if let Err(err) = spawned {
                error!("event=server_spawn module=server status=error peer={peer} error={err}");
            }
        }
    }
}

enum LineRead {
    Eof,
    Line(Vec<u8>),
    TooLarge,
}

/// Serves request lines on one connection until EOF or a closing reply.
fn handle_connection<S: DocumentStore, E: EnrichmentClient>(
    stream: TcpStream,
    dispatcher: &Dispatcher<S, E>,
    max_request_bytes: usize,
    conn_tag: &str,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let raw = match read_line_bounded(&mut reader, max_request_bytes)? {
            LineRead::Eof => return Ok(()),
            LineRead::TooLarge => {
                warn!(
                    "event=rpc_decode module=server conn={conn_tag} status=error error_code=payload_too_large limit={max_request_bytes}"
                );
                let response = JsonRpcResponse::error(
                    None,
                    error_codes::INVALID_REQUEST,
                    format!("request exceeds {max_request_bytes} bytes"),
                );
                return write_response(&mut writer, &response);
            }
            LineRead::Line(raw) => raw,
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let reply = dispatcher.handle_bytes(&raw);
        if let Some(response) = &reply.response {
            write_response(&mut writer, response)?;
        }
        if reply.close {
            debug!("event=conn_close module=server conn={conn_tag} reason=fatal_request");
            return Ok(());
        }
    }
}

/// Reads up to and including `\n`, refusing lines longer than `max_bytes`.
fn read_line_bounded<R: BufRead>(reader: &mut R, max_bytes: usize) -> io::Result<LineRead> {
    let mut buf = Vec::new();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let read = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() != Some(&b'\n') && buf.len() > max_bytes {
        return Ok(LineRead::TooLarge);
    }
    Ok(LineRead::Line(buf))
}

fn write_response(writer: &mut impl Write, response: &JsonRpcResponse) -> io::Result<()> {
    let mut encoded = serde_json::to_vec(response)?;
    encoded.push(b'\n');
    writer.write_all(&encoded)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::{read_line_bounded, LineRead};
    use std::io::Cursor;

    #[test]
    fn read_line_bounded_splits_lines_and_reports_eof() {
        let mut input = Cursor::new(b"first\nsecond".to_vec());
        assert!(matches!(
            read_line_bounded(&mut input, 64).unwrap(),
            LineRead::Line(line) if line == b"first\n"
        ));
        assert!(matches!(
            read_line_bounded(&mut input, 64).unwrap(),
            LineRead::Line(line) if line == b"second"
        ));
        assert!(matches!(read_line_bounded(&mut input, 64).unwrap(), LineRead::Eof));
    }

    #[test]
    fn read_line_bounded_rejects_oversized_line() {
        let mut input = Cursor::new(vec![b'x'; 100]);
        assert!(matches!(
            read_line_bounded(&mut input, 10).unwrap(),
            LineRead::TooLarge
        ));

        let mut exact = Cursor::new(b"0123456789\n".to_vec());
        assert!(matches!(
            read_line_bounded(&mut exact, 10).unwrap(),
            LineRead::Line(_)
        ));
    }
}
