use std::io::{BufRead, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{CloseCallback, ListenerId, ListenerSet, TextListener, TextTransport};

/// Default maximum line length: 16 MiB.
pub const DEFAULT_MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// Configuration for newline-delimited transports.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Maximum message length in bytes, excluding the newline. Default: 16 MiB.
    pub max_line_len: usize,
    /// Write timeout applied to socket streams.
    pub write_timeout: Option<Duration>,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            write_timeout: None,
        }
    }
}

/// Text transport carrying one message per line over a byte stream.
///
/// A dedicated reader thread splits the stream on `\n` and dispatches each
/// non-empty line to the registered listeners, in order. The reader exits
/// when the stream reaches EOF, fails, or the transport is closed; any of
/// these closes the transport and fires its close callbacks.
///
/// Nothing is dispatched until the first listener is registered; lines that
/// arrive earlier wait in the stream.
#[derive(Clone)]
pub struct LineTransport {
    shared: Arc<LineShared>,
}

struct LineShared {
    name: &'static str,
    writer: Mutex<Box<dyn Write + Send>>,
    listeners: ListenerSet,
    shutdown: Box<dyn Fn() + Send + Sync>,
    gate: Arc<StartGate>,
    config: LineConfig,
}

/// Holds the reader back until someone is listening.
#[derive(Default)]
struct StartGate {
    open: Mutex<bool>,
    opened: Condvar,
}

impl StartGate {
    fn open(&self) {
        let mut open = self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !*open {
            *open = true;
            self.opened.notify_all();
        }
    }

    fn wait(&self) {
        let mut open = self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while !*open {
            open = self
                .opened
                .wait(open)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

impl LineShared {
    fn close(&self) {
        self.gate.open();
        if self.listeners.close() {
            debug!(transport = self.name, "line transport closed");
            (self.shutdown)();
        }
    }
}

impl Drop for LineShared {
    fn drop(&mut self) {
        // Unblocks the reader thread if it is parked in a read.
        self.gate.open();
        (self.shutdown)();
    }
}

impl LineTransport {
    /// Build a transport from separate read and write halves.
    ///
    /// `shutdown` must make a pending read on `reader` return; for sockets
    /// that is `shutdown(Both)` on a cloned handle.
    pub fn spawn<R, W, S>(
        name: &'static str,
        reader: R,
        writer: W,
        shutdown: S,
        config: LineConfig,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        S: Fn() + Send + Sync + 'static,
    {
        let max_line_len = config.max_line_len;
        let gate = Arc::new(StartGate::default());
        let shared = Arc::new(LineShared {
            name,
            writer: Mutex::new(Box::new(writer)),
            listeners: ListenerSet::new(),
            shutdown: Box::new(shutdown),
            gate: Arc::clone(&gate),
            config,
        });

        let weak = Arc::downgrade(&shared);
        thread::Builder::new()
            .name(format!("textbridge-{name}-reader"))
            .spawn(move || read_loop(reader, weak, gate, max_line_len))?;

        debug!(transport = name, "line transport started");
        Ok(Self { shared })
    }

    /// Wrap a connected Unix domain socket stream.
    #[cfg(unix)]
    pub fn from_unix(
        stream: std::os::unix::net::UnixStream,
        config: LineConfig,
    ) -> Result<Self> {
        stream.set_write_timeout(config.write_timeout)?;
        let reader = stream.try_clone()?;
        let handle = stream.try_clone()?;
        Self::spawn(
            "unix",
            reader,
            stream,
            move || {
                let _ = handle.shutdown(Shutdown::Both);
            },
            config,
        )
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream, config: LineConfig) -> Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_write_timeout(config.write_timeout)?;
        let reader = stream.try_clone()?;
        let handle = stream.try_clone()?;
        Self::spawn(
            "tcp",
            reader,
            stream,
            move || {
                let _ = handle.shutdown(Shutdown::Both);
            },
            config,
        )
    }

    /// Connect to a TCP endpoint (`host:port`).
    pub fn connect_tcp(addr: &str, config: LineConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        debug!(addr, "connected tcp line transport");
        Self::from_tcp(stream, config)
    }

    /// Current transport configuration.
    pub fn config(&self) -> &LineConfig {
        &self.shared.config
    }
}

fn read_loop<R: Read>(
    reader: R,
    shared: Weak<LineShared>,
    gate: Arc<StartGate>,
    max_line_len: usize,
) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let limit = (max_line_len as u64).saturating_add(1);

    loop {
        line.clear();
        match (&mut reader).take(limit).read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "line reader stopped");
                break;
            }
        }

        if line.last() != Some(&b'\n') && line.len() > max_line_len {
            if let Some(shared) = shared.upgrade() {
                warn!(
                    transport = shared.name,
                    size = line.len(),
                    max = max_line_len,
                    "inbound line exceeds limit; closing transport"
                );
                shared.close();
            }
            return;
        }

        let text = match std::str::from_utf8(&line) {
            Ok(text) => text.trim_end_matches(['\n', '\r']),
            Err(err) => {
                let name = shared.upgrade().map_or("line", |shared| shared.name);
                warn!(
                    transport = name,
                    size = line.len(),
                    error = %err,
                    "inbound line is not valid UTF-8; skipping"
                );
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }

        gate.wait();
        let Some(shared) = shared.upgrade() else {
            return;
        };
        shared.listeners.dispatch(text);
    }

    if let Some(shared) = shared.upgrade() {
        shared.close();
    }
}

impl TextTransport for LineTransport {
    fn register_listener(&self, listener: TextListener) -> ListenerId {
        let id = self.shared.listeners.register(listener);
        self.shared.gate.open();
        id
    }

    fn unregister_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.unregister(id)
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let max = self.shared.config.max_line_len;
        if text.len() > max {
            return Err(TransportError::MessageTooLarge {
                size: text.len(),
                max,
            });
        }
        if text.contains('\n') {
            return Err(TransportError::EmbeddedNewline);
        }

        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.extend_from_slice(text.as_bytes());
        buf.push(b'\n');

        let mut writer = self
            .shared
            .writer
            .lock()
            .map_err(|_| TransportError::Closed)?;
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(())
    }

    fn on_close(&self, callback: CloseCallback) {
        self.shared.listeners.on_close(callback);
    }

    fn close(&self) {
        self.shared.close();
    }

    fn is_closed(&self) -> bool {
        self.shared.listeners.is_closed()
    }

    fn transport_name(&self) -> &'static str {
        self.shared.name
    }
}

impl std::fmt::Debug for LineTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineTransport")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .field("max_line_len", &self.shared.config.max_line_len)
            .finish()
    }
}
