use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::config::NetworkConfig;
use crate::embedded;
use crate::location::{Location, Protocol};

const DNS_CACHE_ENTRIES: usize = 16;
const DNS_CACHE_TTL: Duration = Duration::from_secs(120);
const DNS_MAX_HOST_LEN: usize = 31;
/// Pause between polls once a transfer has gone quiet.
const IDLE_SLEEP: Duration = Duration::from_millis(250);
/// Downloads are written to disk whenever more than this is pending.
const FLUSH_THRESHOLD: usize = 4096;
const RECV_CHUNK: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("DNS resolution failed!")]
    Resolve,
    #[error("Connection error!")]
    Connect(#[source] io::Error),
    #[error("send() error!")]
    Send,
    #[error("Timeout while waiting for data!")]
    Timeout,
    #[error("Receive error: {0}")]
    Receive(#[source] io::Error),
    #[error("Connection aborted by the user.")]
    Aborted,
    #[error("Error: Server's answer is too long!")]
    TooLong,
    #[error("File already exists! Operation aborted.")]
    FileExists,
    #[error("Error: could not create the file on disk!")]
    FileCreate(#[source] io::Error),
    #[error("Error: could not write to disk!")]
    Write(#[source] io::Error),
}

impl FetchError {
    /// Everything but a user abort is shown as a warning.
    pub fn is_warning(&self) -> bool {
        !matches!(self, FetchError::Aborted)
    }

    /// The message as it goes on the status bar.
    pub fn status_message(&self) -> String {
        if self.is_warning() {
            format!("!{self}")
        } else {
            self.to_string()
        }
    }
}

/// Outcome of one receive poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Data(usize),
    /// Nothing arrived within the poll timeout.
    Idle,
    /// The peer shut the connection down.
    Closed,
}

/// The raw connection the fetch loop drives. One connection at a time.
pub trait Transport {
    fn resolve(&mut self, host: &str) -> Option<IpAddr>;
    fn connect(&mut self, addr: IpAddr, port: u16) -> io::Result<()>;
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;
    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Received>;
    fn close(&mut self);
    /// Drops the connection without waiting on the peer.
    fn abort(&mut self);
}

/// Callbacks a fetch uses to talk to whoever started it.
pub trait FetchObserver {
    fn progress(&mut self, message: &str);
    /// Polled once per receive iteration.
    fn abort_requested(&mut self) -> bool;
}

#[derive(Debug, Clone)]
struct DnsEntry {
    host: String,
    addr: IpAddr,
    inserted: Instant,
}

/// A small table of recent lookups. Hosts compare case-insensitively and
/// entries expire after two minutes.
#[derive(Debug, Default)]
pub struct DnsCache {
    entries: Vec<DnsEntry>,
}

impl DnsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, host: &str) -> Option<IpAddr> {
        self.lookup_at(host, Instant::now())
    }

    pub fn lookup_at(&self, host: &str, now: Instant) -> Option<IpAddr> {
        self.entries
            .iter()
            .find(|entry| {
                now.saturating_duration_since(entry.inserted) < DNS_CACHE_TTL
                    && entry.host.eq_ignore_ascii_case(host)
            })
            .map(|entry| entry.addr)
    }

    pub fn insert(&mut self, host: &str, addr: IpAddr) {
        self.insert_at(host, addr, Instant::now());
    }

    /// Known hosts are refreshed in place; a full table loses its oldest
    /// entry. Overlong names are not cached at all.
    pub fn insert_at(&mut self, host: &str, addr: IpAddr, now: Instant) {
        if host.len() > DNS_MAX_HOST_LEN {
            return;
        }
        let entry = DnsEntry {
            host: host.to_string(),
            addr,
            inserted: now,
        };
        if let Some(known) = self
            .entries
            .iter_mut()
            .find(|known| known.host.eq_ignore_ascii_case(host))
        {
            *known = entry;
        } else if self.entries.len() < DNS_CACHE_ENTRIES {
            self.entries.push(entry);
        } else if let Some(oldest) = self.entries.iter_mut().min_by_key(|known| known.inserted) {
            *oldest = entry;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plain TCP over `std::net`, with a per-transport DNS cache.
pub struct TcpTransport {
    stream: Option<TcpStream>,
    dns: DnsCache,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            stream: None,
            dns: DnsCache::new(),
            connect_timeout,
        }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "no open connection"))
    }
}

impl Transport for TcpTransport {
    fn resolve(&mut self, host: &str) -> Option<IpAddr> {
        if let Some(addr) = self.dns.lookup(host) {
            debug!(host, %addr, "dns cache hit");
            return Some(addr);
        }
        let addrs: Vec<SocketAddr> = (host, 0).to_socket_addrs().ok()?.collect();
        let addr = addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .map(SocketAddr::ip)?;
        debug!(host, %addr, "resolved");
        self.dns.insert(host, addr);
        Some(addr)
    }

    fn connect(&mut self, addr: IpAddr, port: u16) -> io::Result<()> {
        let stream = TcpStream::connect_timeout(&SocketAddr::new(addr, port), self.connect_timeout)?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let stream = self.stream()?;
        stream.write_all(data)?;
        Ok(data.len())
    }

    fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Received> {
        let stream = self.stream()?;
        stream.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        match stream.read(buf) {
            Ok(0) => Ok(Received::Closed),
            Ok(n) => Ok(Received::Data(n)),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(Received::Idle)
            }
            Err(err) => Err(err),
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn abort(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Where received bytes go.
trait Sink {
    fn accept(&mut self, data: &[u8]) -> Result<(), FetchError>;
    fn len(&self) -> usize;
}

struct MemorySink {
    body: Vec<u8>,
    limit: usize,
}

impl Sink for MemorySink {
    fn accept(&mut self, data: &[u8]) -> Result<(), FetchError> {
        if self.body.len() + data.len() > self.limit {
            return Err(FetchError::TooLong);
        }
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn len(&self) -> usize {
        self.body.len()
    }
}

struct FileSink {
    file: File,
    pending: Vec<u8>,
    written: usize,
}

impl FileSink {
    fn create(path: &Path) -> Result<Self, FetchError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => FetchError::FileExists,
                _ => FetchError::FileCreate(err),
            })?;
        Ok(Self {
            file,
            pending: Vec::new(),
            written: 0,
        })
    }

    fn flush_pending(&mut self) -> Result<(), FetchError> {
        self.file.write_all(&self.pending).map_err(FetchError::Write)?;
        self.written += self.pending.len();
        self.pending.clear();
        Ok(())
    }

    fn finish(mut self) -> Result<usize, FetchError> {
        self.flush_pending()?;
        self.file.flush().map_err(FetchError::Write)?;
        Ok(self.written)
    }
}

impl Sink for FileSink {
    fn accept(&mut self, data: &[u8]) -> Result<(), FetchError> {
        self.pending.extend_from_slice(data);
        if self.pending.len() > FLUSH_THRESHOLD {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.written + self.pending.len()
    }
}

/// Offset of the first byte after the HTTP header block, i.e. past the
/// first `\n\n` or `\n\r\n`.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 2 < buf.len() {
        if buf[i] == b'\n' {
            let mut j = i;
            if buf.get(j + 1) == Some(&b'\r') {
                j += 1;
            }
            if buf.get(j + 1) == Some(&b'\n') {
                return Some(j + 2);
            }
        }
        i += 1;
    }
    None
}

/// The bytes sent to ask for `location`. The selector is copied verbatim.
pub fn request(location: &Location, user_agent: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(location.selector.len() + 64);
    match location.protocol {
        Protocol::Http => {
            out.extend_from_slice(b"GET /");
            out.extend_from_slice(&location.selector);
            out.extend_from_slice(
                format!(
                    " HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\n\r\n",
                    location.host, user_agent
                )
                .as_bytes(),
            );
        }
        Protocol::Gopher | Protocol::Unknown => {
            out.extend_from_slice(&location.selector);
            out.extend_from_slice(b"\r\n");
        }
    }
    out
}

/// Runs whole transfers over a [`Transport`].
pub struct Fetcher<T: Transport> {
    transport: T,
    config: NetworkConfig,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, config: NetworkConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches a resource into memory, up to `max_response_bytes`.
    pub fn fetch(
        &mut self,
        location: &Location,
        observer: &mut dyn FetchObserver,
    ) -> Result<Vec<u8>, FetchError> {
        if location.is_embedded() {
            return Ok(embedded::page(&location.host).to_vec());
        }
        let limit = self.config.max_response_bytes;
        let sink = self.transfer(location, observer, || {
            Ok(MemorySink {
                body: Vec::new(),
                limit,
            })
        })?;
        debug!(url = %location, bytes = sink.body.len(), "fetched");
        Ok(sink.body)
    }

    /// Streams a resource into a new file at `path` and returns the number
    /// of bytes saved. An existing file is never overwritten.
    pub fn download(
        &mut self,
        location: &Location,
        path: &Path,
        observer: &mut dyn FetchObserver,
    ) -> Result<usize, FetchError> {
        let sink = if location.is_embedded() {
            let mut sink = FileSink::create(path)?;
            sink.accept(embedded::page(&location.host))?;
            sink
        } else {
            self.transfer(location, observer, || FileSink::create(path))?
        };
        let written = sink.finish()?;
        debug!(url = %location, path = %path.display(), bytes = written, "downloaded");
        Ok(written)
    }

    /// Resolve, connect, send the request, then open the sink and pump the
    /// response into it. The connection is closed on success and aborted on
    /// any failure.
    fn transfer<S: Sink>(
        &mut self,
        location: &Location,
        observer: &mut dyn FetchObserver,
        open_sink: impl FnOnce() -> Result<S, FetchError>,
    ) -> Result<S, FetchError> {
        observer.progress(&format!("Resolving '{}'...", location.host));
        let addr = self
            .transport
            .resolve(&location.host)
            .ok_or(FetchError::Resolve)?;

        observer.progress(&format!("Connecting to {addr}..."));
        self.transport
            .connect(addr, location.port)
            .map_err(FetchError::Connect)?;

        let request = request(location, &self.config.user_agent);
        match self.transport.send(&request) {
            Ok(sent) if sent == request.len() => {}
            _ => {
                self.transport.close();
                return Err(FetchError::Send);
            }
        }

        let mut sink = match open_sink() {
            Ok(sink) => sink,
            Err(err) => {
                self.transport.abort();
                return Err(err);
            }
        };

        match self.receive_into(location.protocol, observer, &mut sink) {
            Ok(()) => {
                self.transport.close();
                Ok(sink)
            }
            Err(err) => {
                debug!(url = %location, error = %err, "transfer failed");
                self.transport.abort();
                Err(err)
            }
        }
    }

    fn receive_into(
        &mut self,
        protocol: Protocol,
        observer: &mut dyn FetchObserver,
        sink: &mut dyn Sink,
    ) -> Result<(), FetchError> {
        let mut buf = vec![0u8; RECV_CHUNK];
        // HTTP bytes are held back until the end of the headers shows up
        let mut header = (protocol == Protocol::Http).then(Vec::new);
        let mut last_activity = Instant::now();

        loop {
            let received = self
                .transport
                .receive(&mut buf, self.config.poll_interval)
                .map_err(FetchError::Receive)?;
            if received == Received::Closed {
                break;
            }
            if observer.abort_requested() {
                return Err(FetchError::Aborted);
            }

            match received {
                Received::Data(n) => {
                    last_activity = Instant::now();
                    let chunk = &buf[..n];
                    match header.as_mut() {
                        Some(head) => {
                            head.extend_from_slice(chunk);
                            if let Some(end) = find_header_end(head) {
                                let body = head.split_off(end);
                                header = None;
                                sink.accept(&body)?;
                            } else if head.len() > self.config.max_response_bytes {
                                return Err(FetchError::TooLong);
                            }
                        }
                        None => {
                            sink.accept(chunk)?;
                            observer.progress(&format!("Downloading... [{} bytes]", sink.len()));
                        }
                    }
                }
                Received::Idle => {
                    let idle = last_activity.elapsed();
                    if idle > self.config.timeout {
                        return Err(FetchError::Timeout);
                    }
                    if idle > self.config.idle_threshold {
                        thread::sleep(IDLE_SLEEP);
                    }
                }
                Received::Closed => break,
            }
        }

        // a response without a blank line is kept whole
        if let Some(head) = header {
            sink.accept(&head)?;
        }
        Ok(())
    }
}
