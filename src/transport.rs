//! The bidirectional byte stream the codec and handshake run over (spec
//! §4.A). Grounded on the Plain/Secure stream split implied by the
//! teacher's `stream.rs`/`server.rs` (`SocketFlowStream::{Plain, Secure}`),
//! rewritten against blocking `std::net::TcpStream` and sync `rustls`
//! (`StreamOwned`) instead of `tokio-rustls`, per spec.md §1/§5's
//! synchronous-transport requirement.

use crate::error::{Error, Result};
use pki_types::ServerName;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

enum Stream {
    Plain(TcpStream),
    TlsClient(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
    TlsServer(Box<rustls::StreamOwned<rustls::ServerConnection, TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Stream::Plain(s) => s,
            Stream::TlsClient(s) => &s.sock,
            Stream::TlsServer(s) => &s.sock,
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.read(buf),
            Stream::TlsClient(s) => s.read(buf),
            Stream::TlsServer(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Plain(s) => s.write(buf),
            Stream::TlsClient(s) => s.write(buf),
            Stream::TlsServer(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Plain(s) => s.flush(),
            Stream::TlsClient(s) => s.flush(),
            Stream::TlsServer(s) => s.flush(),
        }
    }
}

/// A bidirectional reliable byte stream: `read_exact`/`write_all`, `close`,
/// peer/local address, and a one-shot `enable_tls` wrap point that must run
/// before the first handshake byte.
pub struct Transport {
    stream: Option<Stream>,
    handshake_started: bool,
}

impl Transport {
    pub fn from_tcp(tcp: TcpStream) -> Self {
        Self {
            stream: Some(Stream::Plain(tcp)),
            handshake_started: false,
        }
    }

    pub fn connect(addr: &str) -> Result<Self> {
        Ok(Self::from_tcp(TcpStream::connect(addr)?))
    }

    /// Marks the point after which `enable_tls` is no longer legal: the
    /// first byte of the HTTP handshake.
    pub fn mark_handshake_started(&mut self) {
        self.handshake_started = true;
    }

    fn take_plain_tcp(&mut self) -> Result<TcpStream> {
        if self.handshake_started {
            return Err(Error::TlsConfig);
        }
        match self.stream.take() {
            Some(Stream::Plain(tcp)) => Ok(tcp),
            other => {
                self.stream = other;
                Err(Error::TlsConfig)
            }
        }
    }

    pub fn enable_tls_client(&mut self, config: Arc<rustls::ClientConfig>, server_name: &str) -> Result<()> {
        let tcp = self.take_plain_tcp()?;
        let name = ServerName::try_from(server_name)?.to_owned();
        let conn = rustls::ClientConnection::new(config, name)
            .map_err(|e| Error::TlsError(e.to_string()))?;
        self.stream = Some(Stream::TlsClient(Box::new(rustls::StreamOwned::new(conn, tcp))));
        Ok(())
    }

    pub fn enable_tls_server(&mut self, config: Arc<rustls::ServerConfig>) -> Result<()> {
        let tcp = self.take_plain_tcp()?;
        let conn = rustls::ServerConnection::new(config).map_err(|e| Error::TlsError(e.to_string()))?;
        self.stream = Some(Stream::TlsServer(Box::new(rustls::StreamOwned::new(conn, tcp))));
        Ok(())
    }

    fn stream_mut(&mut self) -> &mut Stream {
        self.stream.as_mut().expect("transport stream is always present outside enable_tls_*")
    }

    fn stream(&self) -> &Stream {
        self.stream.as_ref().expect("transport stream is always present outside enable_tls_*")
    }

    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        match self.stream_mut().read_exact(&mut buf) {
            Ok(()) => Ok(buf),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(Error::Closed),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.stream_mut().write_all(buf)?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.shutdown(Shutdown::Both)
    }

    pub fn shutdown(&mut self, how: Shutdown) -> Result<()> {
        match self.stream().tcp().shutdown(how) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream().tcp().peer_addr()?)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.stream().tcp().local_addr()?)
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream_mut().read(buf)
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream_mut().flush()
    }
}
