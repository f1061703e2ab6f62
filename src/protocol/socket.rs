use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use log::debug;
use native_tls::{TlsConnector, TlsStream};
use socket2::{Domain, Protocol, Socket, Type};

use crate::{Error, Result, config::ClientConfig};

enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Stream::Plain(s) => s,
            Stream::Tls(s) => s.get_ref(),
        }
    }
}

/// Connection shared by the read and write halves of a session.
///
/// A TLS stream cannot be split, so both halves lock the same stream. The
/// session is sequential, so the lock is never contended.
#[derive(Clone)]
pub struct SharedStream {
    inner: Arc<Mutex<Stream>>,
}

impl SharedStream {
    /// Opens a TCP connection with the configured socket options, then TLS
    /// on top of it when `ssl` is set.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let tcp = open_tcp(config)?;
        let stream = if config.ssl {
            let mut builder = TlsConnector::builder();
            if config.skip_verification {
                builder
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true);
            }
            let connector = builder.build().map_err(|e| Error::Tls(e.to_string()))?;
            tcp.set_read_timeout(Some(config.connect_timeout()))?;
            tcp.set_write_timeout(Some(config.connect_timeout()))?;
            let tls = connector
                .connect(&config.host, tcp)
                .map_err(|e| Error::Tls(e.to_string()))?;
            Stream::Tls(Box::new(tls))
        } else {
            Stream::Plain(tcp)
        };
        Ok(Self {
            inner: Arc::new(Mutex::new(stream)),
        })
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Stream>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("connection lock poisoned"))
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.lock()?.tcp().set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.lock()?.tcp().set_write_timeout(timeout)?;
        Ok(())
    }

    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.lock()?.tcp().peer_addr()?)
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.lock()?.tcp().local_addr()?)
    }

    pub fn is_tls(&self) -> bool {
        self.lock()
            .map(|s| matches!(*s, Stream::Tls(_)))
            .unwrap_or(false)
    }

    pub fn shutdown(&self) -> Result<()> {
        let mut stream = self.lock()?;
        if let Stream::Tls(tls) = &mut *stream {
            // best effort close_notify before the TCP shutdown
            if let Err(e) = tls.shutdown() {
                debug!("tls shutdown: {e}");
            }
        }
        stream.tcp().shutdown(Shutdown::Both)?;
        Ok(())
    }
}

impl Read for SharedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut *self.lock()? {
            Stream::Plain(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for SharedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.lock()? {
            Stream::Plain(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.lock()? {
            Stream::Plain(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
        }
    }
}

fn open_tcp(config: &ClientConfig) -> Result<TcpStream> {
    let addrs = (config.host.as_str(), config.port).to_socket_addrs()?;
    let mut last_error = None;
    for addr in addrs {
        match connect_addr(addr, config) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error
        .map(Error::from)
        .unwrap_or_else(|| Error::Config(format!("{} resolves to no address", config.address()))))
}

fn connect_addr(addr: SocketAddr, config: &ClientConfig) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(config.tcp_no_delay)?;
    socket.set_keepalive(config.tcp_keep_alive)?;
    socket.set_send_buffer_size(config.send_buffer_size)?;
    socket.set_recv_buffer_size(config.receive_buffer_size)?;
    socket.connect_timeout(&addr.into(), config.connect_timeout())?;
    Ok(socket.into())
}
