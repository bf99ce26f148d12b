//! TCP transport between the host and the device bridge.
//!
//! The microcontroller sits behind a serial-to-TCP bridge on the same
//! machine, which connects to the host once and keeps the connection open.
//! [`DeviceListener`] accepts that connection and [`DeviceLink`] splits it
//! into the read half for the inbound worker and the write half for the
//! outbound worker.
//!
//! Splitting uses `TcpStream::try_clone`, which duplicates the OS handle;
//! both halves refer to the same socket.  [`LinkShutdown`] keeps a third
//! handle so the socket can be shut down from the main thread, which unblocks
//! the inbound worker's pending read.

use std::io::{self, BufReader};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Errors from setting up the device link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to bind device listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept device connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("failed to split device connection from {peer}: {source}")]
    Split {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Listens for the device bridge.
#[derive(Debug)]
pub struct DeviceListener {
    listener: TcpListener,
}

impl DeviceListener {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Bind`] if the address is unavailable.
    pub fn bind(addr: SocketAddr) -> Result<Self, LinkError> {
        let listener =
            TcpListener::bind(addr).map_err(|source| LinkError::Bind { addr, source })?;
        Ok(Self { listener })
    }

    /// The bound address; useful when binding port 0.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the address cannot be read back.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the device bridge to connect.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Accept`] if the accept call fails.
    pub fn accept(&self) -> Result<DeviceLink, LinkError> {
        let (stream, peer) = self.listener.accept().map_err(LinkError::Accept)?;
        Ok(DeviceLink::connected(stream, peer))
    }

    /// Like [`DeviceListener::accept`], but gives up with `Ok(None)` once
    /// `stop` is set.  The flag is checked every `poll_interval`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Accept`] if the listener cannot be switched
    /// between blocking modes or the accept call fails.
    pub fn accept_until(
        &self,
        stop: &AtomicBool,
        poll_interval: Duration,
    ) -> Result<Option<DeviceLink>, LinkError> {
        self.listener
            .set_nonblocking(true)
            .map_err(LinkError::Accept)?;
        let accepted = loop {
            if stop.load(Ordering::Relaxed) {
                break None;
            }
            match self.listener.accept() {
                Ok(pair) => break Some(pair),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(poll_interval),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LinkError::Accept(e)),
            }
        };
        self.listener
            .set_nonblocking(false)
            .map_err(LinkError::Accept)?;

        match accepted {
            Some((stream, peer)) => {
                // Accepted sockets may inherit non-blocking mode on some
                // platforms.
                stream.set_nonblocking(false).map_err(LinkError::Accept)?;
                Ok(Some(DeviceLink::connected(stream, peer)))
            }
            None => Ok(None),
        }
    }
}

/// One accepted device connection.
#[derive(Debug)]
pub struct DeviceLink {
    stream: TcpStream,
    peer: SocketAddr,
}

/// Handle that shuts the link down from another thread.
#[derive(Debug)]
pub struct LinkShutdown {
    stream: TcpStream,
}

impl LinkShutdown {
    /// Shuts down both directions.  Blocked reads return end of stream.
    pub fn shutdown(&self) {
        // NotConnected just means the peer already closed.
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("device link shutdown: {e}");
        }
    }
}

/// The pieces of a split [`DeviceLink`].
#[derive(Debug)]
pub struct LinkHalves {
    pub reader: BufReader<TcpStream>,
    pub writer: TcpStream,
    pub shutdown: LinkShutdown,
}

impl DeviceLink {
    fn connected(stream: TcpStream, peer: SocketAddr) -> Self {
        // Command frames are tiny; send each one immediately.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not disable Nagle on device link: {e}");
        }
        info!("device connected from {peer}");
        Self { stream, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Splits the connection into independently owned halves.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Split`] if the socket handle cannot be cloned.
    pub fn into_halves(self) -> Result<LinkHalves, LinkError> {
        let peer = self.peer;
        let clone = |stream: &TcpStream| {
            stream
                .try_clone()
                .map_err(|source| LinkError::Split { peer, source })
        };
        let writer = clone(&self.stream)?;
        let shutdown = LinkShutdown {
            stream: clone(&self.stream)?,
        };
        Ok(LinkHalves {
            reader: BufReader::new(self.stream),
            writer,
            shutdown,
        })
    }
}
