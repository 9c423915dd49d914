/*
  TcpPipe - length framed pipe over a TCP stream

  Every message travels as one frame:

    ┌────────────────────┬──────────────────────────┐
    │ length (u32, BE)   │ payload (length bytes)   │
    └────────────────────┴──────────────────────────┘

  The initiator connects and sends first. The listener only accepts the TCP
  connection and hands out a `PendingTcpPipe`; reading that first frame is
  left to `PendingTcpPipe::accept`, normally in the connection's own task, so
  a silent client never holds up the accept loop. The accepted pipe holds the
  initiation data. After that both sides alternate: `send` writes one frame
  and waits for the next frame from the peer.

  A timed out or failed exchange leaves the stream mid-frame, so the pipe
  drops its stream and every later call reports `Closed`. Oversized outgoing
  messages are refused before anything is written and leave the pipe usable.
*/

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use super::error::{TransportError, TransportResult};
use super::pipe::{NetworkPeer, NetworkPipe, PipeRole};
use crate::config::NetworkConfig;

const LENGTH_PREFIX: usize = 4;

/// Limits applied to a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipeOptions {
    pub max_frame_size: usize,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&NetworkConfig> for PipeOptions {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            max_frame_size: config.max_frame_size,
            connect_timeout: config.connect_timeout,
            response_timeout: config.response_timeout,
        }
    }
}

/// Write one length-prefixed frame
pub async fn write_frame<W>(writer: &mut W, data: &[u8], limit: usize) -> TransportResult<()>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > limit || data.len() > u32::MAX as usize {
        return Err(TransportError::FrameTooLarge {
            size: data.len(),
            limit,
        });
    }

    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame; a clean EOF before the prefix is `Closed`
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> TransportResult<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LENGTH_PREFIX];
    reader.read_exact(&mut prefix).await.map_err(eof_as_closed)?;

    let size = u32::from_be_bytes(prefix) as usize;
    if size > limit {
        return Err(TransportError::FrameTooLarge { size, limit });
    }

    let mut frame = vec![0u8; size];
    reader.read_exact(&mut frame).await.map_err(eof_as_closed)?;
    Ok(frame)
}

fn eof_as_closed(err: std::io::Error) -> TransportError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TransportError::Closed
    } else {
        TransportError::Io(err)
    }
}

/// Pipe over one TCP connection
#[derive(Debug)]
pub struct TcpPipe {
    stream: Mutex<Option<TcpStream>>,
    peer: NetworkPeer,
    initiation: Option<Vec<u8>>,
    options: PipeOptions,
}

impl TcpPipe {
    /// Connect as the initiator
    pub async fn connect<A>(addr: A, options: PipeOptions) -> TransportResult<Self>
    where
        A: ToSocketAddrs,
    {
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout(options.connect_timeout))??;
        stream.set_nodelay(true)?;

        let peer_addr = stream.peer_addr()?;
        debug!(peer = %peer_addr, "Connected TCP pipe");

        Ok(Self {
            stream: Mutex::new(Some(stream)),
            peer: NetworkPeer::new(peer_addr.to_string(), PipeRole::Responder),
            initiation: None,
            options,
        })
    }

    pub fn options(&self) -> &PipeOptions {
        &self.options
    }

    async fn exchange(&self, stream: &mut TcpStream, data: &[u8]) -> TransportResult<Vec<u8>> {
        write_frame(stream, data, self.options.max_frame_size).await?;

        let timeout = self.options.response_timeout;
        tokio::time::timeout(timeout, read_frame(stream, self.options.max_frame_size))
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
    }
}

#[async_trait]
impl NetworkPipe for TcpPipe {
    fn peer(&self) -> &NetworkPeer {
        &self.peer
    }

    fn initiation_data(&self) -> Option<&[u8]> {
        self.initiation.as_deref()
    }

    async fn send(&self, data: &[u8]) -> TransportResult<Vec<u8>> {
        let limit = self.options.max_frame_size;
        if data.len() > limit {
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                limit,
            });
        }

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::Closed)?;

        match self.exchange(stream, data).await {
            Ok(reply) => {
                trace!(peer = %self.peer, sent = data.len(), received = reply.len(), "Pipe exchange");
                Ok(reply)
            }
            Err(err) => {
                guard.take();
                warn!(peer = %self.peer, error = %err, "Pipe exchange failed, dropping stream");
                Err(err)
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        let Some(mut stream) = self.stream.lock().await.take() else {
            return Ok(());
        };
        debug!(peer = %self.peer, "Closing TCP pipe");
        match stream.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Accepts responder pipes
#[derive(Debug)]
pub struct TcpPipeListener {
    listener: TcpListener,
    options: PipeOptions,
}

impl TcpPipeListener {
    pub async fn bind<A>(addr: A, options: PipeOptions) -> TransportResult<Self>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        debug!(addr = ?listener.local_addr().ok(), "TCP pipe listener bound");
        Ok(Self { listener, options })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the next connection without reading from it
    pub async fn accept(&self) -> TransportResult<PendingTcpPipe> {
        let (stream, peer_addr) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        trace!(peer = %peer_addr, "TCP connection waiting for initiation");

        Ok(PendingTcpPipe {
            stream,
            peer_addr,
            options: self.options,
        })
    }
}

/// Accepted connection whose initiation frame has not been read yet
#[derive(Debug)]
pub struct PendingTcpPipe {
    stream: TcpStream,
    peer_addr: SocketAddr,
    options: PipeOptions,
}

impl PendingTcpPipe {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Read the initiation frame within the response timeout
    pub async fn accept(mut self) -> TransportResult<TcpPipe> {
        let timeout = self.options.response_timeout;
        let initiation = tokio::time::timeout(
            timeout,
            read_frame(&mut self.stream, self.options.max_frame_size),
        )
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

        debug!(peer = %self.peer_addr, initiation = initiation.len(), "Accepted TCP pipe");
        Ok(TcpPipe {
            stream: Mutex::new(Some(self.stream)),
            peer: NetworkPeer::new(self.peer_addr.to_string(), PipeRole::Initiator),
            initiation: Some(initiation),
            options: self.options,
        })
    }
}
