//! TCP transport for the federation stream.
//!
//! Each connection carries length-delimited, protobuf-encoded
//! [`FederationFrame`]s in both directions and is served by
//! [`FederationApi::federation_stream`].

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, Stream, StreamExt};
use prost::bytes::Bytes;
use prost::Message;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use crate::domain::errors::FederationError;
use crate::ports::FederationApi;
use crate::proto::FederationFrame;

/// Largest accepted frame.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Outbound frames buffered per connection.
const OUTBOUND_BUFFER: usize = 32;

pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Accept connections until `shutdown` flips to `true`.
pub async fn serve<A>(
    listener: TcpListener,
    api: Arc<A>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), FederationError>
where
    A: FederationApi + 'static,
{
    info!(addr = ?listener.local_addr().ok(), "Federation listener started");
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Federation listener shutting down");
                    return Ok(());
                }
            }
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept federation connection");
                        continue;
                    }
                };
                let api = Arc::clone(&api);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(socket, peer, api, shutdown).await {
                        warn!(%peer, error = %e, "Federation connection closed with error");
                    }
                });
            }
        }
    }
}

async fn handle_connection<A>(
    socket: TcpStream,
    peer: SocketAddr,
    api: Arc<A>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), FederationError>
where
    A: FederationApi + 'static,
{
    debug!(%peer, "Federation connection accepted");
    let (read, write) = socket.into_split();
    let inbound = decode_frames(FramedRead::new(read, frame_codec()));

    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer = spawn_writer(FramedWrite::new(write, frame_codec()), rx);

    let result = api.federation_stream(inbound, tx, shutdown).await;
    // The service dropped its sender; drain whatever is still queued.
    match writer.await {
        Ok(Err(e)) => warn!(%peer, error = %e, "Federation writer failed"),
        Err(e) => warn!(%peer, error = %e, "Federation writer task panicked"),
        Ok(Ok(())) => {}
    }
    debug!(%peer, "Federation connection finished");
    result
}

/// Decode raw frames into [`FederationFrame`]s.
pub fn decode_frames<S, E>(
    frames: S,
) -> impl Stream<Item = Result<FederationFrame, FederationError>> + Send + Unpin + 'static
where
    S: Stream<Item = Result<prost::bytes::BytesMut, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + 'static,
{
    frames.map(|frame| match frame {
        Ok(bytes) => FederationFrame::decode(&bytes[..]).map_err(FederationError::from),
        Err(e) => Err(FederationError::Receive(e.to_string())),
    })
}

fn spawn_writer<W>(
    mut sink: FramedWrite<W, LengthDelimitedCodec>,
    mut rx: mpsc::Receiver<FederationFrame>,
) -> JoinHandle<Result<(), FederationError>>
where
    W: tokio::io::AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            sink.send(Bytes::from(frame.encode_to_vec()))
                .await
                .map_err(|e| FederationError::Send(e.to_string()))?;
        }
        SinkExt::<Bytes>::close(&mut sink)
            .await
            .map_err(|e| FederationError::Send(e.to_string()))
    })
}

/// Client side of a federation connection.
pub struct FederationConnection {
    sink: FramedWrite<tokio::net::tcp::OwnedWriteHalf, LengthDelimitedCodec>,
    stream: FramedRead<tokio::net::tcp::OwnedReadHalf, LengthDelimitedCodec>,
}

impl FederationConnection {
    pub async fn connect(addr: SocketAddr) -> Result<Self, FederationError> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;
        let (read, write) = socket.into_split();
        Ok(Self {
            sink: FramedWrite::new(write, frame_codec()),
            stream: FramedRead::new(read, frame_codec()),
        })
    }

    pub async fn send(&mut self, frame: impl Into<FederationFrame>) -> Result<(), FederationError> {
        self.sink
            .send(Bytes::from(frame.into().encode_to_vec()))
            .await
            .map_err(|e| FederationError::Send(e.to_string()))
    }

    /// Next frame, or `None` once the server closes the connection.
    pub async fn recv(&mut self) -> Result<Option<FederationFrame>, FederationError> {
        match self.stream.next().await {
            Some(Ok(bytes)) => Ok(Some(FederationFrame::decode(&bytes[..])?)),
            Some(Err(e)) => Err(FederationError::Receive(e.to_string())),
            None => Ok(None),
        }
    }

    /// Half-close the write side; the server ends the stream when it sees EOF.
    pub async fn close(mut self) -> Result<(), FederationError> {
        SinkExt::<Bytes>::close(&mut self.sink)
            .await
            .map_err(|e| FederationError::Send(e.to_string()))
    }
}
