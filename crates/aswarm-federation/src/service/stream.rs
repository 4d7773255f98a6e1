//! Bidirectional federation stream.
//!
//! One inbound frame yields at most one outbound frame. The loop ends when
//! the peer closes its side, a receive fails, the outbound channel closes
//! or the shutdown signal fires; every await inside it is raced against
//! shutdown.

use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::FederationService;
use crate::domain::errors::FederationError;
use crate::ports::{FederationApi, Keyring, SketchStore, TimeSource};
use crate::proto::federation_frame::Payload;
use crate::proto::{FederationFrame, Status};

impl<S, K, T> FederationService<S, K, T>
where
    S: SketchStore + 'static,
    K: Keyring + 'static,
    T: TimeSource + 'static,
{
    pub(crate) async fn run_stream<St>(
        &self,
        mut inbound: St,
        outbound: mpsc::Sender<FederationFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), FederationError>
    where
        St: Stream<Item = Result<FederationFrame, FederationError>> + Send + Unpin,
    {
        if *shutdown.borrow() {
            return Ok(());
        }

        loop {
            let next = tokio::select! {
                _ = cancelled(&mut shutdown) => {
                    debug!("Federation stream cancelled");
                    return Ok(());
                }
                next = inbound.next() => next,
            };

            let frame = match next {
                None => {
                    debug!("Federation stream closed by peer");
                    return Ok(());
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Federation stream receive failed");
                    return Err(e);
                }
                Some(Ok(frame)) => frame,
            };
            self.metrics().record_stream_frame();

            let reply = tokio::select! {
                _ = cancelled(&mut shutdown) => {
                    debug!("Federation stream cancelled while handling a frame");
                    return Ok(());
                }
                reply = self.dispatch(frame) => reply,
            };
            let Some(reply) = reply else {
                continue;
            };

            tokio::select! {
                _ = cancelled(&mut shutdown) => {
                    debug!("Federation stream cancelled while sending");
                    return Ok(());
                }
                sent = outbound.send(reply) => {
                    sent.map_err(|_| FederationError::Send("outbound channel closed".into()))?;
                }
            }
        }
    }

    /// Route one frame through the matching request handler.
    async fn dispatch(&self, frame: FederationFrame) -> Option<FederationFrame> {
        let reply = match frame.payload {
            Some(Payload::ShareSketch(request)) => {
                self.share_sketch(request).await.map(FederationFrame::from)
            }
            Some(Payload::RequestSketch(request)) => {
                self.request_sketch(request).await.map(FederationFrame::from)
            }
            Some(Payload::ReportHealth(request)) => {
                self.report_health(request).await.map(FederationFrame::from)
            }
            Some(Payload::ShareSketchResponse(_))
            | Some(Payload::RequestSketchResponse(_))
            | Some(Payload::HealthReportResponse(_)) => {
                self.metrics().record_status(Status::InvalidRequest);
                Err(FederationError::InvalidRequest(
                    "response frames are not accepted on this stream".into(),
                ))
            }
            Some(Payload::Notice(notice)) => {
                debug!(status = ?notice.status(), message = %notice.message, "Peer notice");
                return None;
            }
            None => {
                self.metrics().record_status(Status::InvalidRequest);
                Err(FederationError::InvalidRequest("empty frame".into()))
            }
        };

        Some(reply.unwrap_or_else(|e| FederationFrame::notice(Status::InvalidRequest, e.to_string())))
    }
}

/// Resolves once shutdown is requested or its sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
