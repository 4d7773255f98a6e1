//! Inbound Ports (Driving Ports)
//!
//! The four federation operations. Security outcomes are reported through
//! the response `status`; `Err` is reserved for structural faults.

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{mpsc, watch};

use crate::domain::errors::FederationError;
use crate::proto::{
    FederationFrame, HealthReportRequest, HealthReportResponse, RequestSketchRequest,
    RequestSketchResponse, ShareSketchRequest, ShareSketchResponse,
};

/// Federation API (Driving Port)
#[async_trait]
pub trait FederationApi: Send + Sync {
    /// Validate, authenticate and store a peer's sketch.
    async fn share_sketch(
        &self,
        request: ShareSketchRequest,
    ) -> Result<ShareSketchResponse, FederationError>;

    /// Return sketches stored since `request.since`.
    async fn request_sketch(
        &self,
        request: RequestSketchRequest,
    ) -> Result<RequestSketchResponse, FederationError>;

    /// Store statistics, capabilities and load.
    async fn report_health(
        &self,
        request: HealthReportRequest,
    ) -> Result<HealthReportResponse, FederationError>;

    /// Serve a duplex stream until the peer closes it, a receive fails or
    /// `shutdown` fires.
    async fn federation_stream<S>(
        &self,
        inbound: S,
        outbound: mpsc::Sender<FederationFrame>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), FederationError>
    where
        S: Stream<Item = Result<FederationFrame, FederationError>> + Send + Unpin + 'static;
}
