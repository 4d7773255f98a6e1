//! Constructors for the bidirectional stream envelope.

use super::{
    federation_frame, FederationFrame, HealthReportRequest, HealthReportResponse,
    RequestSketchRequest, RequestSketchResponse, ShareSketchRequest, ShareSketchResponse, Status,
    StreamNotice,
};

impl FederationFrame {
    pub fn new(payload: federation_frame::Payload) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    pub fn notice(status: Status, message: impl Into<String>) -> Self {
        Self::new(federation_frame::Payload::Notice(StreamNotice {
            status: status as i32,
            message: message.into(),
        }))
    }
}

impl From<ShareSketchRequest> for FederationFrame {
    fn from(req: ShareSketchRequest) -> Self {
        Self::new(federation_frame::Payload::ShareSketch(req))
    }
}

impl From<RequestSketchRequest> for FederationFrame {
    fn from(req: RequestSketchRequest) -> Self {
        Self::new(federation_frame::Payload::RequestSketch(req))
    }
}

impl From<HealthReportRequest> for FederationFrame {
    fn from(req: HealthReportRequest) -> Self {
        Self::new(federation_frame::Payload::ReportHealth(req))
    }
}

impl From<ShareSketchResponse> for FederationFrame {
    fn from(resp: ShareSketchResponse) -> Self {
        Self::new(federation_frame::Payload::ShareSketchResponse(resp))
    }
}

impl From<RequestSketchResponse> for FederationFrame {
    fn from(resp: RequestSketchResponse) -> Self {
        Self::new(federation_frame::Payload::RequestSketchResponse(resp))
    }
}

impl From<HealthReportResponse> for FederationFrame {
    fn from(resp: HealthReportResponse) -> Self {
        Self::new(federation_frame::Payload::HealthReportResponse(resp))
    }
}
