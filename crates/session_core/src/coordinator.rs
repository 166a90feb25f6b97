//! Per-lane request bookkeeping and the staleness guard for backend completions.
//!
//! Each lane (DIAGNOSE, EXPLAIN) hands out tickets carrying a sequence number and
//! the identity of the image they were issued for. A completion is applied only
//! when its ticket is still the newest one for the lane and that image is still
//! selected; anything else is dropped without touching the session.

use shared::{
    domain::{HeatmapResult, ImageId, RequestSeq, SessionView},
    protocol::DiagnosisResult,
};
use tracing::{debug, info, warn};

use crate::{
    backend::{DiagnosePayload, ExplainPayload},
    error::{BackendError, SessionError},
    notify::{Notification, NotificationSink, Operation},
    store::SessionStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub lane: Operation,
    pub seq: RequestSeq,
    pub image_id: ImageId,
}

#[derive(Debug, Clone)]
pub struct DiagnoseDispatch {
    pub ticket: Ticket,
    pub payload: DiagnosePayload,
}

#[derive(Debug, Clone)]
pub struct ExplainDispatch {
    pub ticket: Ticket,
    pub payload: ExplainPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Failed,
    Discarded,
}

#[derive(Debug, Clone, Default)]
struct LaneState {
    loading: bool,
    latest: RequestSeq,
    owner: Option<ImageId>,
}

impl LaneState {
    fn issue(&mut self, image_id: ImageId) -> RequestSeq {
        self.latest = self.latest.next();
        self.loading = true;
        self.owner = Some(image_id);
        self.latest
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestCoordinator {
    diagnose: LaneState,
    explain: LaneState,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self, lane: Operation) -> bool {
        self.lane(lane).loading
    }

    pub fn any_loading(&self) -> bool {
        self.diagnose.loading || self.explain.loading
    }

    pub fn latest_seq(&self, lane: Operation) -> RequestSeq {
        self.lane(lane).latest
    }

    /// Image the newest request on `lane` was issued for.
    pub fn owning_image(&self, lane: Operation) -> Option<ImageId> {
        self.lane(lane).owner
    }

    pub fn begin_diagnose(
        &mut self,
        store: &SessionStore,
    ) -> Result<DiagnoseDispatch, SessionError> {
        let (image_id, image) = match (store.image_id(), store.image()) {
            (Some(id), Some(image)) => (id, image.clone()),
            _ => return Err(SessionError::NoImageSelected),
        };
        let payload = DiagnosePayload::new(image, store.metadata());
        let seq = self.diagnose.issue(image_id);
        debug!(lane = "diagnose", seq = seq.0, image_id = image_id.0, "dispatching");
        Ok(DiagnoseDispatch {
            ticket: Ticket {
                lane: Operation::Diagnose,
                seq,
                image_id,
            },
            payload,
        })
    }

    pub fn begin_explain(
        &mut self,
        store: &SessionStore,
    ) -> Result<ExplainDispatch, SessionError> {
        let (image_id, image) = match (store.image_id(), store.image()) {
            (Some(id), Some(image)) => (id, image.clone()),
            _ => return Err(SessionError::NoImageSelected),
        };
        let seq = self.explain.issue(image_id);
        debug!(lane = "explain", seq = seq.0, image_id = image_id.0, "dispatching");
        Ok(ExplainDispatch {
            ticket: Ticket {
                lane: Operation::Explain,
                seq,
                image_id,
            },
            payload: ExplainPayload::new(image),
        })
    }

    pub fn complete_diagnose(
        &mut self,
        ticket: Ticket,
        result: Result<DiagnosisResult, BackendError>,
        store: &mut SessionStore,
        sink: &dyn NotificationSink,
    ) -> ApplyOutcome {
        if !self.settle(ticket, store) {
            return ApplyOutcome::Discarded;
        }

        match result {
            Ok(result) => {
                info!(
                    seq = ticket.seq.0,
                    image_id = ticket.image_id.0,
                    predicted_class = %result.ml_prediction.predicted_class,
                    confidence = result.ml_prediction.confidence,
                    "diagnosis applied"
                );
                store.set_diagnosis_result(Some(result));
                store.navigate(SessionView::Results);
                sink.notify(Notification::success(Operation::Diagnose));
                ApplyOutcome::Applied
            }
            Err(err) => {
                warn!(seq = ticket.seq.0, image_id = ticket.image_id.0, "diagnosis failed: {err}");
                sink.notify(Notification::failure(Operation::Diagnose, &err));
                ApplyOutcome::Failed
            }
        }
    }

    pub fn complete_explain(
        &mut self,
        ticket: Ticket,
        result: Result<String, BackendError>,
        store: &mut SessionStore,
        sink: &dyn NotificationSink,
    ) -> ApplyOutcome {
        if !self.settle(ticket, store) {
            return ApplyOutcome::Discarded;
        }

        match result {
            Ok(encoded) => {
                info!(seq = ticket.seq.0, image_id = ticket.image_id.0, "heatmap applied");
                store.set_heatmap(Some(HeatmapResult {
                    image_id: ticket.image_id,
                    encoded,
                }));
                store.navigate(SessionView::Explainability);
                sink.notify(Notification::success(Operation::Explain));
                ApplyOutcome::Applied
            }
            Err(err) => {
                warn!(seq = ticket.seq.0, image_id = ticket.image_id.0, "heatmap failed: {err}");
                sink.notify(Notification::failure(Operation::Explain, &err));
                ApplyOutcome::Failed
            }
        }
    }

    /// Invalidates every outstanding ticket on both lanes.
    pub fn fence_all(&mut self) {
        for lane in [&mut self.diagnose, &mut self.explain] {
            lane.latest = lane.latest.next();
            lane.loading = false;
            lane.owner = None;
        }
    }

    /// Clears the loading flag when `ticket` is the lane's newest request and
    /// reports whether its response may be applied.
    fn settle(&mut self, ticket: Ticket, store: &SessionStore) -> bool {
        let lane = self.lane_mut(ticket.lane);
        let is_latest = ticket.seq == lane.latest;
        if is_latest {
            lane.loading = false;
        }

        let image_matches = store.image_id() == Some(ticket.image_id);
        if !(is_latest && image_matches) {
            debug!(
                lane = ticket.lane.as_str(),
                seq = ticket.seq.0,
                latest = lane.latest.0,
                image_id = ticket.image_id.0,
                "discarding stale response"
            );
            return false;
        }
        true
    }

    fn lane(&self, lane: Operation) -> &LaneState {
        match lane {
            Operation::Diagnose => &self.diagnose,
            Operation::Explain => &self.explain,
        }
    }

    fn lane_mut(&mut self, lane: Operation) -> &mut LaneState {
        match lane {
            Operation::Diagnose => &mut self.diagnose,
            Operation::Explain => &mut self.explain,
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
