//! Single-owner event loop for a diagnosis session.
//!
//! The runtime owns the store and the coordinator. Backend calls run on tasks in
//! a [`JoinSet`] that only hold their payload; results come back as
//! [`Completion`]s and are applied one at a time by whoever drives the runtime.
//! A task that panics or is cancelled still completes its ticket, as a failure.
//! All methods that dispatch must be called from within a Tokio runtime.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{ImageAsset, ImageId, PatientMetadataPatch, SessionView, ViewLayout},
    protocol::DiagnosisResult,
};
use tokio::task::{self, JoinSet};

use crate::{
    backend::DiagnosisBackend,
    coordinator::{ApplyOutcome, RequestCoordinator, Ticket},
    error::{BackendError, SessionError},
    notify::{NotificationSink, Operation},
    store::SessionStore,
};

#[derive(Debug, Clone)]
pub enum UserAction {
    SelectImage(ImageAsset),
    UpdateMetadata(PatientMetadataPatch),
    Navigate(SessionView),
    Diagnose,
    Explain,
    Reset,
}

impl UserAction {
    pub fn name(&self) -> &'static str {
        match self {
            UserAction::SelectImage(_) => "select_image",
            UserAction::UpdateMetadata(_) => "update_metadata",
            UserAction::Navigate(_) => "navigate",
            UserAction::Diagnose => "diagnose",
            UserAction::Explain => "explain",
            UserAction::Reset => "reset",
        }
    }
}

#[derive(Debug)]
pub enum Completion {
    Diagnose {
        ticket: Ticket,
        result: Result<DiagnosisResult, BackendError>,
    },
    Explain {
        ticket: Ticket,
        result: Result<String, BackendError>,
    },
}

impl Completion {
    /// Failed completion for `ticket`'s lane.
    pub fn failed(ticket: Ticket, err: BackendError) -> Self {
        match ticket.lane {
            Operation::Diagnose => Completion::Diagnose {
                ticket,
                result: Err(err),
            },
            Operation::Explain => Completion::Explain {
                ticket,
                result: Err(err),
            },
        }
    }
}

pub struct SessionRuntime {
    store: SessionStore,
    coordinator: RequestCoordinator,
    backend: Arc<dyn DiagnosisBackend>,
    sink: Arc<dyn NotificationSink>,
    tasks: JoinSet<Completion>,
    tickets: HashMap<task::Id, Ticket>,
    auto_diagnose: bool,
}

impl SessionRuntime {
    pub fn new(
        layout: ViewLayout,
        backend: Arc<dyn DiagnosisBackend>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store: SessionStore::new(layout),
            coordinator: RequestCoordinator::new(),
            backend,
            sink,
            tasks: JoinSet::new(),
            tickets: HashMap::new(),
            auto_diagnose: true,
        }
    }

    /// Whether selecting an image immediately dispatches DIAGNOSE. On by default.
    pub fn with_auto_diagnose(mut self, enabled: bool) -> Self {
        self.auto_diagnose = enabled;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn handle(&mut self, action: UserAction) -> Result<(), SessionError> {
        tracing::debug!(action = action.name(), "handling user action");
        match action {
            UserAction::SelectImage(asset) => {
                self.select_image(asset);
            }
            UserAction::UpdateMetadata(patch) => self.update_patient_metadata(patch),
            UserAction::Navigate(view) => {
                self.navigate(view);
            }
            UserAction::Diagnose => {
                self.diagnose()?;
            }
            UserAction::Explain => {
                self.explain()?;
            }
            UserAction::Reset => self.reset(),
        }
        Ok(())
    }

    pub fn select_image(&mut self, asset: ImageAsset) -> ImageId {
        let image_id = self.store.select_image(asset);
        if self.auto_diagnose {
            if let Err(err) = self.diagnose() {
                tracing::error!("automatic diagnose after selection failed: {err}");
            }
        }
        image_id
    }

    pub fn update_patient_metadata(&mut self, patch: PatientMetadataPatch) {
        self.store.update_patient_metadata(patch);
    }

    pub fn navigate(&mut self, view: SessionView) -> bool {
        self.store.navigate(view)
    }

    pub fn diagnose(&mut self) -> Result<Ticket, SessionError> {
        let dispatch = self.coordinator.begin_diagnose(&self.store)?;
        let ticket = dispatch.ticket;
        let backend = Arc::clone(&self.backend);
        let handle = self.tasks.spawn(async move {
            let result = backend.diagnose(dispatch.payload).await;
            Completion::Diagnose { ticket, result }
        });
        self.tickets.insert(handle.id(), ticket);
        Ok(ticket)
    }

    pub fn explain(&mut self) -> Result<Ticket, SessionError> {
        let dispatch = self.coordinator.begin_explain(&self.store)?;
        let ticket = dispatch.ticket;
        let backend = Arc::clone(&self.backend);
        let handle = self.tasks.spawn(async move {
            let result = backend.explain(dispatch.payload).await;
            Completion::Explain { ticket, result }
        });
        self.tickets.insert(handle.id(), ticket);
        Ok(ticket)
    }

    /// Clears the session and fences both lanes so earlier responses are ignored.
    pub fn reset(&mut self) {
        self.store.reset();
        self.coordinator.fence_all();
    }

    pub fn apply(&mut self, completion: Completion) -> ApplyOutcome {
        match completion {
            Completion::Diagnose { ticket, result } => self.coordinator.complete_diagnose(
                ticket,
                result,
                &mut self.store,
                self.sink.as_ref(),
            ),
            Completion::Explain { ticket, result } => self.coordinator.complete_explain(
                ticket,
                result,
                &mut self.store,
                self.sink.as_ref(),
            ),
        }
    }

    /// Waits for the next backend completion and applies it. Returns `None` when
    /// nothing is in flight.
    pub async fn next_completion(&mut self) -> Option<ApplyOutcome> {
        loop {
            let completion = match self.tasks.join_next_with_id().await? {
                Ok((id, completion)) => {
                    self.tickets.remove(&id);
                    completion
                }
                Err(err) => {
                    let Some(ticket) = self.tickets.remove(&err.id()) else {
                        tracing::error!("untracked backend task ended: {err}");
                        continue;
                    };
                    tracing::error!(
                        lane = ticket.lane.as_str(),
                        seq = ticket.seq.0,
                        "backend task ended without a response: {err}"
                    );
                    Completion::failed(ticket, BackendError::TaskAborted(err.to_string()))
                }
            };
            return Some(self.apply(completion));
        }
    }

    /// Applies completions until every dispatched request has come back.
    pub async fn run_until_idle(&mut self) -> Vec<ApplyOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_completion().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
