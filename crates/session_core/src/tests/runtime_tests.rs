use std::time::Duration;

use super::*;
use crate::{
    backend::{DiagnosePayload, ExplainPayload},
    notify::{BroadcastSink, Notification, NotificationKind},
    test_support::{image, sample_diagnosis, scripted_backend, server_error, BackendControl},
};
use async_trait::async_trait;
use shared::protocol::HealthStatus;
use tokio::sync::broadcast::{self, error::TryRecvError};

fn runtime(
    layout: ViewLayout,
) -> (SessionRuntime, BackendControl, broadcast::Receiver<Notification>) {
    let (backend, control) = scripted_backend();
    let sink = BroadcastSink::new(16);
    let notifications = sink.subscribe();
    let runtime = SessionRuntime::new(layout, Arc::new(backend), Arc::new(sink));
    (runtime, control, notifications)
}

#[tokio::test]
async fn selecting_an_image_runs_diagnose_and_opens_results() {
    let (mut runtime, mut control, mut notifications) = runtime(ViewLayout::Tabs);

    runtime.select_image(image("mammo1.png"));
    assert!(runtime.coordinator().is_loading(Operation::Diagnose));

    let call = control.next_diagnose().await;
    assert_eq!(call.payload.image().file_name(), "mammo1.png");
    call.respond
        .send(Ok(sample_diagnosis("benign", 0.92)))
        .expect("respond");

    assert_eq!(runtime.next_completion().await, Some(ApplyOutcome::Applied));
    assert!(!runtime.coordinator().is_loading(Operation::Diagnose));
    assert_eq!(runtime.store().active_view(), SessionView::Results);
    assert!(runtime.store().enabled_views().contains(SessionView::Details));

    let notification = notifications.try_recv().expect("notification");
    assert_eq!(notification.kind, NotificationKind::Success);
    assert!(matches!(notifications.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn backend_error_leaves_upload_view_and_emits_one_failure() {
    let (mut runtime, mut control, mut notifications) = runtime(ViewLayout::Tabs);

    runtime.select_image(image("mammo1.png"));
    control
        .next_diagnose()
        .await
        .respond
        .send(Err(server_error("model not loaded")))
        .expect("respond");

    assert_eq!(runtime.next_completion().await, Some(ApplyOutcome::Failed));
    assert!(!runtime.coordinator().is_loading(Operation::Diagnose));
    assert!(runtime.store().diagnosis().is_none());
    assert_eq!(runtime.store().active_view(), SessionView::Upload);

    let notification = notifications.try_recv().expect("notification");
    assert_eq!(notification.kind, NotificationKind::Failure);
    assert_eq!(notification.operation, Operation::Diagnose);
    assert!(matches!(notifications.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn out_of_order_responses_only_apply_for_current_image() {
    let (mut runtime, mut control, mut notifications) = runtime(ViewLayout::Tabs);

    runtime.select_image(image("a.png"));
    let for_a = control.next_diagnose().await;
    runtime.select_image(image("b.png"));
    let for_b = control.next_diagnose().await;
    assert_eq!(for_b.payload.image().file_name(), "b.png");

    for_b
        .respond
        .send(Ok(sample_diagnosis("malignant", 0.81)))
        .expect("respond b");
    assert_eq!(runtime.next_completion().await, Some(ApplyOutcome::Applied));

    for_a
        .respond
        .send(Ok(sample_diagnosis("benign", 0.99)))
        .expect("respond a");
    assert_eq!(runtime.next_completion().await, Some(ApplyOutcome::Discarded));

    let stored = runtime.store().diagnosis().expect("result");
    assert_eq!(stored.ml_prediction.predicted_class, "malignant");
    assert_eq!(runtime.in_flight(), 0);
    assert!(notifications.try_recv().is_ok());
    assert!(matches!(notifications.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn explain_without_image_sends_nothing() {
    let (mut runtime, mut control, mut notifications) = runtime(ViewLayout::Tabs);

    let err = runtime.handle(UserAction::Explain).expect_err("must reject");

    assert!(matches!(err, SessionError::NoImageSelected));
    assert_eq!(runtime.in_flight(), 0);
    assert!(control.explain_rx.try_recv().is_err());
    assert!(matches!(notifications.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(runtime.store().active_view(), SessionView::Upload);
    assert_eq!(runtime.next_completion().await, None);
}

#[tokio::test]
async fn explain_stores_heatmap_for_selected_image() {
    let (mut runtime, mut control, _notifications) = runtime(ViewLayout::Tabs);
    runtime = runtime.with_auto_diagnose(false);

    runtime.select_image(image("mammo1.png"));
    runtime.handle(UserAction::Explain).expect("explain");
    let call = control.next_explain().await;
    assert_eq!(call.payload.image().file_name(), "mammo1.png");
    call.respond.send(Ok("Zm9v".to_string())).expect("respond");

    assert_eq!(runtime.run_until_idle().await, vec![ApplyOutcome::Applied]);
    let heatmap = runtime.store().heatmap().expect("heatmap");
    assert_eq!(heatmap.encoded, "Zm9v");
    assert_eq!(runtime.store().active_view(), SessionView::Explainability);
}

#[tokio::test]
async fn new_selection_drops_heatmap_without_new_explain() {
    let (mut runtime, mut control, _notifications) = runtime(ViewLayout::Tabs);
    runtime = runtime.with_auto_diagnose(false);

    runtime.select_image(image("a.png"));
    runtime.explain().expect("explain");
    control
        .next_explain()
        .await
        .respond
        .send(Ok("Zm9v".to_string()))
        .expect("respond");
    runtime.run_until_idle().await;
    assert!(runtime.store().heatmap().is_some());

    runtime.select_image(image("b.png"));
    assert!(runtime.store().heatmap().is_none());
}

#[tokio::test]
async fn reset_discards_in_flight_responses() {
    let (mut runtime, mut control, mut notifications) = runtime(ViewLayout::Sidebar);

    runtime.select_image(image("a.png"));
    runtime.update_patient_metadata(PatientMetadataPatch::default().age(45));
    runtime.explain().expect("explain");
    let diagnose = control.next_diagnose().await;
    let explain = control.next_explain().await;

    runtime.handle(UserAction::Reset).expect("reset");
    assert!(!runtime.coordinator().any_loading());

    diagnose
        .respond
        .send(Ok(sample_diagnosis("benign", 0.92)))
        .expect("respond");
    explain.respond.send(Ok("Zm9v".to_string())).expect("respond");

    assert_eq!(
        runtime.run_until_idle().await,
        vec![ApplyOutcome::Discarded, ApplyOutcome::Discarded]
    );
    assert!(runtime.store().image().is_none());
    assert!(runtime.store().diagnosis().is_none());
    assert!(runtime.store().heatmap().is_none());
    assert_eq!(runtime.store().metadata().age, None);
    assert_eq!(runtime.store().active_view(), SessionView::Overview);
    assert!(matches!(notifications.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn metadata_set_before_selection_reaches_the_automatic_diagnose() {
    let (mut runtime, mut control, _notifications) = runtime(ViewLayout::Tabs);

    runtime
        .handle(UserAction::UpdateMetadata(
            PatientMetadataPatch::default().age(45).family_history(true),
        ))
        .expect("update");
    runtime
        .handle(UserAction::SelectImage(image("mammo1.png")))
        .expect("select");

    let call = control.next_diagnose().await;
    assert_eq!(call.payload.field("age"), Some("45"));
    assert_eq!(call.payload.field("pain_level"), None);
    assert_eq!(call.payload.field("family_history"), Some("true"));
}

#[tokio::test]
async fn navigation_follows_the_view_gate() {
    let (mut runtime, mut control, _notifications) = runtime(ViewLayout::Tabs);

    runtime
        .handle(UserAction::Navigate(SessionView::Details))
        .expect("navigate");
    assert_eq!(runtime.store().active_view(), SessionView::Upload);

    runtime.select_image(image("a.png"));
    control
        .next_diagnose()
        .await
        .respond
        .send(Ok(sample_diagnosis("benign", 0.92)))
        .expect("respond");
    runtime.run_until_idle().await;

    assert!(runtime.navigate(SessionView::Details));
    assert_eq!(runtime.store().active_view(), SessionView::Details);
}

struct CrashingBackend;

#[async_trait]
impl DiagnosisBackend for CrashingBackend {
    async fn diagnose(&self, _payload: DiagnosePayload) -> Result<DiagnosisResult, BackendError> {
        panic!("inference worker crashed");
    }

    async fn explain(&self, _payload: ExplainPayload) -> Result<String, BackendError> {
        panic!("gradcam worker crashed");
    }

    async fn health(&self) -> Result<HealthStatus, BackendError> {
        Err(server_error("down"))
    }
}

#[tokio::test]
async fn crashed_backend_task_completes_as_a_failure() {
    let sink = BroadcastSink::new(16);
    let mut notifications = sink.subscribe();
    let mut runtime =
        SessionRuntime::new(ViewLayout::Tabs, Arc::new(CrashingBackend), Arc::new(sink));

    runtime.select_image(image("a.png"));
    runtime.explain().expect("explain");
    assert_eq!(runtime.in_flight(), 2);

    let outcomes = tokio::time::timeout(Duration::from_secs(2), runtime.run_until_idle())
        .await
        .expect("runtime settles after a crashed task");

    assert_eq!(outcomes, vec![ApplyOutcome::Failed, ApplyOutcome::Failed]);
    assert_eq!(runtime.in_flight(), 0);
    assert!(!runtime.coordinator().any_loading());
    assert!(runtime.store().diagnosis().is_none());
    assert!(runtime.store().heatmap().is_none());
    assert_eq!(runtime.store().active_view(), SessionView::Upload);

    let mut failed = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        assert_eq!(notification.kind, NotificationKind::Failure);
        failed.push(notification.operation);
    }
    failed.sort_by_key(|op| op.as_str());
    assert_eq!(failed, vec![Operation::Diagnose, Operation::Explain]);
}
