use std::sync::Arc;
use std::time::Duration;

use app::Server;
use client::{ClientError, HttpBackend, ReconnectPolicy, subscribe, ws_url};
use compagnon_core::model::{
    Module, ModuleId, PresentationMode, SessionCode, Submodule, SubmoduleId, TemplateKind,
};
use compagnon_core::presentation::{ClientNavigationView, GateState, Role};
use compagnon_core::time::fixed_now;
use services::{AppServices, Clock, ControllerConfig, PresentationController, ViewSnapshot};
use storage::repository::Storage;
use tokio::sync::{mpsc, watch};

const MODULE: ModuleId = ModuleId::new(11);
const POLL: Duration = Duration::from_millis(200);

struct Harness {
    services: AppServices,
    backend: HttpBackend,
    code: SessionCode,
}

async fn start() -> Harness {
    let storage = Storage::in_memory();
    let module = Module::new(
        MODULE,
        "Kick-off",
        vec![
            Submodule::new(SubmoduleId::new(1), "Hello", TemplateKind::Title, 30),
            Submodule::new(SubmoduleId::new(2), "Warm-up", TemplateKind::Quiz, 60),
            Submodule::new(SubmoduleId::new(3), "Agenda", TemplateKind::Content, 60),
        ],
    )
    .unwrap();
    storage.modules.upsert_module(&module).await.unwrap();
    let services = AppServices::from_storage(storage, Clock::fixed(fixed_now()))
        .await
        .unwrap();

    let server = Server::bind("127.0.0.1:0", services.clone()).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve(std::future::pending()));

    let backend = HttpBackend::new(&format!("http://{addr}")).unwrap();
    let session = backend
        .start_session(&[MODULE], PresentationMode::Manual)
        .await
        .unwrap();
    Harness {
        services,
        backend,
        code: session.code,
    }
}

async fn mount(harness: &Harness, role: Role, live: bool) -> PresentationController {
    let outline = harness.backend.outline(&harness.code, MODULE).await.unwrap();
    let view = ClientNavigationView::mount(
        role,
        harness.code.clone(),
        MODULE,
        outline.templates,
        1,
    )
    .unwrap();
    let events = if live {
        subscribe(
            ws_url(harness.backend.base_url(), &harness.code).unwrap(),
            ReconnectPolicy::default(),
        )
    } else {
        let (_, rx) = mpsc::channel(1);
        rx
    };
    PresentationController::spawn(
        view,
        Arc::new(harness.backend.clone()),
        events,
        ControllerConfig {
            poll_interval: POLL,
        },
    )
}

async fn wait_for(
    rx: &mut watch::Receiver<ViewSnapshot>,
    what: impl FnMut(&ViewSnapshot) -> bool,
) -> ViewSnapshot {
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(what))
        .await
        .expect("snapshot condition not reached")
        .expect("controller stopped")
        .clone()
}

#[tokio::test]
async fn facilitator_next_releases_participant_over_the_network() {
    let harness = start().await;
    let participant = mount(&harness, Role::Participant, true).await;
    let facilitator = mount(&harness, Role::Facilitator, true).await;
    let mut participant_rx = participant.subscribe();

    let gated = wait_for(&mut participant_rx, |s| s.gate == GateState::Gated).await;
    assert_eq!(gated.template, TemplateKind::Quiz);

    let step = facilitator.next().await.unwrap();
    assert!(step.advance_gate);
    assert_eq!(step.new_index, 2);

    let free = wait_for(&mut participant_rx, |s| s.gate == GateState::Free).await;
    assert_eq!(free.current_index, 1);
    assert_eq!(free.known_allowed_index, 2);
    assert_eq!(
        harness
            .backend
            .allowed_index(&harness.code, MODULE)
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn poll_alone_catches_up() {
    let harness = start().await;
    let participant = mount(&harness, Role::Participant, false).await;
    let mut rx = participant.subscribe();
    wait_for(&mut rx, |s| s.gate == GateState::Gated).await;

    harness
        .services
        .gate()
        .advance(&harness.code, MODULE, 2)
        .await
        .unwrap();
    let free = wait_for(&mut rx, |s| s.known_allowed_index == 2).await;
    assert_eq!(free.gate, GateState::Free);
}

#[tokio::test]
async fn force_sync_and_end_reach_the_participant() {
    let harness = start().await;
    let participant = mount(&harness, Role::Participant, true).await;
    let mut rx = participant.subscribe();
    wait_for(&mut rx, |s| s.gate == GateState::Gated).await;

    // The subscription may still be connecting; keep nudging until the
    // event lands.
    let mut moved = false;
    for _ in 0..20 {
        harness
            .backend
            .force_sync(&harness.code, MODULE, 2)
            .await
            .unwrap();
        if tokio::time::timeout(Duration::from_millis(250), rx.wait_for(|s| s.current_index == 2))
            .await
            .is_ok()
        {
            moved = true;
            break;
        }
    }
    assert!(moved, "force-sync never reached the participant");

    harness.backend.end_session(&harness.code).await.unwrap();
    let ended = wait_for(&mut rx, |s| s.session_ended).await;
    assert_eq!(ended.current_index, 2);
}

#[tokio::test]
async fn server_rejections_surface_as_status_errors() {
    let harness = start().await;
    let unknown = SessionCode::new("MISS22").unwrap();
    let err = harness.backend.session(&unknown).await.unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 404, .. }));

    let err = harness
        .backend
        .advance(&harness.code, MODULE, 9)
        .await
        .unwrap_err();
    match err {
        ClientError::Status { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("out of range"));
        }
        other => panic!("unexpected error {other}"),
    }
}
