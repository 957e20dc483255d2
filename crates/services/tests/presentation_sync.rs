use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use compagnon_core::model::{
    Module, ModuleId, PresentationMode, SessionCode, Submodule, SubmoduleId, SyncEvent,
    TemplateKind,
};
use compagnon_core::presentation::{ClientNavigationView, GateState, NavigationError, Role};
use compagnon_core::time::fixed_now;
use services::{
    AdvanceOutcome, AppServices, BackendError, Clock, ControllerConfig, ControllerError,
    NavigationBackend, NavigationGate, PresentationController, ViewSnapshot, events_from_bus,
};
use storage::repository::Storage;
use tokio::sync::{mpsc, watch};

const MODULE: ModuleId = ModuleId::new(1);
const POLL: Duration = Duration::from_secs(3);

const OUTLINE: [TemplateKind; 6] = [
    TemplateKind::Title,
    TemplateKind::Content,
    TemplateKind::Quiz,
    TemplateKind::Content,
    TemplateKind::Poll,
    TemplateKind::Summary,
];

async fn setup() -> (AppServices, SessionCode) {
    let storage = Storage::in_memory();
    let submodules = OUTLINE
        .iter()
        .zip(1_u64..)
        .map(|(template, n)| Submodule::new(SubmoduleId::new(n), format!("Slide {n}"), *template, 60))
        .collect();
    storage
        .modules
        .upsert_module(&Module::new(MODULE, "Onboarding", submodules).unwrap())
        .await
        .unwrap();

    let services = AppServices::from_storage(storage, Clock::fixed(fixed_now()))
        .await
        .unwrap();
    let session = services
        .sessions()
        .start(vec![MODULE], PresentationMode::Manual)
        .await
        .unwrap();
    (services, session.code().clone())
}

fn mount(
    services: &AppServices,
    code: &SessionCode,
    role: Role,
    index: u32,
    events: mpsc::Receiver<SyncEvent>,
) -> PresentationController {
    let view =
        ClientNavigationView::mount(role, code.clone(), MODULE, OUTLINE.to_vec(), index).unwrap();
    PresentationController::spawn(
        view,
        services.gate(),
        events,
        ControllerConfig {
            poll_interval: POLL,
        },
    )
}

/// The real gate behind a switch that makes every call fail.
struct FlakyBackend {
    gate: Arc<NavigationGate>,
    down: AtomicBool,
}

impl FlakyBackend {
    fn new(services: &AppServices) -> Arc<Self> {
        Arc::new(Self {
            gate: services.gate(),
            down: AtomicBool::new(true),
        })
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl NavigationBackend for FlakyBackend {
    async fn fetch_allowed_index(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
    ) -> Result<u32, BackendError> {
        self.check()?;
        self.gate.fetch_allowed_index(code, module_id).await
    }

    async fn advance(
        &self,
        code: &SessionCode,
        module_id: ModuleId,
        new_index: u32,
    ) -> Result<AdvanceOutcome, BackendError> {
        self.check()?;
        NavigationBackend::advance(self.gate.as_ref(), code, module_id, new_index).await
    }
}

fn mount_with(
    backend: Arc<FlakyBackend>,
    code: &SessionCode,
    role: Role,
    index: u32,
) -> PresentationController {
    let view =
        ClientNavigationView::mount(role, code.clone(), MODULE, OUTLINE.to_vec(), index).unwrap();
    let (_, no_events) = mpsc::channel(1);
    PresentationController::spawn(
        view,
        backend,
        no_events,
        ControllerConfig {
            poll_interval: POLL,
        },
    )
}

fn live_events(services: &AppServices, code: &SessionCode) -> mpsc::Receiver<SyncEvent> {
    events_from_bus(services.bus().subscribe_session(code.clone()))
}

async fn wait_for(
    rx: &mut watch::Receiver<ViewSnapshot>,
    what: impl FnMut(&ViewSnapshot) -> bool,
) -> ViewSnapshot {
    tokio::time::timeout(Duration::from_secs(60), rx.wait_for(what))
        .await
        .expect("snapshot condition not reached")
        .expect("controller stopped")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn participant_on_quiz_is_released_by_facilitator_advance() {
    let (services, code) = setup().await;
    let participant = mount(&services, &code, Role::Participant, 2, live_events(&services, &code));
    let mut rx = participant.subscribe();

    let gated = wait_for(&mut rx, |s| s.gate == GateState::Gated).await;
    assert_eq!(gated.template, TemplateKind::Quiz);
    let err = participant.next().await.unwrap_err();
    assert!(matches!(err, ControllerError::Navigation(NavigationError::Gated)));

    let outcome = services.gate().advance(&code, MODULE, 3).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.allowed_index, 3);

    let free = wait_for(&mut rx, |s| s.gate == GateState::Free).await;
    assert_eq!(free.current_index, 2);
    assert_eq!(free.known_allowed_index, 3);

    let step = participant.next().await.unwrap();
    assert_eq!(step.new_index, 3);
    assert!(!step.advance_gate);
    // Participants never write the stored value.
    assert_eq!(services.gate().allowed_index(&code, MODULE).await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn lower_advances_never_lower_the_stored_value() {
    let (services, code) = setup().await;
    let gate = services.gate();
    for index in [5, 2, 4] {
        gate.advance(&code, MODULE, index).await.unwrap();
    }
    assert_eq!(gate.allowed_index(&code, MODULE).await.unwrap(), 5);

    // A view mounted afterwards picks the value up from its first poll.
    let participant = mount(&services, &code, Role::Participant, 4, live_events(&services, &code));
    let mut rx = participant.subscribe();
    let snapshot = wait_for(&mut rx, |s| s.known_allowed_index == 5).await;
    assert_eq!(snapshot.gate, GateState::Free);
}

#[tokio::test(start_paused = true)]
async fn poll_recovers_from_a_dead_subscription() {
    let (services, code) = setup().await;
    let (dead_tx, dead_rx) = mpsc::channel(1);
    drop(dead_tx);
    let participant = mount(&services, &code, Role::Participant, 2, dead_rx);
    let mut rx = participant.subscribe();
    wait_for(&mut rx, |s| s.gate == GateState::Gated).await;

    let before = tokio::time::Instant::now();
    services.gate().advance(&code, MODULE, 3).await.unwrap();

    let snapshot = wait_for(&mut rx, |s| s.known_allowed_index == 3).await;
    assert_eq!(snapshot.gate, GateState::Free);
    assert!(before.elapsed() <= POLL);
}

#[tokio::test(start_paused = true)]
async fn facilitator_next_drives_the_gate() {
    let (services, code) = setup().await;
    let facilitator = mount(&services, &code, Role::Facilitator, 2, live_events(&services, &code));
    let participant = mount(&services, &code, Role::Participant, 2, live_events(&services, &code));
    let mut participant_rx = participant.subscribe();
    wait_for(&mut participant_rx, |s| s.gate == GateState::Gated).await;

    assert_eq!(facilitator.snapshot().gate, GateState::Free);
    let step = facilitator.next().await.unwrap();
    assert!(step.advance_gate);
    assert_eq!(step.new_index, 3);

    let snapshot = wait_for(&mut participant_rx, |s| s.gate == GateState::Free).await;
    assert_eq!(snapshot.current_index, 2);
    assert_eq!(services.gate().allowed_index(&code, MODULE).await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn force_sync_moves_participants_but_not_the_facilitator() {
    let (services, code) = setup().await;
    let facilitator = mount(&services, &code, Role::Facilitator, 1, live_events(&services, &code));
    let participant = mount(&services, &code, Role::Participant, 0, live_events(&services, &code));
    let mut participant_rx = participant.subscribe();
    let mut facilitator_rx = facilitator.subscribe();

    services.gate().force_sync(&code, MODULE, 4).await.unwrap();

    let moved = wait_for(&mut participant_rx, |s| s.current_index == 4).await;
    assert_eq!(moved.template, TemplateKind::Poll);
    assert_eq!(moved.gate, GateState::Gated);

    // Let the poll run once more so the facilitator has seen the event.
    tokio::time::sleep(POLL * 2).await;
    let unchanged = facilitator_rx.borrow_and_update().clone();
    assert_eq!(unchanged.current_index, 1);
}

#[tokio::test(start_paused = true)]
async fn ending_the_session_stops_views() {
    let (services, code) = setup().await;
    let participant = mount(&services, &code, Role::Participant, 0, live_events(&services, &code));
    let mut rx = participant.subscribe();

    services
        .sessions()
        .set_mode(&code, PresentationMode::SelfPaced)
        .await
        .unwrap();
    let snapshot = wait_for(&mut rx, |s| s.mode == Some(PresentationMode::SelfPaced)).await;
    assert!(!snapshot.session_ended);

    services.sessions().end(&code).await.unwrap();
    wait_for(&mut rx, |s| s.session_ended).await;

    let err = participant.next().await.unwrap_err();
    assert!(matches!(err, ControllerError::Stopped));
    participant.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn completion_flag_resets_when_the_slide_changes() {
    let (services, code) = setup().await;
    let participant = mount(&services, &code, Role::Participant, 0, live_events(&services, &code));
    let mut rx = participant.subscribe();

    participant.mark_completed().await.unwrap();
    assert!(participant.snapshot().completed);

    services
        .gate()
        .navigate(
            &code,
            services::NavigateRequest {
                module_id: Some(MODULE),
                submodule_index: 1,
                submodule_id: None,
            },
        )
        .await
        .unwrap();

    let snapshot = wait_for(&mut rx, |s| s.current_index == 1).await;
    assert!(!snapshot.completed);
    assert_eq!(
        participant.previous().await.unwrap(),
        0,
        "previous is always allowed"
    );
}

#[tokio::test(start_paused = true)]
async fn facilitator_moves_on_even_when_the_advance_is_lost() {
    let (services, code) = setup().await;
    let backend = FlakyBackend::new(&services);
    let facilitator = mount_with(backend, &code, Role::Facilitator, 2);
    let mut rx = facilitator.subscribe();
    wait_for(&mut rx, |s| s.last_error.is_some()).await;
    let published = services.bus().published_count();

    let step = facilitator.next().await.unwrap();
    assert!(step.advance_gate);

    let snapshot = facilitator.snapshot();
    assert_eq!(snapshot.current_index, 3);
    assert!(snapshot.last_error.is_some());
    assert_eq!(services.bus().published_count(), published);
    assert_eq!(services.gate().allowed_index(&code, MODULE).await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_poll_changes_nothing_until_the_next_tick_succeeds() {
    let (services, code) = setup().await;
    let backend = FlakyBackend::new(&services);
    let participant = mount_with(Arc::clone(&backend), &code, Role::Participant, 2);
    let mut rx = participant.subscribe();

    let failed = wait_for(&mut rx, |s| s.last_error.is_some()).await;
    assert_eq!(failed.gate, GateState::Gated);
    assert_eq!(failed.known_allowed_index, 0);
    assert_eq!(failed.current_index, 2);

    services.gate().advance(&code, MODULE, 3).await.unwrap();
    backend.down.store(false, Ordering::SeqCst);

    let healed = wait_for(&mut rx, |s| s.last_error.is_none()).await;
    assert_eq!(healed.known_allowed_index, 3);
    assert_eq!(healed.gate, GateState::Free);
    assert_eq!(healed.current_index, 2);
}
