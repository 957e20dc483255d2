use compagnon_core::model::{
    Module, ModuleId, PresentationMode, Session, SessionCode, SessionPosition, Submodule,
    SubmoduleId, TemplateKind, ThemeDraft,
};
use compagnon_core::time::fixed_now;
use storage::repository::{
    ModuleRepository, NavigationStateRepository, SessionRepository, StorageError, ThemeRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_module(id: u64) -> Module {
    Module::new(
        ModuleId::new(id),
        format!("Module {id}"),
        vec![
            Submodule::new(SubmoduleId::new(id * 10 + 1), "Intro", TemplateKind::Title, 30),
            Submodule::new(SubmoduleId::new(id * 10 + 2), "Quiz", TemplateKind::Quiz, 90),
            Submodule::new(SubmoduleId::new(id * 10 + 3), "Notes", TemplateKind::Content, 60),
        ],
    )
    .unwrap()
}

fn code() -> SessionCode {
    SessionCode::new("ROOM42").unwrap()
}

#[tokio::test]
async fn sqlite_allowed_index_never_decreases() {
    let repo = connect("memdb_allowed_index").await;
    let module = ModuleId::new(1);

    assert_eq!(repo.fetch_allowed_index(&code(), module).await.unwrap(), 0);
    assert_eq!(repo.persist_allowed_index(&code(), module, 3).await.unwrap(), 3);
    assert_eq!(repo.persist_allowed_index(&code(), module, 1).await.unwrap(), 3);
    assert_eq!(repo.persist_allowed_index(&code(), module, 5).await.unwrap(), 5);
    assert_eq!(repo.fetch_allowed_index(&code(), module).await.unwrap(), 5);

    // Other modules of the same session are independent.
    assert_eq!(
        repo.fetch_allowed_index(&code(), ModuleId::new(2))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn sqlite_clear_session_resets_navigation() {
    let repo = connect("memdb_clear_session").await;
    repo.persist_allowed_index(&code(), ModuleId::new(1), 2)
        .await
        .unwrap();
    repo.persist_allowed_index(&code(), ModuleId::new(2), 4)
        .await
        .unwrap();

    assert_eq!(repo.clear_session(&code()).await.unwrap(), 2);
    assert_eq!(
        repo.fetch_allowed_index(&code(), ModuleId::new(2))
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn sqlite_module_roundtrip_keeps_slide_order() {
    let repo = connect("memdb_modules").await;
    let module = build_module(7);
    repo.upsert_module(&module).await.unwrap();

    let fetched = repo.get_module(ModuleId::new(7)).await.unwrap().unwrap();
    assert_eq!(fetched, module);
    assert_eq!(
        fetched.outline(),
        vec![TemplateKind::Title, TemplateKind::Quiz, TemplateKind::Content]
    );

    // Re-upserting replaces the slide list.
    let shorter = Module::new(
        ModuleId::new(7),
        "Renamed",
        vec![Submodule::new(
            SubmoduleId::new(99),
            "Only",
            TemplateKind::Poll,
            45,
        )],
    )
    .unwrap();
    repo.upsert_module(&shorter).await.unwrap();
    let fetched = repo.get_module(ModuleId::new(7)).await.unwrap().unwrap();
    assert_eq!(fetched.title(), "Renamed");
    assert_eq!(fetched.submodules().len(), 1);

    assert!(repo.get_module(ModuleId::new(8)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_session_roundtrip_and_update() {
    let repo = connect("memdb_sessions").await;
    repo.upsert_module(&build_module(1)).await.unwrap();
    repo.upsert_module(&build_module(2)).await.unwrap();

    let mut session = Session::start(
        code(),
        vec![ModuleId::new(2), ModuleId::new(1)],
        PresentationMode::Manual,
        fixed_now(),
    )
    .unwrap();
    repo.insert_session(&session).await.unwrap();

    let err = repo.insert_session(&session).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let fetched = repo.get_session(&code()).await.unwrap().unwrap();
    assert_eq!(fetched.module_ids(), &[ModuleId::new(2), ModuleId::new(1)]);
    assert_eq!(fetched.mode(), PresentationMode::Manual);
    assert!(fetched.position().is_none());
    assert!(fetched.is_active());

    session.set_mode(PresentationMode::Hybrid).unwrap();
    session
        .record_position(SessionPosition {
            module_id: ModuleId::new(1),
            submodule_index: 2,
        })
        .unwrap();
    session.set_theme_override(Some("midnight".into())).unwrap();
    session.end(fixed_now()).unwrap();
    repo.update_session(&session).await.unwrap();

    let fetched = repo.get_session(&code()).await.unwrap().unwrap();
    assert_eq!(fetched.mode(), PresentationMode::Hybrid);
    assert_eq!(fetched.theme_override(), Some("midnight"));
    assert_eq!(fetched.position().map(|p| p.submodule_index), Some(2));
    assert!(!fetched.is_active());
}

#[tokio::test]
async fn sqlite_update_unknown_session_is_not_found() {
    let repo = connect("memdb_missing_session").await;
    repo.upsert_module(&build_module(1)).await.unwrap();
    let session = Session::start(
        SessionCode::new("NOPE99").unwrap(),
        vec![ModuleId::new(1)],
        PresentationMode::Auto,
        fixed_now(),
    )
    .unwrap();

    let err = repo.update_session(&session).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_stale_write_cannot_reopen_ended_session() {
    let repo = connect("memdb_stale_session").await;
    repo.upsert_module(&build_module(1)).await.unwrap();
    let stale = Session::start(
        code(),
        vec![ModuleId::new(1)],
        PresentationMode::Manual,
        fixed_now(),
    )
    .unwrap();
    repo.insert_session(&stale).await.unwrap();

    let mut ended = stale.clone();
    ended.end(fixed_now()).unwrap();
    repo.update_session(&ended).await.unwrap();

    let err = repo.update_session(&stale).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert!(!repo.get_session(&code()).await.unwrap().unwrap().is_active());
}

#[tokio::test]
async fn sqlite_update_position_leaves_other_columns() {
    let repo = connect("memdb_session_position").await;
    repo.upsert_module(&build_module(1)).await.unwrap();
    let mut session = Session::start(
        code(),
        vec![ModuleId::new(1)],
        PresentationMode::Manual,
        fixed_now(),
    )
    .unwrap();
    repo.insert_session(&session).await.unwrap();
    session.set_mode(PresentationMode::Auto).unwrap();
    repo.update_session(&session).await.unwrap();

    let position = SessionPosition {
        module_id: ModuleId::new(1),
        submodule_index: 2,
    };
    assert!(repo.update_position(&code(), position).await.unwrap());
    let foreign = SessionPosition {
        module_id: ModuleId::new(7),
        submodule_index: 0,
    };
    assert!(!repo.update_position(&code(), foreign).await.unwrap());

    let stored = repo.get_session(&code()).await.unwrap().unwrap();
    assert_eq!(stored.position(), Some(position));
    assert_eq!(stored.mode(), PresentationMode::Auto);

    let mut ended = stored.clone();
    ended.end(fixed_now()).unwrap();
    repo.update_session(&ended).await.unwrap();
    let later = SessionPosition {
        submodule_index: 0,
        ..position
    };
    assert!(!repo.update_position(&code(), later).await.unwrap());
    assert_eq!(
        repo.get_session(&code()).await.unwrap().unwrap().position(),
        Some(position)
    );
}

#[tokio::test]
async fn sqlite_theme_is_a_single_row() {
    let repo = connect("memdb_theme").await;
    assert!(repo.get_theme().await.unwrap().is_none());

    let first = ThemeDraft {
        name: Some("Ocean".into()),
        primary_color: Some("#0a4d68".into()),
        ..ThemeDraft::default()
    }
    .validate()
    .unwrap();
    repo.save_theme(&first).await.unwrap();

    let second = ThemeDraft {
        name: Some("Forest".into()),
        font_family: Some("Inter".into()),
        ..ThemeDraft::default()
    }
    .validate()
    .unwrap();
    repo.save_theme(&second).await.unwrap();

    let stored = repo.get_theme().await.unwrap().unwrap();
    assert_eq!(stored, second);
    assert_eq!(stored.font_family(), Some("Inter"));
}
