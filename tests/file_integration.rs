//! File backend integration tests
//!
//! Sessions written by one `FileSessionService` must be readable by a fresh
//! instance pointed at the same file, the way a restarted process sees them.

use a3s_state::reading_list::{add_item, list_items, remove_item, set_user_name};
use a3s_state::{FileSessionService, SessionService, StateAccess, StateConfig, StateMap};
use serde_json::json;
use std::path::PathBuf;

fn temp_path() -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!("a3s-state-it-{}", uuid::Uuid::new_v4()));
    let path = dir.join("reading_list.json");
    (dir, path)
}

fn initial_state() -> StateMap {
    let mut state = StateMap::new();
    state.insert("user_name".to_string(), json!(""));
    state.insert("reading_list".to_string(), json!([]));
    state
}

#[tokio::test]
async fn test_reading_list_survives_restart() {
    let (dir, path) = temp_path();

    let session_id = {
        let service = FileSessionService::new(&path);
        let (mut session, created) = service
            .find_or_create_session("curator", "demo_user", initial_state())
            .await
            .unwrap();
        assert!(created);

        let event = {
            let turn = session.turn();
            set_user_name(&turn, "Grace").unwrap();
            add_item(&turn, "Dune", "", ["sci-fi"], Some("queued"), "").unwrap();
            add_item(&turn, "Hyperion", "", ["sci-fi"], Some("reading"), "").unwrap();
            turn.into_event("reading_list_curator").unwrap()
        };
        service.append_event(&mut session, event).await.unwrap();
        session.id
    };

    let service = FileSessionService::new(&path);
    let (mut session, created) = service
        .find_or_create_session("curator", "demo_user", initial_state())
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(session.id, session_id);
    assert_eq!(session.state().get("user_name"), Some(json!("Grace")));

    let event = {
        let turn = session.turn();
        let removed = remove_item(&turn, 1).unwrap();
        assert_eq!(removed.title, "Dune");
        turn.into_event("reading_list_curator").unwrap()
    };
    service.append_event(&mut session, event).await.unwrap();

    let reopened = FileSessionService::new(&path);
    let session = reopened
        .get_session("curator", "demo_user", &session_id)
        .await
        .unwrap()
        .unwrap();
    let items = list_items(session.state(), None, Some("sci-fi")).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "Hyperion");
    assert_eq!(session.events.len(), 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[tokio::test]
async fn test_config_selects_file_backend() {
    let (dir, path) = temp_path();
    let config = StateConfig::default().with_state_path(&path);

    let service = config.open_service();
    assert_eq!(service.name(), "file");

    let session = service
        .create_session(&config.app_name, &config.user_id, Some(initial_state()), None)
        .await
        .unwrap();
    assert!(path.exists());

    let sessions = service
        .list_sessions(&config.app_name, &config.user_id)
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, session.id);

    service
        .delete_session(&config.app_name, &config.user_id, &session.id)
        .await
        .unwrap();
    assert!(service
        .get_session(&config.app_name, &config.user_id, &session.id)
        .await
        .unwrap()
        .is_none());

    std::fs::remove_dir_all(&dir).unwrap();
}
