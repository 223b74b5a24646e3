//! Session store: sign-in, registration, sign-out and restore.

mod common;

use common::*;
use retail_core::credentials::{PROFILE_KEY, TOKEN_KEY};
use retail_core::{AuthError, Registration};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_sign_in_persists_token_and_profile_together() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;

    let storage = memory_storage();
    let stores = build_stores(&server, storage.clone(), new_york());
    let session = stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    assert_eq!(session.subject_id, "demo-user-1");
    assert_eq!(session.display_name, "Demo User");
    assert_eq!(session.token, DEMO_TOKEN);
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some(DEMO_TOKEN));
    let profile: serde_json::Value =
        serde_json::from_str(&storage.get(PROFILE_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(profile["id"], "demo-user-1");
}

#[tokio::test]
async fn test_sign_in_rejected_surfaces_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Invalid credentials"
        })))
        .mount(&server)
        .await;

    let storage = memory_storage();
    let stores = build_stores(&server, storage.clone(), new_york());
    let err = stores.sessions.sign_in(DEMO_EMAIL, "wrong").await.unwrap_err();

    match err {
        AuthError::InvalidCredentials(msg) => assert_eq!(msg, "Invalid credentials"),
        other => panic!("Expected InvalidCredentials, got {:?}", other),
    }
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(PROFILE_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_sign_in_with_malformed_payload_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    let storage = memory_storage();
    let stores = build_stores(&server, storage.clone(), new_york());
    let err = stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap_err();

    assert!(matches!(err, AuthError::MalformedResponse(_)));
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert!(!stores.sessions.is_signed_in());
}

#[tokio::test]
async fn test_restore_after_reload_yields_equivalent_session() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;
    mount_status_ok(&server).await;

    let storage = memory_storage();
    let original = {
        let stores = build_stores(&server, storage.clone(), new_york());
        stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap()
    };

    // Fresh stores over the same storage simulate a process restart
    let reloaded = build_stores(&server, storage.clone(), new_york());
    let restored = reloaded.sessions.restore_session().await;

    assert_eq!(restored, Some(original));
    assert_eq!(hits(&server, "/api/auth/login").await, 1);
    assert_eq!(hits(&server, "/api/auth/status").await, 1);
}

#[tokio::test]
async fn test_restore_is_optimistic_then_verified() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/status"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "authenticated": false, "user": null }))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .mount(&server)
        .await;

    let storage = memory_storage();
    {
        let stores = build_stores(&server, storage.clone(), new_york());
        stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    }

    let reloaded = build_stores(&server, storage.clone(), new_york());
    let (cached, verification) = reloaded.sessions.spawn_restore();

    // Optimistic phase publishes the cached session immediately
    assert!(cached.is_some());
    assert!(reloaded.sessions.is_signed_in());

    verification.expect("verification task").await.unwrap();

    // Verification downgrades it
    assert!(!reloaded.sessions.is_signed_in());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(PROFILE_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_restore_fails_closed_on_network_error() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;

    let storage = memory_storage();
    {
        let stores = build_stores(&server, storage.clone(), new_york());
        stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    }

    let offline = build_stores_with(
        test_config("http://127.0.0.1:1".to_string()),
        storage.clone(),
        new_york(),
        std::sync::Arc::new(retail_core::DisabledGeocoder),
    );
    assert_eq!(offline.sessions.restore_session().await, None);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(PROFILE_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_restore_rejects_authenticated_false() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "authenticated": false, "user": null })),
        )
        .mount(&server)
        .await;

    let storage = memory_storage();
    let stores = build_stores(&server, storage.clone(), new_york());
    stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    let err = stores.sessions.revalidate().await.unwrap_err();
    assert!(matches!(err, AuthError::RevalidationFailed(_)));
    assert!(!stores.sessions.is_signed_in());
}

#[tokio::test]
async fn test_restore_discards_unparseable_profile() {
    let server = MockServer::start().await;
    let storage = memory_storage();
    storage
        .set_many(&[(TOKEN_KEY, "t".to_string()), (PROFILE_KEY, "{oops".to_string())])
        .unwrap();

    let stores = build_stores(&server, storage.clone(), new_york());
    assert_eq!(stores.sessions.restore_session().await, None);
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(PROFILE_KEY).unwrap(), None);
    assert_eq!(hits(&server, "/api/auth/status").await, 0);
}

#[tokio::test]
async fn test_sign_out_clears_state_even_when_backend_fails() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let storage = memory_storage();
    let stores = build_stores(&server, storage.clone(), new_york());
    stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();

    stores.sessions.sign_out().await;

    assert!(!stores.sessions.is_signed_in());
    assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
    assert_eq!(storage.get(PROFILE_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_register_chains_into_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "hunter22",
            "phone": "+1-555-0100"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "ada@example.com", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "ada-token",
            "user": { "id": "u-7", "retailer_id": "r-7", "name": "Ada", "email": "ada@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stores = build_stores(&server, memory_storage(), new_york());
    let session = stores
        .sessions
        .register(Registration {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "hunter22".to_string(),
            phone: Some("+1-555-0100".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(session.subject_id, "r-7");
    assert_eq!(session.token, "ada-token");
}

#[tokio::test]
async fn test_register_conflict_surfaces_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "success": false,
            "message": "Email already registered"
        })))
        .mount(&server)
        .await;

    let stores = build_stores(&server, memory_storage(), new_york());
    let err = stores
        .sessions
        .register(Registration {
            name: "Demo".to_string(),
            email: DEMO_EMAIL.to_string(),
            password: "x".to_string(),
            phone: None,
        })
        .await
        .unwrap_err();

    match err {
        AuthError::RegistrationRejected(msg) => assert_eq!(msg, "Email already registered"),
        other => panic!("Expected RegistrationRejected, got {:?}", other),
    }
    assert_eq!(hits(&server, "/api/auth/login").await, 0);
}

#[tokio::test]
async fn test_corrupt_state_file_does_not_block_sign_in() {
    let server = MockServer::start().await;
    mount_demo_login(&server).await;

    let dir = std::env::temp_dir().join(format!("retail-session-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("state.json");
    std::fs::write(&path, "{truncated").unwrap();

    let storage: std::sync::Arc<dyn retail_core::KeyValueStore> =
        std::sync::Arc::new(retail_core::FileStore::new(&path));
    let stores = build_stores(&server, storage.clone(), new_york());

    assert!(stores.sessions.restore_cached().is_none());

    let session = stores.sessions.sign_in(DEMO_EMAIL, DEMO_PASSWORD).await.unwrap();
    assert_eq!(session.subject_id, "demo-user-1");
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some(DEMO_TOKEN));

    stores.sessions.sign_out().await;
    assert!(storage.get(TOKEN_KEY).unwrap().is_none());
    assert!(storage.get(PROFILE_KEY).unwrap().is_none());

    let _ = std::fs::remove_dir_all(&dir);
}
