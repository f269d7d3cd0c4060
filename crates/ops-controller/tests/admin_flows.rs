//! End-to-end admin flows over a real WebSocket connection.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use common::types::OperationId;
use oc_test_utils::{TestServer, WsClient, TEST_PROVISIONING_KEY};
use ops_controller::protocol::{ClientEvent, ServerEvent};

async fn create_operation(client: &mut WsClient, op_id: &str, password: &str) {
    client
        .send(&ClientEvent::CreateTenant {
            key: TEST_PROVISIONING_KEY.to_string(),
            op_id: OperationId::from(op_id),
            password: password.to_string(),
        })
        .await
        .unwrap();
    match client.recv().await.unwrap() {
        ServerEvent::TenantCreated { success: true, .. } => {}
        other => panic!("tenant creation failed: {other:?}"),
    }
}

#[tokio::test]
async fn admin_login_round_trip() {
    let server = TestServer::spawn().await.unwrap();
    let mut provisioner = WsClient::connect(&server.ws_url()).await.unwrap();
    create_operation(&mut provisioner, "ALPHA", "p1").await;

    let mut admin = WsClient::connect(&server.ws_url()).await.unwrap();
    admin
        .send(&ClientEvent::LoginAdmin {
            op_id: OperationId::from("ALPHA"),
            password: "p1".to_string(),
        })
        .await
        .unwrap();

    match admin.recv().await.unwrap() {
        ServerEvent::AdminAuthenticated {
            success,
            op_id,
            channels,
        } => {
            assert!(success);
            assert_eq!(op_id, OperationId::from("ALPHA"));
            assert_eq!(channels, vec!["CHANNEL 1", "LOGISTICS"]);
        }
        other => panic!("expected admin-authenticated, got {other:?}"),
    }
    match admin.recv().await.unwrap() {
        ServerEvent::ActiveUnitsList(units) => assert!(units.is_empty()),
        other => panic!("expected active-units-list, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_password_reports_invalid_credentials() {
    let server = TestServer::spawn().await.unwrap();
    let mut provisioner = WsClient::connect(&server.ws_url()).await.unwrap();
    create_operation(&mut provisioner, "ALPHA", "p1").await;

    let mut admin = WsClient::connect(&server.ws_url()).await.unwrap();
    admin
        .send(&ClientEvent::LoginAdmin {
            op_id: OperationId::from("ALPHA"),
            password: "p2".to_string(),
        })
        .await
        .unwrap();

    match admin.recv().await.unwrap() {
        ServerEvent::AdminAuthError(msg) => assert_eq!(msg, "Invalid credentials"),
        other => panic!("expected admin-auth-error, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_create_conflicts_once() {
    let server = TestServer::spawn().await.unwrap();
    let mut client = WsClient::connect(&server.ws_url()).await.unwrap();

    create_operation(&mut client, "ALPHA", "p1").await;

    client
        .send(&ClientEvent::CreateTenant {
            key: TEST_PROVISIONING_KEY.to_string(),
            op_id: OperationId::from("ALPHA"),
            password: "other".to_string(),
        })
        .await
        .unwrap();
    match client.recv().await.unwrap() {
        ServerEvent::TenantCreated { success, msg, .. } => {
            assert!(!success);
            assert_eq!(msg.as_deref(), Some("Operation already exists"));
        }
        other => panic!("expected tenant-created, got {other:?}"),
    }
}

#[tokio::test]
async fn tenants_list_round_trip() {
    let server = TestServer::spawn().await.unwrap();
    let mut client = WsClient::connect(&server.ws_url()).await.unwrap();
    create_operation(&mut client, "ALPHA", "p1").await;
    create_operation(&mut client, "BRAVO", "p2").await;

    client
        .send(&ClientEvent::ListTenants {
            key: TEST_PROVISIONING_KEY.to_string(),
        })
        .await
        .unwrap();

    match client.recv().await.unwrap() {
        ServerEvent::TenantsList(tenants) => {
            let ids: Vec<String> = tenants.iter().map(|t| t.id.to_string()).collect();
            assert_eq!(ids, vec!["ALPHA", "BRAVO"]);
            // Stored hashes, never clear-text credentials.
            assert!(tenants.iter().all(|t| t.password.starts_with("$2")));
        }
        other => panic!("expected tenants-list, got {other:?}"),
    }
}

#[tokio::test]
async fn invite_generation_over_the_wire() {
    let server = TestServer::spawn().await.unwrap();
    let mut provisioner = WsClient::connect(&server.ws_url()).await.unwrap();
    create_operation(&mut provisioner, "ALPHA", "p1").await;

    let mut admin = WsClient::connect(&server.ws_url()).await.unwrap();
    admin
        .send(&ClientEvent::LoginAdmin {
            op_id: OperationId::from("ALPHA"),
            password: "p1".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(
        admin.recv().await.unwrap(),
        ServerEvent::AdminAuthenticated { success: true, .. }
    ));
    assert!(matches!(
        admin.recv().await.unwrap(),
        ServerEvent::ActiveUnitsList(_)
    ));

    admin
        .send(&ClientEvent::GenerateInvite {
            op_id: OperationId::from("ALPHA"),
        })
        .await
        .unwrap();
    match admin.recv().await.unwrap() {
        ServerEvent::InviteGenerated { token, op_id } => {
            assert_eq!(op_id, OperationId::from("ALPHA"));
            assert_eq!(token.len(), 32);
        }
        other => panic!("expected invite-generated, got {other:?}"),
    }
}
