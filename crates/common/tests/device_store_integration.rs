#![cfg(feature = "integration-tests")]

use common::domain::{Device, DeviceId, DeviceStore, Metadata, RequestContext, StoreError};
use common::postgres::{PostgresClient, PostgresDeviceStore};
use serde_json::json;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;

const SCHEMA: &str = include_str!("../schema/devices.sql");

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient, PostgresDeviceStore) {
    let postgres = Postgres::default()
        .with_tag("16-alpine")
        .start()
        .await
        .unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let client = PostgresClient::new(
        &host.to_string(),
        port,
        "postgres",
        "postgres",
        "postgres",
        5,
    )
    .expect("Failed to create client");

    client.ping().await.unwrap();

    let conn = client.get_connection().await.unwrap();
    conn.batch_execute(SCHEMA).await.expect("Failed to apply schema");

    let store = PostgresDeviceStore::new(client.clone());
    (postgres, client, store)
}

fn metadata(value: serde_json::Value) -> Metadata {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_save_creates_device() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let mut device = Device::new(
        "hw-create-01",
        Some("test-device".to_string()),
        Some(metadata(json!({"key": "val", "nested": {"enabled": true}}))),
    )
    .unwrap();
    store.save(&ctx, &mut device).await.unwrap();

    assert!(!device.id.is_nil());
    assert!(device.created_at.is_some());
    assert_eq!(device.created_at, device.updated_at);

    let found = store.find_by_id(&ctx, device.id).await.unwrap();
    assert_eq!(found.id, device.id);
    assert_eq!(found.hardware_id, device.hardware_id);
    assert_eq!(found.name, device.name);
    assert_eq!(found.metadata, device.metadata);
    assert_eq!(found.created_at, device.created_at);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_save_empty_metadata_stores_empty_document() {
    let (_container, client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let mut device = Device::new("hw-empty-01", None, None).unwrap();
    store.save(&ctx, &mut device).await.unwrap();

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "SELECT metadata::text, metadata IS NULL FROM devices WHERE id = $1",
            &[device.id.as_uuid()],
        )
        .await
        .unwrap();
    let stored: String = row.get(0);
    let is_null: bool = row.get(1);
    assert_eq!(stored, "{}");
    assert!(!is_null);

    let found = store.find_by_id(&ctx, device.id).await.unwrap();
    assert!(found.metadata.is_empty());
    assert_eq!(found.name, "");
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_save_existing_updates_row() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let mut device = Device::new("hw-update-01", Some("before".to_string()), None).unwrap();
    store.save(&ctx, &mut device).await.unwrap();
    let id = device.id;
    let created_at = device.created_at;
    let first_updated_at = device.updated_at.unwrap();

    device.name = "after".to_string();
    device.metadata = metadata(json!({"firmware": "2.1.0"}));
    store.save(&ctx, &mut device).await.unwrap();

    assert_eq!(device.id, id);
    assert_eq!(device.created_at, created_at);
    assert!(device.updated_at.unwrap() >= first_updated_at);

    let found = store.find_by_id(&ctx, id).await.unwrap();
    assert_eq!(found.name, "after");
    assert_eq!(found.metadata, metadata(json!({"firmware": "2.1.0"})));

    let all = store.find_all(&ctx).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_save_duplicate_hardware_id_conflicts() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let mut first = Device::new("hw-unique-01", None, None).unwrap();
    store.save(&ctx, &mut first).await.unwrap();

    let mut second = Device::new("hw-unique-01", Some("dup".to_string()), None).unwrap();
    let result = store.save(&ctx, &mut second).await;

    assert!(matches!(result, Err(StoreError::Conflict(hw)) if hw == "hw-unique-01"));
    assert!(second.id.is_nil());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_find_by_hardware_id() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let mut device = Device::new("hw-find-01", Some("find-me".to_string()), None).unwrap();
    store.save(&ctx, &mut device).await.unwrap();

    let found = store.find_by_hardware_id(&ctx, "hw-find-01").await.unwrap();
    assert_eq!(found.id, device.id);
    assert_eq!(found.name, "find-me");

    let missing = store.find_by_hardware_id(&ctx, "hw-missing").await;
    assert!(matches!(missing, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_find_by_id_not_found() {
    let (_container, _client, store) = setup_test_db().await;

    let result = store
        .find_by_id(&RequestContext::new(), DeviceId::generate())
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_find_all() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let empty = store.find_all(&ctx).await.unwrap();
    assert!(empty.is_empty());

    for hardware_id in ["hw-list-01", "hw-list-02", "hw-list-03"] {
        let mut device = Device::new(hardware_id, None, None).unwrap();
        store.save(&ctx, &mut device).await.unwrap();
    }

    let devices = store.find_all(&ctx).await.unwrap();
    let hardware_ids: Vec<_> = devices.iter().map(|d| d.hardware_id.as_str()).collect();
    assert_eq!(hardware_ids, vec!["hw-list-01", "hw-list-02", "hw-list-03"]);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_delete() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();

    let mut device = Device::new("hw-delete-01", None, None).unwrap();
    store.save(&ctx, &mut device).await.unwrap();

    store.delete(&ctx, device.id).await.unwrap();
    let result = store.find_by_id(&ctx, device.id).await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));

    // Deleting a missing row is a no-op
    store.delete(&ctx, device.id).await.unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_null_metadata_column_decodes_empty() {
    let (_container, client, store) = setup_test_db().await;

    let conn = client.get_connection().await.unwrap();
    conn.batch_execute(
        "ALTER TABLE devices ALTER COLUMN metadata DROP NOT NULL;
         INSERT INTO devices (hardware_id, metadata) VALUES ('hw-null-01', NULL);",
    )
    .await
    .unwrap();

    let found = store
        .find_by_hardware_id(&RequestContext::new(), "hw-null-01")
        .await
        .unwrap();
    assert!(found.metadata.is_empty());
    assert!(!found.id.is_nil());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_json_null_document_decodes_empty() {
    let (_container, client, store) = setup_test_db().await;

    let conn = client.get_connection().await.unwrap();
    conn.batch_execute(
        "INSERT INTO devices (hardware_id, metadata) VALUES ('hw-jsonnull-01', 'null'::jsonb);",
    )
    .await
    .unwrap();

    let devices = store.find_all(&RequestContext::new()).await.unwrap();
    assert_eq!(devices.len(), 1);
    assert!(devices[0].metadata.is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_non_object_document_names_device() {
    let (_container, client, store) = setup_test_db().await;

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "INSERT INTO devices (hardware_id, metadata) VALUES ('hw-scalar-01', '42'::jsonb) RETURNING id",
            &[],
        )
        .await
        .unwrap();
    let id = DeviceId::from_uuid(row.get(0));

    let result = store.find_by_id(&RequestContext::new(), id).await;
    match result {
        Err(StoreError::Codec { device, .. }) => assert_eq!(device, id.to_string()),
        other => panic!("expected codec error, got {other:?}"),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_query_failure_names_device() {
    let (_container, client, store) = setup_test_db().await;

    let conn = client.get_connection().await.unwrap();
    conn.batch_execute("DROP TABLE devices;").await.unwrap();

    let id = DeviceId::generate();
    let err = store
        .find_by_id(&RequestContext::new(), id)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Repository(_)));
    assert!(err.to_string().contains(&id.to_string()));

    let err = store
        .find_by_hardware_id(&RequestContext::new(), "hw-gone-01")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("hw-gone-01"));

    let err = store.delete(&RequestContext::new(), id).await.unwrap_err();
    assert!(err.to_string().contains(&id.to_string()));
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_cancelled_context() {
    let (_container, _client, store) = setup_test_db().await;
    let ctx = RequestContext::new();
    ctx.cancel();

    let mut device = Device::new("hw-cancel-01", None, None).unwrap();
    let result = store.save(&ctx, &mut device).await;
    assert!(matches!(result, Err(StoreError::Cancelled)));

    let devices = store.find_all(&RequestContext::new()).await.unwrap();
    assert!(devices.is_empty());
}
