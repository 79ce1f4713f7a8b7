use bucket_facade::config::AppConfig;
use bucket_facade::{
    Action, LocalDiskStore, PermissionMode, PermissionRule, ResourceKind, Scope, SqliteStore, Store,
    StoreError,
};
use bytes::Bytes;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> AppConfig {
    let path = dir.path().join("config.yaml");
    fs::write(&path, body).unwrap();
    AppConfig::load(&path).unwrap()
}

#[test]
fn test_local_disk_store_from_config() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let config = write_config(
        &dir,
        &format!(
            "store:\n  root: photos\n  permission: limited\nstorage:\n  backend: local\n  base_path: {}\n",
            data.display()
        ),
    );

    let mut store = config.open_store().unwrap();
    store.create_bucket("2024").unwrap();
    store.set("2024/beach.jpg", b"\xff\xd8jpeg").unwrap();
    store.set("2024/deep/nested.jpg", b"\xff\xd8").unwrap();

    assert!(data.join("photos").join("2024").join("beach.jpg").is_file());
    assert_eq!(
        store.get("2024/beach.jpg").unwrap(),
        Some(Bytes::from_static(b"\xff\xd8jpeg"))
    );
    assert_eq!(
        store.list_contents("2024").unwrap(),
        Some(vec!["beach.jpg".to_string(), "deep".to_string()])
    );
    assert!(matches!(
        store.get("2024/../../etc/passwd"),
        Err(StoreError::TraversalRejected(_))
    ));

    store.teardown().unwrap();
    assert!(!data.join("photos").exists());
    assert!(data.is_dir());
}

#[test]
fn test_second_store_sees_but_cannot_touch() {
    let dir = TempDir::new().unwrap();

    let mut writer = Store::new(
        PermissionMode::Limited,
        "shared",
        Box::new(LocalDiskStore::new(dir.path()).unwrap()),
    )
    .unwrap();
    writer.create_bucket("inbox").unwrap();
    writer.set("inbox/msg", "hi").unwrap();

    let mut reader = Store::new(
        PermissionMode::Limited,
        "shared",
        Box::new(LocalDiskStore::new(dir.path()).unwrap()),
    )
    .unwrap();
    assert!(reader.is_object("inbox/msg").unwrap());
    assert!(!reader.has_object("inbox/msg").unwrap());
    assert_eq!(reader.get("inbox/msg").unwrap(), Some(Bytes::from_static(b"hi")));

    let err = reader.delete("inbox/msg").unwrap_err();
    assert!(err.is_denial());
    let err = reader.delete_bucket("inbox").unwrap_err();
    assert!(err.is_denial());
    assert!(reader.teardown().unwrap_err().is_denial());

    writer.delete("inbox/msg").unwrap();
    writer.delete_bucket("inbox").unwrap();
    writer.teardown().unwrap();
    assert!(!dir.path().join("shared").exists());
}

#[test]
fn test_sqlite_contents_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("store.sqlite");

    {
        let mut store = Store::new(
            PermissionMode::Limited,
            "ledger",
            Box::new(SqliteStore::open(&db).unwrap()),
        )
        .unwrap();
        store.create_bucket("2024").unwrap();
        store.set("2024/jan", "100").unwrap();
    }

    let mut store = Store::new(
        PermissionMode::Limited,
        "ledger",
        Box::new(SqliteStore::open(&db).unwrap()),
    )
    .unwrap();
    assert_eq!(store.get("2024/jan").unwrap(), Some(Bytes::from_static(b"100")));
    // A fresh instance owns nothing it finds.
    assert!(matches!(store.set("2024/jan", "200"), Err(StoreError::NotOwned(_))));
    store.set("2024/feb", "200").unwrap();
}

#[test]
fn test_rule_model_from_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
store:
  id: uploader
  root: drop
storage:
  backend: memory
rules:
  - scope: { exact: drop }
    rule: { create: true, read: true }
  - scope: { kind: bucket }
    rule: { read: true }
  - scope: { pattern: 'drop/incoming/.*' }
    rule: { create: true, read: true, update: true, delete: true }
  - scope: { kind: object }
    rule: { create: true }
"#,
    );

    let mut store = config.open_store().unwrap();
    assert_eq!(store.id(), "uploader");

    assert!(matches!(
        store.create_bucket("incoming"),
        Err(StoreError::PermissionDenied { action: Action::Create, .. })
    ));
    store
        .set_permission(Scope::Exact("drop/incoming".into()), PermissionRule::allow_all())
        .unwrap();
    store.create_bucket("incoming").unwrap();

    store.set("incoming/a", "1").unwrap();
    store.set("incoming/a", "2").unwrap();
    store.delete("incoming/a").unwrap();

    store.set("loose", "1").unwrap();
    assert!(store.get("loose").unwrap_err().is_denial());
    assert!(!store.has_permission("loose", ResourceKind::Object, Action::Read).unwrap());

    store
        .set_permission(Scope::Kind(ResourceKind::Object), PermissionRule::new(true, true, false, false))
        .unwrap();
    assert_eq!(store.get("loose").unwrap(), Some(Bytes::from_static(b"1")));
    assert!(store.permissions_conflict("incoming/b", ResourceKind::Object).unwrap());
}
