//! SQLite stores survive reopening the same database file.

use ngmig_core::{
    AsyncTaskRecord, CgBasicInfo, EntityType, MigratedEntityMapping, NgEntityDetail,
    TaskRequestType, TaskStatus,
};
use ngmig_storage::{MappingFilter, MappingStore, SqliteStore, StorageError, TaskStore};

fn temp_db_path() -> String {
    std::env::temp_dir()
        .join(format!("ngmig_storage_test_{}.db", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string()
}

fn connector_mapping() -> MigratedEntityMapping {
    let cg = CgBasicInfo {
        account_id: "acc".into(),
        app_id: None,
        id: "conn1".into(),
        kind: EntityType::Connector,
        name: "git conn".into(),
    };
    MigratedEntityMapping::new(&cg, &NgEntityDetail::new("gitConn", None, None))
}

#[test]
fn mappings_persist_across_reopen() {
    let path = temp_db_path();
    {
        let mut store = SqliteStore::new(&path).unwrap();
        store.insert_mapping(&connector_mapping()).unwrap();
    }

    let mut store = SqliteStore::new(&path).unwrap();
    let found = store
        .find_mappings(&MappingFilter::account("acc").cg_entity(EntityType::Connector, "conn1"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].identifier, "gitConn");

    // The unique index is still enforced after reopening.
    let err = store.insert_mapping(&connector_mapping()).unwrap_err();
    assert!(matches!(err, StorageError::Duplicate { .. }));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn two_handles_share_task_records() {
    let path = temp_db_path();
    let mut writer = SqliteStore::new(&path).unwrap();
    let reader = SqliteStore::new(&path).unwrap();

    let mut rec = AsyncTaskRecord::processing(
        "t-1",
        "acc",
        TaskRequestType::Discovery,
        serde_json::json!({"root": "ACCOUNT:acc"}),
    );
    writer.insert_task(&rec).unwrap();
    assert_eq!(reader.get_task("t-1").unwrap().status, TaskStatus::Processing);

    rec.mark_error("source unavailable");
    writer.update_task(&rec).unwrap();
    let seen = reader.get_task("t-1").unwrap();
    assert_eq!(seen.status, TaskStatus::Error);
    assert_eq!(seen.error_message.as_deref(), Some("source unavailable"));
    assert_eq!(reader.list_tasks("acc").unwrap().len(), 1);

    let _ = std::fs::remove_file(&path);
}
