use libsql::Builder;
use pretty_assertions::assert_eq;
use tellr_schema::{SchemaLoadError, SchemaRegistry, SchemaSource};

const SEED: &str = "
    CREATE TABLE branches (branch_id INTEGER PRIMARY KEY, city TEXT NOT NULL);
    CREATE TABLE customers (
        customer_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        branch_id INTEGER REFERENCES branches(branch_id)
    );
    INSERT INTO branches VALUES (1, 'Austin'), (2, 'Denver');
    INSERT INTO customers VALUES (1, 'Ada', 1), (2, 'Grace', 1), (3, 'Linus', 2);
";

async fn seeded_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("bank.db");
    let db = Builder::new_local(path.to_string_lossy().as_ref())
        .build()
        .await
        .unwrap();
    db.connect().unwrap().execute_batch(SEED).await.unwrap();
    path
}

#[tokio::test]
async fn database_source_collects_row_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_file(&dir).await;

    let registry = SchemaRegistry::load(&SchemaSource::Database(path))
        .await
        .unwrap();
    let schema = registry.describe();

    assert_eq!(schema.table("branches").unwrap().row_estimate, Some(2));
    assert_eq!(schema.table("customers").unwrap().row_estimate, Some(3));
    assert!(schema.has_foreign_key(("customers", "branch_id"), ("branches", "branch_id")));
}

#[tokio::test]
async fn ddl_file_source_matches_inline_ddl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schema.sql");
    std::fs::write(&path, SEED).unwrap();

    let from_file = SchemaRegistry::load(&SchemaSource::DdlFile(path)).await.unwrap();
    let inline = SchemaRegistry::load(&SchemaSource::Ddl(SEED.into()))
        .await
        .unwrap();
    assert_eq!(from_file.prompt_context(), inline.prompt_context());
    assert_eq!(from_file.resolve("city").unwrap().table, "branches");
}

#[tokio::test]
async fn missing_database_is_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");

    let err = SchemaRegistry::load(&SchemaSource::Database(path.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaLoadError::Unreachable(_)));
    assert!(!path.exists(), "loading must not create the file");
}

#[tokio::test]
async fn missing_ddl_file_is_unreachable() {
    let err = SchemaRegistry::load(&SchemaSource::DdlFile("/nonexistent/schema.sql".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaLoadError::Unreachable(_)));
}

#[tokio::test]
async fn snapshots_share_one_descriptor() {
    let registry = SchemaRegistry::load(&SchemaSource::Ddl(SEED.into()))
        .await
        .unwrap();
    let clone = registry.clone();
    assert!(std::sync::Arc::ptr_eq(&registry.snapshot(), &clone.snapshot()));
}
