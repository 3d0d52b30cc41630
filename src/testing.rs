use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::db::{Database, connect_from_config};

/// Fresh migrated libSQL database in a temp dir. Keep the `TempDir` alive
/// for as long as the handle is used.
pub(crate) async fn test_db() -> (Arc<dyn Database>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = DatabaseConfig::libsql(dir.path().join("contas-test.db"));
    let db = connect_from_config(&config)
        .await
        .expect("open test database");
    (db, dir)
}
