// SPDX-FileCopyrightText: 2026 Waynebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `waynebot migrate`: opening the store applies pending migrations.

use tracing::info;
use waynebot_config::WaynebotConfig;
use waynebot_core::WaynebotError;
use waynebot_storage::Database;

pub async fn run_migrate(config: &WaynebotConfig) -> Result<(), WaynebotError> {
    let version = migrate(&config.storage.db_path).await?;
    info!(db_path = %config.storage.db_path, version, "migrations applied");
    println!("schema version {version}");
    Ok(())
}

async fn migrate(db_path: &str) -> Result<i64, WaynebotError> {
    let db = Database::open(db_path).await?;
    let version = db.schema_version().await?;
    db.close().await?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrating_twice_reports_the_same_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waynebot.db");
        let path = path.to_string_lossy();

        let first = migrate(&path).await.unwrap();
        assert!(first > 0);
        assert_eq!(migrate(&path).await.unwrap(), first);
    }
}
