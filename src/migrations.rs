use crate::db::DbPool;

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_initial_schema",
            sql: "-- initial schema created by init_db, this is a placeholder
                  SELECT 1;",
        },
        Migration {
            name: "002_session_tokens_fallback",
            sql: "CREATE TABLE IF NOT EXISTS session_tokens (
                      role TEXT PRIMARY KEY CHECK(role IN ('viewer','security','admin')),
                      token TEXT NOT NULL,
                      updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                  );",
        },
    ]
}

pub fn run_pending(pool: &DbPool) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let applied_set: std::collections::HashSet<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();

    let mut newly_applied = Vec::new();

    for migration in all_migrations() {
        if !applied_set.contains(migration.name) {
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO migrations (name) VALUES (?1)",
                [migration.name],
            )?;
            newly_applied.push(migration.name.to_string());
        }
    }

    Ok(newly_applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("test.sqlite")).unwrap();
        db::init_db(&pool).unwrap();
        (dir, pool)
    }

    #[test]
    fn run_pending_on_fresh_db_applies_all() {
        let (_dir, pool) = test_pool();
        let applied = run_pending(&pool).unwrap();
        assert_eq!(applied.len(), all_migrations().len());
    }

    #[test]
    fn run_pending_is_idempotent() {
        let (_dir, pool) = test_pool();
        let first = run_pending(&pool).unwrap();
        let second = run_pending(&pool).unwrap();
        assert!(!first.is_empty());
        assert!(second.is_empty()); // nothing new to apply
    }

    #[test]
    fn migration_002_creates_token_table() {
        let (_dir, pool) = test_pool();
        run_pending(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch("SELECT role, token, updated_at FROM session_tokens LIMIT 0")
            .expect("session_tokens table should exist with expected columns");
    }
}
