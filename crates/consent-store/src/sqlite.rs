//! SQLite-backed consent store (persistence across restarts).

use async_trait::async_trait;
use consent_types::{ClientMeta, ConsentRecord, ConsentStore, ConsentStoreError, NewConsent};
use std::path::Path;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "id, fingerprint, policy_version, submitted_at, checksum, \
                              client_meta, recorded_at, expires_at, is_valid";

/// SQLite-backed ConsentStore. The composite (fingerprint, policy_version)
/// index serves lookup and revoke; the expires_at index serves the sweep's
/// range delete.
pub struct SqliteConsentStore {
    validity_period_ms: i64,
    conn: std::sync::Mutex<rusqlite::Connection>,
}

impl SqliteConsentStore {
    /// Open (or create) the store at the given path.
    pub fn new(path: impl AsRef<Path>, validity_period_ms: i64) -> Result<Self, ConsentStoreError> {
        let conn =
            rusqlite::Connection::open(path).map_err(|e| ConsentStoreError::Other(e.to_string()))?;
        Self::init(conn, validity_period_ms)
    }

    /// Private in-memory database, used by tests and ephemeral deployments.
    pub fn open_in_memory(validity_period_ms: i64) -> Result<Self, ConsentStoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| ConsentStoreError::Other(e.to_string()))?;
        Self::init(conn, validity_period_ms)
    }

    fn init(conn: rusqlite::Connection, validity_period_ms: i64) -> Result<Self, ConsentStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS consents (
                id TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                policy_version TEXT NOT NULL,
                submitted_at INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                client_meta TEXT,
                recorded_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                is_valid INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_consents_pair ON consents(fingerprint, policy_version);
            CREATE INDEX IF NOT EXISTS idx_consents_expires ON consents(expires_at);
            "#,
        )
        .map_err(|e| ConsentStoreError::Other(e.to_string()))?;

        Ok(Self {
            validity_period_ms,
            conn: std::sync::Mutex::new(conn),
        })
    }

    fn with_conn<T, F>(&self, f: F) -> Result<T, ConsentStoreError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConsentStoreError::Other(format!("failed to acquire lock: {}", e)))?;
        f(&conn).map_err(|e| ConsentStoreError::Other(e.to_string()))
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> Result<ConsentRecord, rusqlite::Error> {
        let client_meta: Option<String> = row.get(5)?;
        Ok(ConsentRecord {
            id: row.get(0)?,
            fingerprint: row.get(1)?,
            policy_version: row.get(2)?,
            submitted_at: row.get(3)?,
            checksum: row.get(4)?,
            client_meta: client_meta.and_then(|s| serde_json::from_str::<ClientMeta>(&s).ok()),
            recorded_at: row.get(6)?,
            expires_at: row.get(7)?,
            is_valid: row.get::<_, i64>(8)? != 0,
        })
    }
}

#[async_trait]
impl ConsentStore for SqliteConsentStore {
    async fn insert(
        &self,
        consent: NewConsent,
        now_ms: i64,
    ) -> Result<ConsentRecord, ConsentStoreError> {
        let id = Uuid::new_v4().to_string();
        let expires_at = now_ms + self.validity_period_ms;
        let client_meta_json = consent
            .client_meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| ConsentStoreError::Other(e.to_string()))?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO consents (id, fingerprint, policy_version, submitted_at, checksum, \
                 client_meta, recorded_at, expires_at, is_valid) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
                rusqlite::params![
                    id,
                    consent.fingerprint,
                    consent.policy_version,
                    consent.submitted_at,
                    consent.checksum,
                    client_meta_json,
                    now_ms,
                    expires_at,
                ],
            )
        })?;

        Ok(ConsentRecord {
            id,
            submitted_at: consent.submitted_at,
            policy_version: consent.policy_version,
            fingerprint: consent.fingerprint,
            checksum: consent.checksum,
            client_meta: consent.client_meta,
            recorded_at: now_ms,
            expires_at,
            is_valid: true,
        })
    }

    async fn find_latest_valid(
        &self,
        fingerprint: &str,
        policy_version: &str,
        now_ms: i64,
    ) -> Result<Option<ConsentRecord>, ConsentStoreError> {
        let fingerprint = fingerprint.to_string();
        let policy_version = policy_version.to_string();
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM consents \
                 WHERE fingerprint = ?1 AND policy_version = ?2 \
                   AND is_valid = 1 AND expires_at > ?3 \
                 ORDER BY recorded_at DESC LIMIT 1",
                SELECT_COLUMNS
            ))?;
            let mut rows = stmt.query(rusqlite::params![fingerprint, policy_version, now_ms])?;
            match rows.next()? {
                Some(row) => Ok(Some(Self::row_to_record(row)?)),
                None => Ok(None),
            }
        })
    }

    async fn invalidate_all(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<u64, ConsentStoreError> {
        let fingerprint = fingerprint.to_string();
        let policy_version = policy_version.to_string();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE consents SET is_valid = 0 \
                 WHERE fingerprint = ?1 AND policy_version = ?2 AND is_valid = 1",
                rusqlite::params![fingerprint, policy_version],
            )
        })
        .map(|n| n as u64)
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<u64, ConsentStoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM consents WHERE expires_at <= ?1 OR is_valid = 0",
                rusqlite::params![now_ms],
            )
        })
        .map(|n| n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const T0: i64 = 1_700_000_000_000;

    fn consent(fingerprint: &str, version: &str) -> NewConsent {
        NewConsent {
            submitted_at: T0,
            policy_version: version.to_string(),
            fingerprint: fingerprint.to_string(),
            checksum: "tag".to_string(),
            client_meta: Some(ClientMeta {
                user_agent: Some("test-agent".to_string()),
                source_ip: Some("10.0.0.1".to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_client_meta() {
        let store = SqliteConsentStore::open_in_memory(30 * DAY_MS).unwrap();
        let rec = store.insert(consent("fp", "2.0"), T0).await.unwrap();
        assert_eq!(rec.expires_at, T0 + 30 * DAY_MS);

        let found = store
            .find_latest_valid("fp", "2.0", T0 + 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, rec);
        assert_eq!(
            found.client_meta.unwrap().user_agent.as_deref(),
            Some("test-agent")
        );
    }

    #[tokio::test]
    async fn latest_recorded_at_wins() {
        let store = SqliteConsentStore::open_in_memory(30 * DAY_MS).unwrap();
        store.insert(consent("fp", "2.0"), T0).await.unwrap();
        let second = store.insert(consent("fp", "2.0"), T0 + 500).await.unwrap();

        let found = store
            .find_latest_valid("fp", "2.0", T0 + 1000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn invalidate_then_sweep_physically_removes() {
        let store = SqliteConsentStore::open_in_memory(30 * DAY_MS).unwrap();
        store.insert(consent("fp", "2.0"), T0).await.unwrap();
        store.insert(consent("fp", "2.0"), T0 + 1).await.unwrap();

        assert_eq!(store.invalidate_all("fp", "2.0").await.unwrap(), 2);
        assert_eq!(store.invalidate_all("fp", "2.0").await.unwrap(), 0);
        assert_eq!(store.sweep_expired(T0).await.unwrap(), 2);
        assert_eq!(store.sweep_expired(T0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sweep_uses_expiry_boundary_inclusively() {
        let store = SqliteConsentStore::open_in_memory(30 * DAY_MS).unwrap();
        let rec = store.insert(consent("fp", "2.0"), T0).await.unwrap();
        assert_eq!(store.sweep_expired(rec.expires_at - 1).await.unwrap(), 0);
        assert_eq!(store.sweep_expired(rec.expires_at).await.unwrap(), 1);
    }
}
