//! In-memory consent store (process lifetime only).

use consent_types::{ConsentRecord, ConsentStore, ConsentStoreError, NewConsent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type PairIndex = HashMap<(String, String), Vec<String>>;

/// In-memory implementation of ConsentStore.
/// Records are keyed by id; a (fingerprint, policy_version) index backs the
/// lookup and revoke paths. Lock order is records before pair_index.
pub struct InMemoryConsentStore {
    validity_period_ms: i64,
    /// record id -> record.
    records: Arc<RwLock<HashMap<String, ConsentRecord>>>,
    /// (fingerprint, policy_version) -> record ids, in insertion order.
    pair_index: Arc<RwLock<PairIndex>>,
}

impl InMemoryConsentStore {
    pub fn new(validity_period_ms: i64) -> Self {
        Self {
            validity_period_ms,
            records: Arc::new(RwLock::new(HashMap::new())),
            pair_index: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait::async_trait]
impl ConsentStore for InMemoryConsentStore {
    async fn insert(
        &self,
        consent: NewConsent,
        now_ms: i64,
    ) -> Result<ConsentRecord, ConsentStoreError> {
        let record = ConsentRecord {
            id: Uuid::new_v4().to_string(),
            submitted_at: consent.submitted_at,
            policy_version: consent.policy_version,
            fingerprint: consent.fingerprint,
            checksum: consent.checksum,
            client_meta: consent.client_meta,
            recorded_at: now_ms,
            expires_at: now_ms + self.validity_period_ms,
            is_valid: true,
        };
        let key = (record.fingerprint.clone(), record.policy_version.clone());
        let mut records = self.records.write().await;
        let mut index = self.pair_index.write().await;
        index.entry(key).or_default().push(record.id.clone());
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn find_latest_valid(
        &self,
        fingerprint: &str,
        policy_version: &str,
        now_ms: i64,
    ) -> Result<Option<ConsentRecord>, ConsentStoreError> {
        let records = self.records.read().await;
        let index = self.pair_index.read().await;
        let ids = match index.get(&(fingerprint.to_string(), policy_version.to_string())) {
            Some(ids) => ids,
            None => return Ok(None),
        };
        let mut latest: Option<&ConsentRecord> = None;
        for id in ids {
            let rec = match records.get(id) {
                Some(rec) if rec.is_live(now_ms) => rec,
                _ => continue,
            };
            // ids are in insertion order, so on equal recorded_at the later
            // insertion wins.
            match latest {
                Some(best) if rec.recorded_at < best.recorded_at => {}
                _ => latest = Some(rec),
            }
        }
        Ok(latest.cloned())
    }

    async fn invalidate_all(
        &self,
        fingerprint: &str,
        policy_version: &str,
    ) -> Result<u64, ConsentStoreError> {
        let mut records = self.records.write().await;
        let index = self.pair_index.read().await;
        let ids = match index.get(&(fingerprint.to_string(), policy_version.to_string())) {
            Some(ids) => ids,
            None => return Ok(0),
        };
        let mut mutated = 0u64;
        for id in ids {
            if let Some(rec) = records.get_mut(id) {
                if rec.is_valid {
                    rec.is_valid = false;
                    mutated += 1;
                }
            }
        }
        Ok(mutated)
    }

    async fn sweep_expired(&self, now_ms: i64) -> Result<u64, ConsentStoreError> {
        let mut records = self.records.write().await;
        let mut index = self.pair_index.write().await;
        let before = records.len();
        records.retain(|_, rec| rec.is_valid && rec.expires_at > now_ms);
        for ids in index.values_mut() {
            ids.retain(|id| records.contains_key(id));
        }
        index.retain(|_, ids| !ids.is_empty());
        Ok((before - records.len()) as u64)
    }
}
