//! Run audit log
//!
//! Every run leaves a record of what each stage saw (as a digest of its
//! input snapshot) and how it resolved, so a stage can be replayed and checked.

use crate::models::{Query, StageName, StageStatus};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageAudit {
    pub stage: StageName,
    pub status: StageStatus,
    pub input_digest: String,
    pub notes: Vec<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub query: Query,
    pub report_title: String,
    pub stages: Vec<StageAudit>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl RunRecord {
    pub fn degraded_stages(&self) -> Vec<StageName> {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Degraded)
            .map(|s| s.stage)
            .collect()
    }
}

/// Runs kept before the oldest is evicted
pub const DEFAULT_RUN_LOG_CAPACITY: usize = 1000;

/// In-memory audit trail storage, bounded to the most recent runs
pub struct RunLog {
    records: Arc<RwLock<HashMap<Uuid, RunRecord>>>,
    capacity: usize,
}

impl RunLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RUN_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Store a run record, evicting the oldest runs past capacity
    pub async fn record(&self, record: RunRecord) -> Result<Uuid> {
        let run_id = record.run_id;
        let mut records = self.records.write().await;
        records.insert(run_id, record);

        while records.len() > self.capacity {
            let oldest = records
                .iter()
                .filter(|(id, _)| **id != run_id)
                .min_by_key(|(_, r)| r.started_at)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    records.remove(&id);
                    debug!(run_id = %id, "Evicted run record");
                }
                None => break,
            }
        }

        Ok(run_id)
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&run_id).cloned())
    }

    /// All run IDs, oldest first
    pub async fn list(&self) -> Result<Vec<Uuid>> {
        let records = self.records.read().await;

        let mut items: Vec<_> = records
            .iter()
            .map(|(id, record)| (*id, record.started_at))
            .collect();

        items.sort_by_key(|(_, started_at)| *started_at);

        Ok(items.into_iter().map(|(id, _)| id).collect())
    }

    /// Check that `snapshot` is exactly what `stage` ran on in `run_id`
    pub async fn verify_stage_replay<T: Serialize>(
        &self,
        run_id: Uuid,
        stage: StageName,
        snapshot: &T,
    ) -> Result<bool> {
        let records = self.records.read().await;

        let recorded = records
            .get(&run_id)
            .and_then(|record| record.stages.iter().find(|s| s.stage == stage))
            .map(|s| s.input_digest.clone());

        Ok(match recorded {
            Some(digest) => digest == compute_digest(snapshot),
            None => false,
        })
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 hex digest of any serializable value.
/// Streams JSON straight into the hasher (no intermediate String).
pub fn compute_digest<T: Serialize>(value: &T) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), value).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryParser;

    fn record(digest: &str) -> RunRecord {
        RunRecord {
            run_id: Uuid::new_v4(),
            query: QueryParser::parse("Gym in Coimbatore"),
            report_title: "Market Research Report: Gym in Coimbatore".to_string(),
            stages: vec![StageAudit {
                stage: StageName::Competitor,
                status: StageStatus::Degraded,
                input_digest: digest.to_string(),
                notes: vec!["synthesis failed".to_string()],
                execution_time_ms: 12,
            }],
            started_at: Utc::now(),
            finished_at: Utc::now(),
            execution_time_ms: 40,
        }
    }

    #[tokio::test]
    async fn test_oldest_runs_are_evicted() {
        let log = RunLog::with_capacity(2);
        let mut ids = Vec::new();
        for offset in 0..3 {
            let mut run = record("digest");
            run.started_at = Utc::now() + chrono::Duration::seconds(offset);
            ids.push(log.record(run).await.unwrap());
        }

        assert_eq!(log.list().await.unwrap(), vec![ids[1], ids[2]]);
        assert!(log.get(ids[0]).await.unwrap().is_none());
    }

    #[test]
    fn test_digest_is_stable_and_sensitive() {
        let a = compute_digest(&serde_json::json!({ "local_market": "3 gyms" }));
        let b = compute_digest(&serde_json::json!({ "local_market": "3 gyms" }));
        let c = compute_digest(&serde_json::json!({ "local_market": "4 gyms" }));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_record_and_replay() {
        let snapshot = serde_json::json!({ "local_market": "3 gyms" });
        let log = RunLog::new();
        let record = record(&compute_digest(&snapshot));
        let run_id = log.record(record).await.unwrap();

        assert!(log
            .verify_stage_replay(run_id, StageName::Competitor, &snapshot)
            .await
            .unwrap());
        assert!(!log
            .verify_stage_replay(run_id, StageName::Competitor, &serde_json::json!({}))
            .await
            .unwrap());
        assert!(!log
            .verify_stage_replay(run_id, StageName::Trends, &snapshot)
            .await
            .unwrap());

        let stored = log.get(run_id).await.unwrap().unwrap();
        assert_eq!(stored.degraded_stages(), vec![StageName::Competitor]);
        assert_eq!(log.list().await.unwrap(), vec![run_id]);
    }
}
