//! Durable job records and the active-job set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use magnetar_events::JobId;
use magnetar_torrent_core::{Category, TorrentHandle};
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::kv::KeyValueStore;

/// Key prefix shared by every job record hash.
pub const RECORD_KEY_PREFIX: &str = "coordinator:torrent:";
/// Set holding the ids of jobs believed to be in progress.
pub const ACTIVE_SET_KEY: &str = "coordinator:torrents:in_progress";

const FIELD_HANDLE: &str = "torrent_id";
const FIELD_CATEGORY: &str = "category";
const FIELD_LAST_UPDATE: &str = "last_update";

/// Lifecycle metadata persisted for one submitted download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// Job identifier; also the record key suffix.
    pub job_id: JobId,
    /// Backend handle returned when the item was added.
    pub handle: TorrentHandle,
    /// Category chosen at submission; never rewritten.
    pub category: Category,
    /// Time of the last successful poll (or of creation).
    pub last_update: DateTime<Utc>,
}

impl JobRecord {
    /// Record for a job that was just accepted by the backend.
    #[must_use]
    pub fn new(job_id: JobId, handle: TorrentHandle, category: Category) -> Self {
        Self {
            job_id,
            handle,
            category,
            last_update: Utc::now(),
        }
    }

    fn fields(&self) -> [(&'static str, String); 3] {
        [
            (FIELD_HANDLE, self.handle.0.to_string()),
            (FIELD_CATEGORY, self.category.as_i32().to_string()),
            (FIELD_LAST_UPDATE, format_timestamp(self.last_update)),
        ]
    }

    fn from_fields(
        key: &str,
        job_id: JobId,
        fields: &HashMap<String, String>,
    ) -> StoreResult<Self> {
        let invalid = |field: &'static str| StoreError::InvalidRecord {
            key: key.to_string(),
            field,
        };
        let handle = fields
            .get(FIELD_HANDLE)
            .and_then(|raw| raw.parse::<i64>().ok())
            .ok_or_else(|| invalid(FIELD_HANDLE))?;
        let category = fields
            .get(FIELD_CATEGORY)
            .and_then(|raw| raw.parse::<i32>().ok())
            .and_then(|code| Category::try_from(code).ok())
            .ok_or_else(|| invalid(FIELD_CATEGORY))?;
        let last_update = fields
            .get(FIELD_LAST_UPDATE)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|stamp| stamp.with_timezone(&Utc))
            .ok_or_else(|| invalid(FIELD_LAST_UPDATE))?;
        Ok(Self {
            job_id,
            handle: TorrentHandle(handle),
            category,
            last_update,
        })
    }
}

/// Hash key holding the record for `job_id`.
#[must_use]
pub fn record_key(job_id: &JobId) -> String {
    format!("{RECORD_KEY_PREFIX}{job_id}")
}

fn format_timestamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Job record repository layered on a [`KeyValueStore`].
#[derive(Clone)]
pub struct JobStore {
    store: Arc<dyn KeyValueStore>,
}

impl JobStore {
    /// Wrap the shared store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist `record` and mark the job active.
    ///
    /// # Errors
    ///
    /// Returns the first store failure; a record written before a failed
    /// set insertion is left for the recovery sweep.
    pub async fn create(&self, record: &JobRecord) -> StoreResult<()> {
        self.store
            .hash_set(&record_key(&record.job_id), &record.fields())
            .await?;
        self.store
            .set_add(ACTIVE_SET_KEY, record.job_id.as_str())
            .await
    }

    /// Load the record for `job_id`, or `None` once it has been removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the store fails or the record is malformed.
    pub async fn load(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        let key = record_key(job_id);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        JobRecord::from_fields(&key, job_id.clone(), &fields).map(Some)
    }

    /// Stamp `last_update` on an existing record.
    ///
    /// Returns `false` when the record is already gone; a removed job is never
    /// recreated by a late update.
    ///
    /// # Errors
    ///
    /// Returns an error when the store fails.
    pub async fn touch(&self, job_id: &JobId, at: DateTime<Utc>) -> StoreResult<bool> {
        self.store
            .hash_set_existing(&record_key(job_id), FIELD_LAST_UPDATE, &format_timestamp(at))
            .await
    }

    /// Drop the job from the active set and delete its record.
    ///
    /// Both steps are attempted even when the first fails.
    ///
    /// # Errors
    ///
    /// Returns the first store failure.
    pub async fn remove(&self, job_id: &JobId) -> StoreResult<()> {
        let unmarked = self.store.set_remove(ACTIVE_SET_KEY, job_id.as_str()).await;
        let deleted = self.store.delete(&record_key(job_id)).await;
        unmarked.and(deleted)
    }

    /// Drop the job from the active set only.
    ///
    /// # Errors
    ///
    /// Returns an error when the store fails.
    pub async fn deactivate(&self, job_id: &JobId) -> StoreResult<()> {
        self.store.set_remove(ACTIVE_SET_KEY, job_id.as_str()).await
    }

    /// Ids currently in the active set.
    ///
    /// # Errors
    ///
    /// Returns an error when the store fails.
    pub async fn active_ids(&self) -> StoreResult<Vec<JobId>> {
        let members = self.store.set_members(ACTIVE_SET_KEY).await?;
        Ok(members.into_iter().map(JobId::from).collect())
    }

    /// Every persisted record, regardless of active-set membership.
    ///
    /// Records that fail to decode are reported by id in
    /// [`RecordScan::malformed`] so the caller can delete them; records
    /// deleted between the scan and the read are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error when the scan or a read fails.
    pub async fn scan_records(&self) -> StoreResult<RecordScan> {
        let keys = self.store.scan_prefix(RECORD_KEY_PREFIX).await?;
        let mut scan = RecordScan {
            records: Vec::with_capacity(keys.len()),
            malformed: Vec::new(),
        };
        for key in keys {
            let Some(raw_id) = key.strip_prefix(RECORD_KEY_PREFIX) else {
                continue;
            };
            let job_id = JobId::from(raw_id);
            match self.load(&job_id).await {
                Ok(Some(record)) => scan.records.push(record),
                Ok(None) => {}
                Err(err @ StoreError::InvalidRecord { .. }) => {
                    warn!(error = %err, key = %key, "found malformed job record");
                    scan.malformed.push(job_id);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(scan)
    }
}

/// Outcome of [`JobStore::scan_records`].
#[derive(Debug, Default)]
pub struct RecordScan {
    /// Records that decoded cleanly.
    pub records: Vec<JobRecord>,
    /// Ids whose stored fields could not be decoded.
    pub malformed: Vec<JobId>,
}
