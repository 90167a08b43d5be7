use crate::announcements::error::AnnouncementError;
use crate::announcements::record::{AnnouncementId, AnnouncementRecord};
use crate::persistence::{read_json_or_default, write_json, PersistenceError};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;

type Records = HashMap<AnnouncementId, AnnouncementRecord>;

/// Pending announcements keyed by id.
///
/// Records older than the lifespan read as absent straight away and are
/// physically removed by [`AnnouncementStore::sweep_expired`]. When the store
/// has a backing file, its whole contents are written after every change.
pub struct AnnouncementStore {
    records: Mutex<Records>,
    lifespan: chrono::Duration,
    path: Option<PathBuf>,
}

impl AnnouncementStore {
    #[cfg(test)]
    pub(crate) fn in_memory(lifespan: chrono::Duration) -> Self {
        AnnouncementStore {
            records: Mutex::new(HashMap::new()),
            lifespan,
            path: None,
        }
    }

    /// Opens the store backed by `path`. A missing or empty file gives an empty
    /// store.
    pub async fn load(path: PathBuf, lifespan: chrono::Duration) -> Result<Self, PersistenceError> {
        let pairs: Vec<(AnnouncementId, AnnouncementRecord)> = read_json_or_default(&path).await?;
        tracing::info!(
            "Loaded {} pending announcements from {}",
            pairs.len(),
            path.display()
        );

        Ok(AnnouncementStore {
            records: Mutex::new(pairs.into_iter().collect()),
            lifespan,
            path: Some(path),
        })
    }

    pub fn lifespan(&self) -> chrono::Duration {
        self.lifespan
    }

    pub fn is_expired(&self, record: &AnnouncementRecord, now: DateTime<Utc>) -> bool {
        now - record.created_at() > self.lifespan
    }

    async fn persist(&self, records: &Records) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut pairs: Vec<(&AnnouncementId, &AnnouncementRecord)> = records.iter().collect();
        pairs.sort_by(|(a_id, a), (b_id, b)| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a_id.cmp(b_id))
        });

        write_json(path, &pairs).await
    }

    /// Writes `next` and only then makes it the live map, so a failed write
    /// leaves memory matching the file.
    async fn commit(&self, records: &mut Records, next: Records) -> Result<(), PersistenceError> {
        self.persist(&next).await?;
        *records = next;
        Ok(())
    }

    pub async fn create(&self, record: AnnouncementRecord) -> Result<AnnouncementId, AnnouncementError> {
        let id = record.id().clone();
        let mut records = self.records.lock().await;

        if records.contains_key(&id) {
            return Err(AnnouncementError::DuplicateId(id));
        }

        let mut next = records.clone();
        next.insert(id.clone(), record);
        self.commit(&mut records, next).await?;

        Ok(id)
    }

    pub async fn get(&self, id: &AnnouncementId, now: DateTime<Utc>) -> Option<AnnouncementRecord> {
        self.records
            .lock()
            .await
            .get(id)
            .filter(|record| !self.is_expired(record, now))
            .cloned()
    }

    /// Applies `mutator` to a live record and returns the updated copy.
    pub async fn update<F>(
        &self,
        id: &AnnouncementId,
        now: DateTime<Utc>,
        mutator: F,
    ) -> Result<AnnouncementRecord, AnnouncementError>
    where
        F: FnOnce(&mut AnnouncementRecord),
    {
        let mut records = self.records.lock().await;

        let mut updated = match records.get(id) {
            Some(record) if !self.is_expired(record, now) => record.clone(),
            _ => return Err(AnnouncementError::NotFound(id.clone())),
        };

        mutator(&mut updated);

        let mut next = records.clone();
        next.insert(id.clone(), updated.clone());
        self.commit(&mut records, next).await?;

        Ok(updated)
    }

    /// Removes a record. Deleting an absent id is not an error.
    pub async fn delete(&self, id: &AnnouncementId) -> Result<(), AnnouncementError> {
        let mut records = self.records.lock().await;

        if records.contains_key(id) {
            let mut next = records.clone();
            next.remove(id);
            self.commit(&mut records, next).await?;
        }

        Ok(())
    }

    /// Removes every record older than the lifespan and returns their ids.
    pub async fn sweep_expired(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AnnouncementId>, AnnouncementError> {
        let mut records = self.records.lock().await;

        let expired: Vec<AnnouncementId> = records
            .values()
            .filter(|record| self.is_expired(record, now))
            .map(|record| record.id().clone())
            .collect();

        if expired.is_empty() {
            return Ok(expired);
        }

        let mut next = records.clone();
        for id in &expired {
            next.remove(id);
        }
        self.commit(&mut records, next).await?;

        Ok(expired)
    }
}

/// Sweeps expired announcements every half lifespan, so nothing outlives
/// 1.5x the lifespan.
pub async fn sweep_periodically(store: Arc<AnnouncementStore>) {
    let every = (store.lifespan() / 2)
        .to_std()
        .unwrap_or(Duration::from_secs(60))
        .max(Duration::from_secs(1));

    let mut interval = interval(every);

    loop {
        interval.tick().await;

        match store.sweep_expired(Utc::now()).await {
            Ok(removed) if removed.is_empty() => {}
            Ok(removed) => tracing::info!("Swept {} expired announcements", removed.len()),
            Err(e) => tracing::error!("Failed to sweep expired announcements: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const AUTHOR: u64 = 123456789123456789;

    fn lifespan() -> chrono::Duration {
        chrono::Duration::minutes(30)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap()
    }

    fn record_at(author_id: u64, created_at: DateTime<Utc>) -> AnnouncementRecord {
        AnnouncementRecord::new(author_id, "Meeting", Some("Room 4"), Some(42), created_at)
    }

    #[tokio::test]
    async fn created_records_are_retrieved_with_their_author() {
        // arrange
        let store = AnnouncementStore::in_memory(lifespan());
        let test_cases = vec![
            (AUTHOR, start()),
            (AUTHOR, start() + chrono::Duration::milliseconds(1)),
            (987654321987654321, start()),
        ];

        for (author_id, created_at) in test_cases {
            // act
            let id = store.create(record_at(author_id, created_at)).await.unwrap();
            let record = store.get(&id, created_at).await.unwrap();

            // assert
            assert_eq!(record.author_id(), author_id);
            assert_eq!(record.id(), &id);
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = AnnouncementStore::in_memory(lifespan());
        store.create(record_at(AUTHOR, start())).await.unwrap();

        let result = store.create(record_at(AUTHOR, start())).await;

        assert!(matches!(result, Err(AnnouncementError::DuplicateId(_))));
    }

    #[tokio::test]
    async fn expired_records_read_as_absent() {
        // arrange
        let store = AnnouncementStore::in_memory(lifespan());
        let id = store.create(record_at(AUTHOR, start())).await.unwrap();
        let later = start() + lifespan() + chrono::Duration::seconds(1);

        // act
        let fetched = store.get(&id, later).await;
        let updated = store.update(&id, later, |r| r.topic = "late".to_string()).await;

        // assert
        assert!(fetched.is_none());
        assert!(matches!(updated, Err(AnnouncementError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_of_missing_record_is_not_found() {
        let store = AnnouncementStore::in_memory(lifespan());
        let id = AnnouncementId::new(AUTHOR, start());

        let result = store.update(&id, start(), |_| {}).await;

        assert!(matches!(result, Err(AnnouncementError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_returns_and_stores_the_mutated_record() {
        let store = AnnouncementStore::in_memory(lifespan());
        let id = store.create(record_at(AUTHOR, start())).await.unwrap();

        let updated = store
            .update(&id, start(), |r| r.email_subject = "Room Change".to_string())
            .await
            .unwrap();

        assert_eq!(updated.email_subject, "Room Change");
        assert_eq!(store.get(&id, start()).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = AnnouncementStore::in_memory(lifespan());
        let id = store.create(record_at(AUTHOR, start())).await.unwrap();

        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();

        assert!(store.get(&id, start()).await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_exactly_the_records_past_their_lifespan() {
        // arrange
        let store = AnnouncementStore::in_memory(lifespan());
        let now = start() + chrono::Duration::hours(1);
        let just_expired = now - lifespan() - chrono::Duration::milliseconds(1);
        let at_the_limit = now - lifespan();
        let almost_expired = now - lifespan() + chrono::Duration::milliseconds(1);

        let old = store.create(record_at(1, start())).await.unwrap();
        let just = store.create(record_at(2, just_expired)).await.unwrap();
        let limit = store.create(record_at(3, at_the_limit)).await.unwrap();
        let almost = store.create(record_at(4, almost_expired)).await.unwrap();

        // act
        let mut removed = store.sweep_expired(now).await.unwrap();
        removed.sort();

        // assert
        let mut expected = vec![old, just];
        expected.sort();
        assert_eq!(removed, expected);
        assert!(store.get(&limit, now).await.is_some());
        assert!(store.get(&almost, now).await.is_some());
    }

    #[tokio::test]
    async fn persisted_records_are_reloaded_identically() {
        // arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("announcements.json");
        let store = AnnouncementStore::load(path.clone(), lifespan()).await.unwrap();

        let first = store.create(record_at(1, start())).await.unwrap();
        let second = store.create(record_at(2, start())).await.unwrap();
        store
            .update(&second, start(), |r| r.discord_body = "edited".to_string())
            .await
            .unwrap();
        let deleted = store.create(record_at(3, start())).await.unwrap();
        store.delete(&deleted).await.unwrap();

        // act
        let reloaded = AnnouncementStore::load(path, lifespan()).await.unwrap();

        // assert
        assert_eq!(*reloaded.records.lock().await, *store.records.lock().await);
        assert_eq!(
            reloaded.get(&second, start()).await.unwrap().discord_body,
            "edited"
        );
        assert!(reloaded.get(&first, start()).await.is_some());
        assert!(reloaded.get(&deleted, start()).await.is_none());
    }

    #[tokio::test]
    async fn persisted_layout_is_a_list_of_id_record_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("announcements.json");
        let store = AnnouncementStore::load(path.clone(), lifespan()).await.unwrap();
        let id = store.create(record_at(AUTHOR, start())).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();

        assert_eq!(json[0][0], serde_json::json!(id.as_str()));
        assert_eq!(json[0][1]["topic"], "Meeting");
    }

    #[tokio::test]
    async fn failed_writes_leave_memory_unchanged() {
        // arrange
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::create_dir(&data_dir).unwrap();
        let store = AnnouncementStore::load(data_dir.join("announcements.json"), lifespan())
            .await
            .unwrap();
        let id = store.create(record_at(AUTHOR, start())).await.unwrap();
        std::fs::remove_dir_all(&data_dir).unwrap();

        // act
        let deleted = store.delete(&id).await;
        let updated = store
            .update(&id, start(), |r| r.topic = "Changed".to_string())
            .await;
        let created = store.create(record_at(2, start())).await;

        // assert
        assert!(matches!(deleted, Err(AnnouncementError::Persistence(_))));
        assert!(matches!(updated, Err(AnnouncementError::Persistence(_))));
        assert!(matches!(created, Err(AnnouncementError::Persistence(_))));
        let records = store.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[&id].topic, "Meeting");
    }

    #[tokio::test]
    async fn missing_backing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();

        let store = AnnouncementStore::load(dir.path().join("missing.json"), lifespan())
            .await
            .unwrap();

        assert!(store.records.lock().await.is_empty());
    }
}
