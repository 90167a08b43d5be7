use crate::persistence::{read_json_or_default, write_json, PersistenceError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledAction {
    ArchiveChannel { channel_id: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: Uuid,
    pub due_at: DateTime<Utc>,
    pub action: ScheduledAction,
}

/// Actions to run at a later time. Tasks survive restarts when the queue has a
/// backing file.
pub struct TaskQueue {
    tasks: Mutex<Vec<ScheduledTask>>,
    path: Option<PathBuf>,
}

impl TaskQueue {
    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        TaskQueue {
            tasks: Mutex::new(Vec::new()),
            path: None,
        }
    }

    pub async fn load(path: PathBuf) -> Result<Self, PersistenceError> {
        let tasks: Vec<ScheduledTask> = read_json_or_default(&path).await?;
        tracing::info!("Loaded {} scheduled tasks from {}", tasks.len(), path.display());

        Ok(TaskQueue {
            tasks: Mutex::new(tasks),
            path: Some(path),
        })
    }

    async fn persist(&self, tasks: &[ScheduledTask]) -> Result<(), PersistenceError> {
        match &self.path {
            Some(path) => write_json(path, tasks).await,
            None => Ok(()),
        }
    }

    /// Queues `action` to run at `due_at`. A pending task with the same action
    /// is replaced.
    pub async fn schedule(
        &self,
        due_at: DateTime<Utc>,
        action: ScheduledAction,
    ) -> Result<Uuid, PersistenceError> {
        let mut tasks = self.tasks.lock().await;

        tasks.retain(|task| task.action != action);

        let id = Uuid::new_v4();
        tasks.push(ScheduledTask { id, due_at, action });
        tasks.sort_by_key(|task| task.due_at);

        self.persist(&tasks).await?;

        Ok(id)
    }

    /// Tasks due at or before `now`, earliest first. They stay queued until
    /// completed.
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<ScheduledTask> {
        self.tasks
            .lock()
            .await
            .iter()
            .filter(|task| task.due_at <= now)
            .cloned()
            .collect()
    }

    pub async fn complete(&self, id: Uuid) -> Result<(), PersistenceError> {
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();

        tasks.retain(|task| task.id != id);

        if tasks.len() != before {
            self.persist(&tasks).await?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn pending(&self) -> Vec<ScheduledTask> {
        self.tasks.lock().await.clone()
    }
}

/// Runs every task due at `now` and removes it from the queue. A failing task
/// is logged and dropped. Returns how many tasks ran successfully.
pub async fn run_due<F, Fut, E>(queue: &TaskQueue, now: DateTime<Utc>, execute: F) -> usize
where
    F: Fn(ScheduledAction) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut succeeded = 0;

    for task in queue.due(now).await {
        match execute(task.action.clone()).await {
            Ok(()) => {
                tracing::info!("Ran scheduled task {} ({:?})", task.id, task.action);
                succeeded += 1;
            }
            Err(e) => {
                tracing::error!("Scheduled task {} ({:?}) failed: {}", task.id, task.action, e)
            }
        }

        if let Err(e) = queue.complete(task.id).await {
            tracing::error!("Failed to remove scheduled task {}: {}", task.id, e);
        }
    }

    succeeded
}

pub async fn run_periodically<F, Fut, E>(queue: Arc<TaskQueue>, execute: F)
where
    F: Fn(ScheduledAction) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    const CHECK_EVERY: Duration = Duration::from_secs(60);

    let mut interval = interval(CHECK_EVERY);

    loop {
        interval.tick().await;
        run_due(&queue, Utc::now(), &execute).await;
    }
}
