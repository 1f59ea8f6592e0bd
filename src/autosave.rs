use crate::db::{Database, StoreResult};
use crate::format::format_timestamp;
use chrono::{DateTime, Utc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

/// Records a save checkpoint on a fixed interval. The first save happens
/// as soon as the task starts.
pub struct AutosaveTask {
    db: Database,
    interval: Duration,
}

impl AutosaveTask {
    pub fn new(db: Database, interval: Duration) -> Self {
        Self { db, interval }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.save_once(Utc::now()).await {
                error!("Autosave failed: {}", e);
            }
        }
    }

    async fn save_once(&self, now: DateTime<Utc>) -> StoreResult<()> {
        self.db.record_last_save(now).await?;
        info!("Autosave recorded at {}", format_timestamp(&now, true));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_once_records_checkpoint() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 16);
        let task = AutosaveTask::new(db.clone(), Duration::from_secs(60));

        assert_eq!(db.get_last_save().await.unwrap(), None);

        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        task.save_once(at).await.unwrap();
        assert_eq!(db.get_last_save().await.unwrap(), Some(at));

        let later = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
        task.save_once(later).await.unwrap();
        assert_eq!(db.get_last_save().await.unwrap(), Some(later));
    }

    #[tokio::test]
    async fn test_run_saves_on_first_tick() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 16);
        db.ensure_ready().await.unwrap();

        let handle = tokio::spawn(AutosaveTask::new(db.clone(), Duration::from_secs(3600)).run());
        let mut saved = None;
        for _ in 0..200 {
            tokio::task::yield_now().await;
            saved = db.get_last_save().await.unwrap();
            if saved.is_some() {
                break;
            }
        }
        handle.abort();
        assert!(saved.is_some());
    }
}
