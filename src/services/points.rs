use crate::db::{Database, StoreResult};
use crate::format::parse_timestamp;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

pub const DAILY_REWARD: i64 = 100;
pub const DAILY_CLAIM_KEY_PREFIX: &str = "daily_claim:";
pub const LEADERBOARD_SIZE: usize = 5;

/// Whether a user may claim the daily reward right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyClaim {
    Eligible,
    AlreadyClaimed { next_claim: DateTime<Utc> },
}

impl DailyClaim {
    /// One claim per UTC calendar day.
    pub fn evaluate(last_claim: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match last_claim {
            Some(last) if last.date_naive() == now.date_naive() => Self::AlreadyClaimed {
                next_claim: last + Duration::days(1),
            },
            _ => Self::Eligible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyOutcome {
    Claimed { reward: i64, new_balance: i64 },
    AlreadyClaimed { next_claim: DateTime<Utc> },
}

pub fn daily_claim_key(user_id: u64) -> String {
    format!("{DAILY_CLAIM_KEY_PREFIX}{user_id}")
}

fn parse_claim(user_id: u64, value: &str) -> Option<DateTime<Utc>> {
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
        warn!("Ignoring malformed daily claim '{}' for user {}", value, user_id);
    }
    parsed
}

pub struct PointsService {
    db: Database,
}

impl PointsService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn balance(&self, user_id: u64) -> StoreResult<i64> {
        self.db.get_balance(user_id).await
    }

    /// Last recorded claim. A value that does not parse counts as no claim.
    pub async fn last_claim(&self, user_id: u64) -> StoreResult<Option<DateTime<Utc>>> {
        let raw = self.db.get_metadata_value(&daily_claim_key(user_id)).await?;
        Ok(raw.and_then(|value| parse_claim(user_id, &value)))
    }

    /// Checks the cooldown and credits the reward as one store transaction.
    pub async fn claim_daily(&self, user_id: u64, now: DateTime<Utc>) -> StoreResult<DailyOutcome> {
        let claimed = self
            .db
            .credit_with_stamp(
                user_id,
                DAILY_REWARD,
                &daily_claim_key(user_id),
                &now.to_rfc3339(),
                move |stored| {
                    let last_claim = stored.and_then(|value| parse_claim(user_id, value));
                    match DailyClaim::evaluate(last_claim, now) {
                        DailyClaim::Eligible => Ok(()),
                        DailyClaim::AlreadyClaimed { next_claim } => Err(next_claim),
                    }
                },
            )
            .await?;

        match claimed {
            Ok(new_balance) => Ok(DailyOutcome::Claimed {
                reward: DAILY_REWARD,
                new_balance,
            }),
            Err(next_claim) => {
                debug!("User {} already claimed today, next at {}", user_id, next_claim);
                Ok(DailyOutcome::AlreadyClaimed { next_claim })
            }
        }
    }

    pub async fn leaderboard(&self) -> StoreResult<Vec<(u64, i64)>> {
        self.db.leaderboard(LEADERBOARD_SIZE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_evaluate_cooldown() {
        assert_eq!(DailyClaim::evaluate(None, at(16, 12)), DailyClaim::Eligible);

        // Same calendar day, even hours apart
        assert_eq!(
            DailyClaim::evaluate(Some(at(16, 1)), at(16, 23)),
            DailyClaim::AlreadyClaimed { next_claim: at(17, 1) }
        );

        // Day boundary resets, even minutes apart
        let late = Utc.with_ymd_and_hms(2026, 10, 15, 23, 59, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 10, 16, 0, 1, 0).unwrap();
        assert_eq!(DailyClaim::evaluate(Some(late), early), DailyClaim::Eligible);
    }

    #[test]
    fn test_claim_key() {
        assert_eq!(daily_claim_key(42), "daily_claim:42");
    }

    #[tokio::test]
    async fn test_claim_daily_flow() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 10);
        let service = PointsService::new(db.clone());

        assert_eq!(
            service.claim_daily(2, at(16, 9)).await.unwrap(),
            DailyOutcome::Claimed { reward: DAILY_REWARD, new_balance: 100 }
        );
        assert_eq!(service.balance(2).await.unwrap(), DAILY_REWARD);

        assert_eq!(
            service.claim_daily(2, at(16, 18)).await.unwrap(),
            DailyOutcome::AlreadyClaimed { next_claim: at(17, 9) }
        );
        assert_eq!(service.balance(2).await.unwrap(), DAILY_REWARD);

        assert_eq!(
            service.claim_daily(2, at(17, 8)).await.unwrap(),
            DailyOutcome::Claimed { reward: DAILY_REWARD, new_balance: 200 }
        );
        assert_eq!(service.last_claim(2).await.unwrap(), Some(at(17, 8)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_simultaneous_claims_pay_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 10);
        db.ensure_ready().await.unwrap();
        let now = at(16, 12);

        let mut handles = Vec::new();
        for user in 1..=20u64 {
            for _ in 0..2 {
                let service = PointsService::new(db.clone());
                handles.push(tokio::spawn(async move { service.claim_daily(user, now).await }));
            }
        }

        let mut paid = 0;
        for handle in handles {
            if let DailyOutcome::Claimed { .. } = handle.await.unwrap().unwrap() {
                paid += 1;
            }
        }
        assert_eq!(paid, 20);

        for user in 1..=20u64 {
            assert_eq!(db.get_balance(user).await.unwrap(), DAILY_REWARD);
        }
    }

    #[tokio::test]
    async fn test_malformed_claim_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 10);
        db.set_metadata_value(&daily_claim_key(3), "garbage").await.unwrap();

        let service = PointsService::new(db);
        assert_eq!(service.last_claim(3).await.unwrap(), None);
        assert!(matches!(
            service.claim_daily(3, at(16, 9)).await.unwrap(),
            DailyOutcome::Claimed { .. }
        ));
    }

    #[tokio::test]
    async fn test_leaderboard_top_five() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("bot.db"), "!", 10);
        for (user, amount) in [(1, 10), (2, 20), (3, 30), (4, 40), (5, 50), (6, 60)] {
            db.add_balance(user, amount).await.unwrap();
        }

        let top = PointsService::new(db).leaderboard().await.unwrap();
        assert_eq!(top, vec![(6, 60), (5, 50), (4, 40), (3, 30), (2, 20)]);
    }
}
