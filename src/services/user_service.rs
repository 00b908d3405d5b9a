use crate::entities::{card_entity as cards, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::issued_today;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, UpdateResult,
};

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
}

impl UserService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn find_by_tg_id(&self, tg_id: i64) -> AppResult<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::TgId.eq(tg_id))
            .one(&self.pool)
            .await?)
    }

    /// 按 Telegram ID 取用户，不存在则创建（未订阅、空历史）
    pub async fn ensure_user(&self, tg_id: i64) -> AppResult<users::Model> {
        if let Some(user) = self.find_by_tg_id(tg_id).await? {
            return Ok(user);
        }

        let now = Utc::now();
        let inserted = users::ActiveModel {
            tg_id: Set(tg_id),
            subscription: Set(false),
            requests: Set(0),
            last_request: Set(None),
            history: Set(CardHistory::new().to_json()),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(user) => {
                log::info!("Registered user tg_id={tg_id}");
                Ok(user)
            }
            // 并发首次访问：唯一索引冲突后重新读取
            Err(e) => match self.find_by_tg_id(tg_id).await? {
                Some(user) => Ok(user),
                None => Err(e.into()),
            },
        }
    }

    pub async fn set_subscription(&self, tg_id: i64, subscribed: bool) -> AppResult<users::Model> {
        let user = self.ensure_user(tg_id).await?;
        if user.subscription == subscribed {
            return Ok(user);
        }
        let mut am: users::ActiveModel = user.into();
        am.subscription = Set(subscribed);
        am.updated_at = Set(Some(Utc::now()));
        let user = am.update(&self.pool).await?;
        log::info!("User tg_id={tg_id} subscription={subscribed}");
        Ok(user)
    }

    pub async fn list_subscribers(&self) -> AppResult<Vec<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Subscription.eq(true))
            .order_by_asc(users::Column::Id)
            .all(&self.pool)
            .await?)
    }

    /// 写入新历史并把 requests 加一
    ///
    /// 条件更新 `where requests = 读取时的值`：期间有其他写入则返回 Conflict，
    /// 不会覆盖别人的历史。
    pub async fn record_issuance(
        &self,
        user: &users::Model,
        history: &CardHistory,
        now: DateTime<Utc>,
    ) -> AppResult<users::Model> {
        let result: UpdateResult = users::Entity::update_many()
            .col_expr(users::Column::History, Expr::value(history.to_json()))
            .col_expr(
                users::Column::Requests,
                Expr::col(users::Column::Requests).add(1),
            )
            .col_expr(users::Column::LastRequest, Expr::value(now))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(user.id))
            .filter(users::Column::Requests.eq(user.requests))
            .exec(&self.pool)
            .await?;

        if result.rows_affected != 1 {
            return Err(AppError::Conflict(format!(
                "History of user tg_id={} changed concurrently",
                user.tg_id
            )));
        }

        users::Entity::find_by_id(user.id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))
    }

    pub async fn statistics(&self, now: DateTime<Utc>, zone: Tz) -> AppResult<StatisticsResponse> {
        let total_users = users::Entity::find().count(&self.pool).await?;
        let subscribers = users::Entity::find()
            .filter(users::Column::Subscription.eq(true))
            .count(&self.pool)
            .await?;
        let total_cards = cards::Entity::find().count(&self.pool).await?;

        let mut cards_issued_today = 0u64;
        let mut pages = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .paginate(&self.pool, 500);
        while let Some(batch) = pages.fetch_and_next().await? {
            for user in batch {
                let (history, _) = CardHistory::from_json(&user.history);
                cards_issued_today += issued_today(&history, now, zone) as u64;
            }
        }

        Ok(StatisticsResponse {
            total_users,
            subscribers,
            total_cards,
            cards_issued_today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Europe::Kyiv;

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let service = UserService::new(test_pool().await);

        let first = service.ensure_user(42).await.unwrap();
        let second = service.ensure_user(42).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.subscription);
        assert_eq!(first.requests, 0);
        assert!(CardHistory::from_json(&first.history).0.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_toggle() {
        let service = UserService::new(test_pool().await);

        service.set_subscription(1, true).await.unwrap();
        service.set_subscription(2, true).await.unwrap();
        service.set_subscription(2, false).await.unwrap();
        service.ensure_user(3).await.unwrap();

        let subscribers: Vec<i64> = service
            .list_subscribers()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.tg_id)
            .collect();
        assert_eq!(subscribers, vec![1]);
    }

    #[tokio::test]
    async fn test_record_issuance_rejects_stale_read() {
        let service = UserService::new(test_pool().await);
        let now = Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap();
        let stale = service.ensure_user(7).await.unwrap();

        let mut history = CardHistory::new();
        history.record(1, now);
        let updated = service.record_issuance(&stale, &history, now).await.unwrap();
        assert_eq!(updated.requests, 1);
        assert_eq!(updated.last_request, Some(now));
        assert_eq!(CardHistory::from_json(&updated.history).0, history);

        // 第二次基于旧快照写入：应当冲突且不覆盖
        let mut other = CardHistory::new();
        other.record(2, now);
        let conflict = service.record_issuance(&stale, &other, now).await;
        assert!(matches!(conflict, Err(AppError::Conflict(_))));

        let current = service.find_by_tg_id(7).await.unwrap().unwrap();
        assert_eq!(CardHistory::from_json(&current.history).0, history);
    }

    #[tokio::test]
    async fn test_statistics_counts_today_in_reference_zone() {
        let service = UserService::new(test_pool().await);
        let now = Utc.with_ymd_and_hms(2025, 9, 10, 12, 0, 0).unwrap();

        let user = service.set_subscription(1, true).await.unwrap();
        let mut history = CardHistory::new();
        history.record(1, now - Duration::hours(1));
        history.record(2, now - Duration::days(2));
        service.record_issuance(&user, &history, now).await.unwrap();
        service.ensure_user(2).await.unwrap();

        let stats = service.statistics(now, Kyiv).await.unwrap();
        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.subscribers, 1);
        assert_eq!(stats.total_cards, 0);
        assert_eq!(stats.cards_issued_today, 1);
    }
}
