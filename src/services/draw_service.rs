use crate::entities::{card_entity as cards, user_entity as users};
use crate::error::AppResult;
use crate::models::*;
use crate::services::{CardService, UserService};
use crate::utils::{Clock, Selection, UserLocks, can_draw_today, effective_limit, select_card};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// 抽卡流程：加锁 -> 读历史 -> 每日上限 -> 选卡 -> 条件写回
///
/// 交互式抽卡与每日推送共用同一个实例（同一组用户锁）。
#[derive(Clone)]
pub struct DrawService {
    users: UserService,
    cards: CardService,
    clock: Arc<dyn Clock>,
    locks: UserLocks,
    cooldown: Duration,
    zone: Tz,
    rng: Arc<Mutex<StdRng>>,
}

impl DrawService {
    pub fn new(
        users: UserService,
        cards: CardService,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
        zone: Tz,
    ) -> Self {
        Self {
            users,
            cards,
            clock,
            locks: UserLocks::new(),
            cooldown,
            zone,
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// 固定随机种子（测试用）
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn cards(&self) -> &CardService {
        &self.cards
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// 用户点击 "Карта дня"
    pub async fn draw(&self, tg_id: i64, settings: &BotSettings) -> AppResult<DrawOutcome> {
        let _guard = self.locks.acquire(tg_id).await;

        let user = self.users.ensure_user(tg_id).await?;
        let now = self.clock.now();
        let history = read_history(&user);

        if !can_draw_today(&history, now, settings.cards_limit, self.zone) {
            let limit = effective_limit(settings.cards_limit);
            log::info!("Daily limit {limit} reached for tg_id={tg_id}");
            return Ok(DrawOutcome::LimitReached { limit });
        }

        let catalog = self.cards.list_cards().await?;
        self.issue_locked(&user, history, &catalog, now).await
    }

    /// 选卡并写回历史，不检查每日上限
    ///
    /// 调用方必须已持有 `user.tg_id` 的锁，且 `user` 是加锁后读取的。
    pub async fn issue_locked(
        &self,
        user: &users::Model,
        mut history: CardHistory,
        catalog: &[cards::Model],
        now: DateTime<Utc>,
    ) -> AppResult<DrawOutcome> {
        let picked = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            match select_card(catalog, &history, now, self.cooldown, &mut *rng)? {
                Selection::Picked(card) => card.clone(),
                Selection::Exhausted => {
                    log::info!("All cards cooling for tg_id={}", user.tg_id);
                    return Ok(DrawOutcome::Exhausted);
                }
            }
        };

        let known: HashSet<i32> = catalog.iter().map(|c| c.id).collect();
        let today = now.with_timezone(&self.zone).date_naive();
        let pruned = history.prune_missing(&known, today, self.zone);
        if pruned > 0 {
            log::debug!("Pruned {pruned} stale history entries for tg_id={}", user.tg_id);
        }
        history.record(picked.id, now);

        self.users.record_issuance(user, &history, now).await?;
        log::info!("Issued card {} to tg_id={}", picked.id, user.tg_id);
        Ok(DrawOutcome::Issued(picked))
    }
}

/// 解析存储的历史，丢弃的条目写日志
pub fn read_history(user: &users::Model) -> CardHistory {
    let (history, rejected) = CardHistory::from_json(&user.history);
    for entry in rejected {
        log::warn!(
            "Dropped history entry {:?} of tg_id={}: {}",
            entry.key,
            user.tg_id,
            entry.reason
        );
    }
    history
}
