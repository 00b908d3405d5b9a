use crate::entities::{card_entity as cards, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::CardDelivery;
use crate::models::*;
use crate::services::{DrawService, read_history};
use crate::utils::texts;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// 单个订阅用户的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepStep {
    Delivered,
    Exhausted,
    /// 加锁后发现已退订
    Skipped,
}

/// 每日卡牌推送
#[derive(Clone)]
pub struct SweepService {
    draws: DrawService,
    delivery: Arc<dyn CardDelivery>,
}

impl SweepService {
    pub fn new(draws: DrawService, delivery: Arc<dyn CardDelivery>) -> Self {
        Self { draws, delivery }
    }

    /// 给所有订阅用户各发一张卡（不受每日上限限制）
    ///
    /// 单个用户的失败（写库、发送、panic）只记日志，继续处理其余用户。
    pub async fn run_sweep(&self) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        let catalog = self.draws.cards().list_cards().await?;
        if catalog.is_empty() {
            log::warn!("Daily sweep skipped: card catalog is empty");
            report.no_cards = true;
            return Ok(report);
        }

        let subscribers = self.draws.users().list_subscribers().await?;
        report.subscribers = subscribers.len() as u32;
        log::info!(
            "Daily sweep started: {} subscribers, {} cards",
            subscribers.len(),
            catalog.len()
        );

        for subscriber in subscribers {
            let tg_id = subscriber.tg_id;
            let step = AssertUnwindSafe(self.sweep_user(tg_id, &catalog))
                .catch_unwind()
                .await;
            match step {
                Ok(Ok(SweepStep::Delivered)) => report.delivered += 1,
                Ok(Ok(SweepStep::Exhausted)) => report.exhausted += 1,
                Ok(Ok(SweepStep::Skipped)) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    log::error!("Daily sweep failed for tg_id={tg_id}: {e}");
                }
                Err(panic) => {
                    report.failed += 1;
                    log::error!(
                        "Daily sweep panicked for tg_id={tg_id}: {}",
                        panic_message(panic.as_ref())
                    );
                }
            }
        }

        log::info!(
            "Daily sweep finished: delivered={} exhausted={} failed={}",
            report.delivered,
            report.exhausted,
            report.failed
        );
        Ok(report)
    }

    async fn sweep_user(
        &self,
        tg_id: i64,
        catalog: &[cards::Model],
    ) -> AppResult<SweepStep> {
        let outcome = {
            let _guard = self.draws.locks().acquire(tg_id).await;
            let user: users::Model = self
                .draws
                .users()
                .find_by_tg_id(tg_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User tg_id={tg_id} not found")))?;
            if !user.subscription {
                return Ok(SweepStep::Skipped);
            }
            let history = read_history(&user);
            self.draws
                .issue_locked(&user, history, catalog, self.draws.now())
                .await?
        };

        // 历史已写入；发送失败不回滚
        match outcome {
            DrawOutcome::Issued(card) => {
                self.delivery
                    .send_card(tg_id, &card.image, &texts::daily_card_caption(&card.description))
                    .await?;
                Ok(SweepStep::Delivered)
            }
            DrawOutcome::Exhausted => {
                self.delivery.send_text(tg_id, texts::EXHAUSTED, None).await?;
                Ok(SweepStep::Exhausted)
            }
            DrawOutcome::LimitReached { .. } => Ok(SweepStep::Skipped),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
