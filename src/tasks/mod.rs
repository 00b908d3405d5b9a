//! Background scheduled tasks for the application.
//!
//! The daily card sweep is the only recurring job. It is owned by a
//! `SweepScheduler` created once at startup; admin endpoints enable or
//! disable it at runtime and shutdown tears it down.

use crate::error::{AppError, AppResult};
use crate::models::BotSettings;
use crate::services::SweepService;
use crate::utils::{Clock, NotificationSchedule};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct ScheduledJob {
    schedule: NotificationSchedule,
    handle: JoinHandle<()>,
}

/// 每日推送任务的持有者：同一时间最多一个任务
#[derive(Clone)]
pub struct SweepScheduler {
    sweep: SweepService,
    clock: Arc<dyn Clock>,
    zone: Tz,
    job: Arc<Mutex<Option<ScheduledJob>>>,
}

impl SweepScheduler {
    pub fn new(sweep: SweepService, clock: Arc<dyn Clock>, zone: Tz) -> Self {
        Self {
            sweep,
            clock,
            zone,
            job: Arc::new(Mutex::new(None)),
        }
    }

    pub fn sweep(&self) -> &SweepService {
        &self.sweep
    }

    /// 注册新任务；已有任务会先被取消
    pub async fn register_job(&self, schedule: NotificationSchedule) -> AppResult<()> {
        if schedule.is_empty() {
            return Err(AppError::ValidationError(
                "No notification days selected".into(),
            ));
        }

        let mut job = self.job.lock().await;
        if let Some(old) = job.take() {
            old.handle.abort();
        }

        let sweep = self.sweep.clone();
        let clock = self.clock.clone();
        let zone = self.zone;
        let task_schedule = schedule.clone();
        let handle = tokio::spawn(async move {
            let mut last_fire: Option<DateTime<Utc>> = None;
            loop {
                let now = clock.now();
                let from = last_fire.map_or(now, |at| at.max(now));
                let Some(next) = task_schedule.next_run_after(from, zone) else {
                    log::warn!("Daily sweep has no upcoming run; stopping");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                log::debug!("Next daily sweep at {next} (in {}s)", wait.as_secs());
                tokio::time::sleep(wait).await;
                last_fire = Some(next);

                // 推送在独立任务中执行：取消任务只停止后续触发，不中断进行中的推送
                let run = tokio::spawn({
                    let sweep = sweep.clone();
                    async move { sweep.run_sweep().await }
                });
                match run.await {
                    Ok(Ok(report)) => log::info!("Daily sweep report: {report:?}"),
                    Ok(Err(e)) => log::error!("Daily sweep failed: {e:?}"),
                    Err(e) => log::error!("Daily sweep task failed: {e}"),
                }
            }
        });

        log::info!("Daily sweep scheduled: {}", schedule.cron_expression());
        *job = Some(ScheduledJob { schedule, handle });
        Ok(())
    }

    pub async fn cancel_all(&self) {
        if let Some(job) = self.job.lock().await.take() {
            job.handle.abort();
            log::info!("Daily sweep job cancelled ({})", job.schedule.cron_expression());
        }
    }

    pub async fn is_running(&self) -> bool {
        self.job
            .lock()
            .await
            .as_ref()
            .is_some_and(|job| !job.handle.is_finished())
    }

    /// 当前任务的 cron 表达式（未运行时为 None）
    pub async fn current_cron(&self) -> Option<String> {
        self.job
            .lock()
            .await
            .as_ref()
            .map(|job| job.schedule.cron_expression())
    }

    /// Stopped -> Running；已在运行时先拆除旧任务
    pub async fn enable(&self, settings: &BotSettings) -> AppResult<NotificationSchedule> {
        let schedule = NotificationSchedule::from_settings(settings)?;
        self.cancel_all().await;
        self.register_job(schedule.clone()).await?;
        Ok(schedule)
    }

    pub async fn disable(&self) {
        self.cancel_all().await;
    }

    /// 运行中才重新注册（修改推送时间或星期之后调用）
    pub async fn reschedule(&self, settings: &BotSettings) -> AppResult<()> {
        if self.is_running().await {
            self.enable(settings).await?;
        }
        Ok(())
    }

    pub async fn teardown(&self) {
        self.cancel_all().await;
        log::info!("Sweep scheduler shut down");
    }
}
