use crate::error::{AppError, AppResult};
use crate::models::{BotSettings, UpdateLinksRequest, UpdateTextsRequest};
use regex::Regex;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("valid link regex"));

/// settings.json 的读写
///
/// 内存中保留当前设置，调用方通过 `snapshot()` 获得一份不可变副本；
/// 修改时先写临时文件再 rename，写成功后才替换内存中的值。
#[derive(Clone)]
pub struct SettingsService {
    path: PathBuf,
    current: Arc<RwLock<BotSettings>>,
}

impl SettingsService {
    pub async fn load(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(fields)) => {
                    let (settings, rejected) = merge_over_defaults(fields);
                    if !rejected.is_empty() {
                        log::warn!(
                            "Settings file {} has invalid values for {rejected:?}; using defaults for them",
                            path.display()
                        );
                        backup(&path).await;
                    }
                    settings
                }
                parsed => {
                    let reason = match parsed {
                        Err(e) => e.to_string(),
                        Ok(_) => "not a JSON object".to_string(),
                    };
                    log::warn!(
                        "Settings file {} is unreadable ({reason}); using defaults",
                        path.display()
                    );
                    backup(&path).await;
                    BotSettings::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let settings = BotSettings::default();
                write_atomically(&path, &settings).await?;
                log::info!("Created default settings file {}", path.display());
                settings
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            current: Arc::new(RwLock::new(settings)),
        })
    }

    pub async fn snapshot(&self) -> BotSettings {
        self.current.read().await.clone()
    }

    /// Applies `change` to a copy of the settings, persists it, then publishes it.
    pub async fn update<F>(&self, change: F) -> AppResult<BotSettings>
    where
        F: FnOnce(&mut BotSettings) -> AppResult<()>,
    {
        let mut guard = self.current.write().await;
        let mut next = guard.clone();
        change(&mut next)?;
        write_atomically(&self.path, &next).await?;
        *guard = next.clone();
        Ok(next)
    }

    pub async fn set_links(&self, req: UpdateLinksRequest) -> AppResult<BotSettings> {
        for link in [&req.buy_cards_link, &req.full_card_link].into_iter().flatten() {
            validate_link(link)?;
        }
        self.update(|s| {
            if let Some(link) = req.buy_cards_link {
                s.buy_cards_link = link.trim().to_string();
            }
            if let Some(link) = req.full_card_link {
                s.full_card_link = link.trim().to_string();
            }
            Ok(())
        })
        .await
    }

    pub async fn set_texts(&self, req: UpdateTextsRequest) -> AppResult<BotSettings> {
        self.update(|s| {
            if let Some(text) = req.help_text {
                s.help_text = text;
            }
            if let Some(text) = req.start_text {
                s.start_text = text;
            }
            Ok(())
        })
        .await
    }

    pub async fn set_cards_limit(&self, limit: u32) -> AppResult<BotSettings> {
        if limit == 0 {
            return Err(AppError::ValidationError(
                "cards_limit must be a positive integer".into(),
            ));
        }
        self.update(|s| {
            s.cards_limit = Some(limit);
            Ok(())
        })
        .await
    }

    pub async fn set_notification_time(&self, hour: u32) -> AppResult<BotSettings> {
        if hour > 23 {
            return Err(AppError::ValidationError(format!(
                "notification hour must be 0-23, got {hour}"
            )));
        }
        self.update(|s| {
            s.notification_time = hour;
            Ok(())
        })
        .await
    }

    /// 已选中则移除，未选中则加入
    pub async fn toggle_notification_day(&self, day: &str) -> AppResult<BotSettings> {
        let day = day.trim();
        match day.parse::<u32>() {
            Ok(d) if d <= 6 => {}
            _ => {
                return Err(AppError::ValidationError(format!(
                    "weekday must be 0-6, got {day:?}"
                )));
            }
        }
        let day = day.to_string();
        self.update(move |s| {
            if let Some(pos) = s.notification_days.iter().position(|d| *d == day) {
                s.notification_days.remove(pos);
            } else {
                s.notification_days.push(day);
            }
            Ok(())
        })
        .await
    }

    pub async fn set_scheduler_status(&self, enabled: bool) -> AppResult<BotSettings> {
        self.update(|s| {
            s.scheduler_status = enabled;
            Ok(())
        })
        .await
    }
}

pub fn validate_link(link: &str) -> AppResult<()> {
    if LINK_RE.is_match(link.trim()) {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "link must start with http:// or https://, got {link:?}"
        )))
    }
}

/// 逐个字段合并到默认值上；类型不对的字段保留默认值，返回被拒绝的键
fn merge_over_defaults(fields: serde_json::Map<String, Value>) -> (BotSettings, Vec<String>) {
    let defaults = BotSettings::default();
    let mut merged = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        _ => return (defaults, fields.into_iter().map(|(key, _)| key).collect()),
    };

    let mut rejected = Vec::new();
    for (key, value) in fields {
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value);
        if serde_json::from_value::<BotSettings>(Value::Object(candidate.clone())).is_ok() {
            merged = candidate;
        } else {
            rejected.push(key);
        }
    }

    let settings = serde_json::from_value(Value::Object(merged)).unwrap_or(defaults);
    (settings, rejected)
}

/// 下一次写入会覆盖原文件，先留一份副本
async fn backup(path: &Path) {
    let target = path.with_extension("json.bak");
    match tokio::fs::copy(path, &target).await {
        Ok(_) => log::warn!("Saved a copy of {} to {}", path.display(), target.display()),
        Err(e) => log::error!("Failed to back up {}: {e}", path.display()),
    }
}

async fn write_atomically(path: &Path, settings: &BotSettings) -> AppResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(settings)?;
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
