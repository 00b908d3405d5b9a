use crate::entities::card_entity as cards;
use crate::error::{AppError, AppResult};
use crate::models::CreateCardRequest;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryOrder, Set,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Clone)]
pub struct CardService {
    pool: DatabaseConnection,
    images_dir: PathBuf,
}

impl CardService {
    pub fn new(pool: DatabaseConnection, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            images_dir: images_dir.into(),
        }
    }

    /// 全部卡牌（按 ID 升序）
    pub async fn list_cards(&self) -> AppResult<Vec<cards::Model>> {
        let list = cards::Entity::find()
            .order_by_asc(cards::Column::Id)
            .all(&self.pool)
            .await?;
        Ok(list)
    }

    pub async fn get_card(&self, id: i32) -> AppResult<cards::Model> {
        cards::Entity::find_by_id(id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Card {id} not found")))
    }

    pub async fn create_card(&self, req: CreateCardRequest) -> AppResult<cards::Model> {
        let bytes = BASE64
            .decode(req.image_base64.trim())
            .map_err(|e| AppError::ValidationError(format!("Invalid image encoding: {e}")))?;
        self.create_card_with_image(&req.description, &bytes).await
    }

    /// 保存图片文件并写入卡牌记录；写库失败时删除刚保存的图片
    pub async fn create_card_with_image(&self, description: &str, image: &[u8]) -> AppResult<cards::Model> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::ValidationError(
                "Card description must not be empty".into(),
            ));
        }
        if image.is_empty() {
            return Err(AppError::ValidationError("Card image is empty".into()));
        }

        tokio::fs::create_dir_all(&self.images_dir).await?;
        let path = self.images_dir.join(format!("{}.jpg", Uuid::new_v4()));
        tokio::fs::write(&path, image).await?;
        let image_path = path.to_string_lossy().into_owned();

        let now = Utc::now();
        let inserted = cards::ActiveModel {
            description: Set(description.to_string()),
            image: Set(image_path.clone()),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(card) => {
                log::info!("Card {} created ({image_path})", card.id);
                Ok(card)
            }
            Err(e) => {
                remove_image(&image_path).await;
                Err(e.into())
            }
        }
    }

    pub async fn update_description(&self, id: i32, description: &str) -> AppResult<cards::Model> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::ValidationError(
                "Card description must not be empty".into(),
            ));
        }
        let mut am = self.get_card(id).await?.into_active_model();
        am.description = Set(description.to_string());
        am.updated_at = Set(Some(Utc::now()));
        Ok(am.update(&self.pool).await?)
    }

    /// 删除卡牌及其图片文件；图片删除失败只记录日志
    pub async fn delete_card(&self, id: i32) -> AppResult<()> {
        let card = self.get_card(id).await?;
        cards::Entity::delete_by_id(id).exec(&self.pool).await?;
        remove_image(&card.image).await;
        log::info!("Card {id} deleted");
        Ok(())
    }
}

async fn remove_image(path: &str) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove card image {path}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use std::path::Path;

    fn temp_images_dir() -> PathBuf {
        std::env::temp_dir().join(format!("daily-card-bot-images-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_create_list_update_delete() {
        let service = CardService::new(test_pool().await, temp_images_dir());

        let card = service
            .create_card(CreateCardRequest {
                description: "  Шут  ".to_string(),
                image_base64: BASE64.encode(b"fake-jpeg"),
            })
            .await
            .unwrap();
        assert_eq!(card.description, "Шут");
        assert_eq!(std::fs::read(&card.image).unwrap(), b"fake-jpeg");
        assert_eq!(service.list_cards().await.unwrap().len(), 1);

        let updated = service.update_description(card.id, "Маг").await.unwrap();
        assert_eq!(updated.description, "Маг");
        assert_eq!(service.list_cards().await.unwrap()[0].description, "Маг");

        service.delete_card(card.id).await.unwrap();
        assert!(!Path::new(&card.image).exists());
        assert!(matches!(
            service.get_card(card.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let service = CardService::new(test_pool().await, temp_images_dir());

        let bad_base64 = service
            .create_card(CreateCardRequest {
                description: "Шут".to_string(),
                image_base64: "not base64 !!".to_string(),
            })
            .await;
        assert!(matches!(bad_base64, Err(AppError::ValidationError(_))));

        let empty_description = service.create_card_with_image("   ", b"img").await;
        assert!(matches!(empty_description, Err(AppError::ValidationError(_))));

        assert!(matches!(
            service.update_description(99, "x").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(service.delete_card(99).await, Err(AppError::NotFound(_))));
    }
}
