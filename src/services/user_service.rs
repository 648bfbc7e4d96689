use crate::entities::user_entity as users;
use crate::error::{AppError, AppResult};
use crate::models::*;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

#[derive(Clone)]
pub struct UserService {
    pool: Arc<DatabaseConnection>,
}

impl UserService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    /// 获取用户个人资料
    pub async fn get_user_profile(&self, user_id: i64) -> AppResult<UserResponse> {
        let user = self.find_user(user_id).await?;
        Ok(UserResponse::from(user))
    }

    /// 管理端接口要求 staff 账号
    pub async fn ensure_staff(&self, user_id: i64) -> AppResult<()> {
        let user = self.find_user(user_id).await?;
        if !user.is_staff {
            return Err(AppError::PermissionDenied);
        }
        Ok(())
    }

    async fn find_user(&self, user_id: i64) -> AppResult<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn user(is_staff: bool) -> users::Model {
        users::Model {
            id: 1,
            username: "anna".into(),
            phone_number: Some("+36201234567".into()),
            is_phone_verified: true,
            password_hash: String::new(),
            is_staff,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_ensure_staff() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(false)], vec![user(true)]])
            .into_connection();
        let service = UserService::new(db);

        let err = service.ensure_staff(1).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
        service.ensure_staff(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_profile_of_missing_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();
        let service = UserService::new(db);

        let err = service.get_user_profile(9).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
