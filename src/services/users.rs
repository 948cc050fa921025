use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{expedition, movement, user, UserRole},
};

/// Editable profile fields. Identity (email) comes from the identity provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub role: Option<UserRole>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 100))]
    pub position: Option<String>,
}

/// Service for the local user mirror
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    /// Makes sure the identity `email` has a local row.
    ///
    /// Empty emails are ignored. A missing row is only created when `name` is
    /// non-empty; the existing or created row is returned.
    #[instrument(skip(self))]
    pub async fn ensure_user(
        &self,
        email: &str,
        name: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        let email = email.trim();
        if email.is_empty() {
            return Ok(None);
        }

        if let Some(existing) = self.find_by_email(email).await? {
            return Ok(Some(existing));
        }

        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            name: Set(name.to_string()),
            role: Set(UserRole::default()),
            phone: Set(None),
            position: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error);

        match created {
            Ok(model) => {
                info!(self.logger, "user mirrored"; "user_id" => %model.id, "email" => &model.email);
                Ok(Some(model))
            }
            // Another request mirrored the same identity first.
            Err(err) if err.is_unique_violation() => self.find_by_email(email).await,
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, ServiceError> {
        let db = &*self.db_pool;
        user::Entity::find()
            .filter(user::Column::Email.eq(email.trim()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Like [`find_by_email`](Self::find_by_email) but missing users are an error.
    pub async fn require_by_email(&self, email: &str) -> Result<user::Model, ServiceError> {
        self.find_by_email(email)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", email.trim())))
    }

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> Result<user::Model, ServiceError> {
        let db = &*self.db_pool;
        user::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        let db = &*self.db_pool;
        user::Entity::find()
            .order_by_asc(user::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn update_user(
        &self,
        id: Uuid,
        input: UpdateUserInput,
    ) -> Result<user::Model, ServiceError> {
        input.validate()?;
        let current = self.get_user(id).await?;

        let mut active: user::ActiveModel = current.into();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::ValidationError("name cannot be blank".into()));
            }
            active.name = Set(name);
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(non_blank(phone));
        }
        if let Some(position) = input.position {
            active.position = Set(non_blank(position));
        }
        active.updated_at = Set(Utc::now());

        let db = &*self.db_pool;
        active.update(db).await.map_err(ServiceError::db_error)
    }

    /// Deletes a user that no longer owns shipments or audit entries.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let target = self.get_user(id).await?;

        let shipments = expedition::Entity::find()
            .filter(expedition::Column::UserId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        let movements = movement::Entity::find()
            .filter(movement::Column::UserId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        if shipments > 0 || movements > 0 {
            return Err(ServiceError::Conflict(format!(
                "User {} still owns {} expedition(s) and {} movement(s)",
                target.email, shipments, movements
            )));
        }

        user::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;

        info!(self.logger, "user deleted"; "user_id" => %id, "email" => &target.email);
        Ok(())
    }
}

/// Empty strings clear optional text fields.
pub(crate) fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
