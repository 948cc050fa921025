use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::users::non_blank;
use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{materiel, materiel_type},
};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct MaterielTypeInput {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub unit: Option<String>,
}

/// Catalog of materiel kinds that line items may reference
#[derive(Clone)]
pub struct MaterielTypeService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl MaterielTypeService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<materiel_type::Model>, ServiceError> {
        materiel_type::Entity::find()
            .order_by_asc(materiel_type::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<materiel_type::Model, ServiceError> {
        materiel_type::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Materiel type {} not found", id)))
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        input: MaterielTypeInput,
    ) -> Result<materiel_type::Model, ServiceError> {
        input.validate()?;
        let (code, name) = code_and_name(&input)?;

        let now = Utc::now();
        let created = materiel_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(name),
            category: Set(input.category.and_then(non_blank)),
            description: Set(input.description.and_then(non_blank)),
            unit: Set(input.unit.and_then(non_blank)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| duplicate_code(e, &code))?;

        info!(self.logger, "materiel type created"; "type_id" => %created.id, "code" => &created.code);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: MaterielTypeInput,
    ) -> Result<materiel_type::Model, ServiceError> {
        input.validate()?;
        let (code, name) = code_and_name(&input)?;

        let mut active: materiel_type::ActiveModel = self.get(id).await?.into();
        active.code = Set(code.clone());
        active.name = Set(name);
        active.category = Set(input.category.and_then(non_blank));
        active.description = Set(input.description.and_then(non_blank));
        active.unit = Set(input.unit.and_then(non_blank));
        active.updated_at = Set(Utc::now());

        active
            .update(&*self.db_pool)
            .await
            .map_err(|e| duplicate_code(e, &code))
    }

    /// Deletes a catalog entry; line items that referenced it keep their own text.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let target = self.get(id).await?;
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        let unlinked = materiel::Entity::update_many()
            .col_expr(
                materiel::Column::MaterielTypeId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(materiel::Column::MaterielTypeId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        materiel_type::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(self.logger, "materiel type deleted";
            "type_id" => %id, "code" => &target.code, "unlinked" => unlinked.rows_affected);
        Ok(())
    }
}

fn code_and_name(input: &MaterielTypeInput) -> Result<(String, String), ServiceError> {
    let code = input.code.trim();
    let name = input.name.trim();
    if code.is_empty() || name.is_empty() {
        return Err(ServiceError::ValidationError(
            "code and name are required".to_string(),
        ));
    }
    Ok((code.to_string(), name.to_string()))
}

fn duplicate_code(err: sea_orm::DbErr, code: &str) -> ServiceError {
    let err = ServiceError::db_error(err);
    if err.is_unique_violation() {
        ServiceError::Conflict(format!("Materiel type code {} already exists", code))
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::logging::{setup_logger, LoggerConfig};
    use crate::models::{expedition, user, ExpeditionStatus, MaterielStatus, UserRole};
    use assert_matches::assert_matches;

    fn input(code: &str, name: &str) -> MaterielTypeInput {
        MaterielTypeInput {
            code: code.into(),
            name: name.into(),
            category: Some("Scrutin".into()),
            description: None,
            unit: Some("pièce".into()),
        }
    }

    #[tokio::test]
    async fn crud_and_unlink_on_delete() {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();
        let db = Arc::new(db);
        let catalog = MaterielTypeService::new(db.clone(), setup_logger(LoggerConfig::silent()));

        let urne = catalog.create(input("URNE", "Urne")).await.unwrap();
        assert_matches!(
            catalog.create(input("URNE", "Urne bis")).await,
            Err(ServiceError::Conflict(_))
        );
        catalog.create(input("ISOL", "Isoloir")).await.unwrap();
        let names: Vec<String> = catalog
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Isoloir".to_string(), "Urne".to_string()]);

        let now = Utc::now();
        let owner = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set("agent@ceni.mg".into()),
            name: Set("Agent".into()),
            role: Set(UserRole::Agent),
            phone: Set(None),
            position: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*db)
        .await
        .unwrap();
        let shipment = expedition::ActiveModel {
            id: Set(Uuid::new_v4()),
            number: Set("EXP-2024-000001".into()),
            designation: Set("Urnes".into()),
            origin: Set(String::new()),
            departure_date: Set(None),
            sender_name: Set(None),
            sender_address: Set(None),
            destination: Set(String::new()),
            arrival_date: Set(None),
            receiver_name: Set(None),
            receiver_address: Set(None),
            status: Set(ExpeditionStatus::Draft),
            notes: Set(None),
            region_id: Set(None),
            district_id: Set(None),
            commune_id: Set(None),
            voting_center_id: Set(None),
            user_id: Set(owner.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*db)
        .await
        .unwrap();
        let line = materiel::ActiveModel {
            id: Set(Uuid::new_v4()),
            expedition_id: Set(shipment.id),
            materiel_type_id: Set(Some(urne.id)),
            designation: Set("Urne transparente".into()),
            category: Set(None),
            description: Set(None),
            quantity: Set(20),
            quantity_received: Set(None),
            quantity_used: Set(None),
            status: Set(MaterielStatus::Good),
            user_id: Set(Some(owner.id)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*db)
        .await
        .unwrap();

        catalog.delete(urne.id).await.unwrap();

        let line = materiel::Entity::find_by_id(line.id)
            .one(&*db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.materiel_type_id, None);
        assert_eq!(line.designation, "Urne transparente");
        assert_matches!(catalog.get(urne.id).await, Err(ServiceError::NotFound(_)));
    }
}
