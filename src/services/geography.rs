use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::{info, Logger};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::users::non_blank;
use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{commune, district, expedition, region, voting_center},
};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct RegionInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub capital: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct DistrictInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub capital: Option<String>,
    pub region_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CommuneInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub district_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct VotingCenterInput {
    #[validate(length(min = 1, max = 20))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub address: Option<String>,
    #[validate(range(min = 0))]
    pub capacity: Option<i32>,
    pub commune_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct RegionSummary {
    pub region: region::Model,
    pub district_count: u64,
}

#[derive(Debug, Clone)]
pub struct DistrictSummary {
    pub district: district::Model,
    pub region: Option<region::Model>,
    pub commune_count: u64,
}

#[derive(Debug, Clone)]
pub struct CommuneSummary {
    pub commune: commune::Model,
    pub district: Option<district::Model>,
    pub voting_center_count: u64,
}

#[derive(Debug, Clone)]
pub struct VotingCenterSummary {
    pub voting_center: voting_center::Model,
    pub commune: Option<commune::Model>,
}

#[derive(Debug, Clone)]
pub struct CommuneNode {
    pub commune: commune::Model,
    pub voting_centers: Vec<voting_center::Model>,
}

#[derive(Debug, Clone)]
pub struct DistrictNode {
    pub district: district::Model,
    pub communes: Vec<CommuneNode>,
}

/// A region with its whole subtree, every level ordered by name.
#[derive(Debug, Clone)]
pub struct RegionNode {
    pub region: region::Model,
    pub districts: Vec<DistrictNode>,
}

/// Service for the region > district > commune > voting center hierarchy
#[derive(Clone)]
pub struct GeographyService {
    db_pool: Arc<DbPool>,
    logger: Logger,
}

impl GeographyService {
    pub fn new(db_pool: Arc<DbPool>, logger: Logger) -> Self {
        Self { db_pool, logger }
    }

    // Regions

    #[instrument(skip(self))]
    pub async fn list_regions(&self) -> Result<Vec<RegionSummary>, ServiceError> {
        let db = &*self.db_pool;
        let counts = child_counts::<district::Entity, _>(db, district::Column::RegionId).await?;

        Ok(region::Entity::find()
            .order_by_asc(region::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|region| RegionSummary {
                district_count: counts.get(&region.id).copied().unwrap_or(0),
                region,
            })
            .collect())
    }

    /// Every region with its districts, communes and voting centers.
    #[instrument(skip(self))]
    pub async fn region_tree(&self) -> Result<Vec<RegionNode>, ServiceError> {
        let db = &*self.db_pool;

        let regions = region::Entity::find()
            .order_by_asc(region::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let mut districts = group_by_parent(
            district::Entity::find()
                .order_by_asc(district::Column::Name)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?,
            |d| d.region_id,
        );
        let mut communes = group_by_parent(
            commune::Entity::find()
                .order_by_asc(commune::Column::Name)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?,
            |c| c.district_id,
        );
        let mut centers = group_by_parent(
            voting_center::Entity::find()
                .order_by_asc(voting_center::Column::Name)
                .all(db)
                .await
                .map_err(ServiceError::db_error)?,
            |v| v.commune_id,
        );

        Ok(regions
            .into_iter()
            .map(|region| RegionNode {
                districts: districts
                    .remove(&region.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|district| DistrictNode {
                        communes: communes
                            .remove(&district.id)
                            .unwrap_or_default()
                            .into_iter()
                            .map(|commune| CommuneNode {
                                voting_centers: centers.remove(&commune.id).unwrap_or_default(),
                                commune,
                            })
                            .collect(),
                        district,
                    })
                    .collect(),
                region,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_region(&self, input: RegionInput) -> Result<region::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let name = required(&input.name, "name")?;

        let now = Utc::now();
        let created = region::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(name),
            capital: Set(input.capital.and_then(non_blank)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| duplicate_code(e, "Region", &code))?;

        info!(self.logger, "region created"; "region_id" => %created.id, "code" => &created.code);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_region(
        &self,
        id: Uuid,
        input: RegionInput,
    ) -> Result<region::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let db = &*self.db_pool;

        let mut active: region::ActiveModel = find_region(db, id).await?.into();
        active.code = Set(code.clone());
        active.name = Set(required(&input.name, "name")?);
        active.capital = Set(input.capital.and_then(non_blank));
        active.updated_at = Set(Utc::now());

        active
            .update(db)
            .await
            .map_err(|e| duplicate_code(e, "Region", &code))
    }

    /// Refused while the region still has districts.
    #[instrument(skip(self))]
    pub async fn delete_region(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let target = find_region(db, id).await?;

        let children = district::Entity::find()
            .filter(district::Column::RegionId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        refuse_with_children("Region", &target.code, children, "district")?;

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        expedition::Entity::update_many()
            .col_expr(expedition::Column::RegionId, Expr::value(Option::<Uuid>::None))
            .filter(expedition::Column::RegionId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        region::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(self.logger, "region deleted"; "region_id" => %id, "code" => &target.code);
        Ok(())
    }

    // Districts

    /// All districts, or only those of `region_id`.
    #[instrument(skip(self))]
    pub async fn list_districts(
        &self,
        region_id: Option<Uuid>,
    ) -> Result<Vec<DistrictSummary>, ServiceError> {
        let db = &*self.db_pool;
        if let Some(parent) = region_id {
            find_region(db, parent).await?;
        }
        let counts = child_counts::<commune::Entity, _>(db, commune::Column::DistrictId).await?;

        let mut query = district::Entity::find();
        if let Some(parent) = region_id {
            query = query.filter(district::Column::RegionId.eq(parent));
        }

        Ok(query
            .find_also_related(region::Entity)
            .order_by_asc(district::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|(district, region)| DistrictSummary {
                commune_count: counts.get(&district.id).copied().unwrap_or(0),
                district,
                region,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_district(
        &self,
        input: DistrictInput,
    ) -> Result<district::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let name = required(&input.name, "name")?;
        let db = &*self.db_pool;
        parent_exists(find_region(db, input.region_id).await, "Region", input.region_id)?;

        let now = Utc::now();
        let created = district::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(name),
            capital: Set(input.capital.and_then(non_blank)),
            region_id: Set(input.region_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| duplicate_code(e, "District", &code))?;

        info!(self.logger, "district created";
            "district_id" => %created.id, "code" => &created.code, "region_id" => %created.region_id);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_district(
        &self,
        id: Uuid,
        input: DistrictInput,
    ) -> Result<district::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let db = &*self.db_pool;

        let mut active: district::ActiveModel = find_district(db, id).await?.into();
        parent_exists(find_region(db, input.region_id).await, "Region", input.region_id)?;
        active.code = Set(code.clone());
        active.name = Set(required(&input.name, "name")?);
        active.capital = Set(input.capital.and_then(non_blank));
        active.region_id = Set(input.region_id);
        active.updated_at = Set(Utc::now());

        active
            .update(db)
            .await
            .map_err(|e| duplicate_code(e, "District", &code))
    }

    /// Refused while the district still has communes.
    #[instrument(skip(self))]
    pub async fn delete_district(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let target = find_district(db, id).await?;

        let children = commune::Entity::find()
            .filter(commune::Column::DistrictId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        refuse_with_children("District", &target.code, children, "commune")?;

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        expedition::Entity::update_many()
            .col_expr(
                expedition::Column::DistrictId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(expedition::Column::DistrictId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        district::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(self.logger, "district deleted"; "district_id" => %id, "code" => &target.code);
        Ok(())
    }

    // Communes

    #[instrument(skip(self))]
    pub async fn list_communes(
        &self,
        district_id: Option<Uuid>,
    ) -> Result<Vec<CommuneSummary>, ServiceError> {
        let db = &*self.db_pool;
        if let Some(parent) = district_id {
            find_district(db, parent).await?;
        }
        let counts =
            child_counts::<voting_center::Entity, _>(db, voting_center::Column::CommuneId).await?;

        let mut query = commune::Entity::find();
        if let Some(parent) = district_id {
            query = query.filter(commune::Column::DistrictId.eq(parent));
        }

        Ok(query
            .find_also_related(district::Entity)
            .order_by_asc(commune::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|(commune, district)| CommuneSummary {
                voting_center_count: counts.get(&commune.id).copied().unwrap_or(0),
                commune,
                district,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_commune(&self, input: CommuneInput) -> Result<commune::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let name = required(&input.name, "name")?;
        let db = &*self.db_pool;
        parent_exists(
            find_district(db, input.district_id).await,
            "District",
            input.district_id,
        )?;

        let now = Utc::now();
        let created = commune::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(name),
            district_id: Set(input.district_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| duplicate_code(e, "Commune", &code))?;

        info!(self.logger, "commune created"; "commune_id" => %created.id, "code" => &created.code);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_commune(
        &self,
        id: Uuid,
        input: CommuneInput,
    ) -> Result<commune::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let db = &*self.db_pool;

        let mut active: commune::ActiveModel = find_commune(db, id).await?.into();
        parent_exists(
            find_district(db, input.district_id).await,
            "District",
            input.district_id,
        )?;
        active.code = Set(code.clone());
        active.name = Set(required(&input.name, "name")?);
        active.district_id = Set(input.district_id);
        active.updated_at = Set(Utc::now());

        active
            .update(db)
            .await
            .map_err(|e| duplicate_code(e, "Commune", &code))
    }

    /// Refused while the commune still has voting centers.
    #[instrument(skip(self))]
    pub async fn delete_commune(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let target = find_commune(db, id).await?;

        let children = voting_center::Entity::find()
            .filter(voting_center::Column::CommuneId.eq(id))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        refuse_with_children("Commune", &target.code, children, "voting center")?;

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        expedition::Entity::update_many()
            .col_expr(expedition::Column::CommuneId, Expr::value(Option::<Uuid>::None))
            .filter(expedition::Column::CommuneId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        commune::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(self.logger, "commune deleted"; "commune_id" => %id, "code" => &target.code);
        Ok(())
    }

    // Voting centers

    #[instrument(skip(self))]
    pub async fn list_voting_centers(
        &self,
        commune_id: Option<Uuid>,
    ) -> Result<Vec<VotingCenterSummary>, ServiceError> {
        let db = &*self.db_pool;
        if let Some(parent) = commune_id {
            find_commune(db, parent).await?;
        }

        let mut query = voting_center::Entity::find();
        if let Some(parent) = commune_id {
            query = query.filter(voting_center::Column::CommuneId.eq(parent));
        }

        Ok(query
            .find_also_related(commune::Entity)
            .order_by_asc(voting_center::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|(voting_center, commune)| VotingCenterSummary {
                voting_center,
                commune,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_voting_center(
        &self,
        input: VotingCenterInput,
    ) -> Result<voting_center::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let name = required(&input.name, "name")?;
        let db = &*self.db_pool;
        parent_exists(
            find_commune(db, input.commune_id).await,
            "Commune",
            input.commune_id,
        )?;

        let now = Utc::now();
        let created = voting_center::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.clone()),
            name: Set(name),
            address: Set(input.address.and_then(non_blank)),
            capacity: Set(input.capacity),
            commune_id: Set(input.commune_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(|e| duplicate_code(e, "Voting center", &code))?;

        info!(self.logger, "voting center created";
            "voting_center_id" => %created.id, "code" => &created.code);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_voting_center(
        &self,
        id: Uuid,
        input: VotingCenterInput,
    ) -> Result<voting_center::Model, ServiceError> {
        input.validate()?;
        let code = required(&input.code, "code")?;
        let db = &*self.db_pool;

        let mut active: voting_center::ActiveModel = find_voting_center(db, id).await?.into();
        parent_exists(
            find_commune(db, input.commune_id).await,
            "Commune",
            input.commune_id,
        )?;
        active.code = Set(code.clone());
        active.name = Set(required(&input.name, "name")?);
        active.address = Set(input.address.and_then(non_blank));
        active.capacity = Set(input.capacity);
        active.commune_id = Set(input.commune_id);
        active.updated_at = Set(Utc::now());

        active
            .update(db)
            .await
            .map_err(|e| duplicate_code(e, "Voting center", &code))
    }

    #[instrument(skip(self))]
    pub async fn delete_voting_center(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let target = find_voting_center(db, id).await?;

        let txn = db.begin().await.map_err(ServiceError::db_error)?;
        expedition::Entity::update_many()
            .col_expr(
                expedition::Column::VotingCenterId,
                Expr::value(Option::<Uuid>::None),
            )
            .filter(expedition::Column::VotingCenterId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        voting_center::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(self.logger, "voting center deleted";
            "voting_center_id" => %id, "code" => &target.code);
        Ok(())
    }
}

async fn find_region<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<region::Model, ServiceError> {
    region::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Region {} not found", id)))
}

async fn find_district<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<district::Model, ServiceError> {
    district::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("District {} not found", id)))
}

async fn find_commune<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<commune::Model, ServiceError> {
    commune::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Commune {} not found", id)))
}

async fn find_voting_center<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<voting_center::Model, ServiceError> {
    voting_center::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Voting center {} not found", id)))
}

/// A missing parent in a create/update body is a validation problem, not a 404.
fn parent_exists<T>(
    lookup: Result<T, ServiceError>,
    level: &str,
    id: Uuid,
) -> Result<T, ServiceError> {
    match lookup {
        Err(ServiceError::NotFound(_)) => Err(ServiceError::ValidationError(format!(
            "{} {} does not exist",
            level, id
        ))),
        other => other,
    }
}

fn required(value: &str, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn duplicate_code(err: sea_orm::DbErr, level: &str, code: &str) -> ServiceError {
    let err = ServiceError::db_error(err);
    if err.is_unique_violation() {
        ServiceError::Conflict(format!("{} code {} already exists", level, code))
    } else {
        err
    }
}

fn refuse_with_children(
    level: &str,
    code: &str,
    children: u64,
    child: &str,
) -> Result<(), ServiceError> {
    if children == 0 {
        return Ok(());
    }
    Err(ServiceError::Conflict(format!(
        "{} {} still has {} {}(s)",
        level, code, children, child
    )))
}

/// Number of rows per parent id.
async fn child_counts<E, C>(db: &C, parent: E::Column) -> Result<HashMap<Uuid, u64>, ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let rows: Vec<(Uuid, i64)> = E::find()
        .select_only()
        .column(parent)
        .column_as(Expr::col(parent).count(), "children")
        .group_by(parent)
        .into_tuple()
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(rows
        .into_iter()
        .map(|(id, count)| (id, count.max(0) as u64))
        .collect())
}

fn group_by_parent<T>(rows: Vec<T>, parent: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(parent(&row)).or_default().push(row);
    }
    grouped
}
