use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, Iterable,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::{info, warn, Logger};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{
    ci_contains,
    manifest::Manifest,
    movements::{
        append_status_change, movements_by_expedition, MovementEntry, StatusTransition,
        AUTO_LOST_NOTE, STATUS_CHANGE_NOTE,
    },
    numbering,
    reconcile::{self, MaterielDraft},
    search_term,
    users::non_blank,
};
use crate::{
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        commune, district, expedition, materiel, materiel_type, region, user, voting_center,
        ExpeditionStatus, MaterielStatus,
    },
};

/// Movements attached to each shipment in listings.
pub const LISTING_MOVEMENTS: usize = 10;

/// Full edit form of a shipment, including its desired line items.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ExpeditionForm {
    #[validate(length(min = 1, max = 255))]
    pub designation: String,
    #[serde(default)]
    pub origin: String,
    pub departure_date: Option<DateTime<Utc>>,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    #[serde(default)]
    pub destination: String,
    pub arrival_date: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub receiver_address: Option<String>,
    /// Omitted means unchanged
    pub status: Option<ExpeditionStatus>,
    pub notes: Option<String>,
    /// Recorded on the movement entry when the status changes
    pub location: Option<String>,
    pub region_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub commune_id: Option<Uuid>,
    pub voting_center_id: Option<Uuid>,
    #[serde(default)]
    pub materiels: Vec<MaterielLineInput>,
}

/// One desired line item. Lines without an `id` are created.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct MaterielLineInput {
    pub id: Option<Uuid>,
    pub materiel_type_id: Option<Uuid>,
    pub designation: String,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    pub quantity_received: Option<i32>,
    pub quantity_used: Option<i32>,
    #[serde(default)]
    pub status: MaterielStatus,
}

impl From<MaterielLineInput> for MaterielDraft {
    fn from(line: MaterielLineInput) -> Self {
        MaterielDraft {
            id: line.id,
            materiel_type_id: line.materiel_type_id,
            designation: line.designation.trim().to_string(),
            category: line.category.and_then(non_blank),
            description: line.description.and_then(non_blank),
            quantity: line.quantity,
            quantity_received: line.quantity_received,
            quantity_used: line.quantity_used,
            status: line.status,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpeditionFilter {
    pub status: Option<ExpeditionStatus>,
    pub search: Option<String>,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone)]
pub struct MaterielLine {
    pub item: materiel::Model,
    pub materiel_type: Option<materiel_type::Model>,
}

#[derive(Debug, Clone, Default)]
pub struct GeographyLinks {
    pub region: Option<region::Model>,
    pub district: Option<district::Model>,
    pub commune: Option<commune::Model>,
    pub voting_center: Option<voting_center::Model>,
}

/// A shipment with everything the detail and list views show.
#[derive(Debug, Clone)]
pub struct ExpeditionDetail {
    pub expedition: expedition::Model,
    pub owner: Option<user::Model>,
    /// Only resolved on single-shipment reads
    pub geography: Option<GeographyLinks>,
    pub materiels: Vec<MaterielLine>,
    pub movements: Vec<MovementEntry>,
}

#[derive(Debug, Clone)]
pub struct ExpeditionPage {
    pub items: Vec<ExpeditionDetail>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone)]
pub struct MaterielDetail {
    pub item: materiel::Model,
    pub expedition: expedition::Model,
    pub materiel_type: Option<materiel_type::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: ExpeditionStatus,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExpeditionStats {
    pub total: u64,
    /// Every status, zero-filled, in lifecycle order
    pub by_status: Vec<StatusCount>,
}

/// Service for shipments, their line items and status lifecycle
#[derive(Clone)]
pub struct ExpeditionService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl ExpeditionService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    async fn owner_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<user::Model, ServiceError> {
        user::Entity::find()
            .filter(user::Column::Email.eq(email.trim()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", email.trim())))
    }

    /// Creates a draft shipment owned by `email` with a freshly allocated number.
    #[instrument(skip(self))]
    pub async fn create_expedition(
        &self,
        email: &str,
        designation: &str,
    ) -> Result<expedition::Model, ServiceError> {
        let designation = designation.trim();
        if designation.is_empty() {
            return Err(ServiceError::ValidationError(
                "designation is required".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let owner = Self::owner_by_email(db, email).await?;

        let created = numbering::allocate(db, numbering::candidate_number, |number| {
            let now = Utc::now();
            let draft = expedition::ActiveModel {
                id: Set(Uuid::new_v4()),
                number: Set(number),
                designation: Set(designation.to_string()),
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
            };
            async move { draft.insert(db).await.map_err(ServiceError::db_error) }
        })
        .await?;

        counter!("expedition_api.expeditions.created", 1);
        info!(self.logger, "expedition created";
            "expedition_id" => %created.id, "number" => &created.number, "user" => &owner.email);

        self.event_sender
            .send_or_log(Event::ExpeditionCreated {
                expedition_id: created.id,
                number: created.number.clone(),
                user_id: owner.id,
            })
            .await;

        Ok(created)
    }

    /// Lists the shipments of `email`, newest first.
    ///
    /// Overdue in-transit shipments of that user are rewritten to `lost` before
    /// the page is read, so the result never shows a stale in-transit status.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        email: &str,
        filter: ExpeditionFilter,
    ) -> Result<ExpeditionPage, ServiceError> {
        crate::tracing::with_metrics("list_expeditions", || async {
            let db = &*self.db_pool;
            let owner = Self::owner_by_email(db, email).await?;

            self.expire_overdue(owner.id, Utc::now()).await?;

            let mut query =
                expedition::Entity::find().filter(expedition::Column::UserId.eq(owner.id));
            if let Some(status) = filter.status {
                query = query.filter(expedition::Column::Status.eq(status));
            }
            if let Some(term) = search_term(filter.search.as_deref()) {
                query = query.filter(
                    Condition::any()
                        .add(ci_contains(
                            (expedition::Entity, expedition::Column::Number),
                            term,
                        ))
                        .add(ci_contains(
                            (expedition::Entity, expedition::Column::Designation),
                            term,
                        ))
                        .add(ci_contains(
                            (expedition::Entity, expedition::Column::Origin),
                            term,
                        ))
                        .add(ci_contains(
                            (expedition::Entity, expedition::Column::Destination),
                            term,
                        )),
                );
            }

            let limit = filter.limit.max(1);
            let page = filter.page.max(1);
            // the paginator computes the row offset as page * limit
            if page.checked_mul(limit).is_none() {
                return Err(ServiceError::BadRequest(format!(
                    "Page {} is out of range for page size {}",
                    page, limit
                )));
            }
            let paginator = query
                .order_by_desc(expedition::Column::CreatedAt)
                .paginate(db, limit);
            let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
            let rows = paginator
                .fetch_page(page - 1)
                .await
                .map_err(ServiceError::db_error)?;

            let ids: Vec<Uuid> = rows.iter().map(|e| e.id).collect();
            let mut lines = materiel_lines(db, &ids).await?;
            let mut movements = movements_by_expedition(db, &ids, Some(LISTING_MOVEMENTS)).await?;

            let items = rows
                .into_iter()
                .map(|expedition| ExpeditionDetail {
                    owner: Some(owner.clone()),
                    geography: None,
                    materiels: lines.remove(&expedition.id).unwrap_or_default(),
                    movements: movements.remove(&expedition.id).unwrap_or_default(),
                    expedition,
                })
                .collect();

            Ok::<_, ServiceError>(ExpeditionPage {
                items,
                total,
                page,
                limit,
                total_pages: (total + limit - 1) / limit,
            })
        })
        .await
    }

    /// Rewrites `user_id`'s overdue in-transit shipments to `lost`.
    ///
    /// Each shipment is handled in its own transaction with an update guarded on
    /// the in-transit status. Only the writer whose update touched the row logs
    /// the movement, so concurrent readers cannot duplicate the entry.
    /// Returns the number of shipments rewritten.
    #[instrument(skip(self))]
    pub async fn expire_overdue(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<usize, ServiceError> {
        let db = &*self.db_pool;

        let overdue = expedition::Entity::find()
            .filter(expedition::Column::UserId.eq(user_id))
            .filter(expedition::Column::Status.eq(ExpeditionStatus::InTransit))
            .filter(expedition::Column::ArrivalDate.lt(now))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut rewritten = 0;
        for shipment in overdue {
            let txn = db.begin().await.map_err(ServiceError::db_error)?;

            let result = expedition::Entity::update_many()
                .set(expedition::ActiveModel {
                    status: Set(ExpeditionStatus::Lost),
                    updated_at: Set(now),
                    ..Default::default()
                })
                .filter(expedition::Column::Id.eq(shipment.id))
                .filter(expedition::Column::Status.eq(ExpeditionStatus::InTransit))
                .filter(expedition::Column::ArrivalDate.lt(now))
                .exec(&txn)
                .await
                .map_err(ServiceError::db_error)?;

            if result.rows_affected != 1 {
                txn.rollback().await.map_err(ServiceError::db_error)?;
                continue;
            }

            append_status_change(
                &txn,
                StatusTransition {
                    expedition_id: shipment.id,
                    from: ExpeditionStatus::InTransit,
                    to: ExpeditionStatus::Lost,
                    user_id,
                    notes: Some(AUTO_LOST_NOTE.to_string()),
                    location: None,
                    at: now,
                },
            )
            .await?;

            txn.commit().await.map_err(ServiceError::db_error)?;
            rewritten += 1;

            counter!("expedition_api.expeditions.auto_lost", 1);
            warn!(self.logger, "expedition marked lost automatically";
                "expedition_id" => %shipment.id, "number" => &shipment.number);

            self.event_sender
                .send_or_log(Event::ExpeditionStatusChanged {
                    expedition_id: shipment.id,
                    from: ExpeditionStatus::InTransit,
                    to: ExpeditionStatus::Lost,
                    automatic: true,
                    at: now,
                })
                .await;
        }

        Ok(rewritten)
    }

    /// One shipment with line items, owner, geography and full movement log.
    #[instrument(skip(self))]
    pub async fn get_expedition(&self, id: Uuid) -> Result<ExpeditionDetail, ServiceError> {
        let db = &*self.db_pool;
        let expedition = find_expedition(db, id).await?;

        let owner = user::Entity::find_by_id(expedition.user_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        let geography = geography_links(db, &expedition).await?;
        let materiels = materiel_lines(db, &[id]).await?.remove(&id).unwrap_or_default();
        let movements = movements_by_expedition(db, &[id], None)
            .await?
            .remove(&id)
            .unwrap_or_default();

        Ok(ExpeditionDetail {
            expedition,
            owner,
            geography: Some(geography),
            materiels,
            movements,
        })
    }

    /// Applies a full edit in one transaction.
    ///
    /// When the status changes the update only matches the row if it still has
    /// the status read at the start; otherwise the edit is a `Conflict`. With a
    /// known acting user exactly one movement records the transition.
    #[instrument(skip(self, form))]
    pub async fn update_expedition(
        &self,
        id: Uuid,
        form: ExpeditionForm,
        acting_user: Option<Uuid>,
    ) -> Result<ExpeditionDetail, ServiceError> {
        form.validate()?;
        let designation = form.designation.trim().to_string();
        if designation.is_empty() {
            return Err(ServiceError::ValidationError(
                "designation is required".to_string(),
            ));
        }

        let drafts: Vec<MaterielDraft> = form.materiels.iter().cloned().map(Into::into).collect();
        reconcile::validate_drafts(&drafts)?;

        let transition = crate::tracing::with_metrics("update_expedition", || async {
            let db = &*self.db_pool;
            let txn = db.begin().await.map_err(ServiceError::db_error)?;

            let current = find_expedition(&txn, id).await?;
            let stored = materiel::Entity::find()
                .filter(materiel::Column::ExpeditionId.eq(id))
                .all(&txn)
                .await
                .map_err(ServiceError::db_error)?;

            check_geography(&txn, &form).await?;
            check_materiel_types(&txn, &drafts).await?;

            let now = Utc::now();
            let new_status = form.status.unwrap_or(current.status);
            let status_changed = new_status != current.status;

            let mut update = expedition::Entity::update_many()
                .set(expedition::ActiveModel {
                    designation: Set(designation.clone()),
                    origin: Set(form.origin.trim().to_string()),
                    departure_date: Set(form.departure_date),
                    sender_name: Set(form.sender_name.clone().and_then(non_blank)),
                    sender_address: Set(form.sender_address.clone().and_then(non_blank)),
                    destination: Set(form.destination.trim().to_string()),
                    arrival_date: Set(form.arrival_date),
                    receiver_name: Set(form.receiver_name.clone().and_then(non_blank)),
                    receiver_address: Set(form.receiver_address.clone().and_then(non_blank)),
                    status: Set(new_status),
                    notes: Set(form.notes.clone().and_then(non_blank)),
                    region_id: Set(form.region_id),
                    district_id: Set(form.district_id),
                    commune_id: Set(form.commune_id),
                    voting_center_id: Set(form.voting_center_id),
                    updated_at: Set(now),
                    ..Default::default()
                })
                .filter(expedition::Column::Id.eq(id));
            if status_changed {
                update = update.filter(expedition::Column::Status.eq(current.status));
            }

            let result = update.exec(&txn).await.map_err(ServiceError::db_error)?;
            if result.rows_affected == 0 {
                return Err(ServiceError::Conflict(format!(
                    "Expedition {} changed status concurrently; reload and retry",
                    current.number
                )));
            }

            let mut transition = None;
            if status_changed {
                if let Some(user_id) = acting_user {
                    append_status_change(
                        &txn,
                        StatusTransition {
                            expedition_id: id,
                            from: current.status,
                            to: new_status,
                            user_id,
                            notes: Some(
                                form.notes
                                    .clone()
                                    .and_then(non_blank)
                                    .unwrap_or_else(|| STATUS_CHANGE_NOTE.to_string()),
                            ),
                            location: form.location.clone().and_then(non_blank),
                            at: now,
                        },
                    )
                    .await?;
                }
                transition = Some((current.status, new_status, now));
            }

            let plan = reconcile::plan_reconciliation(&stored, drafts.clone());
            reconcile::apply_plan(&txn, id, acting_user, plan).await?;

            txn.commit().await.map_err(ServiceError::db_error)?;
            Ok::<_, ServiceError>(transition.map(|t| (current.number, t)))
        })
        .await?;

        if let Some((number, (from, to, at))) = transition {
            counter!("expedition_api.expeditions.status_transitions", 1,
                "from" => from.to_string(), "to" => to.to_string());
            info!(self.logger, "expedition status changed";
                "expedition_id" => %id, "number" => &number, "from" => %from, "to" => %to);
            self.event_sender
                .send_or_log(Event::ExpeditionStatusChanged {
                    expedition_id: id,
                    from,
                    to,
                    automatic: false,
                    at,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::ExpeditionUpdated(id))
            .await;

        self.get_expedition(id).await
    }

    /// Deletes a shipment with its movements and line items.
    #[instrument(skip(self))]
    pub async fn delete_expedition(&self, id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let shipment = find_expedition(&txn, id).await?;

        crate::models::movement::Entity::delete_many()
            .filter(crate::models::movement::Column::ExpeditionId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let removed_lines = materiel::Entity::delete_many()
            .filter(materiel::Column::ExpeditionId.eq(id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        expedition::Entity::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(self.logger, "expedition deleted";
            "expedition_id" => %id, "number" => &shipment.number,
            "lines" => removed_lines.rows_affected);

        self.event_sender
            .send_or_log(Event::ExpeditionDeleted {
                expedition_id: id,
                number: shipment.number,
            })
            .await;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_materiel(&self, id: Uuid) -> Result<MaterielDetail, ServiceError> {
        let db = &*self.db_pool;
        let (item, materiel_type) = materiel::Entity::find_by_id(id)
            .find_also_related(materiel_type::Entity)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Materiel {} not found", id)))?;
        let expedition = find_expedition(db, item.expedition_id).await?;

        Ok(MaterielDetail {
            item,
            expedition,
            materiel_type,
        })
    }

    /// Counts per status, optionally restricted to one owner.
    #[instrument(skip(self))]
    pub async fn stats(&self, user_id: Option<Uuid>) -> Result<ExpeditionStats, ServiceError> {
        let db = &*self.db_pool;
        let scoped = || {
            let query = expedition::Entity::find();
            match user_id {
                Some(id) => query.filter(expedition::Column::UserId.eq(id)),
                None => query,
            }
        };

        let mut by_status = Vec::new();
        let mut total = 0;
        for status in ExpeditionStatus::iter() {
            let count = scoped()
                .filter(expedition::Column::Status.eq(status))
                .count(db)
                .await
                .map_err(ServiceError::db_error)?;
            total += count;
            by_status.push(StatusCount { status, count });
        }

        Ok(ExpeditionStats { total, by_status })
    }

    /// Movement log of one shipment, newest first.
    #[instrument(skip(self))]
    pub async fn movements_for(&self, id: Uuid) -> Result<Vec<MovementEntry>, ServiceError> {
        let db = &*self.db_pool;
        find_expedition(db, id).await?;
        Ok(movements_by_expedition(db, &[id], None)
            .await?
            .remove(&id)
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn manifest(&self, id: Uuid) -> Result<Manifest, ServiceError> {
        let db = &*self.db_pool;
        let shipment = find_expedition(db, id).await?;
        let items: Vec<materiel::Model> = materiel_lines(db, &[id])
            .await?
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .map(|line| line.item)
            .collect();

        Ok(Manifest::build(&shipment, &items, Utc::now()))
    }
}

async fn find_expedition<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<expedition::Model, ServiceError> {
    expedition::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Expedition {} not found", id)))
}

async fn materiel_lines<C: ConnectionTrait>(
    db: &C,
    expedition_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<MaterielLine>>, ServiceError> {
    let mut grouped: HashMap<Uuid, Vec<MaterielLine>> = HashMap::new();
    if expedition_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = materiel::Entity::find()
        .filter(materiel::Column::ExpeditionId.is_in(expedition_ids.to_vec()))
        .find_also_related(materiel_type::Entity)
        .order_by_asc(materiel::Column::CreatedAt)
        .order_by_asc(materiel::Column::Designation)
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    for (item, materiel_type) in rows {
        grouped
            .entry(item.expedition_id)
            .or_default()
            .push(MaterielLine {
                item,
                materiel_type,
            });
    }

    Ok(grouped)
}

async fn geography_links<C: ConnectionTrait>(
    db: &C,
    shipment: &expedition::Model,
) -> Result<GeographyLinks, ServiceError> {
    let mut links = GeographyLinks::default();
    if let Some(id) = shipment.region_id {
        links.region = region::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
    }
    if let Some(id) = shipment.district_id {
        links.district = district::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
    }
    if let Some(id) = shipment.commune_id {
        links.commune = commune::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
    }
    if let Some(id) = shipment.voting_center_id {
        links.voting_center = voting_center::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
    }
    Ok(links)
}

async fn check_geography<C: ConnectionTrait>(
    db: &C,
    form: &ExpeditionForm,
) -> Result<(), ServiceError> {
    let missing = |level: &str, id: Uuid| {
        ServiceError::ValidationError(format!("{} {} does not exist", level, id))
    };

    if let Some(id) = form.region_id {
        region::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| missing("Region", id))?;
    }
    if let Some(id) = form.district_id {
        district::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| missing("District", id))?;
    }
    if let Some(id) = form.commune_id {
        commune::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| missing("Commune", id))?;
    }
    if let Some(id) = form.voting_center_id {
        voting_center::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| missing("Voting center", id))?;
    }
    Ok(())
}

async fn check_materiel_types<C: ConnectionTrait>(
    db: &C,
    drafts: &[MaterielDraft],
) -> Result<(), ServiceError> {
    let wanted: HashSet<Uuid> = drafts.iter().filter_map(|d| d.materiel_type_id).collect();
    if wanted.is_empty() {
        return Ok(());
    }

    let found: HashSet<Uuid> = materiel_type::Entity::find()
        .filter(materiel_type::Column::Id.is_in(wanted.iter().copied().collect::<Vec<_>>()))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|t| t.id)
        .collect();

    match wanted.difference(&found).next() {
        Some(id) => Err(ServiceError::ValidationError(format!(
            "Materiel type {} does not exist",
            id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::logging::{setup_logger, LoggerConfig};
    use crate::models::{movement, MovementType, UserRole};
    use assert_matches::assert_matches;
    use chrono::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        service: ExpeditionService,
        db: Arc<DbPool>,
        owner: user::Model,
        _events: mpsc::Receiver<Event>,
    }

    async fn fixture() -> Fixture {
        let db = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        run_migrations(&db).await.unwrap();

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
        .insert(&db)
        .await
        .unwrap();

        let db = Arc::new(db);
        let (tx, rx) = mpsc::channel(64);
        let service = ExpeditionService::new(
            db.clone(),
            Arc::new(EventSender::new(tx)),
            setup_logger(LoggerConfig::silent()),
        );
        Fixture {
            service,
            db,
            owner,
            _events: rx,
        }
    }

    fn form(designation: &str, status: Option<ExpeditionStatus>) -> ExpeditionForm {
        ExpeditionForm {
            designation: designation.into(),
            origin: "Antananarivo".into(),
            departure_date: None,
            sender_name: None,
            sender_address: None,
            destination: "Mahajanga".into(),
            arrival_date: None,
            receiver_name: None,
            receiver_address: None,
            status,
            notes: None,
            location: None,
            region_id: None,
            district_id: None,
            commune_id: None,
            voting_center_id: None,
            materiels: Vec::new(),
        }
    }

    fn line(id: Option<Uuid>, designation: &str, quantity: i32) -> MaterielLineInput {
        MaterielLineInput {
            id,
            materiel_type_id: None,
            designation: designation.into(),
            category: None,
            description: None,
            quantity,
            quantity_received: None,
            quantity_used: None,
            status: MaterielStatus::Good,
        }
    }

    #[tokio::test]
    async fn created_expedition_is_a_numbered_draft_without_movements() {
        let fx = fixture().await;
        let created = fx
            .service
            .create_expedition(&fx.owner.email, "  Urnes  ")
            .await
            .unwrap();

        assert!(numbering::is_valid_number(&created.number));
        assert_eq!(created.designation, "Urnes");
        assert_eq!(created.status, ExpeditionStatus::Draft);
        assert!(fx.service.movements_for(created.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_blank_designation_and_unknown_owner() {
        let fx = fixture().await;
        assert_matches!(
            fx.service.create_expedition(&fx.owner.email, "   ").await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            fx.service.create_expedition("ghost@ceni.mg", "Urnes").await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn status_change_logs_one_movement_and_reconciles_lines() {
        let fx = fixture().await;
        let created = fx
            .service
            .create_expedition(&fx.owner.email, "Kits")
            .await
            .unwrap();

        let mut first = form("Kits", None);
        first.materiels = vec![line(None, "A", 1), line(None, "B", 2)];
        let detail = fx
            .service
            .update_expedition(created.id, first, Some(fx.owner.id))
            .await
            .unwrap();
        assert_eq!(detail.materiels.len(), 2);
        assert!(detail.movements.is_empty());

        let a = detail
            .materiels
            .iter()
            .find(|l| l.item.designation == "A")
            .unwrap()
            .item
            .id;
        let mut second = form("Kits", Some(ExpeditionStatus::InTransit));
        second.location = Some("Ambohidratrimo".into());
        second.materiels = vec![line(Some(a), "A", 5), line(None, "C", 3)];
        let detail = fx
            .service
            .update_expedition(created.id, second, Some(fx.owner.id))
            .await
            .unwrap();

        let mut names: Vec<(&str, i32)> = detail
            .materiels
            .iter()
            .map(|l| (l.item.designation.as_str(), l.item.quantity))
            .collect();
        names.sort();
        assert_eq!(names, vec![("A", 5), ("C", 3)]);
        assert!(detail.materiels.iter().any(|l| l.item.id == a));

        assert_eq!(detail.movements.len(), 1);
        let entry = &detail.movements[0].movement;
        assert_eq!(entry.movement_type, MovementType::StatusChange);
        assert_eq!(entry.status_before, Some(ExpeditionStatus::Draft));
        assert_eq!(entry.status_after, ExpeditionStatus::InTransit);
        assert_eq!(entry.notes.as_deref(), Some(STATUS_CHANGE_NOTE));
        assert_eq!(entry.location.as_deref(), Some("Ambohidratrimo"));
    }

    #[tokio::test]
    async fn update_rejects_unknown_geography() {
        let fx = fixture().await;
        let created = fx
            .service
            .create_expedition(&fx.owner.email, "Kits")
            .await
            .unwrap();

        let mut bad = form("Kits", None);
        bad.region_id = Some(Uuid::new_v4());
        assert_matches!(
            fx.service
                .update_expedition(created.id, bad, Some(fx.owner.id))
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn overdue_shipments_are_lost_once() {
        let fx = fixture().await;
        let created = fx
            .service
            .create_expedition(&fx.owner.email, "Bulletins")
            .await
            .unwrap();

        let mut transit = form("Bulletins", Some(ExpeditionStatus::InTransit));
        transit.arrival_date = Some(Utc::now() - Duration::days(1));
        fx.service
            .update_expedition(created.id, transit, Some(fx.owner.id))
            .await
            .unwrap();

        let now = Utc::now();
        assert_eq!(fx.service.expire_overdue(fx.owner.id, now).await.unwrap(), 1);
        assert_eq!(fx.service.expire_overdue(fx.owner.id, now).await.unwrap(), 0);

        let page = fx
            .service
            .list_for_user(
                &fx.owner.email,
                ExpeditionFilter {
                    page: 1,
                    limit: 20,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.items[0].expedition.status, ExpeditionStatus::Lost);

        let lost: Vec<movement::Model> = movement::Entity::find()
            .filter(movement::Column::ExpeditionId.eq(created.id))
            .filter(movement::Column::StatusAfter.eq(ExpeditionStatus::Lost))
            .all(&*fx.db)
            .await
            .unwrap();
        assert_eq!(lost.len(), 1);
        assert_eq!(lost[0].notes.as_deref(), Some(AUTO_LOST_NOTE));
        assert_eq!(lost[0].status_before, Some(ExpeditionStatus::InTransit));
    }

    #[tokio::test]
    async fn out_of_range_page_is_rejected() {
        let fx = fixture().await;
        fx.service
            .create_expedition(&fx.owner.email, "Urnes")
            .await
            .unwrap();

        let result = fx
            .service
            .list_for_user(
                &fx.owner.email,
                ExpeditionFilter {
                    page: u64::MAX,
                    limit: 20,
                    ..Default::default()
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::BadRequest(_)));

        let beyond = fx
            .service
            .list_for_user(
                &fx.owner.email,
                ExpeditionFilter {
                    page: 50,
                    limit: 20,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(beyond.total, 1);
        assert!(beyond.items.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_lines_and_movements() {
        let fx = fixture().await;
        let created = fx
            .service
            .create_expedition(&fx.owner.email, "Isoloirs")
            .await
            .unwrap();
        let mut edit = form("Isoloirs", Some(ExpeditionStatus::InTransit));
        edit.materiels = vec![line(None, "Isoloir", 12)];
        fx.service
            .update_expedition(created.id, edit, Some(fx.owner.id))
            .await
            .unwrap();

        fx.service.delete_expedition(created.id).await.unwrap();

        let db = &*fx.db;
        assert_eq!(materiel::Entity::find().count(db).await.unwrap(), 0);
        assert_eq!(movement::Entity::find().count(db).await.unwrap(), 0);
        assert_matches!(
            fx.service.get_expedition(created.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn stats_are_zero_filled() {
        let fx = fixture().await;
        fx.service
            .create_expedition(&fx.owner.email, "Urnes")
            .await
            .unwrap();

        let stats = fx.service.stats(Some(fx.owner.id)).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.by_status.len(), 8);
        assert_eq!(stats.by_status[0].status, ExpeditionStatus::Draft);
        assert_eq!(stats.by_status[0].count, 1);
        assert!(stats.by_status[1..].iter().all(|s| s.count == 0));
    }
}
