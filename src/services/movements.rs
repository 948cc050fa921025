use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{ci_contains, search_term};
use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{expedition, movement, user, ExpeditionStatus, MovementType},
};

pub const DEFAULT_JOURNAL_LIMIT: u64 = 200;
pub const MAX_JOURNAL_LIMIT: u64 = 1000;

/// Default note on an explicit status change without user-supplied notes.
pub const STATUS_CHANGE_NOTE: &str = "Status change";
/// Note on the automatic in_transit -> lost rewrite.
pub const AUTO_LOST_NOTE: &str = "Automatic change: planned arrival date passed without receipt";

/// A status transition to record.
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub expedition_id: Uuid,
    pub from: ExpeditionStatus,
    pub to: ExpeditionStatus,
    pub user_id: Uuid,
    pub notes: Option<String>,
    pub location: Option<String>,
    pub at: DateTime<Utc>,
}

/// Appends one `status_change` entry. Movements are never updated afterwards.
pub(crate) async fn append_status_change<C: ConnectionTrait>(
    db: &C,
    transition: StatusTransition,
) -> Result<movement::Model, ServiceError> {
    movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        expedition_id: Set(transition.expedition_id),
        movement_type: Set(MovementType::StatusChange),
        status_before: Set(Some(transition.from)),
        status_after: Set(transition.to),
        location: Set(transition.location),
        notes: Set(transition.notes),
        user_id: Set(transition.user_id),
        occurred_at: Set(transition.at),
    }
    .insert(db)
    .await
    .map_err(ServiceError::db_error)
}

/// One movement with the user that performed it
#[derive(Debug, Clone)]
pub struct MovementEntry {
    pub movement: movement::Model,
    pub user: Option<user::Model>,
}

/// Journal row: movement plus its shipment and user
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub movement: movement::Model,
    pub expedition: Option<expedition::Model>,
    pub user: Option<user::Model>,
}

/// Movement logs, newest first, for a set of shipments.
pub(crate) async fn movements_by_expedition<C: ConnectionTrait>(
    db: &C,
    expedition_ids: &[Uuid],
    per_expedition: Option<usize>,
) -> Result<HashMap<Uuid, Vec<MovementEntry>>, ServiceError> {
    let mut grouped: HashMap<Uuid, Vec<MovementEntry>> = HashMap::new();
    if expedition_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = movement::Entity::find()
        .filter(movement::Column::ExpeditionId.is_in(expedition_ids.to_vec()))
        .find_also_related(user::Entity)
        .order_by_desc(movement::Column::OccurredAt)
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    for (movement, user) in rows {
        let entries = grouped.entry(movement.expedition_id).or_default();
        if per_expedition.map_or(true, |cap| entries.len() < cap) {
            entries.push(MovementEntry { movement, user });
        }
    }

    Ok(grouped)
}

/// Read side of the movement log across all shipments
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Newest movements first, optionally filtered by shipment number or
    /// designation, user name or email, notes or location.
    #[instrument(skip(self))]
    pub async fn journal(
        &self,
        search: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<JournalEntry>, ServiceError> {
        let db = &*self.db_pool;
        let limit = limit
            .unwrap_or(DEFAULT_JOURNAL_LIMIT)
            .clamp(1, MAX_JOURNAL_LIMIT);

        let mut query = movement::Entity::find()
            .join(JoinType::InnerJoin, movement::Relation::Expedition.def())
            .join(JoinType::InnerJoin, movement::Relation::User.def());

        if let Some(term) = search_term(search) {
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
                    .add(ci_contains((user::Entity, user::Column::Name), term))
                    .add(ci_contains((user::Entity, user::Column::Email), term))
                    .add(ci_contains((movement::Entity, movement::Column::Notes), term))
                    .add(ci_contains(
                        (movement::Entity, movement::Column::Location),
                        term,
                    )),
            );
        }

        let movements = query
            .order_by_desc(movement::Column::OccurredAt)
            .limit(limit)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let expedition_ids: Vec<Uuid> = movements.iter().map(|m| m.expedition_id).collect();
        let user_ids: Vec<Uuid> = movements.iter().map(|m| m.user_id).collect();

        let expeditions: HashMap<Uuid, expedition::Model> = if expedition_ids.is_empty() {
            HashMap::new()
        } else {
            expedition::Entity::find()
                .filter(expedition::Column::Id.is_in(expedition_ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|e| (e.id, e))
                .collect()
        };
        let users: HashMap<Uuid, user::Model> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|u| (u.id, u))
                .collect()
        };

        Ok(movements
            .into_iter()
            .map(|movement| JournalEntry {
                expedition: expeditions.get(&movement.expedition_id).cloned(),
                user: users.get(&movement.user_id).cloned(),
                movement,
            })
            .collect())
    }
}
