//! Diffing of a shipment's stored line items against the desired set submitted
//! with an edit. Planning is pure; applying runs on the caller's transaction.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{materiel, MaterielStatus};

/// Desired state of one line item. `id` is `None` for new lines.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterielDraft {
    pub id: Option<Uuid>,
    pub materiel_type_id: Option<Uuid>,
    pub designation: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub quantity: i32,
    pub quantity_received: Option<i32>,
    pub quantity_used: Option<i32>,
    pub status: MaterielStatus,
}

impl MaterielDraft {
    fn differs_from(&self, stored: &materiel::Model) -> bool {
        self.materiel_type_id != stored.materiel_type_id
            || self.designation != stored.designation
            || self.category != stored.category
            || self.description != stored.description
            || self.quantity != stored.quantity
            || self.quantity_received != stored.quantity_received
            || self.quantity_used != stored.quantity_used
            || self.status != stored.status
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconciliationPlan {
    pub delete: Vec<Uuid>,
    pub update: Vec<(Uuid, MaterielDraft)>,
    pub insert: Vec<MaterielDraft>,
    pub unchanged: Vec<Uuid>,
}

impl ReconciliationPlan {
    pub fn is_noop(&self) -> bool {
        self.delete.is_empty() && self.update.is_empty() && self.insert.is_empty()
    }
}

/// Rejects drafts that could not be stored as-is.
pub fn validate_drafts(drafts: &[MaterielDraft]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();

    for (index, draft) in drafts.iter().enumerate() {
        let line = index + 1;
        if draft.designation.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: designation is required",
                line
            )));
        }
        let quantities = [
            Some(draft.quantity),
            draft.quantity_received,
            draft.quantity_used,
        ];
        if quantities.iter().flatten().any(|q| *q < 0) {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: quantities cannot be negative",
                line
            )));
        }
        if let Some(id) = draft.id {
            if !seen.insert(id) {
                return Err(ServiceError::ValidationError(format!(
                    "Line {}: materiel {} appears more than once",
                    line, id
                )));
            }
        }
    }

    Ok(())
}

/// Computes the delete/update/insert sets turning `stored` into `desired`.
///
/// Ids are scoped to the shipment being edited: a draft whose id is not one of
/// `stored` is inserted as a new line with a fresh id, so an item can never be
/// moved from another shipment.
pub fn plan_reconciliation(
    stored: &[materiel::Model],
    desired: Vec<MaterielDraft>,
) -> ReconciliationPlan {
    let by_id: HashMap<Uuid, &materiel::Model> = stored.iter().map(|m| (m.id, m)).collect();
    let mut plan = ReconciliationPlan::default();
    let mut kept = HashSet::new();

    for draft in desired {
        match draft.id.and_then(|id| by_id.get(&id).map(|m| (id, *m))) {
            Some((id, current)) => {
                kept.insert(id);
                if draft.differs_from(current) {
                    plan.update.push((id, draft));
                } else {
                    plan.unchanged.push(id);
                }
            }
            None => plan.insert.push(MaterielDraft { id: None, ..draft }),
        }
    }

    plan.delete = stored
        .iter()
        .map(|m| m.id)
        .filter(|id| !kept.contains(id))
        .collect();

    plan
}

/// Applies a plan. Callers pass a transaction so a failure leaves nothing applied.
pub async fn apply_plan<C: ConnectionTrait>(
    db: &C,
    expedition_id: Uuid,
    acting_user: Option<Uuid>,
    plan: ReconciliationPlan,
) -> Result<(), ServiceError> {
    let now = Utc::now();

    if !plan.delete.is_empty() {
        materiel::Entity::delete_many()
            .filter(materiel::Column::ExpeditionId.eq(expedition_id))
            .filter(materiel::Column::Id.is_in(plan.delete))
            .exec(db)
            .await
            .map_err(ServiceError::db_error)?;
    }

    for (id, draft) in plan.update {
        materiel::ActiveModel {
            id: Set(id),
            materiel_type_id: Set(draft.materiel_type_id),
            designation: Set(draft.designation),
            category: Set(draft.category),
            description: Set(draft.description),
            quantity: Set(draft.quantity),
            quantity_received: Set(draft.quantity_received),
            quantity_used: Set(draft.quantity_used),
            status: Set(draft.status),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(db)
        .await
        .map_err(ServiceError::db_error)?;
    }

    for draft in plan.insert {
        materiel::ActiveModel {
            id: Set(Uuid::new_v4()),
            expedition_id: Set(expedition_id),
            materiel_type_id: Set(draft.materiel_type_id),
            designation: Set(draft.designation),
            category: Set(draft.category),
            description: Set(draft.description),
            quantity: Set(draft.quantity),
            quantity_received: Set(draft.quantity_received),
            quantity_used: Set(draft.quantity_used),
            status: Set(draft.status),
            user_id: Set(acting_user),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;
    }

    Ok(())
}
