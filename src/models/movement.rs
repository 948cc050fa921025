use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::expedition::ExpeditionStatus;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementType {
    #[sea_orm(string_value = "creation")]
    Creation,
    #[sea_orm(string_value = "send")]
    Send,
    #[sea_orm(string_value = "receive")]
    Receive,
    #[sea_orm(string_value = "distribution")]
    Distribution,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "status_change")]
    StatusChange,
    #[sea_orm(string_value = "correction")]
    Correction,
}

/// Append-only audit entry for an expedition. Rows are never updated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expedition_id: Uuid,
    pub movement_type: MovementType,
    pub status_before: Option<ExpeditionStatus>,
    pub status_after: ExpeditionStatus,
    pub location: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    /// Acting user
    pub user_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expedition::Entity",
        from = "Column::ExpeditionId",
        to = "super::expedition::Column::Id",
        on_delete = "Cascade"
    )]
    Expedition,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::expedition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expedition.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn movement_type_wire_values() {
        let values: Vec<String> = MovementType::iter().map(|t| t.to_string()).collect();
        assert_eq!(
            values,
            vec![
                "creation",
                "send",
                "receive",
                "distribution",
                "return",
                "status_change",
                "correction"
            ]
        );
        assert_eq!(
            MovementType::from_str("status_change").unwrap(),
            MovementType::StatusChange
        );
    }
}
