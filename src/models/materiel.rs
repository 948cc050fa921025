use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Condition of a line item.
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
pub enum MaterielStatus {
    #[sea_orm(string_value = "good")]
    Good,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "lost")]
    Lost,
    #[sea_orm(string_value = "used")]
    Used,
    #[sea_orm(string_value = "returned")]
    Returned,
}

impl Default for MaterielStatus {
    fn default() -> Self {
        MaterielStatus::Good
    }
}

/// A materiel line item. Always owned by exactly one expedition.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materiels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expedition_id: Uuid,
    pub materiel_type_id: Option<Uuid>,
    pub designation: String,
    pub category: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    /// Declared quantity
    pub quantity: i32,
    pub quantity_received: Option<i32>,
    pub quantity_used: Option<i32>,
    pub status: MaterielStatus,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
        belongs_to = "super::materiel_type::Entity",
        from = "Column::MaterielTypeId",
        to = "super::materiel_type::Column::Id"
    )]
    MaterielType,
}

impl Related<super::expedition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expedition.def()
    }
}

impl Related<super::materiel_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MaterielType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
