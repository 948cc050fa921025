use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle status of an expedition.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
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
pub enum ExpeditionStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "distributed")]
    Distributed,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "lost")]
    Lost,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl Default for ExpeditionStatus {
    fn default() -> Self {
        ExpeditionStatus::Draft
    }
}

impl ExpeditionStatus {
    /// Whether the automatic expiry rule applies to a shipment in this state
    /// whose planned arrival is `arrival` at instant `now`.
    pub fn is_overdue(self, arrival: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        self == ExpeditionStatus::InTransit && arrival.map_or(false, |at| at < now)
    }
}

/// One consignment of electoral materiel.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expeditions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// `EXP-<year>-<6 hex>`
    #[sea_orm(unique)]
    pub number: String,

    pub designation: String,

    pub origin: String,
    pub departure_date: Option<DateTime<Utc>>,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,

    pub destination: String,
    pub arrival_date: Option<DateTime<Utc>>,
    pub receiver_name: Option<String>,
    pub receiver_address: Option<String>,

    pub status: ExpeditionStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    pub region_id: Option<Uuid>,
    pub district_id: Option<Uuid>,
    pub commune_id: Option<Uuid>,
    pub voting_center_id: Option<Uuid>,

    /// Creator
    pub user_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::region::Entity",
        from = "Column::RegionId",
        to = "super::region::Column::Id"
    )]
    Region,
    #[sea_orm(
        belongs_to = "super::district::Entity",
        from = "Column::DistrictId",
        to = "super::district::Column::Id"
    )]
    District,
    #[sea_orm(
        belongs_to = "super::commune::Entity",
        from = "Column::CommuneId",
        to = "super::commune::Column::Id"
    )]
    Commune,
    #[sea_orm(
        belongs_to = "super::voting_center::Entity",
        from = "Column::VotingCenterId",
        to = "super::voting_center::Column::Id"
    )]
    VotingCenter,
    #[sea_orm(has_many = "super::materiel::Entity")]
    Materiels,
    #[sea_orm(has_many = "super::movement::Entity")]
    Movements,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::region::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Region.def()
    }
}

impl Related<super::district::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::District.def()
    }
}

impl Related<super::commune::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commune.def()
    }
}

impl Related<super::voting_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VotingCenter.def()
    }
}

impl Related<super::materiel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Materiels.def()
    }
}

impl Related<super::movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
