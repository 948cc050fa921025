use sea_orm::{
    sea_query::{NullOrdering, Order},
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    errors::ServiceError,
    models::{expedition, materiel, user, ExpeditionStatus},
};

/// Shipments shown in the "recent" panel.
pub const RECENT_EXPEDITIONS: u64 = 6;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct DashboardTotals {
    pub expeditions: u64,
    pub materiels: u64,
    pub in_transit: u64,
    pub received: u64,
    pub damaged: u64,
    pub lost: u64,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub totals: DashboardTotals,
    /// Newest departures first; shipments without a departure date come last
    pub recent: Vec<(expedition::Model, Option<user::Model>)>,
}

/// Read-only aggregate counts for the landing page
#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<Dashboard, ServiceError> {
        let db = &*self.db_pool;

        let count_status = |status: ExpeditionStatus| {
            expedition::Entity::find()
                .filter(expedition::Column::Status.eq(status))
                .count(db)
        };

        let totals = DashboardTotals {
            expeditions: expedition::Entity::find()
                .count(db)
                .await
                .map_err(ServiceError::db_error)?,
            materiels: materiel::Entity::find()
                .count(db)
                .await
                .map_err(ServiceError::db_error)?,
            in_transit: count_status(ExpeditionStatus::InTransit)
                .await
                .map_err(ServiceError::db_error)?,
            received: count_status(ExpeditionStatus::Received)
                .await
                .map_err(ServiceError::db_error)?,
            damaged: count_status(ExpeditionStatus::Damaged)
                .await
                .map_err(ServiceError::db_error)?,
            lost: count_status(ExpeditionStatus::Lost)
                .await
                .map_err(ServiceError::db_error)?,
        };

        let recent = expedition::Entity::find()
            .find_also_related(user::Entity)
            .order_by_with_nulls(
                expedition::Column::DepartureDate,
                Order::Desc,
                NullOrdering::Last,
            )
            .order_by_desc(expedition::Column::CreatedAt)
            .limit(RECENT_EXPEDITIONS)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(Dashboard { totals, recent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::models::UserRole;
    use chrono::{Duration, Utc};
    use sea_orm::{ActiveModelTrait, Set};
    use uuid::Uuid;

    #[tokio::test]
    async fn counts_and_orders_recent_departures() {
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
            email: Set("dir@ceni.mg".into()),
            name: Set("Directeur".into()),
            role: Set(UserRole::Director),
            phone: Set(None),
            position: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&db)
        .await
        .unwrap();

        let shipments = [
            ("EXP-2024-000001", ExpeditionStatus::InTransit, Some(now - Duration::days(3))),
            ("EXP-2024-000002", ExpeditionStatus::Lost, Some(now - Duration::days(1))),
            ("EXP-2024-000003", ExpeditionStatus::Draft, None),
        ];
        for (number, status, departure) in shipments {
            expedition::ActiveModel {
                id: Set(Uuid::new_v4()),
                number: Set(number.into()),
                designation: Set(number.into()),
                origin: Set(String::new()),
                departure_date: Set(departure),
                sender_name: Set(None),
                sender_address: Set(None),
                destination: Set(String::new()),
                arrival_date: Set(None),
                receiver_name: Set(None),
                receiver_address: Set(None),
                status: Set(status),
                notes: Set(None),
                region_id: Set(None),
                district_id: Set(None),
                commune_id: Set(None),
                voting_center_id: Set(None),
                user_id: Set(owner.id),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&db)
            .await
            .unwrap();
        }

        let dashboard = DashboardService::new(Arc::new(db)).overview().await.unwrap();
        assert_eq!(dashboard.totals.expeditions, 3);
        assert_eq!(dashboard.totals.in_transit, 1);
        assert_eq!(dashboard.totals.lost, 1);
        assert_eq!(dashboard.totals.received, 0);

        let order: Vec<&str> = dashboard
            .recent
            .iter()
            .map(|(e, _)| e.number.as_str())
            .collect();
        assert_eq!(
            order,
            vec!["EXP-2024-000002", "EXP-2024-000001", "EXP-2024-000003"]
        );
        assert!(dashboard.recent.iter().all(|(_, u)| u.is_some()));
    }
}
