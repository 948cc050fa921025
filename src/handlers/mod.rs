pub mod actions;
pub mod common;
pub mod dashboard;
pub mod expeditions;
pub mod geography;
pub mod materiel_types;
pub mod movements;
pub mod users;

use crate::events::EventSender;
use crate::logging::component_logger;
use crate::services::{
    dashboard::DashboardService, expeditions::ExpeditionService, geography::GeographyService,
    materiel_types::MaterielTypeService, movements::MovementService, users::UserService,
};
use crate::db::DbPool;
use slog::Logger;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub expeditions: Arc<ExpeditionService>,
    pub movements: Arc<MovementService>,
    pub geography: Arc<GeographyService>,
    pub materiel_types: Arc<MaterielTypeService>,
    pub users: Arc<UserService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// `users` is shared with the auth layer so both mirror identities the same way.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        users: Arc<UserService>,
        base_logger: Logger,
    ) -> Self {
        Self {
            expeditions: Arc::new(ExpeditionService::new(
                db_pool.clone(),
                event_sender,
                component_logger(&base_logger, "expedition_service"),
            )),
            movements: Arc::new(MovementService::new(db_pool.clone())),
            geography: Arc::new(GeographyService::new(
                db_pool.clone(),
                component_logger(&base_logger, "geography_service"),
            )),
            materiel_types: Arc::new(MaterielTypeService::new(
                db_pool.clone(),
                component_logger(&base_logger, "materiel_type_service"),
            )),
            users,
            dashboard: Arc::new(DashboardService::new(db_pool)),
        }
    }
}
