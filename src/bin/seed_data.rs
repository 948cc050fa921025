//! Seed data script - populates reference tables
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - the standard electoral materiel catalog
//! - the six former provinces as regions
//! - sample districts of Antananarivo
//!
//! Rows are matched on their code, so running it twice is harmless.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::time::Duration as StdDuration;
use tracing::info;
use uuid::Uuid;

use expedition_api::models::{district, materiel_type, region};

const MATERIEL_TYPES: &[(&str, &str, &str, &str)] = &[
    ("URNE", "Urne électorale", "Urne", "Urne pour le dépôt des bulletins de vote"),
    ("ISOLOIR", "Isoloir", "Isoloir", "Cabine d'isolement pour le vote"),
    ("BULLETIN", "Bulletin de vote", "Document", "Bulletin de vote officiel"),
    ("ENVELOPPE", "Enveloppe électorale", "Document", "Enveloppe pour le bulletin de vote"),
    ("LISTE_ELECTEUR", "Liste électorale", "Document", "Liste des électeurs inscrits"),
    ("CRAYON", "Crayon de vote", "Équipement", "Crayon pour marquer le bulletin"),
    ("TAMPON", "Tampon encreur", "Équipement", "Tampon pour marquer les documents"),
    ("SCELLE", "Scellé de sécurité", "Sécurité", "Scellé pour sécuriser les urnes"),
    ("FICHE_RECENSEMENT", "Fiche de recensement", "Document", "Fiche pour recenser les votes"),
    ("PROCES_VERBAL", "Procès-verbal", "Document", "Procès-verbal de dépouillement"),
];

// Antsiranana gets its own code so both provinces survive the unique index.
const REGIONS: &[(&str, &str, &str)] = &[
    ("ANT", "Antananarivo", "Antananarivo"),
    ("ASR", "Antsiranana", "Antsiranana"),
    ("FIA", "Fianarantsoa", "Fianarantsoa"),
    ("MAH", "Mahajanga", "Mahajanga"),
    ("TOA", "Toamasina", "Toamasina"),
    ("TOL", "Toliara", "Toliara"),
];

const ANTANANARIVO_DISTRICTS: &[(&str, &str, &str)] = &[
    ("ANT-001", "Antananarivo-Atsimondrano", "Antananarivo"),
    ("ANT-002", "Antananarivo-Avaradrano", "Antananarivo"),
    ("ANT-003", "Antananarivo-Renivohitra", "Antananarivo"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("=== Expedition API Seed Data ===");

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://expeditions.db?mode=rwc".to_string());

    let mut options = ConnectOptions::new(database_url.clone());
    options
        .max_connections(5)
        .min_connections(1)
        .connect_timeout(StdDuration::from_secs(10))
        .acquire_timeout(StdDuration::from_secs(10));

    info!("Connecting to database: {}", database_url);
    let db = Database::connect(options).await?;
    expedition_api::db::run_migrations(&db).await?;

    info!("Creating materiel types...");
    let created = seed_materiel_types(&db).await?;
    info!("  Created {} materiel types", created);

    info!("Creating regions...");
    let created = seed_regions(&db).await?;
    info!("  Created {} regions", created);

    info!("Creating sample districts...");
    let created = seed_districts(&db).await?;
    info!("  Created {} districts", created);

    info!("=== Seed Data Complete ===");
    Ok(())
}

async fn seed_materiel_types(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let now = Utc::now();
    let mut created = 0;

    for (code, name, category, description) in MATERIEL_TYPES {
        let existing = materiel_type::Entity::find()
            .filter(materiel_type::Column::Code.eq(*code))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        materiel_type::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            category: Set(Some(category.to_string())),
            description: Set(Some(description.to_string())),
            unit: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        created += 1;
    }

    Ok(created)
}

async fn seed_regions(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let now = Utc::now();
    let mut created = 0;

    for (code, name, capital) in REGIONS {
        let existing = region::Entity::find()
            .filter(region::Column::Code.eq(*code))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        region::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            capital: Set(Some(capital.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        created += 1;
    }

    Ok(created)
}

async fn seed_districts(db: &DatabaseConnection) -> anyhow::Result<usize> {
    let Some(antananarivo) = region::Entity::find()
        .filter(region::Column::Code.eq("ANT"))
        .one(db)
        .await?
    else {
        info!("  Region ANT missing, skipping districts");
        return Ok(0);
    };

    let now = Utc::now();
    let mut created = 0;

    for (code, name, capital) in ANTANANARIVO_DISTRICTS {
        let existing = district::Entity::find()
            .filter(district::Column::Code.eq(*code))
            .one(db)
            .await?;
        if existing.is_some() {
            continue;
        }

        district::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            capital: Set(Some(capital.to_string())),
            region_id: Set(antananarivo.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;
        created += 1;
    }

    Ok(created)
}
