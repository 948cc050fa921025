use chrono::{Datelike, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use rand::RngCore;
use regex::Regex;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::future::Future;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::expedition;

/// Upper bound on candidates tried before giving up.
pub const MAX_NUMBER_ATTEMPTS: usize = 16;

static NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^EXP-\d{4}-[0-9A-F]{6}$").expect("valid expedition number regex"));

/// Formats `EXP-<year>-<hex>` from three random bytes.
pub fn format_number(year: i32, suffix: [u8; 3]) -> String {
    format!("EXP-{:04}-{}", year, hex::encode_upper(suffix))
}

/// Fresh candidate for the current UTC year.
pub fn candidate_number() -> String {
    let mut suffix = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut suffix);
    format_number(Utc::now().year(), suffix)
}

pub fn is_valid_number(number: &str) -> bool {
    NUMBER_PATTERN.is_match(number)
}

async fn number_in_use<C: ConnectionTrait>(db: &C, number: &str) -> Result<bool, ServiceError> {
    let count = expedition::Entity::find()
        .filter(expedition::Column::Number.eq(number))
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(count > 0)
}

/// Picks an unused number and hands it to `insert`.
///
/// The pre-check only avoids obvious collisions. Two writers can still pick the
/// same candidate, in which case the unique index rejects the second insert and
/// a new candidate is drawn.
pub async fn allocate<C, G, F, Fut, T>(
    db: &C,
    mut generate: G,
    mut insert: F,
) -> Result<T, ServiceError>
where
    C: ConnectionTrait,
    G: FnMut() -> String,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    for attempt in 1..=MAX_NUMBER_ATTEMPTS {
        let candidate = generate();

        if number_in_use(db, &candidate).await? {
            debug!(attempt, %candidate, "expedition number already taken");
            counter!("expedition_api.expedition.number_collisions", 1);
            continue;
        }

        match insert(candidate.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_unique_violation() => {
                warn!(attempt, %candidate, "expedition number claimed concurrently");
                counter!("expedition_api.expedition.number_collisions", 1);
            }
            Err(err) => return Err(err),
        }
    }

    Err(ServiceError::Conflict(format!(
        "Could not allocate a unique expedition number after {} attempts",
        MAX_NUMBER_ATTEMPTS
    )))
}
