pub mod dashboard;
pub mod expeditions;
pub mod geography;
pub mod manifest;
pub mod materiel_types;
pub mod movements;
pub mod numbering;
pub mod reconcile;
pub mod users;

use sea_orm::sea_query::{Expr, Func, IntoColumnRef, SimpleExpr};

/// Case-insensitive substring match that behaves the same on SQLite and Postgres.
pub(crate) fn ci_contains<C: IntoColumnRef>(column: C, needle: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(format!("%{}%", needle.to_lowercase()))
}

/// Trimmed, non-empty search term.
pub(crate) fn search_term(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
