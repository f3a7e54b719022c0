//! HTTP handlers, one module per resource. Each exposes `routes()`, merged here into
//! the API router.

use axum::Router;

use crate::state::AppState;

mod auth;
mod facilities;
mod health;
mod images;
mod messages;
mod notifications;
mod reports;
mod residents;
mod users;
mod visits;

#[cfg(test)]
pub mod testing;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes())
        .merge(users::routes())
        .merge(residents::routes())
        .merge(facilities::routes())
        .merge(reports::routes())
        .merge(images::routes())
        .merge(messages::routes())
        .merge(visits::routes())
        .merge(notifications::routes())
}
