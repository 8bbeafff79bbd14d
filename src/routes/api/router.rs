use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

use super::{admin, auth, avatar, me, oauth, public, sessions};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(public::router())
        .merge(auth::router(state.clone()))
        .merge(oauth::router(state.clone()))
        .merge(me::router(state.clone()))
        .merge(avatar::router(state.clone()))
        .merge(sessions::router(state.clone()))
        .merge(admin::router(state))
}
