pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod mood;
pub mod notifier;
pub mod sessions;
pub mod store;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::FromRef,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

pub use client::{ClientState, SessionClient, SessionSnapshot};
pub use error::SessionError;
pub use model::{InviteCode, Participant, Session, SessionPatch, Task};
pub use notifier::{ChangeNotifier, Notifier, SessionUpdated, Subscription};
pub use store::SessionStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub notifier: Notifier,
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/moods", get(mood::palette))
        .merge(sessions::router())
        .layer(cors)
        .with_state(state)
}

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(err) = self.0.downcast_ref::<SessionError>() {
            return (err.status(), err.to_string()).into_response();
        }

        error!("request failed: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{}\n\n{}", self.0, self.0.backtrace()),
        )
            .into_response()
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(SessionError);
