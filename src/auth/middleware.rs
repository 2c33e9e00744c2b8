use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::error::{AppError, AppResult};
use crate::AppState;

/// The verified caller of a request, if a bearer token was sent.
#[derive(Debug, Clone, Default)]
pub struct Requester {
    pub uid: Option<String>,
}

impl Requester {
    /// Anonymous callers pass; an authenticated caller must be `user_id`.
    pub fn authorize(&self, user_id: &str) -> AppResult<()> {
        match &self.uid {
            Some(uid) if uid != user_id => Err(AppError::Forbidden),
            _ => Ok(()),
        }
    }

    /// The caller must be authenticated as `user_id`.
    pub fn require(&self, user_id: &str) -> AppResult<()> {
        match &self.uid {
            None => Err(AppError::Unauthorized),
            Some(uid) if uid != user_id => Err(AppError::Forbidden),
            Some(_) => Ok(()),
        }
    }
}

/// Resolve the optional bearer token into a [`Requester`] extension.
///
/// A missing header is anonymous; a present but invalid token is rejected.
pub async fn resolve_requester(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let uid = match bearer {
        Some(TypedHeader(Authorization(bearer))) if !bearer.token().trim().is_empty() => {
            Some(state.verifier.verify(bearer.token().trim())?)
        }
        _ => None,
    };

    req.extensions_mut().insert(Requester { uid });
    Ok(next.run(req).await)
}
