//! Request extractors
//!
//! [`AuthUser`] accepts any valid bearer token. [`AdminUser`] additionally
//! requires the `admin` role and answers 403 otherwise. [`JsonBody`] is
//! `Json` with rejections reported through [`HttpError`].

use crate::error::HttpError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::{FromRef, FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use folio_auth::{extract_token, AuthError, Claims};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

fn claims_from_parts(parts: &Parts, state: &AppState) -> Result<Claims, HttpError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .map(|value| value.to_str().map_err(|_| AuthError::invalid_token("Authorization header is not valid text")))
        .transpose()?;

    let token = extract_token(header)?.ok_or(AuthError::MissingToken)?;
    let claims = state.jwt.verify(&token)?;
    Ok(claims)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        claims_from_parts(parts, &state).map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let claims = claims_from_parts(parts, &state)?;
        if !claims.is_admin() {
            tracing::debug!(user = %claims.username, "Admin route refused");
            return Err(AuthError::access_denied("Administrator role required").into());
        }
        Ok(AdminUser(claims))
    }
}

/// JSON body whose rejections use the error envelope
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(HttpError::bad_request(rejection.body_text())),
        }
    }
}
