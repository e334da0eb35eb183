//! Bearer sessions kept in redis, and the extractors that resolve them to users.

use axum::{
    async_trait,
    extract::{Extension, FromRequestParts},
    http::{header, request::Parts},
};
use entity::user_account;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::actions;
use crate::constants::SESSION_KEY_PREFIX;
use crate::error::ServerError;
use crate::server::State;
use crate::utils::RKeys;

/// What a session key points at in redis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct SessionUser {
    pub(crate) user_id: i32,
}

crate::impl_redis_rv!(SessionUser);

/// Store a new session for `user_id` and return the bearer token handed to the client.
pub(crate) async fn create_session(state: &State, user_id: i32) -> Result<String, ServerError> {
    let RKeys {
        base_key,
        prefixed_key,
    } = RKeys::generate(SESSION_KEY_PREFIX);

    let mut conn = state.redis_client.get_multiplexed_async_connection().await?;
    conn.set_ex::<_, _, ()>(
        &prefixed_key,
        SessionUser { user_id },
        state.config.session_duration_secs(),
    )
    .await?;
    Ok(base_key)
}

pub(crate) async fn revoke_session(state: &State, token: &str) -> Result<(), ServerError> {
    let mut conn = state.redis_client.get_multiplexed_async_connection().await?;
    conn.del::<_, ()>(RKeys::prefixed(SESSION_KEY_PREFIX, token))
        .await?;
    Ok(())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

async fn state_of<S: Send + Sync>(parts: &mut Parts, state: &S) -> Result<Arc<State>, ServerError> {
    let Extension(state) = Extension::<Arc<State>>::from_request_parts(parts, state)
        .await
        .map_err(|_| ServerError::Internal("State extension missing".to_string()))?;
    Ok(state)
}

/// An active user authenticated by a bearer session token.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub(crate) user: user_account::Model,
    pub(crate) token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = state_of(parts, state).await?;
        let token = bearer_token(parts)
            .ok_or_else(ServerError::invalid_credentials)?
            .to_string();

        let mut conn = state.redis_client.get_multiplexed_async_connection().await?;
        let session: Option<SessionUser> = conn
            .get(RKeys::prefixed(SESSION_KEY_PREFIX, &token))
            .await?;
        let session = session.ok_or_else(ServerError::invalid_credentials)?;

        let user = actions::user::find_by_id(&state.db, session.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(ServerError::invalid_credentials)?;

        Ok(CurrentUser { user, token })
    }
}

/// A [`CurrentUser`] with admin rights.
#[derive(Debug, Clone)]
pub(crate) struct AdminUser(pub(crate) CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.is_admin {
            return Err(ServerError::Forbidden("Not enough permissions".to_string()));
        }
        Ok(AdminUser(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/auth/me");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_tokens_are_read_from_the_header() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc123"))), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("bearer abc123 "))), Some("abc123"));
        assert_eq!(bearer_token(&parts_with(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts_with(None)), None);
    }

    #[test]
    fn session_values_round_trip_through_redis_encoding() {
        use redis::{FromRedisValue, ToRedisArgs};

        let session = SessionUser { user_id: 42 };
        let args = session.to_redis_args();
        let stored = redis::Value::Data(args[0].clone());
        assert_eq!(SessionUser::from_redis_value(&stored).unwrap(), session);
        assert!(SessionUser::from_redis_value(&redis::Value::Nil).is_err());
    }
}
