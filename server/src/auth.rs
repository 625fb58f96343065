// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

/// JWT claims. Tokens are issued elsewhere and signed with the shared secret.
///
/// Only `user_id` and `exp` are required; issuers that omit `sub` still work.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: String,
    pub user_id: i64,
    pub exp: usize,
}

/// The requesting user, inserted as a request extension by [`auth`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub username: String,
}

/// Rejects the request with 401 unless it carries a valid `Bearer` token.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

    let user = verify_token(token, &state.config.jwt_secret)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub fn verify_token(token: &str, secret: &str) -> Result<AuthenticatedUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding error during auth middleware.");
        AppError::Unauthorized("Given token not valid.".to_string())
    })?;

    let Claims { sub, user_id, .. } = token_data.claims;
    let username = if sub.is_empty() {
        format!("user-{}", user_id)
    } else {
        sub
    };
    Ok(AuthenticatedUser {
        id: user_id,
        username,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, exp: usize) -> String {
        let claims = Claims {
            sub: "alice".to_string(),
            user_id: 5,
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn in_an_hour() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_valid_token_yields_user() {
        let user = verify_token(&token("s3cret", in_an_hour()), "s3cret").unwrap();
        assert_eq!(user.id, 5);
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_token_without_sub_is_accepted() {
        let claims = serde_json::json!({
            "token_type": "access",
            "jti": "3f2b9c",
            "user_id": 12,
            "exp": in_an_hour(),
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("s3cret".as_bytes()),
        )
        .unwrap();

        let user = verify_token(&token, "s3cret").unwrap();
        assert_eq!(user.id, 12);
        assert_eq!(user.username, "user-12");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let err = verify_token(&token("s3cret", in_an_hour()), "other").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = (chrono::Utc::now().timestamp() - 3600) as usize;
        let err = verify_token(&token("s3cret", expired), "s3cret").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
