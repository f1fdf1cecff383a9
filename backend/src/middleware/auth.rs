//! Authentication middleware
//!
//! Verifies the bearer token and attaches the caller's [`AuthContext`] to the
//! request. Tokens are issued elsewhere; this server only checks them.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::{AuthContext, Role};

use crate::error::ErrorResponse;
use crate::AppState;

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    #[serde(default)]
    pub branch: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    fn into_context(self) -> Result<AuthContext, &'static str> {
        let user_id = uuid::Uuid::parse_str(&self.sub).map_err(|_| "Invalid user ID in token")?;
        let role = self
            .role
            .parse::<Role>()
            .map_err(|_| "Invalid role in token")?;
        let branch_id = match self.branch.as_deref() {
            Some(branch) if !branch.is_empty() => {
                Some(uuid::Uuid::parse_str(branch).map_err(|_| "Invalid branch ID in token")?)
            }
            _ => None,
        };
        Ok(AuthContext::new(user_id, role, branch_id))
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_jwt(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(msg) => return unauthorized_response(&msg),
    };

    let ctx = match claims.into_context() {
        Ok(ctx) => ctx,
        Err(msg) => return unauthorized_response(msg),
    };

    request.extensions_mut().insert(ctx);

    next.run(request).await
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("UNAUTHORIZED", message)),
    )
        .into_response()
}

/// Extractor for the authenticated caller
#[derive(Clone, Copy, Debug)]
pub struct CurrentUser(pub AuthContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .map(CurrentUser)
            .ok_or_else(|| {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse::new("UNAUTHORIZED", "Authentication required")),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(role: &str, branch: Option<&str>) -> Claims {
        Claims {
            sub: uuid::Uuid::new_v4().to_string(),
            role: role.to_string(),
            branch: branch.map(str::to_string),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_claims_map_to_context() {
        let branch = uuid::Uuid::new_v4();
        let ctx = claims("manager", Some(&branch.to_string()))
            .into_context()
            .unwrap();
        assert_eq!(ctx.role, Role::Manager);
        assert_eq!(ctx.branch_id, Some(branch));
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(claims("owner", None).into_context().is_err());
    }

    #[test]
    fn test_empty_branch_means_unscoped() {
        let ctx = claims("admin", Some("")).into_context().unwrap();
        assert_eq!(ctx.branch_id, None);
    }
}
