use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "admin")]
    Operator,
    #[serde(alias = "student")]
    Occupant,
}

/// Identity supplied by the upstream identity provider. Trusted as given.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

fn authenticate(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))
}

async fn require_role(
    state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    role: Role,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::AuthenticationError("Unauthorized".to_string()))?;
    let claims = authenticate(bearer.token(), &state.auth.secret)?;

    if claims.role != role {
        return Err(AppError::AuthorizationError(match role {
            Role::Occupant => "Operators should use the admin dashboard".to_string(),
            Role::Operator => "Admin access required".to_string(),
        }));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Occupant Authentication Middleware
// ============================================================================

pub async fn occupant_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(&state, bearer, Role::Occupant, req, next).await
}

// ============================================================================
// Operator Authentication Middleware
// ============================================================================

pub async fn operator_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(&state, bearer, Role::Operator, req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(role: &str, secret: &str) -> String {
        let claims = serde_json::json!({
            "sub": "user-1",
            "role": role,
            "exp": chrono::Utc::now().timestamp() + 600,
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_legacy_role_names_are_accepted() {
        assert_eq!(authenticate(&token("admin", "s"), "s").unwrap().role, Role::Operator);
        assert_eq!(authenticate(&token("student", "s"), "s").unwrap().role, Role::Occupant);
        assert_eq!(authenticate(&token("occupant", "s"), "s").unwrap().role, Role::Occupant);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        assert!(matches!(
            authenticate(&token("occupant", "s"), "other"),
            Err(AppError::AuthenticationError(_))
        ));
    }
}
