use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    error::AppError,
    models::user::User,
    repositories::UserRepository,
    state::AppState,
    types::UserId,
    utils::{
        cookies::{extract_cookie_value, ACCESS_COOKIE_NAME},
        jwt::{verify_access_token, Claims},
    },
};

/// Routes a user with a pending forced password change may still reach.
const PASSWORD_CHANGE_ALLOWED: &[&str] = &["/api/auth/change-password", "/api/auth/me"];

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    enforce_password_change(&user, request.uri().path())?;

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Auth plus `ROLE_ADMIN`.
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    enforce_password_change(&user, request.uri().path())?;
    if !user.is_admin() {
        tracing::warn!(user_id = %user.id, path = %request.uri().path(), "Admin route refused");
        return Err(AppError::Forbidden("Administrator role required".into()));
    }

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Cookie session for the HTML views: failures redirect instead of
/// returning JSON.
pub async fn view_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match authenticate_request(request.headers(), &state).await {
        Ok((claims, user)) => {
            request.extensions_mut().insert(claims);
            user
        }
        Err(_) => return Redirect::to("/login").into_response(),
    };
    if user.requires_password_change && request.uri().path() != "/change-password" {
        return Redirect::to("/change-password").into_response();
    }
    request.extensions_mut().insert(user);
    next.run(request).await
}

pub fn enforce_password_change(user: &User, path: &str) -> Result<(), AppError> {
    if user.requires_password_change && !PASSWORD_CHANGE_ALLOWED.contains(&path) {
        return Err(AppError::PasswordChangeRequired);
    }
    Ok(())
}

pub fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        let token = rest.trim();
        return (!token.is_empty()).then_some(token);
    }
    None
}

/// Bearer header first, then the view session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(header::COOKIE)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| extract_cookie_value(raw, ACCESS_COOKIE_NAME))
        })
}

async fn authenticate_request(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<(Claims, User), AppError> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing access token".into()))?;
    let claims = verify_access_token(&token, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;
    let user_id: UserId = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user = UserRepository::new()
        .find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;
    if !user.active {
        return Err(AppError::Unauthorized("Account is inactive".into()));
    }
    if claims.tv != user.token_version {
        tracing::debug!(user_id = %user.id, "Rejected token from an older token version");
        return Err(AppError::Unauthorized("Token has been revoked".into()));
    }

    Ok((claims, user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(requires_password_change: bool) -> User {
        User {
            id: UserId::new(),
            username: "anna".into(),
            password_hash: "hash".into(),
            email: None,
            active: true,
            default_seller_id: None,
            token_version: 1,
            requires_password_change,
            last_password_changed_at: None,
            last_password_reset_at: None,
            roles: vec!["ROLE_USER".into()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
    }

    #[test]
    fn cookie_is_used_when_header_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; access_token=tok".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("tok"));

        headers.insert(header::AUTHORIZATION, "Bearer header-tok".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("header-tok"));
    }

    #[test]
    fn pending_password_change_blocks_everything_but_two_routes() {
        let pending = user(true);
        assert!(enforce_password_change(&pending, "/api/auth/me").is_ok());
        assert!(enforce_password_change(&pending, "/api/auth/change-password").is_ok());
        assert!(matches!(
            enforce_password_change(&pending, "/api/v1/clients"),
            Err(AppError::PasswordChangeRequired)
        ));
        assert!(enforce_password_change(&user(false), "/api/v1/clients").is_ok());
    }
}
