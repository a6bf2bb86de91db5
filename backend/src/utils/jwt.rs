use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub roles: Vec<String>,
    /// Token version; must match `users.token_version` for the token to be honoured.
    pub tv: i32,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    pub fn new(
        user_id: String,
        username: String,
        roles: Vec<String>,
        token_version: i32,
        expiration_hours: u64,
    ) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);

        Self {
            sub: user_id,
            username,
            roles,
            tv: token_version,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

pub fn create_access_token(claims: &Claims, secret: &str) -> anyhow::Result<String> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

pub fn verify_access_token(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let validation = Validation::default();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a_secure_token_that_is_long_enough_123";

    #[test]
    fn create_and_verify_carries_roles_and_version() {
        let claims = Claims::new(
            "user-123".into(),
            "bob".into(),
            vec!["ROLE_ADMIN".into(), "ROLE_USER".into()],
            3,
            1,
        );
        let token = create_access_token(&claims, SECRET).expect("create token");
        let decoded = verify_access_token(&token, SECRET).expect("verify token");
        assert_eq!(decoded.sub, "user-123");
        assert_eq!(decoded.username, "bob");
        assert_eq!(decoded.tv, 3);
        assert!(decoded.has_role("ROLE_ADMIN"));
        assert!(!decoded.has_role("ROLE_AUDITOR"));
    }

    #[test]
    fn verify_rejects_other_secret() {
        let claims = Claims::new("u".into(), "u".into(), vec![], 1, 1);
        let token = create_access_token(&claims, SECRET).expect("create token");
        assert!(verify_access_token(&token, "another_secret_that_is_also_long_enough").is_err());
    }
}
