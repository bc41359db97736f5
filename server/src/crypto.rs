use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use taskhive_core::user::UserRecord;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens for the REST API.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        let secret = if secret.trim().is_empty() {
            warn!("TASKHIVE_JWT_SECRET is empty; tokens will not survive a restart");
            format!("{}{}", Uuid::new_v4(), Uuid::new_v4())
        } else {
            secret.to_owned()
        };

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    pub fn issue(&self, user: &UserRecord) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_owned(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("sign access token")
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("verify access token")?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use taskhive_core::{ids::UserId, user::UserRole};

    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            id: UserId::from("user-1"),
            email: "a@example.com".into(),
            name: None,
            password_hash: String::new(),
            role: UserRole::Admin,
            active: true,
            permissions: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn issued_tokens_verify_with_claims() {
        let signer = TokenSigner::new("secret", 60);
        let token = signer.issue(&user()).expect("issue");
        let claims = signer.verify(&token).expect("verify");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let token = TokenSigner::new("one", 60).issue(&user()).expect("issue");
        assert!(TokenSigner::new("two", 60).verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_tokens() {
        let signer = TokenSigner::new("secret", 60);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "user-1".into(),
            email: "a@example.com".into(),
            role: "user".into(),
            iat: now - 120,
            exp: now - 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .expect("encode");
        assert!(signer.verify(&token).is_err());
        assert!(signer.verify("not-a-token").is_err());
    }
}
