//! JWT issuance/verification and password hashing for the registration
//! and login flow (§6). Shaped after a conventional bearer-auth module:
//! short-lived HS256 tokens and bcrypt-hashed passwords, with a `Claims`
//! struct carrying this domain's `sub` + `is_admin`.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — the user id.
    pub sub: Uuid,
    pub is_admin: bool,
    /// Expiration, seconds since epoch.
    pub exp: usize,
}

/// Wraps a signing secret and TTL; issues/validates HS256 bearer tokens.
pub struct JwtHandler {
    secret: String,
    ttl_secs: i64,
}

impl JwtHandler {
    pub fn new(secret: String, ttl_secs: i64) -> Self {
        Self { secret, ttl_secs }
    }

    /// Returns the signed token and its TTL in seconds (for the
    /// `expires_in` field of `TokenResponse`).
    pub fn issue(&self, user_id: Uuid, is_admin: bool) -> anyhow::Result<(String, i64)> {
        let exp = (Utc::now().timestamp() + self.ttl_secs) as usize;
        let claims = Claims {
            sub: user_id,
            is_admin,
            exp,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))?;
        Ok((token, self.ttl_secs))
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &Validation::default())?;
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 16-hex-char digest used as the `jwt:<hash16>` cache key (§6) so a
/// validated token's claims can be reused without re-verifying the
/// signature on every request within the TTL window.
pub fn token_cache_key(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_bytes());
    format!("jwt:{}", hex::encode(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_and_round_trips_claims() {
        let handler = JwtHandler::new("test-secret".to_string(), 3600);
        let user_id = Uuid::new_v4();
        let (token, ttl) = handler.issue(user_id, true).expect("issue");
        assert_eq!(ttl, 3600);

        let claims = handler.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert!(claims.is_admin);
    }

    #[test]
    fn token_signed_with_different_secret_is_rejected() {
        let a = JwtHandler::new("secret-a".to_string(), 3600);
        let b = JwtHandler::new("secret-b".to_string(), 3600);
        let (token, _) = a.issue(Uuid::new_v4(), false).expect("issue");
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let handler = JwtHandler::new("test-secret".to_string(), -10);
        let (token, _) = handler.issue(Uuid::new_v4(), false).expect("issue");
        assert!(handler.verify(&token).is_err());
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("hunter22").expect("hash");
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn token_cache_key_is_stable_and_short() {
        let k1 = token_cache_key("abc.def.ghi");
        let k2 = token_cache_key("abc.def.ghi");
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), "jwt:".len() + 16);
    }
}
