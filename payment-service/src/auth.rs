use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by caller tokens. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
}

/// Verifies HS256 bearer tokens issued by the platform's auth service.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &[u8], sub: &str, expires_in: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + expires_in).timestamp() as u64,
            iat: Some(now.timestamp() as u64),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn accepts_token_signed_with_secret() {
        let verifier = JwtVerifier::new(b"secret");
        let claims = verifier.verify(&token(b"secret", "alice", Duration::hours(1))).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn rejects_foreign_signature() {
        let verifier = JwtVerifier::new(b"secret");
        assert!(verifier.verify(&token(b"other", "alice", Duration::hours(1))).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = JwtVerifier::new(b"secret");
        assert!(verifier.verify(&token(b"secret", "alice", Duration::hours(-2))).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(JwtVerifier::new(b"secret").verify("not-a-jwt").is_err());
    }
}
