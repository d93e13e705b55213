use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::types::{AuthError, Claims};

/// Verifies access tokens issued by the marketplace's identity service.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Creates a verifier keyed by the `JWT_SECRET` environment variable.
    pub fn new() -> Self {
        let secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-this-in-production".to_string());

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    /// Validates the token's signature and expiry and returns its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data = decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(token_data.claims)
    }

    /// Validates the token and returns the caller's user id.
    pub fn extract_user_id_from_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.verify_token(token)?;
        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token_for(sub: &str, secret: &str, expires_in_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + expires_in_secs) as usize,
            iat: now as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_ref()),
        )
        .unwrap()
    }

    fn verifier(secret: &str) -> JwtService {
        JwtService {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }

    #[test]
    fn accepts_a_valid_token() {
        let user_id = Uuid::new_v4();
        let token = token_for(&user_id.to_string(), "test-secret", 3600);

        let extracted = verifier("test-secret")
            .extract_user_id_from_token(&token)
            .unwrap();

        assert_eq!(extracted, user_id);
    }

    #[test]
    fn rejects_a_token_signed_with_another_key() {
        let token = token_for(&Uuid::new_v4().to_string(), "other-secret", 3600);

        let result = verifier("test-secret").extract_user_id_from_token(&token);

        assert!(matches!(result, Err(AuthError::Jwt(_))));
    }

    #[test]
    fn rejects_an_expired_token() {
        let token = token_for(&Uuid::new_v4().to_string(), "test-secret", -3600);

        let result = verifier("test-secret").extract_user_id_from_token(&token);

        assert!(matches!(result, Err(AuthError::Jwt(_))));
    }

    #[test]
    fn rejects_a_non_uuid_subject() {
        let token = token_for("not-a-uuid", "test-secret", 3600);

        let result = verifier("test-secret").extract_user_id_from_token(&token);

        assert!(matches!(result, Err(AuthError::InvalidSubject)));
    }
}
