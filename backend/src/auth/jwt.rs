use super::models::{AuthUser, Claims};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
    #[error("JWT decoding error: {0}")]
    Decoding(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid subject in token: {0}")]
    InvalidSubject(String),
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::hours(TOKEN_TTL_HOURS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn generate_token(&self, user: &AuthUser) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + self.ttl;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            exp: expiration.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(JwtError::Encoding)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, JwtError> {
        if token.is_empty() || token.split('.').count() != 3 {
            return Err(JwtError::InvalidToken);
        }

        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp() as usize;
                log::debug!(
                    "JWT token decoded. User: {}, Exp: {}, Now: {}",
                    token_data.claims.sub,
                    token_data.claims.exp,
                    now
                );

                if token_data.claims.exp < now {
                    log::warn!("JWT token expired. Exp: {}, Now: {}", token_data.claims.exp, now);
                    return Err(JwtError::TokenExpired);
                }
                Ok(token_data.claims)
            }
            Err(err) => {
                log::debug!("JWT token decode error: {:?}", err);
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(JwtError::TokenExpired),
                    jsonwebtoken::errors::ErrorKind::InvalidToken
                    | jsonwebtoken::errors::ErrorKind::InvalidSignature => Err(JwtError::InvalidToken),
                    _ => Err(JwtError::Decoding(err.to_string())),
                }
            }
        }
    }

    /// Verifies the token and returns the user id it was issued to.
    pub fn verify_user_id(&self, token: &str) -> Result<Uuid, JwtError> {
        let claims = self.verify_token(token)?;
        Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidSubject(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "guru@example.com".into(),
            name: "Guru".into(),
        }
    }

    #[test]
    fn issued_tokens_verify_to_the_same_user() {
        let service = JwtService::new("secret");
        let user = user();
        let token = service.generate_token(&user).unwrap();
        assert_eq!(service.verify_user_id(&token).unwrap(), user.id);
        assert_eq!(service.verify_token(&token).unwrap().email, user.email);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let token = JwtService::new("one").generate_token(&user()).unwrap();
        assert!(matches!(
            JwtService::new("two").verify_token(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn malformed_and_expired_tokens_are_rejected() {
        let service = JwtService::new("secret");
        assert!(matches!(service.verify_token(""), Err(JwtError::InvalidToken)));
        assert!(matches!(service.verify_token("a.b"), Err(JwtError::InvalidToken)));

        let expired = JwtService::with_ttl("secret", Duration::hours(-2))
            .generate_token(&user())
            .unwrap();
        assert!(matches!(service.verify_token(&expired), Err(JwtError::TokenExpired)));
    }
}
