//! JWT token generation and validation

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::warn;

use mekan_common::config::AuthConfig;
use mekan_common::error::{Error, Result};
use mekan_common::types::TokenClaims;

/// JWT manager for token validation (and development issuance)
pub struct JwtManager {
    secret: Vec<u8>,
    issuer: String,
    audience: String,
    access_token_expiry: i64,
    algorithm: Algorithm,
}

impl JwtManager {
    /// Create a new JWT manager with the given configuration
    pub fn new(secret: &str, issuer: &str, audience: &str, access_token_expiry: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            access_token_expiry,
            algorithm: Algorithm::HS256,
        }
    }

    /// Build from the auth section, generating a secret when none is configured
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        let secret = match &config.jwt_secret {
            Some(secret) if secret.trim().is_empty() => {
                return Err(Error::ConfigError("auth.jwt_secret is empty".to_string()));
            }
            Some(secret) => secret.clone(),
            None => {
                warn!("auth.jwt_secret not set, generated an ephemeral secret");
                Self::generate_secret()
            }
        };

        let expiry = i64::try_from(config.jwt_expiry)
            .map_err(|_| Error::ConfigError("auth.jwt_expiry is too large".to_string()))?;

        Ok(Self::new(&secret, &config.issuer, &config.audience, expiry))
    }

    /// Generate a new JWT secret if none provided
    pub fn generate_secret() -> String {
        use base64::Engine;
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    }

    /// Issue an access token for a subject and its groups
    pub fn issue_token(
        &self,
        subject: &str,
        username: Option<&str>,
        groups: &[String],
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_expiry);

        let claims = TokenClaims {
            sub: subject.to_string(),
            username: username.map(str::to_string),
            groups: groups.to_vec(),
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let header = Header::new(self.algorithm);
        let token = encode(&header, &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|e| Error::InternalError(format!("Failed to encode JWT: {}", e)))?;

        Ok(token)
    }

    /// Validate and decode an access token
    pub fn validate_access_token(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let token_data =
            decode::<TokenClaims>(token, &DecodingKey::from_secret(&self.secret), &validation)
                .map_err(|e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
                    _ => Error::InvalidToken,
                })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret-key", "mekan", "mekan-api", 1800)
    }

    #[test]
    fn test_issue_and_validate() {
        let manager = manager();
        let groups = vec!["editors".to_string()];
        let token = manager.issue_token("42", Some("ayse"), &groups).unwrap();

        let claims = manager.validate_access_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username.as_deref(), Some("ayse"));
        assert_eq!(claims.groups, groups);
        assert_eq!(claims.exp - claims.iat, 1800);
    }

    #[test]
    fn test_invalid_token() {
        let result = manager().validate_access_token("invalid.token.here");
        assert!(matches!(result, Err(Error::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("other-secret", "mekan", "mekan-api", 1800)
            .issue_token("1", None, &[])
            .unwrap();
        assert!(matches!(
            manager().validate_access_token(&token),
            Err(Error::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let token = JwtManager::new("test-secret-key", "mekan", "someone-else", 1800)
            .issue_token("1", None, &[])
            .unwrap();
        assert!(manager().validate_access_token(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        // well past the default 60s validation leeway
        let expired = JwtManager::new("test-secret-key", "mekan", "mekan-api", -600);
        let token = expired.issue_token("1", None, &[]).unwrap();
        assert!(matches!(
            manager().validate_access_token(&token),
            Err(Error::TokenExpired)
        ));
    }

    #[test]
    fn test_from_config_generates_secret() {
        let config = AuthConfig::default();
        let manager = JwtManager::from_config(&config).unwrap();
        let token = manager.issue_token("1", None, &[]).unwrap();
        assert!(manager.validate_access_token(&token).is_ok());
    }

    #[test]
    fn test_from_config_rejects_blank_secret() {
        let config = AuthConfig {
            jwt_secret: Some("  ".to_string()),
            ..AuthConfig::default()
        };
        assert!(matches!(
            JwtManager::from_config(&config),
            Err(Error::ConfigError(_))
        ));
    }
}
