//! Signed bearer tokens: issue, verify, revoke.

use anyhow::Context;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::models::User;

use super::revocation::RevocationCache;

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub iss: String,
    pub sub: String,
    /// Unique per token.
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// RSA private key in PEM form; generated at startup when absent.
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    pub access_expiry_hours: i64,
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            private_key_pem: None,
            public_key_pem: None,
            access_expiry_hours: 24,
            issuer: "apigate".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: i64,
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    public_key_pem: String,
    access_expiry_secs: i64,
    issuer: String,
    revoked: RevocationCache,
}

impl TokenService {
    pub fn new(config: TokenConfig, revoked: RevocationCache) -> anyhow::Result<Self> {
        let (private_pem, public_pem) = match (&config.private_key_pem, &config.public_key_pem) {
            (Some(private), Some(public)) => (private.clone(), public.clone()),
            _ => {
                tracing::info!("no RSA key pair configured, generating one for this process");
                generate_key_pair()?
            }
        };

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .context("failed to parse RSA private key PEM")?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .context("failed to parse RSA public key PEM")?;

        Ok(Self {
            encoding_key,
            decoding_key,
            public_key_pem: public_pem,
            access_expiry_secs: config.access_expiry_hours * 3600,
            issuer: config.issuer,
            revoked,
        })
    }

    pub fn issue(&self, user: &User) -> Result<TokenGrant, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role.clone(),
            iss: self.issuer.clone(),
            sub: user.id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            nbf: now,
            exp: now + self.access_expiry_secs,
        };

        let token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("failed to sign token: {e}")))?;

        Ok(TokenGrant {
            access_token: token,
            expires_in: self.access_expiry_secs,
        })
    }

    /// Full verification: signature, expected algorithm, revocation,
    /// expiry and not-before.
    pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        if self.revoked.contains(&fingerprint(token)).await {
            return Err(AppError::TokenInvalid);
        }

        self.decode_claims(token)
    }

    /// Registers the token fingerprint for its remaining lifetime.
    /// A token that no longer verifies is registered anyway, for the
    /// full access lifetime.
    pub async fn revoke(&self, token: &str) {
        let ttl_secs = match self.decode_claims(token) {
            Ok(claims) => claims.exp - Utc::now().timestamp(),
            Err(_) => self.access_expiry_secs,
        };

        if ttl_secs <= 0 {
            return;
        }

        self.revoked
            .insert(
                fingerprint(token),
                std::time::Duration::from_secs(ttl_secs as u64),
            )
            .await;
    }

    /// PEM-encoded public key for out-of-band verification.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AppError> {
        // Pinning the algorithm list rejects any alg-substitution
        // attempt before signature checking.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.validate_nbf = true;

        match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AppError::TokenExpired),
                _ => Err(AppError::TokenInvalid),
            },
        }
    }
}

fn generate_key_pair() -> anyhow::Result<(String, String)> {
    let mut rng = rand::rngs::OsRng;
    let private = RsaPrivateKey::new(&mut rng, 2048).context("RSA key generation failed")?;

    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key")?
        .to_string();
    let public_pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key")?;

    Ok((private_pem, public_pem))
}

fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ROLE_ADMIN, USER_STATUS_ACTIVE};

    fn test_user() -> User {
        User {
            id: 7,
            username: "alice".into(),
            password: String::new(),
            email: "alice@example.com".into(),
            role: ROLE_ADMIN.into(),
            status: USER_STATUS_ACTIVE,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_service() -> TokenService {
        TokenService::new(TokenConfig::default(), RevocationCache::new()).unwrap()
    }

    #[tokio::test]
    async fn issue_and_verify_round_trip() {
        let service = test_service();
        let grant = service.issue(&test_user()).unwrap();

        let claims = service.verify(&grant.access_token).await.unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, ROLE_ADMIN);
        assert_eq!(claims.iss, "apigate");
    }

    #[tokio::test]
    async fn revoked_token_stays_invalid() {
        let service = test_service();
        let grant = service.issue(&test_user()).unwrap();

        service.revoke(&grant.access_token).await;

        let err = service.verify(&grant.access_token).await.unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn tokens_from_another_key_pair_are_rejected() {
        let service = test_service();
        let other = test_service();

        let grant = other.issue(&test_user()).unwrap();
        let err = service.verify(&grant.access_token).await.unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let service = test_service();
        let err = service.verify("not.a.token").await.unwrap_err();
        assert!(matches!(err, AppError::TokenInvalid));
    }
}
