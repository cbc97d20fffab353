/// Signed session token issuing and verification
///
/// Session tokens are HMAC-signed JWTs that carry a single subject (a user id,
/// or the bootstrap administrator name) together with issue and expiry
/// timestamps. The lifetime is configured once and is the single source for
/// both the token `exp` claim and the session cookie max-age.
///
/// # Security
///
/// - **Algorithms**: HS256 (default), HS384, HS512
/// - **Expiration**: validated with zero leeway
/// - **Secret Management**: secrets should be at least 32 bytes
///
/// # Example
///
/// ```
/// use teamdesk_shared::auth::jwt::{TokenIssuer, TokenSettings};
/// use chrono::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let issuer = TokenIssuer::new(&TokenSettings {
///     secret: "your-secret-key-at-least-32-bytes-long".to_string(),
///     algorithm: "HS256".to_string(),
///     ttl: Duration::minutes(30),
/// })?;
///
/// let token = issuer.issue("42")?;
/// assert_eq!(issuer.verify(&token)?, "42");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature mismatch, malformed payload or expired token
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Payload verified but carries no subject
    #[error("Token has no subject")]
    MissingSubject,

    /// Failed to sign a token
    #[error("Failed to create token: {0}")]
    Encode(String),

    /// Configured algorithm is not an HMAC algorithm
    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Token payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id rendered as a string, or the bootstrap admin name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates claims for `subject` expiring `ttl` from now
    pub fn new(subject: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: Some(subject.into()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// Raw settings used to build a [`TokenIssuer`]
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub algorithm: String,
    pub ttl: Duration,
}

/// Issues and verifies session tokens with a fixed key and lifetime
///
/// Built once at startup and shared through application state.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Builds an issuer from settings
    ///
    /// # Errors
    ///
    /// Returns `TokenError::UnsupportedAlgorithm` for anything other than
    /// HS256, HS384 or HS512.
    pub fn new(settings: &TokenSettings) -> Result<Self, TokenError> {
        let algorithm = parse_algorithm(&settings.algorithm)?;
        let secret = settings.secret.as_bytes();

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            algorithm,
            ttl: settings.ttl,
        })
    }

    /// Configured token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `subject` with the configured lifetime
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_with_ttl(subject, self.ttl)
    }

    /// Issues a token for `subject` with an explicit lifetime
    pub fn issue_with_ttl(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        self.encode(&Claims::new(subject, ttl))
    }

    /// Signs arbitrary claims
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verifies signature and expiry and returns the decoded claims
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidToken` on a bad signature, a malformed
    /// payload or an expired token.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    TokenError::InvalidToken("token has expired".to_string())
                }
                _ => TokenError::InvalidToken(e.to_string()),
            })
    }

    /// Verifies a token and returns its subject
    ///
    /// # Errors
    ///
    /// `InvalidToken` as for [`TokenIssuer::decode`], `MissingSubject` when
    /// the payload verifies but has no `sub`.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.decode(token)?.sub.ok_or(TokenError::MissingSubject)
    }
}

fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => Err(TokenError::UnsupportedAlgorithm(other.to_string())),
    }
}
