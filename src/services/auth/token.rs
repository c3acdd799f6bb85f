use axum::http::HeaderValue;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use std::{error::Error as StdError, fmt};

/// HMAC-SHA keys shorter than this are refused (HS256 needs 256 bits).
pub const MIN_KEY_BYTES: usize = 32;

#[derive(Debug)]
pub enum SigningKeyError {
    InvalidBase64(base64::DecodeError),
    TooShort { len: usize },
}

impl fmt::Display for SigningKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBase64(e) => write!(f, "signing secret is not valid base64: {}", e),
            Self::TooShort { len } => write!(
                f,
                "signing secret is {} bytes, at least {} are required",
                len, MIN_KEY_BYTES
            ),
        }
    }
}

impl StdError for SigningKeyError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::InvalidBase64(e) => Some(e),
            _ => None,
        }
    }
}

/// Raw HMAC key material decoded from its configured base64 form.
///
/// - Key material is not printable via Debug.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl SigningKey {
    pub fn from_base64(encoded: &str) -> Result<Self, SigningKeyError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(SigningKeyError::InvalidBase64)?;

        if bytes.len() < MIN_KEY_BYTES {
            return Err(SigningKeyError::TooShort { len: bytes.len() });
        }

        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Errors returned by token verification + claim validation.
#[derive(Debug)]
pub enum TokenError {
    Jwt(jsonwebtoken::errors::Error),
    Expired { exp: i64 },
    NotYetValid { nbf: i64 },
    MissingClaim(&'static str),
    InvalidClaim(&'static str),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt(e) => write!(f, "jwt verification failed: {}", e),
            Self::Expired { exp } => write!(f, "token expired at {}", exp),
            Self::NotYetValid { nbf } => write!(f, "token not valid before {}", nbf),
            Self::MissingClaim(name) => write!(f, "missing '{}' claim", name),
            Self::InvalidClaim(name) => write!(f, "invalid '{}' claim", name),
        }
    }
}

impl StdError for TokenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Jwt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Jwt(e)
    }
}

/// Raw token payload.
///
/// `id` is kept as a `Value` because issuers emit it either as a JSON number or
/// as a decimal string.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
}

/// Verified caller identity forwarded to the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: String,
}

/// HMAC-SHA (HS256/384/512) bearer token verifier.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(key: &SigningKey) -> Self {
        let decoding_key = DecodingKey::from_secret(&key.bytes);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // exp / nbf are checked in `verify` against the caller's clock with no leeway,
        // so an expired token is reported apart from a bad signature.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            decoding_key,
            validation,
        }
    }

    // Verify signature and structure, then decode the raw payload.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }

    /// Verify a bearer token and turn its claims into an [`Identity`].
    ///
    /// `now` is seconds since the Unix epoch. A token whose `exp` is at or
    /// before `now` is rejected with [`TokenError::Expired`]; one whose `nbf`
    /// is after `now` with [`TokenError::NotYetValid`].
    pub fn verify(&self, token: &str, now: i64) -> Result<Identity, TokenError> {
        let claims = self.decode(token)?;

        if claims.exp <= now {
            return Err(TokenError::Expired { exp: claims.exp });
        }
        if let Some(nbf) = claims.nbf.filter(|nbf| *nbf > now) {
            return Err(TokenError::NotYetValid { nbf });
        }

        let user_id = parse_user_id(claims.id.as_ref())?;
        let role = parse_role(claims.role.as_ref())?;

        Ok(Identity { user_id, role })
    }
}

fn parse_user_id(raw: Option<&Value>) -> Result<i64, TokenError> {
    match raw {
        None => Err(TokenError::MissingClaim("id")),
        Some(Value::Number(n)) => n.as_i64().ok_or(TokenError::InvalidClaim("id")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| TokenError::InvalidClaim("id")),
        Some(_) => Err(TokenError::InvalidClaim("id")),
    }
}

fn parse_role(raw: Option<&Value>) -> Result<String, TokenError> {
    match raw {
        None => Err(TokenError::MissingClaim("role")),
        Some(Value::String(s)) => {
            // Must survive as a header value downstream
            if s.trim().is_empty() || HeaderValue::from_str(s).is_err() {
                return Err(TokenError::InvalidClaim("role"));
            }
            Ok(s.clone())
        }
        Some(_) => Err(TokenError::InvalidClaim("role")),
    }
}
