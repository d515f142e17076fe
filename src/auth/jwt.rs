use crate::error::AppError;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Issuer tag baked into every session token.
pub const TOKEN_ISSUER: &str = "sso-login-service";

pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AppError> {
    let algorithm = Algorithm::from_str(alg)
        .map_err(|_| AppError::Internal(format!("Unsupported JWT algorithm: {}", alg)))?;

    // The signing key is a process-wide shared secret, so only the symmetric
    // family is accepted.
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(AppError::Internal(format!(
            "JWT algorithm {:?} requires an asymmetric key; configure an HMAC algorithm",
            other
        ))),
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Provider identity id of the logged-in user.
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
}

impl SessionClaims {
    pub fn new(subject: String, lifetime_seconds: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject,
            iat: now as usize,
            exp: (now + lifetime_seconds) as usize,
            iss: TOKEN_ISSUER.to_string(),
        }
    }

    pub fn is_expired(&self) -> bool {
        let now = Utc::now().timestamp() as usize;
        self.exp <= now
    }
}

/// Token service trait for dependency injection and testing.
pub trait JwtService: Send + Sync {
    /// Sign a session token for the given subject id.
    fn generate(&self, subject: &str) -> Result<String, AppError>;

    /// Verify signature, algorithm, issuer and expiry; return the subject id.
    fn validate(&self, token: &str) -> Result<String, AppError>;

    fn algorithm(&self) -> Algorithm;
}

#[derive(Clone)]
pub struct JwtServiceImpl {
    algorithm: Algorithm,
    lifetime_seconds: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtServiceImpl {
    pub fn new(
        secret: &str,
        algorithm: Algorithm,
        lifetime_seconds: i64,
    ) -> Result<Self, AppError> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {}
            other => {
                return Err(AppError::Internal(format!(
                    "JWT algorithm {:?} requires an asymmetric key; configure an HMAC algorithm",
                    other
                )));
            }
        }

        Ok(Self {
            algorithm,
            lifetime_seconds,
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        })
    }

    /// Sign a token with explicit claims. Used by tests to craft expired
    /// tokens; production code goes through [`JwtService::generate`].
    pub fn sign_claims(&self, claims: &SessionClaims) -> Result<String, AppError> {
        let header = Header::new(self.algorithm);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    fn decode_claims(&self, token: &str) -> Result<SessionClaims, AppError> {
        // Pinning the algorithm rejects tokens signed under a different
        // scheme, even with a valid-looking signature.
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[TOKEN_ISSUER]);

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}

impl JwtService for JwtServiceImpl {
    fn generate(&self, subject: &str) -> Result<String, AppError> {
        let claims = SessionClaims::new(subject.to_string(), self.lifetime_seconds);
        self.sign_claims(&claims)
    }

    fn validate(&self, token: &str) -> Result<String, AppError> {
        Ok(self.decode_claims(token)?.sub)
    }

    fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> JwtServiceImpl {
        JwtServiceImpl::new("test-secret", Algorithm::HS256, 3600).unwrap()
    }

    #[test]
    fn test_parse_algorithm_hmac() {
        assert!(parse_algorithm("HS256").is_ok());
        assert!(parse_algorithm("HS384").is_ok());
        assert!(parse_algorithm("HS512").is_ok());
    }

    #[test]
    fn test_parse_algorithm_rejects_asymmetric() {
        assert!(parse_algorithm("RS256").is_err());
        assert!(parse_algorithm("ES256").is_err());
        assert!(parse_algorithm("EdDSA").is_err());
    }

    #[test]
    fn test_parse_algorithm_invalid() {
        assert!(parse_algorithm("INVALID").is_err());
        assert!(parse_algorithm("hs256").is_err());
        assert!(parse_algorithm("").is_err());
    }

    #[test]
    fn test_token_round_trip() {
        let service = test_service();

        let token = service.generate("u1").unwrap();
        assert!(!token.is_empty());

        let subject = service.validate(&token).unwrap();
        assert_eq!(subject, "u1");
    }

    #[test]
    fn test_token_tamper_sensitivity() {
        let service = test_service();
        let token = service.generate("u1").unwrap();

        // Flipping any single character must invalidate the token.
        for i in 0..token.len() {
            let mut chars: Vec<char> = token.chars().collect();
            chars[i] = if chars[i] == 'x' { 'y' } else { 'x' };
            let tampered: String = chars.into_iter().collect();
            if tampered == token {
                continue;
            }
            assert!(
                service.validate(&tampered).is_err(),
                "tampered token accepted at position {}",
                i
            );
        }
    }

    #[test]
    fn test_expired_token_rejected() {
        let service = test_service();

        let mut claims = SessionClaims::new("u1".to_string(), 3600);
        claims.exp = (Utc::now().timestamp() - 3600) as usize;
        assert!(claims.is_expired());

        let token = service.sign_claims(&claims).unwrap();
        assert!(service.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let service = test_service();

        let mut claims = SessionClaims::new("u1".to_string(), 3600);
        claims.iss = "someone-else".to_string();

        let token = service.sign_claims(&claims).unwrap();
        assert!(service.validate(&token).is_err());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        // Same secret, different HMAC scheme: still rejected.
        let hs256 = JwtServiceImpl::new("test-secret", Algorithm::HS256, 3600).unwrap();
        let hs512 = JwtServiceImpl::new("test-secret", Algorithm::HS512, 3600).unwrap();

        let token = hs512.generate("u1").unwrap();
        assert!(hs256.validate(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let service = test_service();
        let other = JwtServiceImpl::new("other-secret", Algorithm::HS256, 3600).unwrap();

        let token = service.generate("u1").unwrap();
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn test_validation_failures_surface_as_jwt_errors() {
        let service = test_service();
        let other = JwtServiceImpl::new("other-secret", Algorithm::HS256, 3600).unwrap();

        let token = other.generate("u1").unwrap();
        assert!(matches!(
            service.validate(&token).unwrap_err(),
            AppError::Jwt(_)
        ));
        assert!(matches!(
            service.validate("not-a-token").unwrap_err(),
            AppError::Jwt(_)
        ));
    }

    #[test]
    fn test_malformed_input_rejected() {
        let service = test_service();
        assert!(service.validate("").is_err());
        assert!(service.validate("not-a-token").is_err());
        assert!(service.validate("a.b.c").is_err());
    }
}
