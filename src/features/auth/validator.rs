use super::model::{AuthenticatedUser, Claims, Role};
use crate::core::error::AppError;
use crate::shared::constants::MAX_USER_ID_LENGTH;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::time::Duration;

/// Validates HS256 access tokens issued by the identity provider
pub struct JwtValidator {
    decoding_key: DecodingKey,
    leeway: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, leeway: Duration) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            leeway: leeway.as_secs(),
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let header = decode_header(token).map_err(|e| AppError::Auth(e.to_string()))?;

        if header.alg != Algorithm::HS256 {
            return Err(AppError::Auth(format!(
                "Unsupported algorithm: {:?}. Only HS256 is allowed",
                header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| AppError::Auth(e.to_string()))?
            .claims;

        if claims.sub.trim().is_empty() {
            return Err(AppError::Auth("Token subject is empty".to_string()));
        }
        if claims.sub.chars().count() as u64 > MAX_USER_ID_LENGTH {
            return Err(AppError::Auth(format!(
                "Token subject exceeds {} characters",
                MAX_USER_ID_LENGTH
            )));
        }

        // Departments only mean something for staff
        let department = match claims.role {
            Role::Staff => claims.department.filter(|d| !d.trim().is_empty()),
            Role::Citizen | Role::Admin => None,
        };

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            role: claims.role,
            department,
        })
    }
}
