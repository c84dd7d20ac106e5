//! Authentication-related models

use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64, // seconds until the token expires
}
