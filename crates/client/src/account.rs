//! Account API methods without session side effects

use crate::endpoints;
use crate::error::ClientError;
use crate::gateway::{ApiRequest, Gateway};
use crate::types::{EmailRequest, MessageResponse, ProfileResponse, ResetPasswordRequest};

/// Shortest password the backend accepts
pub const MIN_PASSWORD_LEN: usize = 8;

impl Gateway {
    /// Ask for a password reset link to be emailed
    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let request = ApiRequest::post(endpoints::FORGOT_PASSWORD)
            .json(&EmailRequest {
                email: email.to_string(),
            })?
            .without_renewal();
        self.execute(request).await
    }

    /// Set a new password using the token from a reset email
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ClientError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        let request = ApiRequest::post(endpoints::RESET_PASSWORD)
            .json(&ResetPasswordRequest {
                token: token.to_string(),
                new_password: new_password.to_string(),
            })?
            .without_renewal();
        self.execute(request).await
    }

    /// Confirm an email address
    pub async fn verify_email(&self, token: &str) -> Result<MessageResponse, ClientError> {
        let request = ApiRequest::get(endpoints::VERIFY_EMAIL)
            .query("token", token)
            .without_renewal();
        self.execute(request).await
    }

    /// Send the verification email again
    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let request = ApiRequest::post(endpoints::RESEND_VERIFICATION)
            .json(&EmailRequest {
                email: email.to_string(),
            })?
            .without_renewal();
        self.execute(request).await
    }

    /// Get the current user's profile (requires authentication)
    pub async fn get_profile(&self) -> Result<ProfileResponse, ClientError> {
        self.execute(ApiRequest::get(endpoints::PROFILE)).await
    }
}
