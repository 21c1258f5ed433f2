//! ActaLog API paths

pub const LOGIN: &str = "/api/auth/login";
pub const REGISTER: &str = "/api/auth/register";
pub const REFRESH: &str = "/api/auth/refresh";
pub const REVOKE: &str = "/api/auth/revoke";
pub const FORGOT_PASSWORD: &str = "/api/auth/forgot-password";
pub const RESET_PASSWORD: &str = "/api/auth/reset-password";
pub const VERIFY_EMAIL: &str = "/api/auth/verify-email";
pub const RESEND_VERIFICATION: &str = "/api/auth/resend-verification";
pub const PROFILE: &str = "/api/users/profile";
