//! Usage: Backend-facing API surface (wire models and the typed client).

pub mod client;
pub mod models;

pub use client::{ApiClient, StartupValidation};
pub use models::{Captcha, LoginRequest, RegisterRequest, UserProfile};
