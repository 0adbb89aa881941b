pub mod api_key_service_impl;
pub mod auth_service;
pub mod auth_service_impl;
pub mod mailer;
pub mod newsletter_service;
pub mod newsletter_service_impl;

pub use api_key_service_impl::SeaOrmApiKeyService;
pub use auth_service::{ApiKeyService, AuthError, AuthService, SigninResult, SignupRequest};
pub use auth_service_impl::SeaOrmAuthService;
pub use mailer::Mailer;
pub use newsletter_service::{
    MailSettings, NewsletterError, NewsletterService, ProviderInfo, SendReport,
};
pub use newsletter_service_impl::SeaOrmNewsletterService;
