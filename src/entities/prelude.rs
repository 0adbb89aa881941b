pub use super::accounts::Entity as Accounts;
pub use super::api_keys::Entity as ApiKeys;
pub use super::billing_subscriptions::Entity as BillingSubscriptions;
pub use super::newsletter_providers::Entity as NewsletterProviders;
pub use super::newsletter_subscribers::Entity as NewsletterSubscribers;
pub use super::posts::Entity as Posts;
pub use super::short_urls::Entity as ShortUrls;
