pub mod prelude;

pub mod accounts;
pub mod api_keys;
pub mod billing_subscriptions;
pub mod newsletter_providers;
pub mod newsletter_subscribers;
pub mod posts;
pub mod short_urls;
