pub mod account;
pub mod api_key;
pub mod newsletter;
pub mod post;
pub mod short_url;
pub mod subscription;
