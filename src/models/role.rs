use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role tags an account can carry. Multiple roles coexist; every
/// permission check is expressed as set intersection, which subsumes the
/// single-role case as a one-element set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    AccountHolder,
    AuthAdmin,
    SuperAdmin,
    NewsletterProvider,
    NewsletterProviderWorker,
    UrlAdmin,
    PostAdmin,
    SubscriptionAdmin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Self::AccountHolder => "account-holder",
            Self::AuthAdmin => "auth-admin",
            Self::SuperAdmin => "super-admin",
            Self::NewsletterProvider => "newsletter-provider",
            Self::NewsletterProviderWorker => "newsletter-provider-worker",
            Self::UrlAdmin => "url-admin",
            Self::PostAdmin => "post-admin",
            Self::SubscriptionAdmin => "subscription-admin",
        };
        f.write_str(tag)
    }
}

/// Set of role tags, stored as a JSON array in the accounts table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    /// The role every fresh signup gets.
    #[must_use]
    pub fn account_holder() -> Self {
        let mut set = BTreeSet::new();
        set.insert(Role::AccountHolder);
        Self(set)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("Invalid roles column: {e}"))
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).map_err(|e| anyhow::anyhow!("Failed to serialize roles: {e}"))
    }

    #[must_use]
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(&role)
    }

    /// True when the principal holds at least one of the required roles.
    #[must_use]
    pub fn intersects(&self, required: &[Role]) -> bool {
        required.iter().any(|role| self.0.contains(role))
    }

    pub fn grant(&mut self, role: Role) -> bool {
        self.0.insert(role)
    }

    pub fn revoke(&mut self, role: Role) -> bool {
        self.0.remove(&role)
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.0.iter()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_uses_kebab_tags() {
        let roles: RoleSet = [Role::AccountHolder, Role::UrlAdmin].into_iter().collect();
        let json = roles.to_json().unwrap();
        assert!(json.contains("account-holder"));
        assert!(json.contains("url-admin"));
        assert_eq!(RoleSet::from_json(&json).unwrap(), roles);
    }

    #[test]
    fn intersects_requires_overlap() {
        let roles: RoleSet = [Role::AccountHolder, Role::NewsletterProviderWorker]
            .into_iter()
            .collect();
        assert!(roles.intersects(&[Role::NewsletterProvider, Role::NewsletterProviderWorker]));
        assert!(!roles.intersects(&[Role::SuperAdmin, Role::AuthAdmin]));
        assert!(!roles.intersects(&[]));
    }

    #[test]
    fn grant_and_revoke() {
        let mut roles = RoleSet::account_holder();
        assert!(roles.grant(Role::PostAdmin));
        assert!(!roles.grant(Role::PostAdmin));
        assert!(roles.contains(Role::PostAdmin));
        assert!(roles.revoke(Role::PostAdmin));
        assert!(!roles.contains(Role::PostAdmin));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(RoleSet::from_json(r#"["mystery-admin"]"#).is_err());
    }
}
