use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Effective role of a principal. Stored lowercase in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Computes the effective role for a new credential by merging the
/// administrator allow-list with the persisted role.
///
/// Built once from config at startup and injected (axum Extension) into both
/// issuance sites - login and refresh - so tests can substitute allow-lists
/// without process-wide state. The allow-list wins at decision time even if
/// the directory reconciliation afterwards fails.
#[derive(Clone, Debug)]
pub struct RoleResolver {
    allow_list: Vec<String>,
}

impl RoleResolver {
    pub fn new(emails: impl IntoIterator<Item = String>) -> Self {
        Self {
            allow_list: emails.into_iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn is_allow_listed(&self, email: &str) -> bool {
        let email = email.to_ascii_lowercase();
        self.allow_list.iter().any(|e| e == &email)
    }

    /// Allow-listed email => Admin, always. Otherwise the persisted role,
    /// defaulting to User when unset. No client-supplied input reaches this
    /// function; the only elevation paths are the allow-list and the explicit
    /// admin role-change operation.
    pub fn resolve(&self, email: &str, persisted: Option<Role>) -> Role {
        if self.is_allow_listed(email) {
            Role::Admin
        } else {
            persisted.unwrap_or(Role::User)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RoleResolver {
        RoleResolver::new(["admin@x.com".to_string()])
    }

    #[test]
    fn allow_listed_email_is_always_admin() {
        let r = resolver();
        assert_eq!(r.resolve("admin@x.com", None), Role::Admin);
        assert_eq!(r.resolve("admin@x.com", Some(Role::User)), Role::Admin);
        assert_eq!(r.resolve("admin@x.com", Some(Role::Admin)), Role::Admin);
    }

    #[test]
    fn allow_list_is_case_insensitive() {
        let r = resolver();
        assert_eq!(r.resolve("Admin@X.Com", Some(Role::User)), Role::Admin);

        let r = RoleResolver::new(["ADMIN@X.COM".to_string()]);
        assert_eq!(r.resolve("admin@x.com", None), Role::Admin);
    }

    #[test]
    fn other_emails_keep_persisted_role() {
        let r = resolver();
        assert_eq!(r.resolve("user@x.com", Some(Role::Admin)), Role::Admin);
        assert_eq!(r.resolve("user@x.com", Some(Role::User)), Role::User);
    }

    #[test]
    fn missing_persisted_role_defaults_to_user() {
        let r = resolver();
        assert_eq!(r.resolve("user@x.com", None), Role::User);
    }

    #[test]
    fn role_round_trips_as_string() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::Admin.as_str(), "admin");
    }
}
