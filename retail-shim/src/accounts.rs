//! In-memory account and token table for the demo backend. Nothing survives
//! a restart.

use std::collections::HashMap;
use std::sync::RwLock;

use retail_core::models::{Registration, UserProfile};

pub const DEMO_EMAIL: &str = "demo@retailrecommend.com";
pub const DEMO_PASSWORD: &str = "demo123";
pub const DEMO_USER_ID: &str = "demo-user-1";
pub const DEMO_TOKEN: &str = "demo-jwt-token";

struct Account {
    password: String,
    profile: UserProfile,
}

#[derive(Debug, PartialEq)]
pub enum RegisterOutcome {
    Created(UserProfile),
    EmailTaken,
}

#[derive(Default)]
pub struct AccountBook {
    accounts: RwLock<HashMap<String, Account>>,
    tokens: RwLock<HashMap<String, String>>,
}

pub fn demo_profile() -> UserProfile {
    UserProfile {
        id: DEMO_USER_ID.to_string(),
        retailer_id: None,
        name: "Demo User".to_string(),
        email: DEMO_EMAIL.to_string(),
        phone: None,
        avatar: None,
    }
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, registration: Registration) -> RegisterOutcome {
        let email = registration.email.trim().to_lowercase();
        if email == DEMO_EMAIL {
            return RegisterOutcome::EmailTaken;
        }

        let mut accounts = match self.accounts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if accounts.contains_key(&email) {
            return RegisterOutcome::EmailTaken;
        }

        let id = uuid::Uuid::new_v4().to_string();
        let profile = UserProfile {
            retailer_id: Some(format!("retailer-{}", &id[..8])),
            id,
            name: registration.name,
            email: email.clone(),
            phone: registration.phone,
            avatar: None,
        };
        accounts.insert(
            email,
            Account {
                password: registration.password,
                profile: profile.clone(),
            },
        );
        RegisterOutcome::Created(profile)
    }

    /// Returns `(token, profile)` for valid credentials.
    pub fn login(&self, email: &str, password: &str) -> Option<(String, UserProfile)> {
        if email == DEMO_EMAIL && password == DEMO_PASSWORD {
            return Some((DEMO_TOKEN.to_string(), demo_profile()));
        }

        let email = email.trim().to_lowercase();
        let profile = {
            let accounts = self.accounts.read().ok()?;
            let account = accounts.get(&email)?;
            if account.password != password {
                return None;
            }
            account.profile.clone()
        };

        let token = format!("shim-{}", uuid::Uuid::new_v4());
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.clone(), email);
        }
        Some((token, profile))
    }

    pub fn profile_for_token(&self, token: &str) -> Option<UserProfile> {
        if token == DEMO_TOKEN {
            return Some(demo_profile());
        }
        let email = self.tokens.read().ok()?.get(token).cloned()?;
        let accounts = self.accounts.read().ok()?;
        accounts.get(&email).map(|a| a.profile.clone())
    }

    /// Revoke an issued token. The demo token is never revoked.
    pub fn revoke(&self, token: &str) {
        if token == DEMO_TOKEN {
            return;
        }
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str) -> Registration {
        Registration {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_demo_credentials_yield_demo_token() {
        let book = AccountBook::new();
        let (token, profile) = book.login(DEMO_EMAIL, DEMO_PASSWORD).unwrap();
        assert_eq!(token, DEMO_TOKEN);
        assert_eq!(profile.id, DEMO_USER_ID);
        assert!(book.login(DEMO_EMAIL, "nope").is_none());
    }

    #[test]
    fn test_register_login_revoke_cycle() {
        let book = AccountBook::new();
        let created = match book.register(registration("Ada@Example.com")) {
            RegisterOutcome::Created(p) => p,
            other => panic!("Expected Created, got {:?}", other),
        };
        assert_eq!(created.email, "ada@example.com");

        let (token, profile) = book.login("ada@example.com", "hunter22").unwrap();
        assert_eq!(profile, created);
        assert_eq!(book.profile_for_token(&token), Some(created));

        book.revoke(&token);
        assert_eq!(book.profile_for_token(&token), None);
    }

    #[test]
    fn test_duplicate_and_demo_emails_are_taken() {
        let book = AccountBook::new();
        assert!(matches!(book.register(registration("a@b.c")), RegisterOutcome::Created(_)));
        assert_eq!(book.register(registration("a@b.c")), RegisterOutcome::EmailTaken);
        assert_eq!(book.register(registration(DEMO_EMAIL)), RegisterOutcome::EmailTaken);
    }
}
