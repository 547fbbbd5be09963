//! In-memory account store behind the registration and login routes.
//!
//! Emails are unique after trimming and lowercasing, tax ids are unique as
//! given. Passwords are kept only as salted SHA-256 digests.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("missing required field: {0}")]
    InvalidInput(&'static str),
    #[error("email or tax id already registered")]
    AlreadyRegistered,
    #[error("invalid credentials")]
    InvalidCredentials,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    #[serde(default, alias = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "senha")]
    pub password: String,
    #[serde(default, alias = "cpf")]
    pub tax_id: String,
}

/// What the API reveals about an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub email: String,
}

struct Account {
    name: String,
    email: String,
    tax_id: String,
    salt: [u8; 16],
    password_digest: [u8; 32],
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
}

#[derive(Default)]
pub struct AccountStore {
    accounts: Mutex<Accounts>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, new: NewAccount) -> Result<Profile, AccountError> {
        let name = required("name", &new.name)?;
        let email = normalize_email(required("email", &new.email)?);
        let tax_id = required("tax_id", &new.tax_id)?;
        if new.password.is_empty() {
            return Err(AccountError::InvalidInput("password"));
        }

        let mut accounts = self.accounts.lock().await;
        let taken = accounts.by_email.contains_key(&email)
            || accounts
                .by_email
                .values()
                .any(|account| account.tax_id == tax_id);
        if taken {
            return Err(AccountError::AlreadyRegistered);
        }

        let salt: [u8; 16] = rand::thread_rng().gen();
        let account = Account {
            name: name.to_string(),
            email: email.clone(),
            tax_id: tax_id.to_string(),
            salt,
            password_digest: digest(&salt, &new.password),
        };
        let profile = account.profile();
        accounts.by_email.insert(email, account);
        Ok(profile)
    }

    /// Unknown emails and wrong passwords fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> Result<Profile, AccountError> {
        let email = normalize_email(email);
        let accounts = self.accounts.lock().await;
        match accounts.by_email.get(&email) {
            Some(account) if digest(&account.salt, password) == account.password_digest => {
                Ok(account.profile())
            }
            _ => Err(AccountError::InvalidCredentials),
        }
    }

    pub async fn len(&self) -> usize {
        self.accounts.lock().await.by_email.len()
    }
}

impl Account {
    fn profile(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, AccountError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AccountError::InvalidInput(field));
    }
    Ok(value)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}
