use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use time::OffsetDateTime;

use crate::app::tokens::random_token;
use crate::domain::account::{Account, NewAccount, SessionUser};
use crate::infra::sessions::{SessionRecord, SessionStore};
use crate::infra::store::AccountStore;

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated {
        session_key: String,
        user: SessionUser,
    },
    InvalidCredentials,
    Disabled,
    NotStaff,
}

#[derive(Clone)]
pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    session_ttl_seconds: u64,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        session_ttl_seconds: u64,
    ) -> Self {
        Self {
            accounts,
            sessions,
            session_ttl_seconds,
        }
    }

    /// Credentials are checked before the account flags, so an unknown user
    /// and a wrong password are indistinguishable. No session is created
    /// unless every check passes.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        let account = match self.accounts.find_by_username(username).await? {
            Some(account) if !account.password_hash.is_empty() => account,
            _ => {
                // Same Argon2 cost as a real check, so timing does not reveal
                // which usernames exist.
                if let Some(hash) = dummy_hash() {
                    let _ = verify_password(password, hash);
                }
                return Ok(LoginOutcome::InvalidCredentials);
            }
        };

        if !verify_password(password, &account.password_hash)? {
            return Ok(LoginOutcome::InvalidCredentials);
        }

        if !account.is_active {
            return Ok(LoginOutcome::Disabled);
        }

        if !account.is_staff {
            return Ok(LoginOutcome::NotStaff);
        }

        let session_key = random_token();
        let record = SessionRecord {
            user_id: account.id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.sessions
            .save(&session_key, &record, self.session_ttl_seconds)
            .await?;

        Ok(LoginOutcome::Authenticated {
            session_key,
            user: SessionUser::from(&account),
        })
    }

    /// Resolves a session to its account as it is now; a deactivated
    /// account no longer counts as signed in.
    pub async fn current_account(&self, session_key: &str) -> Result<Option<Account>> {
        let record = match self.sessions.load(session_key).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let account = self.accounts.find_by_id(record.user_id).await?;
        Ok(account.filter(|account| account.is_active))
    }

    pub async fn logout(&self, session_key: &str) -> Result<bool> {
        self.sessions.remove(session_key).await
    }

    pub async fn create_staff(&self, username: &str, password: &str) -> Result<Account> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(anyhow!("username and password are required"));
        }
        let password_hash = hash_password(password)?;
        self.accounts
            .upsert(NewAccount {
                username: username.trim().to_string(),
                password_hash,
                is_active: true,
                is_staff: true,
            })
            .await
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    DUMMY_HASH
        .get_or_init(|| hash_password(&random_token()).ok())
        .as_deref()
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::sessions::MemorySessionStore;
    use crate::infra::store::MemoryAccountStore;

    fn service(accounts: MemoryAccountStore) -> AuthService {
        AuthService::new(Arc::new(accounts), Arc::new(MemorySessionStore::new()), 60)
    }

    #[test]
    fn dummy_hash_is_a_real_argon2_hash() {
        let hash = dummy_hash().expect("dummy hash");
        assert!(PasswordHash::new(hash).is_ok());
        assert!(!verify_password("password", hash).unwrap());
    }

    #[tokio::test]
    async fn unknown_and_hashless_accounts_are_invalid_credentials() {
        let accounts = MemoryAccountStore::new();
        accounts
            .upsert(NewAccount {
                username: "nohash".into(),
                password_hash: String::new(),
                is_active: true,
                is_staff: true,
            })
            .await
            .unwrap();
        let service = service(accounts);

        assert!(matches!(
            service.login("ghost", "whatever").await.unwrap(),
            LoginOutcome::InvalidCredentials
        ));
        assert!(matches!(
            service.login("nohash", "").await.unwrap(),
            LoginOutcome::InvalidCredentials
        ));
    }

    #[tokio::test]
    async fn staff_login_creates_a_session() {
        let service = service(MemoryAccountStore::new());
        service.create_staff("admin", "secret-pass").await.unwrap();

        let outcome = service.login("admin", "secret-pass").await.unwrap();
        let LoginOutcome::Authenticated { session_key, user } = outcome else {
            panic!("expected a session");
        };
        assert!(user.is_staff);
        let account = service.current_account(&session_key).await.unwrap();
        assert_eq!(account.map(|account| account.username), Some("admin".to_string()));
    }
}
