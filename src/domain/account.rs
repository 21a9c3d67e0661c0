use serde::Serialize;
use time::OffsetDateTime;

/// Identity record. Only staff accounts may hold an admin session.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
}

/// Identity as reported by login and check-auth.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

impl From<&Account> for SessionUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            is_staff: account.is_staff,
        }
    }
}
