//! Local identity store: sign-up, sign-in and the current user.
//!
//! Accounts live in a single JSON document on disk. Passwords are never
//! stored; each account keeps a random salt and the SHA-256 of salt and
//! password.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::profile::AccountProfile;

/// Choice value that means "use the free-text alternative".
const OTHERS: &str = "others";

/// Sign-up form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub age: u8,
    pub gender: String,
    pub occupation: String,
    #[serde(default)]
    pub other_occupation: Option<String>,
    pub financial_status: String,
    pub primary_needs: String,
    #[serde(default)]
    pub other_primary_needs: Option<String>,
}

/// A registered user, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: String,
    pub profile: AccountProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    id: String,
    #[serde(flatten)]
    profile: AccountProfile,
    salt: String,
    password_hash: String,
}

impl StoredUser {
    fn account(&self) -> UserAccount {
        UserAccount {
            id: self.id.clone(),
            profile: self.profile.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreFile {
    #[serde(default)]
    users: Vec<StoredUser>,
    #[serde(default)]
    current_user: Option<String>,
}

/// File-backed account store.
#[derive(Debug)]
pub struct IdentityStore {
    path: PathBuf,
    state: Mutex<StoreFile>,
}

impl IdentityStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IdentityError> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "Identity store opened");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a new account. Does not sign it in.
    pub fn sign_up(&self, request: SignUpRequest) -> Result<UserAccount, IdentityError> {
        let profile = validate(&request)?;

        let account = self.commit(|state| {
            if state
                .users
                .iter()
                .any(|u| same_email(&u.profile.email, &profile.email))
            {
                return Err(IdentityError::EmailTaken);
            }

            let salt = Uuid::new_v4().simple().to_string();
            let user = StoredUser {
                id: Uuid::new_v4().to_string(),
                password_hash: hash_password(&salt, &request.password),
                salt,
                profile,
            };
            let account = user.account();
            state.users.push(user);
            Ok(account)
        })?;

        tracing::info!(user_id = %account.id, "Account created");
        Ok(account)
    }

    /// Check credentials and make the matching account the current user.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<UserAccount, IdentityError> {
        let account = self.commit(|state| {
            let account = state
                .users
                .iter()
                .find(|u| {
                    same_email(&u.profile.email, email)
                        && hash_password(&u.salt, password) == u.password_hash
                })
                .map(StoredUser::account)
                .ok_or(IdentityError::InvalidCredentials)?;
            state.current_user = Some(account.id.clone());
            Ok(account)
        })?;

        tracing::info!(user_id = %account.id, "Signed in");
        Ok(account)
    }

    /// Forget the current user. Signing out with nobody signed in is a no-op.
    pub fn sign_out(&self) -> Result<(), IdentityError> {
        if self.lock().current_user.is_none() {
            return Ok(());
        }
        self.commit(|state| {
            state.current_user = None;
            Ok(())
        })
    }

    /// The signed-in account, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<UserAccount> {
        let state = self.lock();
        let id = state.current_user.as_deref()?;
        state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(StoredUser::account)
    }

    /// Apply `f` to a copy of the state and keep it only once it is on disk.
    fn commit<R>(
        &self,
        f: impl FnOnce(&mut StoreFile) -> Result<R, IdentityError>,
    ) -> Result<R, IdentityError> {
        let mut state = self.lock();
        let mut next = state.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(out)
    }

    fn persist(&self, state: &StoreFile) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, StoreFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(request: &SignUpRequest) -> Result<AccountProfile, IdentityError> {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(IdentityError::Invalid("a valid email is required".into()));
    }
    if request.password.is_empty() {
        return Err(IdentityError::Invalid("password is required".into()));
    }
    if !(1..=120).contains(&request.age) {
        return Err(IdentityError::Invalid("age must be between 1 and 120".into()));
    }

    Ok(AccountProfile {
        email: email.to_string(),
        age: request.age,
        gender: request.gender.clone(),
        occupation: resolve_choice(
            "occupation",
            &request.occupation,
            request.other_occupation.as_deref(),
        )?,
        financial_status: request.financial_status.clone(),
        primary_needs: resolve_choice(
            "primary needs",
            &request.primary_needs,
            request.other_primary_needs.as_deref(),
        )?,
    })
}

/// Replace an "others" selection with its free-text value.
fn resolve_choice(field: &str, choice: &str, other: Option<&str>) -> Result<String, IdentityError> {
    if choice != OTHERS {
        return Ok(choice.to_string());
    }
    other
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            IdentityError::Invalid(format!("{field} must be described when 'others' is chosen"))
        })
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}
