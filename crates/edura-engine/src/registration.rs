//! Account registration and login.
//!
//! Registration is role-linked: teachers join an institution through its
//! short code, students join a group through its invite code and inherit
//! the group's institution. Code resolution happens before anything is
//! persisted, so a bad code leaves no partial account behind.

use tracing::{info, instrument};

use edura_store::{NewProfile, NewUser, User, UserRole};

use crate::error::{EngineError, Result};
use crate::Platform;

const MIN_PASSWORD_LEN: usize = 6;

/// Input for [`Platform::register`].
#[derive(Debug, Clone)]
pub struct NewRegistration {
    /// Unique login email.
    pub email: String,
    /// Plaintext password, digested before storage.
    pub password: String,
    /// Display name.
    pub full_name: String,
    /// Role fixed at registration.
    pub role: UserRole,
    /// Institution short code; required for teachers.
    pub institution_code: Option<String>,
    /// Group invite code; required for students.
    pub invite_code: Option<String>,
}

impl Platform {
    /// Registers a new account with its role linkage.
    ///
    /// The user row and role profile are created in one atomic store step;
    /// a duplicate email surfaces as a `Conflict` with nothing persisted.
    #[instrument(skip(self, reg), fields(email = %reg.email, role = %reg.role))]
    pub async fn register(&self, reg: NewRegistration) -> Result<User> {
        if !reg.email.contains('@') {
            return Err(EngineError::validation("email must contain '@'"));
        }
        if reg.password.len() < MIN_PASSWORD_LEN {
            return Err(EngineError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if reg.full_name.trim().is_empty() {
            return Err(EngineError::validation("full name must not be empty"));
        }

        let (institution_id, profile) = match reg.role {
            UserRole::Teacher => {
                let code = reg
                    .institution_code
                    .as_deref()
                    .ok_or_else(|| {
                        EngineError::validation("teacher registration requires institutionCode")
                    })?
                    .trim();
                let institution = self
                    .store
                    .institution_by_code(code)
                    .await?
                    .ok_or_else(|| EngineError::validation("unknown institution code"))?;
                (institution.id, NewProfile::Teacher)
            }
            UserRole::Student => {
                let code = reg
                    .invite_code
                    .as_deref()
                    .ok_or_else(|| {
                        EngineError::validation("student registration requires inviteCode")
                    })?
                    .trim();
                let group = self
                    .store
                    .group_by_invite_code(code)
                    .await?
                    .ok_or_else(|| EngineError::validation("unknown invite code"))?;
                (
                    group.institution_id,
                    NewProfile::Student { group_id: group.id },
                )
            }
        };

        let password_hash = self.credentials.hash_password(&reg.password)?;
        let user = self
            .store
            .create_user(NewUser {
                email: reg.email,
                password_hash,
                full_name: reg.full_name,
                role: reg.role,
                institution_id,
                profile,
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "registered new user");
        Ok(user)
    }

    /// Checks credentials and issues an access token.
    ///
    /// Unknown email and wrong password produce the same error so login
    /// probing cannot distinguish them.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let invalid = || EngineError::unauthorized("invalid email or password");

        let user = self.store.user_by_email(email).await?.ok_or_else(invalid)?;
        if !self
            .credentials
            .verify_password(password, &user.password_hash)?
        {
            return Err(invalid());
        }

        let token = self.credentials.issue_token(&user)?;
        info!(user_id = %user.id, "login succeeded");
        Ok((user, token))
    }

    /// Resolves a bearer token to its live user row.
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.credentials.verify_token(token)?;
        self.store
            .user(claims.sub)
            .await?
            .ok_or_else(|| EngineError::unauthorized("account no longer exists"))
    }
}
