//! Accounts: registration, login and identity resolution

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{enforce, optional, require_admin, require_user};
use crate::auth::{
    check_password_length, hash_password, principal_from_claims, verified_claims, verify_password,
    Credentials, JwtValidator, TokenInput,
};
use crate::db::schemas::{normalize_username, UserDoc, UserProfile, USERNAME_SUFFIX};
use crate::db::{Record, ResourceStore};
use crate::logging::AuditLogger;
use crate::policy::{House, Principal, ResourceKind, UserRole};
use crate::types::{GatehouseError, Result};

/// Body of `POST /api/auth/register`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(default)]
    pub house: Option<House>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub admin_key: Option<String>,
}

/// Token plus the account it was issued for
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// Query filters for the admin user listing
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub house: Option<House>,
    /// Case-insensitive match on username or full name
    pub search: Option<String>,
}

pub struct AccountService {
    users: Arc<dyn ResourceStore<UserDoc>>,
    jwt: JwtValidator,
    audit: AuditLogger,
    registration_key: Option<String>,
    // Username uniqueness is check-then-insert
    register_lock: Mutex<()>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn ResourceStore<UserDoc>>,
        jwt: JwtValidator,
        audit: AuditLogger,
        registration_key: Option<String>,
    ) -> Self {
        Self {
            users,
            jwt,
            audit,
            registration_key,
            register_lock: Mutex::new(()),
        }
    }

    /// Create an account; requires the admin registration key
    pub async fn register(
        &self,
        principal: &Principal,
        request: RegisterRequest,
    ) -> Result<UserProfile> {
        let key_ok = match (&self.registration_key, &request.admin_key) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        };
        if !key_ok {
            warn!(principal = %principal.label(), "Registration refused: bad admin key");
            return Err(GatehouseError::Forbidden("Invalid admin key".into()));
        }

        let username = normalize_username(&request.username);
        if !username.ends_with(USERNAME_SUFFIX) || username.len() == USERNAME_SUFFIX.len() {
            return Err(GatehouseError::BadRequest(format!(
                "Username must end with {USERNAME_SUFFIX}"
            )));
        }
        let full_name = super::required("Full name", &request.full_name)?;
        check_password_length(&request.password)?;

        let house = match request.role {
            UserRole::Admin => House::None,
            _ => match request.house {
                Some(house) if house.is_assigned() => house,
                _ => {
                    return Err(GatehouseError::BadRequest(
                        "House is required for non-admin users".into(),
                    ))
                }
            },
        };

        let _guard = self.register_lock.lock().await;
        if self.find_username(&username).await?.is_some() {
            return Err(GatehouseError::Conflict("Username already exists".into()));
        }

        let password_hash = hash_password(&request.password)?;
        let mut user = UserDoc::new(&username, password_hash, full_name, request.role, house);
        user.email = optional(request.email).map(|e| e.to_lowercase());
        user.phone = optional(request.phone);
        user.student_id = optional(request.student_id);
        user.teacher_id = optional(request.teacher_id);
        user.created_by = principal.user_id().map(str::to_string);

        let user = self.users.create(user).await?;
        info!(user_id = %user.id, username = %user.username, role = %user.role, "Registered user");
        self.audit
            .log_registration(principal, user.id(), &user.username)
            .await;
        Ok(user.profile())
    }

    /// Exchange credentials for a session token
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let username = normalize_username(username);

        let user = match self.find_username(&username).await? {
            Some(user) if verify_password(password, &user.password_hash)? => user,
            _ => {
                self.audit.log_auth_attempt(false, &username).await;
                return Err(GatehouseError::Unauthorized("Invalid credentials".into()));
            }
        };

        if !user.is_active {
            self.audit.log_auth_attempt(false, &username).await;
            return Err(GatehouseError::Unauthorized("Account is inactive".into()));
        }

        let token = self.issue_token(&user)?;
        self.audit.log_auth_attempt(true, &username).await;
        debug!(user_id = %user.id, "Login succeeded");

        Ok(LoginResponse {
            token,
            user: user.profile(),
        })
    }

    /// The caller's stored account
    pub async fn me(&self, principal: &Principal) -> Result<UserProfile> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::User,
            None,
            "me",
            require_user(principal),
        )
        .await?;

        let id = principal.user_id().unwrap_or_default();
        self.users
            .get(id)
            .await?
            .map(|user| user.profile())
            .ok_or_else(|| GatehouseError::NotFound("User not found".into()))
    }

    /// Change the caller's password, returning a fresh token
    pub async fn update_password(
        &self,
        principal: &Principal,
        current_password: &str,
        new_password: &str,
    ) -> Result<String> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::User,
            principal.user_id(),
            "update_password",
            require_user(principal),
        )
        .await?;
        check_password_length(new_password)?;

        let id = principal.user_id().unwrap_or_default();
        let mut user = self
            .users
            .get(id)
            .await?
            .ok_or_else(|| GatehouseError::NotFound("User not found".into()))?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(GatehouseError::BadRequest(
                "Current password is incorrect".into(),
            ));
        }

        user.password_hash = hash_password(new_password)?;
        let user = self.users.update(user).await?;
        self.audit
            .log_mutation(principal, ResourceKind::User, user.id(), "update_password")
            .await;
        self.issue_token(&user)
    }

    /// Admin listing of accounts
    pub async fn list_users(
        &self,
        principal: &Principal,
        filter: UserFilter,
    ) -> Result<Vec<UserProfile>> {
        enforce(
            &self.audit,
            principal,
            ResourceKind::User,
            None,
            "list",
            require_admin(principal),
        )
        .await?;

        let search = filter.search.map(|s| s.to_lowercase());
        let users = self
            .users
            .list()
            .await?
            .into_iter()
            .filter(|u| filter.role.map_or(true, |role| u.role == role))
            .filter(|u| filter.house.map_or(true, |house| u.house == house))
            .filter(|u| match &search {
                Some(term) => {
                    u.username.contains(term.as_str())
                        || u.full_name.to_lowercase().contains(term.as_str())
                }
                None => true,
            })
            .map(|u| u.profile())
            .collect();
        Ok(users)
    }

    /// Resolve request credentials to a principal
    ///
    /// Tokens for accounts that no longer exist or were deactivated resolve
    /// to anonymous. Claims that cannot describe a principal are an error.
    pub async fn authenticate(&self, credentials: Credentials<'_>) -> Result<Principal> {
        let Some(claims) = verified_claims(&self.jwt, credentials) else {
            return Ok(Principal::Anonymous);
        };
        let principal = principal_from_claims(&claims)?;

        match self.users.get(&claims.sub).await? {
            Some(user) if user.is_active => Ok(principal),
            _ => {
                debug!(sub = %claims.sub, "Token for missing or inactive account");
                Ok(Principal::Anonymous)
            }
        }
    }

    /// Seed an admin account when none exists
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserProfile>> {
        let admins = self.users.find_by("role", UserRole::Admin.as_str()).await?;
        if !admins.is_empty() {
            debug!(count = admins.len(), "Admin account present, skipping bootstrap");
            return Ok(None);
        }
        check_password_length(password)?;

        let user = UserDoc::new(
            username,
            hash_password(password)?,
            "Principal".into(),
            UserRole::Admin,
            House::None,
        );
        let user = self.users.create(user).await?;
        info!(username = %user.username, "Bootstrapped admin account");
        Ok(Some(user.profile()))
    }

    fn issue_token(&self, user: &UserDoc) -> Result<String> {
        self.jwt.generate_token(TokenInput {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            house: user.house,
        })
    }

    async fn find_username(&self, username: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .find_by("username", username)
            .await?
            .into_iter()
            .next())
    }
}
