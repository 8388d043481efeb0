use chrono::{Duration, Utc};
use sqlx::{MySql, Pool};
use uuid::Uuid;

use crate::modules::auth::interface::{AuthError, Result};
use crate::modules::auth::model::{User, VerificationReceipt};
use crate::services::hashing;
use crate::services::oauth::SocialUserInfo;

/// Hours a verification link stays valid, measured from the last send.
const VERIFICATION_WINDOW_HOURS: i64 = 24;

/// A consumed token answers "already verified" for this long before the
/// receipt is treated as stale.
const RECEIPT_REPLAY_WINDOW_HOURS: i64 = 2;

pub struct UserCrud {
    pool: Pool<MySql>,
}

#[derive(Debug)]
pub enum VerificationOutcome {
    Verified(User),
    AlreadyVerified,
    Expired,
}

impl UserCrud {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, name, phone, password_hash, role,
                is_active, is_verified, verification_token, verification_sent_at,
                subscription_auto_renew, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(&user.verification_token)
        .bind(user.verification_sent_at)
        .bind(user.subscription_auto_renew)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::EmailAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 > 0)
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 > 0)
    }

    /// Password login. Both unknown email and wrong password answer the same
    /// `InvalidCredentials` so the endpoint cannot be used for enumeration.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.has_password() {
            return Err(AuthError::SocialOnlyAccount);
        }

        let hash = user.password_hash.as_deref().unwrap_or_default();
        if !hashing::verify_password(password, hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    // =========================================================================
    // EMAIL VERIFICATION
    // =========================================================================

    pub async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE verification_token = ?")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    pub async fn find_receipt(&self, token: &str) -> Result<Option<VerificationReceipt>> {
        Ok(sqlx::query_as::<_, VerificationReceipt>(
            "SELECT * FROM verification_receipts WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_receipt(&self, token: &str, user_id: &str) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO verification_receipts (token, user_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the stored verification token; any previously issued link
    /// stops working.
    pub async fn set_verification_token(&self, user_id: &str, token: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE users SET verification_token = ?, verification_sent_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        // Receipts for superseded tokens are no longer meaningful.
        sqlx::query("DELETE FROM verification_receipts WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Single-use verification. The state transition is one conditional
    /// UPDATE, so two racing requests cannot both observe it: the loser's
    /// update matches zero rows and reports "already verified".
    pub async fn consume_verification_token(&self, token: &str) -> Result<VerificationOutcome> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(VerificationOutcome::Expired);
        }

        if let Some(receipt) = self.find_receipt(token).await? {
            let age = Utc::now() - receipt.created_at;
            return if age <= Duration::hours(RECEIPT_REPLAY_WINDOW_HOURS) {
                Ok(VerificationOutcome::AlreadyVerified)
            } else {
                Ok(VerificationOutcome::Expired)
            };
        }

        let window_start = Utc::now() - Duration::hours(VERIFICATION_WINDOW_HOURS);
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE verification_token = ? AND verification_sent_at > ?",
        )
        .bind(token)
        .bind(window_start)
        .fetch_optional(&self.pool)
        .await?;

        let Some(user) = user else {
            return Ok(VerificationOutcome::Expired);
        };

        if user.is_verified {
            self.insert_receipt(token, &user.id).await?;
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_token = NULL, updated_at = ?
            WHERE id = ? AND verification_token = ? AND is_verified = FALSE
            "#,
        )
        .bind(now)
        .bind(&user.id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(VerificationOutcome::AlreadyVerified);
        }

        self.insert_receipt(token, &user.id).await?;

        let mut user = user;
        user.is_verified = true;
        user.verification_token = None;
        user.updated_at = now;
        Ok(VerificationOutcome::Verified(user))
    }

    pub async fn purge_expired_receipts(&self, ttl_hours: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::hours(ttl_hours);
        let result = sqlx::query("DELETE FROM verification_receipts WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // PASSWORD RESET
    // =========================================================================

    pub async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE password_reset_token = ? AND password_reset_expires > ?",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn set_password_reset(
        &self,
        user_id: &str,
        token: &str,
        expires: chrono::DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET password_reset_token = ?, password_reset_expires = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(expires)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomic find-and-clear: the token is consumed in the same statement
    /// that checks it is still live, so it cannot be replayed.
    pub async fn consume_password_reset(&self, token: &str, new_hash: &str) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, password_reset_token = NULL,
                password_reset_expires = NULL, updated_at = ?
            WHERE password_reset_token = ? AND password_reset_expires > ?
            "#,
        )
        .bind(new_hash)
        .bind(now)
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(&self, user_id: &str, new_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(new_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // SOCIAL ACCOUNTS
    // =========================================================================

    pub async fn find_by_social_provider(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            JOIN social_accounts s ON s.user_id = u.id
            WHERE s.provider = ? AND s.provider_user_id = ?
            "#,
        )
        .bind(provider)
        .bind(provider_user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn link_social_account(&self, user_id: &str, info: &SocialUserInfo) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO social_accounts (id, user_id, provider, provider_user_id, email, name, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(info.provider)
        .bind(&info.provider_user_id)
        .bind(&info.email)
        .bind(&info.name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // Another request linked the same provider account first.
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn derive_username(&self, email: &str) -> Result<String> {
        let base = email
            .split('@')
            .next()
            .unwrap_or("user")
            .replace(['.', '+'], "_");

        if !self.username_exists(&base).await? {
            return Ok(base);
        }

        Ok(format!(
            "{}_{}",
            base,
            &Uuid::new_v4().simple().to_string()[..6]
        ))
    }

    /// Find-or-create for social logins: match by provider id first, then by
    /// email (linking the provider), otherwise create a passwordless account.
    pub async fn upsert_social_user(&self, info: &SocialUserInfo) -> Result<User> {
        if let Some(user) = self
            .find_by_social_provider(info.provider, &info.provider_user_id)
            .await?
        {
            return Ok(user);
        }

        if let Some(user) = self.find_by_email(&info.email).await? {
            self.link_social_account(&user.id, info).await?;

            if info.email_verified && !user.is_verified {
                sqlx::query(
                    "UPDATE users SET is_verified = TRUE, verification_token = NULL, updated_at = ? WHERE id = ?",
                )
                .bind(Utc::now())
                .bind(&user.id)
                .execute(&self.pool)
                .await?;
            }

            return Ok(self.find_by_id(&user.id).await?.ok_or(AuthError::UserNotFound)?);
        }

        let now = Utc::now();
        let name = info
            .name
            .clone()
            .unwrap_or_else(|| info.email.split('@').next().unwrap_or("user").to_string());

        let user = User {
            id: Uuid::new_v4().to_string(),
            email: info.email.clone(),
            username: self.derive_username(&info.email).await?,
            name,
            phone: None,
            password_hash: None,
            role: "user".to_string(),
            is_active: true,
            is_verified: info.email_verified,
            verification_token: None,
            verification_sent_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            subscription_plan: None,
            subscription_status: None,
            subscription_start: None,
            subscription_end: None,
            subscription_auto_renew: false,
            subscription_payment_id: None,
            created_at: now,
            updated_at: now,
        };

        self.create(&user).await?;
        self.link_social_account(&user.id, info).await?;

        Ok(user)
    }

    // =========================================================================
    // PROFILE
    // =========================================================================

    pub async fn update_profile(
        &self,
        user_id: &str,
        name: Option<&str>,
        username: Option<&str>,
    ) -> Result<User> {
        let user = self.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;

        let name = name.unwrap_or(&user.name);
        let username = username.unwrap_or(&user.username);

        let result = sqlx::query(
            "UPDATE users SET name = ?, username = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(username)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AuthError::UsernameAlreadyExists)
            }
            Err(e) => return Err(e.into()),
        }

        self.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)
    }

    /// Soft delete: the account can no longer log in but the row remains.
    pub async fn deactivate(&self, user_id: &str) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
