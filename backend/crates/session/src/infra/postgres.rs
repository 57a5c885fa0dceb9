//! PostgreSQL Profile Store

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::profile::{Profile, ProfileUpdate};
use crate::domain::repository::ProfileStore;
use crate::domain::value_object::{IdentityHandle, ProfileStatus, UserRole};
use crate::error::{SessionError, SessionResult};

/// PostgreSQL-backed profile store (`admin_profiles` table)
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or replace a profile (operator tooling, seeding)
    pub async fn upsert_profile(&self, handle: &IdentityHandle, profile: &Profile) -> SessionResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_profiles (
                identity,
                role,
                status,
                email,
                display_name,
                login_count,
                last_login,
                last_logout,
                password_changed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (identity) DO UPDATE SET
                role = EXCLUDED.role,
                status = EXCLUDED.status,
                email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                updated_at = now()
            "#,
        )
        .bind(handle.as_str())
        .bind(profile.role.code())
        .bind(profile.status.code())
        .bind(profile.email.as_deref())
        .bind(profile.display_name.as_deref())
        .bind(count_to_db(profile.login_count)?)
        .bind(profile.last_login)
        .bind(profile.last_logout)
        .bind(profile.password_changed_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(identity = %handle, role = %profile.role, "Admin profile upserted");
        Ok(())
    }
}

impl ProfileStore for PgProfileStore {
    async fn get_profile(&self, handle: &IdentityHandle) -> SessionResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT
                role,
                status,
                email,
                display_name,
                login_count,
                last_login,
                last_logout,
                password_changed_at
            FROM admin_profiles
            WHERE identity = $1
            "#,
        )
        .bind(handle.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProfileRow::into_profile).transpose()
    }

    async fn write_profile_fields(
        &self,
        handle: &IdentityHandle,
        update: &ProfileUpdate,
    ) -> SessionResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let login_count = update.login_count.map(count_to_db).transpose()?;
        let affected = sqlx::query(
            r#"
            UPDATE admin_profiles SET
                login_count = COALESCE($2, login_count),
                last_login = COALESCE($3, last_login),
                last_logout = COALESCE($4, last_logout),
                password_changed_at = COALESCE($5, password_changed_at),
                updated_at = now()
            WHERE identity = $1
            "#,
        )
        .bind(handle.as_str())
        .bind(login_count)
        .bind(update.last_login)
        .bind(update.last_logout)
        .bind(update.password_changed_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(SessionError::ProfileNotFound);
        }
        Ok(())
    }
}

fn count_to_db(count: u64) -> SessionResult<i64> {
    i64::try_from(count).map_err(|_| SessionError::Store(format!("login_count out of range: {count}")))
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    role: String,
    status: String,
    email: Option<String>,
    display_name: Option<String>,
    login_count: i64,
    last_login: Option<DateTime<Utc>>,
    last_logout: Option<DateTime<Utc>>,
    password_changed_at: Option<DateTime<Utc>>,
}

impl ProfileRow {
    fn into_profile(self) -> SessionResult<Profile> {
        let role = UserRole::from_code(&self.role)
            .ok_or_else(|| SessionError::Store(format!("Invalid role: {}", self.role)))?;
        let status = ProfileStatus::from_code(&self.status)
            .ok_or_else(|| SessionError::Store(format!("Invalid status: {}", self.status)))?;

        Ok(Profile {
            role,
            status,
            email: self.email,
            display_name: self.display_name,
            login_count: u64::try_from(self.login_count).unwrap_or_default(),
            last_login: self.last_login,
            last_logout: self.last_logout,
            password_changed_at: self.password_changed_at,
        })
    }
}
