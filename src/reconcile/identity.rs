//! Identity resolution: find or create the paying user, inside the
//! orchestrator's transaction.

use chrono::Utc;
use sqlx::{FromRow, Sqlite, Transaction};
use uuid::Uuid;

use crate::{
    auth,
    domain::{UserFields, UserRole},
};

use super::{FatalReason, ReconcileError};

#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    role: String,
}

/// Resolve the submission's user half to a concrete account.
///
/// An explicit `user_id` must exist. Otherwise the email is looked up;
/// a miss registers a fresh account, for which a password is mandatory.
/// Profile fields are only ever overwritten with non-empty values, and
/// the role moves `User -> VenueManager` at most (admin untouched).
pub(super) async fn resolve(
    tx: &mut Transaction<'_, Sqlite>,
    fields: &UserFields,
) -> Result<ResolvedUser, ReconcileError> {
    if let Some(user_id) = fields.user_id {
        let row = find_by_id(tx, user_id)
            .await?
            .ok_or(FatalReason::UserNotFound(user_id))?;
        return update_existing(tx, row, fields, false).await;
    }

    let email = fields.email.trim();
    if email.is_empty() {
        return Err(FatalReason::MissingField("email").into());
    }

    if let Some(row) = find_by_email(tx, email).await? {
        // Session-less path: a freshly supplied password replaces the
        // stored hash so the payer can actually log in afterwards.
        return update_existing(tx, row, fields, true).await;
    }

    register(tx, email, fields).await
}

async fn find_by_id(
    tx: &mut Transaction<'_, Sqlite>,
    id: Uuid,
) -> Result<Option<UserRow>, ReconcileError> {
    let row = sqlx::query_as::<_, UserRow>("SELECT id, email, role FROM users WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

async fn find_by_email(
    tx: &mut Transaction<'_, Sqlite>,
    email: &str,
) -> Result<Option<UserRow>, ReconcileError> {
    let row = sqlx::query_as::<_, UserRow>("SELECT id, email, role FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row)
}

async fn update_existing(
    tx: &mut Transaction<'_, Sqlite>,
    row: UserRow,
    fields: &UserFields,
    allow_password_update: bool,
) -> Result<ResolvedUser, ReconcileError> {
    let id = Uuid::parse_str(&row.id)
        .map_err(|e| FatalReason::DataIntegrity(format!("invalid user uuid: {}", e)))?;

    let role = UserRole::parse(&row.role).ok_or_else(|| {
        FatalReason::DataIntegrity(format!("invalid user role: {}", row.role))
    })?;

    let name = fields.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let phone = fields.phone.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let password = fields
        .password
        .as_deref()
        .filter(|s| allow_password_update && !s.is_empty());

    let password_hash = password.map(hash).transpose()?;
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            password_hash = COALESCE(?, password_hash),
            role = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(phone)
    .bind(password_hash)
    .bind(role.promoted_for_paid_action().as_str())
    .bind(now)
    .bind(&row.id)
    .execute(&mut **tx)
    .await?;

    Ok(ResolvedUser {
        id,
        email: row.email,
    })
}

async fn register(
    tx: &mut Transaction<'_, Sqlite>,
    email: &str,
    fields: &UserFields,
) -> Result<ResolvedUser, ReconcileError> {
    let password = fields
        .password
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(FatalReason::MissingPassword)?;

    let password_hash = hash(password)?;
    let id = Uuid::new_v4();
    let name = fields.name.as_deref().map(str::trim).unwrap_or("");
    let phone = fields.phone.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, phone, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(email)
    .bind(name)
    .bind(phone)
    .bind(password_hash)
    .bind(UserRole::VenueManager.as_str())
    .bind(now)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(ResolvedUser {
        id,
        email: email.to_string(),
    })
}

fn hash(password: &str) -> Result<String, ReconcileError> {
    auth::hash_password(password)
        .map_err(|e| FatalReason::Storage(format!("password hashing failed: {}", e)).into())
}
