use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::info;

use crate::error::{CoreError, CoreResult};
use crate::id::new_uuid_v7;
use crate::model::Member;
use crate::store::{from_record, to_record, Collection, Filter, Record, Store, StoreError};
use crate::time::now_ms;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email validation pattern to compile")
});

fn validate_name(name: &str) -> CoreResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn validate_email(email: &str) -> CoreResult<String> {
    let trimmed = email.trim();
    if !EMAIL_PATTERN.is_match(trimmed) {
        return Err(CoreError::validation(
            "email",
            format!("'{trimmed}' is not an email address"),
        ));
    }
    Ok(trimmed.to_string())
}

fn decode(record: Record) -> CoreResult<Member> {
    from_record(record).map_err(CoreError::from)
}

/// Create the store-side row for a freshly issued identity.
pub async fn register<S: Store + ?Sized>(store: &S, name: &str, email: &str) -> CoreResult<Member> {
    let member = Member {
        id: new_uuid_v7(),
        name: validate_name(name)?,
        email: validate_email(email)?,
        household_id: None,
        created_at: now_ms(),
    };
    let stored = store.insert(Collection::Users, to_record(&member)?).await?;
    let member = decode(stored)?;
    info!(target: "choreboard", event = "member_registered", member_id = %member.id);
    Ok(member)
}

pub async fn get<S: Store + ?Sized>(store: &S, member_id: &str) -> CoreResult<Member> {
    match store
        .select_one(Collection::Users, &Filter::new().eq("id", member_id))
        .await
    {
        Ok(record) => decode(record),
        Err(StoreError::NotFound) => Err(CoreError::not_found("member", member_id)),
        Err(other) => Err(other.into()),
    }
}

async fn patch_member<S: Store + ?Sized>(
    store: &S,
    member: &mut Member,
    column: &'static str,
    value: Value,
) -> CoreResult<()> {
    let mut patch = Record::new();
    patch.insert(column.to_string(), value);
    let updated = store
        .update(Collection::Users, &Filter::new().eq("id", member.id.as_str()), patch)
        .await?;
    let record = updated
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::not_found("member", member.id.clone()))?;
    *member = decode(record)?;
    Ok(())
}

pub async fn rename<S: Store + ?Sized>(store: &S, member: &mut Member, name: &str) -> CoreResult<()> {
    let name = validate_name(name)?;
    patch_member(store, member, "name", Value::String(name)).await?;
    info!(target: "choreboard", event = "member_updated", member_id = %member.id, field = "name");
    Ok(())
}

pub async fn update_email<S: Store + ?Sized>(
    store: &S,
    member: &mut Member,
    email: &str,
) -> CoreResult<()> {
    let email = validate_email(email)?;
    patch_member(store, member, "email", Value::String(email)).await?;
    info!(target: "choreboard", event = "member_updated", member_id = %member.id, field = "email");
    Ok(())
}

/// Point `member` at `household_id`. Only the household registry calls this.
pub(crate) async fn attach<S: Store + ?Sized>(
    store: &S,
    member: &mut Member,
    household_id: &str,
) -> CoreResult<()> {
    patch_member(
        store,
        member,
        "household_id",
        Value::String(household_id.to_string()),
    )
    .await
}

pub async fn household_members<S: Store + ?Sized>(
    store: &S,
    acting: &Member,
) -> CoreResult<Vec<Member>> {
    let household_id = acting.require_household()?;
    store
        .select_where(
            Collection::Users,
            &Filter::new().eq("household_id", household_id),
        )
        .await?
        .into_iter()
        .map(decode)
        .collect()
}
