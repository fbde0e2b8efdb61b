//! Household-scoped records with an `Open -> Completed` lifecycle.
//!
//! Every read and write is filtered by the acting member's household before it
//! reaches the store. Completion is a conditional write on `completed = false`,
//! so a second completion (or a racing one) leaves the first attribution intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};
use crate::id::new_uuid_v7;
use crate::model::{Member, NewPurchase, NewTask, Purchase, Task};
use crate::store::{from_record, to_record, Collection, Filter, Record, Store, StoreError};
use crate::time::now_ms;

pub trait SharedEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Caller-supplied fields for a new record.
    type Draft: Send + Sync;

    const COLLECTION: Collection;
    const KIND: &'static str;

    fn validate(draft: &Self::Draft) -> CoreResult<()>;

    /// Build the stored record, stamping ownership and attribution.
    fn stamp(draft: Self::Draft, acting: &Member, household_id: &str, now: i64) -> Self;

    /// Fields written by the `Open -> Completed` transition.
    fn completion_patch(acting: &Member, now: i64) -> Record;

    fn id(&self) -> &str;
}

fn require_text(field: &'static str, value: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Upper bound for `Task::points`.
pub const MAX_POINTS: i64 = 10_000;
/// Upper bound for `Purchase::quantity`.
pub const MAX_QUANTITY: i64 = 10_000;

fn require_in_range(field: &'static str, value: i64, max: i64) -> CoreResult<()> {
    if !(1..=max).contains(&value) {
        return Err(CoreError::validation(
            field,
            format!("must be between 1 and {max}, got {value}"),
        ));
    }
    Ok(())
}

impl SharedEntity for Task {
    type Draft = NewTask;

    const COLLECTION: Collection = Collection::Tasks;
    const KIND: &'static str = "task";

    fn validate(draft: &NewTask) -> CoreResult<()> {
        require_text("title", &draft.title)?;
        require_in_range("points", draft.points, MAX_POINTS)
    }

    fn stamp(draft: NewTask, acting: &Member, household_id: &str, now: i64) -> Self {
        Task {
            id: new_uuid_v7(),
            household_id: household_id.to_string(),
            title: draft.title.trim().to_string(),
            due_at: draft.due_at,
            points: draft.points,
            created_by: acting.id.clone(),
            completed: false,
            completed_at: None,
            created_at: now,
        }
    }

    fn completion_patch(_acting: &Member, now: i64) -> Record {
        let mut patch = Record::new();
        patch.insert("completed".into(), Value::Bool(true));
        patch.insert("completed_at".into(), Value::from(now));
        patch
    }

    fn id(&self) -> &str {
        &self.id
    }
}

impl SharedEntity for Purchase {
    type Draft = NewPurchase;

    const COLLECTION: Collection = Collection::Purchases;
    const KIND: &'static str = "purchase";

    fn validate(draft: &NewPurchase) -> CoreResult<()> {
        require_text("item", &draft.item)?;
        require_in_range("quantity", draft.quantity, MAX_QUANTITY)
    }

    fn stamp(draft: NewPurchase, _acting: &Member, household_id: &str, now: i64) -> Self {
        Purchase {
            id: new_uuid_v7(),
            household_id: household_id.to_string(),
            item: draft.item.trim().to_string(),
            quantity: draft.quantity,
            completed: false,
            completed_by: None,
            completed_at: None,
            created_at: now,
        }
    }

    fn completion_patch(acting: &Member, now: i64) -> Record {
        let mut patch = Record::new();
        patch.insert("completed".into(), Value::Bool(true));
        patch.insert("completed_by".into(), Value::String(acting.id.clone()));
        patch.insert("completed_at".into(), Value::from(now));
        patch
    }

    fn id(&self) -> &str {
        &self.id
    }
}

fn decode<T: SharedEntity>(record: Record) -> CoreResult<T> {
    from_record(record).map_err(CoreError::from)
}

/// All records of kind `T` in the acting member's household, oldest first.
pub async fn list<T: SharedEntity, S: Store + ?Sized>(
    store: &S,
    acting: &Member,
) -> CoreResult<Vec<T>> {
    let household_id = acting.require_household()?;
    store
        .select_where(
            T::COLLECTION,
            &Filter::new().eq("household_id", household_id),
        )
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

pub async fn create<T: SharedEntity, S: Store + ?Sized>(
    store: &S,
    draft: T::Draft,
    acting: &Member,
) -> CoreResult<T> {
    let household_id = acting.require_household()?;
    T::validate(&draft)?;

    let record = T::stamp(draft, acting, household_id, now_ms());
    let stored: T = decode(store.insert(T::COLLECTION, to_record(&record)?).await?)?;
    info!(
        target: "choreboard",
        event = "shared_entity_created",
        kind = T::KIND,
        record_id = %stored.id(),
        household_id = %household_id,
        member_id = %acting.id
    );
    Ok(stored)
}

/// Mark a record completed. Completing an already completed record returns it unchanged.
pub async fn complete<T: SharedEntity, S: Store + ?Sized>(
    store: &S,
    record_id: &str,
    acting: &Member,
) -> CoreResult<T> {
    let household_id = acting.require_household()?;
    let open = Filter::new()
        .eq("id", record_id)
        .eq("household_id", household_id)
        .eq("completed", false);

    let updated = store
        .update(T::COLLECTION, &open, T::completion_patch(acting, now_ms()))
        .await?;
    if let Some(record) = updated.into_iter().next() {
        let completed: T = decode(record)?;
        info!(
            target: "choreboard",
            event = "shared_entity_completed",
            kind = T::KIND,
            record_id = %record_id,
            household_id = %household_id,
            member_id = %acting.id
        );
        return Ok(completed);
    }

    let scoped = Filter::new()
        .eq("id", record_id)
        .eq("household_id", household_id);
    match store.select_one(T::COLLECTION, &scoped).await {
        Ok(record) => {
            let existing: T = decode(record)?;
            info!(
                target: "choreboard",
                event = "shared_entity_already_completed",
                kind = T::KIND,
                record_id = %record_id,
                member_id = %acting.id
            );
            Ok(existing)
        }
        Err(StoreError::NotFound) => {
            warn!(
                target: "choreboard",
                event = "shared_entity_complete_rejected",
                kind = T::KIND,
                record_id = %record_id,
                household_id = %household_id,
                member_id = %acting.id
            );
            Err(CoreError::not_found(T::KIND, record_id))
        }
        Err(other) => Err(other.into()),
    }
}

/// Open records of kind `T` in the acting member's household.
pub async fn list_open<T: SharedEntity, S: Store + ?Sized>(
    store: &S,
    acting: &Member,
) -> CoreResult<Vec<T>> {
    let household_id = acting.require_household()?;
    store
        .select_where(
            T::COLLECTION,
            &Filter::new()
                .eq("household_id", household_id)
                .eq("completed", false),
        )
        .await?
        .into_iter()
        .map(decode)
        .collect()
}
