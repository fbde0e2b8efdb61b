//! Totals over completed records. Always recomputed from current state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::entities;
use crate::error::{CoreError, CoreResult};
use crate::model::{Member, Purchase, Task};
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MemberStats {
    #[ts(type = "number")]
    pub completed_count: u64,
    #[ts(type = "number")]
    pub total_points: i64,
}

/// Task totals. `per_user` is keyed by creator id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaskStats {
    #[ts(type = "number")]
    pub completed_count: u64,
    #[ts(type = "number")]
    pub total_points: i64,
    pub per_user: BTreeMap<String, MemberStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MemberPurchaseStats {
    #[ts(type = "number")]
    pub completed_count: u64,
    #[ts(type = "number")]
    pub completed_quantity: i64,
}

/// Purchase totals. `per_user` is keyed by the member who completed the purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseStats {
    #[ts(type = "number")]
    pub completed_count: u64,
    #[ts(type = "number")]
    pub completed_quantity: i64,
    pub per_user: BTreeMap<String, MemberPurchaseStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HouseholdStats {
    pub tasks: TaskStats,
    pub purchases: PurchaseStats,
}

fn add(total: i64, value: i64, field: &'static str) -> CoreResult<i64> {
    total
        .checked_add(value)
        .ok_or(CoreError::StatsOverflow { field })
}

pub fn compute_stats<'a, I>(tasks: I) -> CoreResult<TaskStats>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|task| task.completed)
        .try_fold(TaskStats::default(), |mut stats, task| -> CoreResult<TaskStats> {
            stats.completed_count += 1;
            stats.total_points = add(stats.total_points, task.points, "points")?;
            let entry = stats.per_user.entry(task.created_by.clone()).or_default();
            entry.completed_count += 1;
            entry.total_points = add(entry.total_points, task.points, "points")?;
            Ok(stats)
        })
}

pub fn compute_purchase_stats<'a, I>(purchases: I) -> CoreResult<PurchaseStats>
where
    I: IntoIterator<Item = &'a Purchase>,
{
    let mut stats = PurchaseStats::default();
    for purchase in purchases.into_iter().filter(|p| p.completed) {
        stats.completed_count += 1;
        stats.completed_quantity = add(stats.completed_quantity, purchase.quantity, "quantity")?;
        // Rows completed before attribution existed have no completer.
        if let Some(completed_by) = &purchase.completed_by {
            let entry = stats.per_user.entry(completed_by.clone()).or_default();
            entry.completed_count += 1;
            entry.completed_quantity =
                add(entry.completed_quantity, purchase.quantity, "quantity")?;
        }
    }
    Ok(stats)
}

/// Statistics for the acting member's household.
pub async fn household_stats<S: Store + ?Sized>(
    store: &S,
    acting: &Member,
) -> CoreResult<HouseholdStats> {
    let tasks = entities::list::<Task, _>(store, acting).await?;
    let purchases = entities::list::<Purchase, _>(store, acting).await?;
    Ok(HouseholdStats {
        tasks: compute_stats(&tasks)?,
        purchases: compute_purchase_stats(&purchases)?,
    })
}
