use serde::Serialize;
use ts_rs::TS;

use crate::entities;
use crate::error::CoreResult;
use crate::household::household_of;
use crate::model::{Household, Member, Purchase, Task};
use crate::store::Store;

/// Landing view for an onboarded member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Overview {
    pub household: Household,
    pub open_tasks: Vec<Task>,
    pub open_purchases: Vec<Purchase>,
}

pub async fn overview<S: Store + ?Sized>(store: &S, acting: &Member) -> CoreResult<Overview> {
    let household = household_of(store, acting).await?;
    let open_tasks = entities::list_open::<Task, _>(store, acting).await?;
    let open_purchases = entities::list_open::<Purchase, _>(store, acting).await?;
    Ok(Overview {
        household,
        open_tasks,
        open_purchases,
    })
}
