#![allow(clippy::unwrap_used)]

use anyhow::Result;
use choreboard_lib::entities::{complete, create, list};
use choreboard_lib::{members, stats, CoreError, NewPurchase, NewTask, Purchase, Task};

mod util;

#[tokio::test]
async fn lists_never_leak_across_households() -> Result<()> {
    let store = util::migrated_store().await;
    let (_, ana) = util::household_with_creator(&store, "Ana").await;
    let (_, ben) = util::household_with_creator(&store, "Ben").await;

    let _: Task = create(
        &store,
        NewTask {
            title: "Ana's chore".into(),
            due_at: None,
            points: 3,
        },
        &ana,
    )
    .await?;
    let _: Purchase = create(
        &store,
        NewPurchase {
            item: "Ben's bread".into(),
            quantity: 1,
        },
        &ben,
    )
    .await?;

    let ana_tasks = list::<Task, _>(&store, &ana).await?;
    assert_eq!(ana_tasks.len(), 1);
    assert!(list::<Task, _>(&store, &ben).await?.is_empty());
    assert!(list::<Purchase, _>(&store, &ana).await?.is_empty());
    assert_eq!(list::<Purchase, _>(&store, &ben).await?.len(), 1);

    let roster = members::household_members(&store, &ana).await?;
    assert_eq!(roster, vec![ana.clone()]);
    Ok(())
}

#[tokio::test]
async fn foreign_record_cannot_be_completed() -> Result<()> {
    let store = util::migrated_store().await;
    let (_, ana) = util::household_with_creator(&store, "Ana").await;
    let (_, ben) = util::household_with_creator(&store, "Ben").await;

    let task: Task = create(
        &store,
        NewTask {
            title: "Dishes".into(),
            due_at: None,
            points: 2,
        },
        &ana,
    )
    .await?;

    let err = complete::<Task, _>(&store, &task.id, &ben).await.unwrap_err();
    assert_eq!(err, CoreError::not_found("task", task.id.clone()));

    let untouched = list::<Task, _>(&store, &ana).await?;
    assert!(!untouched[0].completed);
    Ok(())
}

#[tokio::test]
async fn stats_only_count_the_members_household() -> Result<()> {
    let store = util::migrated_store().await;
    let (_, ana) = util::household_with_creator(&store, "Ana").await;
    let (_, ben) = util::household_with_creator(&store, "Ben").await;

    for (member, points) in [(&ana, 2), (&ben, 7)] {
        let task: Task = create(
            &store,
            NewTask {
                title: "Chore".into(),
                due_at: None,
                points,
            },
            member,
        )
        .await?;
        complete::<Task, _>(&store, &task.id, member).await?;
    }

    let ana_stats = stats::household_stats(&store, &ana).await?;
    assert_eq!(ana_stats.tasks.completed_count, 1);
    assert_eq!(ana_stats.tasks.total_points, 2);
    assert!(!ana_stats.tasks.per_user.contains_key(&ben.id));
    Ok(())
}
