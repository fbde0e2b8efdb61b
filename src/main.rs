use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use choreboard_lib::db::open_sqlite_pool;
use choreboard_lib::error::{
    NOT_FOUND_CODE, NOT_ONBOARDED_CODE, UNAUTHENTICATED_CODE, VALIDATION_CODE,
};
use choreboard_lib::household::{create_household, household_of, join_household};
use choreboard_lib::migrate::{apply_migrations, migration_names};
use choreboard_lib::stats::household_stats;
use choreboard_lib::time::parse_rfc3339_ms;
use choreboard_lib::{
    entities, init_logging, members, overview, require_member, AppError, Config, CoreError,
    Member, NewPurchase, NewTask, Purchase, SessionIdentity, SqliteStore, Task,
};

#[derive(Debug, Parser)]
#[command(name = "choreboard", about = "Shared household chores and shopping list", version)]
struct Cli {
    /// SQLite database path. Overrides CHOREBOARD_DB.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending schema migrations and list the known ones.
    Migrate,
    #[command(subcommand)]
    Member(MemberCommand),
    #[command(subcommand)]
    Household(HouseholdCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Purchase(PurchaseCommand),
    /// Task and purchase statistics for the member's household.
    Stats(Acting),
    /// Household plus its open tasks and purchases.
    Overview(Acting),
}

#[derive(Debug, Args)]
struct Acting {
    /// Id of the signed-in member.
    #[arg(long)]
    member: Option<String>,
}

#[derive(Debug, Subcommand)]
enum MemberCommand {
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    Show(Acting),
    Rename {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        name: String,
    },
    Email {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        email: String,
    },
    /// Members of the signed-in member's household.
    List(Acting),
}

#[derive(Debug, Subcommand)]
enum HouseholdCommand {
    Create {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        name: String,
        /// shared-flat or family
        #[arg(long)]
        category: String,
    },
    Join {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        code: String,
    },
    Show(Acting),
}

#[derive(Debug, Subcommand)]
enum TaskCommand {
    Add {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        title: String,
        #[arg(long, allow_hyphen_values = true)]
        points: i64,
        /// Due date as RFC 3339.
        #[arg(long)]
        due: Option<String>,
    },
    List(Acting),
    Done {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        id: String,
    },
}

#[derive(Debug, Subcommand)]
enum PurchaseCommand {
    Add {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        item: String,
        #[arg(long, allow_hyphen_values = true)]
        quantity: i64,
    },
    List(Acting),
    Done {
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => 0,
        Err(err) => {
            let app_error = AppError::from(err);
            eprintln!("Error: [{}] {}", app_error.code(), app_error.message());
            exit_code(app_error.code())
        }
    };
    process::exit(code);
}

fn exit_code(code: &str) -> i32 {
    match code {
        VALIDATION_CODE => 2,
        NOT_FOUND_CODE => 3,
        NOT_ONBOARDED_CODE | UNAUTHENTICATED_CODE => 4,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env().context("read configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    init_logging(&config.log_filter);

    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    runtime.block_on(async {
        let pool = open_sqlite_pool(&config.db_path).await?;
        apply_migrations(&pool).await?;
        let store = SqliteStore::new(pool.clone());
        let result = dispatch(&store, &config, cli.command).await;
        pool.close().await;
        result
    })
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value).context("serialize command output")?;
    println!("{serialized}");
    Ok(())
}

async fn sign_in(store: &SqliteStore, acting: &Acting) -> Result<Member> {
    let session = match acting.member.as_deref() {
        Some(member_id) => SessionIdentity::signed_in(members::get(store, member_id).await?),
        None => SessionIdentity::signed_out(),
    };
    Ok(require_member(&session)?)
}

async fn dispatch(store: &SqliteStore, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Migrate => emit(&json!({ "migrations": migration_names().collect::<Vec<_>>() })),
        Commands::Member(command) => handle_member(store, command).await,
        Commands::Household(command) => handle_household(store, config, command).await,
        Commands::Task(command) => handle_task(store, command).await,
        Commands::Purchase(command) => handle_purchase(store, command).await,
        Commands::Stats(acting) => {
            let member = sign_in(store, &acting).await?;
            emit(&household_stats(store, &member).await?)
        }
        Commands::Overview(acting) => {
            let member = sign_in(store, &acting).await?;
            emit(&overview(store, &member).await?)
        }
    }
}

async fn handle_member(store: &SqliteStore, command: MemberCommand) -> Result<()> {
    match command {
        MemberCommand::Register { name, email } => {
            emit(&members::register(store, &name, &email).await?)
        }
        MemberCommand::Show(acting) => emit(&sign_in(store, &acting).await?),
        MemberCommand::Rename { acting, name } => {
            let mut member = sign_in(store, &acting).await?;
            members::rename(store, &mut member, &name).await?;
            emit(&member)
        }
        MemberCommand::Email { acting, email } => {
            let mut member = sign_in(store, &acting).await?;
            members::update_email(store, &mut member, &email).await?;
            emit(&member)
        }
        MemberCommand::List(acting) => {
            let member = sign_in(store, &acting).await?;
            emit(&members::household_members(store, &member).await?)
        }
    }
}

async fn handle_household(
    store: &SqliteStore,
    config: &Config,
    command: HouseholdCommand,
) -> Result<()> {
    match command {
        HouseholdCommand::Create {
            acting,
            name,
            category,
        } => {
            let mut member = sign_in(store, &acting).await?;
            let household =
                create_household(store, &name, &category, &mut member, &config.join_code).await?;
            emit(&json!({ "household": household, "member": member }))
        }
        HouseholdCommand::Join { acting, code } => {
            let mut member = sign_in(store, &acting).await?;
            let household = join_household(store, code.trim(), &mut member).await?;
            emit(&json!({ "household": household, "member": member }))
        }
        HouseholdCommand::Show(acting) => {
            let member = sign_in(store, &acting).await?;
            emit(&household_of(store, &member).await?)
        }
    }
}

async fn handle_task(store: &SqliteStore, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::Add {
            acting,
            title,
            points,
            due,
        } => {
            let member = sign_in(store, &acting).await?;
            let due_at = due
                .as_deref()
                .map(|raw| {
                    parse_rfc3339_ms(raw).ok_or_else(|| {
                        CoreError::validation("due_at", format!("'{raw}' is not an RFC 3339 date"))
                    })
                })
                .transpose()?;
            let draft = NewTask {
                title,
                due_at,
                points,
            };
            emit(&entities::create::<Task, _>(store, draft, &member).await?)
        }
        TaskCommand::List(acting) => {
            let member = sign_in(store, &acting).await?;
            emit(&entities::list::<Task, _>(store, &member).await?)
        }
        TaskCommand::Done { acting, id } => {
            let member = sign_in(store, &acting).await?;
            emit(&entities::complete::<Task, _>(store, &id, &member).await?)
        }
    }
}

async fn handle_purchase(store: &SqliteStore, command: PurchaseCommand) -> Result<()> {
    match command {
        PurchaseCommand::Add {
            acting,
            item,
            quantity,
        } => {
            let member = sign_in(store, &acting).await?;
            let draft = NewPurchase { item, quantity };
            emit(&entities::create::<Purchase, _>(store, draft, &member).await?)
        }
        PurchaseCommand::List(acting) => {
            let member = sign_in(store, &acting).await?;
            emit(&entities::list::<Purchase, _>(store, &member).await?)
        }
        PurchaseCommand::Done { acting, id } => {
            let member = sign_in(store, &acting).await?;
            emit(&entities::complete::<Purchase, _>(store, &id, &member).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(exit_code(VALIDATION_CODE), 2);
        assert_eq!(exit_code(NOT_FOUND_CODE), 3);
        assert_eq!(exit_code(NOT_ONBOARDED_CODE), 4);
        assert_eq!(exit_code(UNAUTHENTICATED_CODE), 4);
        assert_eq!(exit_code("STORE/FAILURE"), 1);
    }

    #[test]
    fn negative_points_reach_validation() {
        let cli = Cli::try_parse_from([
            "choreboard", "task", "add", "--member", "m1", "--title", "Dishes", "--points", "-1",
        ])
        .expect("parse");
        match cli.command {
            Commands::Task(TaskCommand::Add { points, .. }) => assert_eq!(points, -1),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
