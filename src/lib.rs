//! Core of a shared-household app: households joined by code, household-scoped
//! tasks and purchases, and statistics derived from completed records.
//!
//! Every operation takes the acting [`Member`] explicitly and works against a
//! [`Store`]; there is no ambient "current user".

pub mod config;
pub mod dashboard;
pub mod db;
pub mod entities;
pub mod error;
pub mod household;
pub mod id;
pub mod identity;
pub mod logging;
pub mod members;
pub mod migrate;
pub mod model;
pub mod stats;
pub mod store;
pub mod time;

pub use config::Config;
pub use dashboard::{overview, Overview};
pub use entities::SharedEntity;
pub use error::{AppError, CoreError, CoreResult};
pub use household::{JoinCodePolicy, OnboardingRequest};
pub use identity::{require_member, IdentityContext, SessionIdentity};
pub use logging::init_logging;
pub use model::{Household, HouseholdCategory, Member, NewPurchase, NewTask, Purchase, Task};
pub use stats::{compute_purchase_stats, compute_stats, HouseholdStats, PurchaseStats, TaskStats};
pub use store::{MemoryStore, SqliteStore, Store, StoreError};
