use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

/// A person using the app. `household_id` is `None` until onboarding completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    #[ts(optional)]
    pub household_id: Option<String>,
    #[ts(type = "number")]
    pub created_at: i64,
}

impl Member {
    /// The household this member acts in, or `NotOnboarded`.
    pub fn require_household(&self) -> Result<&str, CoreError> {
        self.household_id
            .as_deref()
            .ok_or_else(|| CoreError::NotOnboarded {
                member_id: self.id.clone(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum HouseholdCategory {
    SharedFlat,
    Family,
}

impl HouseholdCategory {
    pub const ALL: &'static [HouseholdCategory] =
        &[HouseholdCategory::SharedFlat, HouseholdCategory::Family];

    pub fn as_str(self) -> &'static str {
        match self {
            HouseholdCategory::SharedFlat => "shared-flat",
            HouseholdCategory::Family => "family",
        }
    }
}

impl fmt::Display for HouseholdCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HouseholdCategory {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "shared-flat" | "WG" => Ok(HouseholdCategory::SharedFlat),
            "family" | "Familie" => Ok(HouseholdCategory::Family),
            other => Err(CoreError::validation(
                "category",
                format!(
                    "'{other}' is not one of {}",
                    HouseholdCategory::ALL
                        .iter()
                        .map(|c| c.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Household {
    pub id: String,
    pub name: String,
    pub category: HouseholdCategory,
    pub code: String,
    #[ts(type = "number")]
    pub created_at: i64,
}

/// A chore. Completion is group-attributed, so there is no completed-by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Task {
    pub id: String,
    pub household_id: String,
    pub title: String,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub due_at: Option<i64>,
    #[ts(type = "number")]
    pub points: i64,
    pub created_by: String,
    #[serde(deserialize_with = "flag")]
    pub completed: bool,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub completed_at: Option<i64>,
    #[ts(type = "number")]
    pub created_at: i64,
}

/// A shopping list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Purchase {
    pub id: String,
    pub household_id: String,
    pub item: String,
    #[ts(type = "number")]
    pub quantity: i64,
    #[serde(deserialize_with = "flag")]
    pub completed: bool,
    #[serde(default)]
    #[ts(optional)]
    pub completed_by: Option<String>,
    #[serde(default)]
    #[ts(optional, type = "number")]
    pub completed_at: Option<i64>,
    #[ts(type = "number")]
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub due_at: Option<i64>,
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPurchase {
    pub item: String,
    pub quantity: i64,
}

// SQLite hands booleans back as INTEGER 0/1.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::Int(value) => value != 0,
    })
}
