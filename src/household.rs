use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::id::new_uuid_v7;
use crate::members;
use crate::model::{Household, HouseholdCategory, Member};
use crate::store::{from_record, to_record, Collection, Filter, Store, StoreError};
use crate::time::now_ms;

pub const JOIN_CODE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// How join codes are drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinCodePolicy {
    pub alphabet: &'static str,
    pub length: usize,
    pub max_attempts: u32,
}

impl Default for JoinCodePolicy {
    fn default() -> Self {
        Self {
            alphabet: JOIN_CODE_ALPHABET,
            length: 6,
            max_attempts: 20,
        }
    }
}

impl JoinCodePolicy {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let symbols = self.alphabet.as_bytes();
        (0..self.length)
            .map(|_| char::from(symbols[rng.gen_range(0..symbols.len())]))
            .collect()
    }
}

/// Onboarding form: either a join code or a name plus category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OnboardingRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn decode(record: crate::store::Record) -> CoreResult<Household> {
    from_record(record).map_err(CoreError::from)
}

async fn code_in_use<S: Store + ?Sized>(store: &S, code: &str) -> CoreResult<bool> {
    let existing = store
        .select_where(Collection::Households, &Filter::new().eq("code", code))
        .await?;
    Ok(!existing.is_empty())
}

async fn attach_member<S: Store + ?Sized>(
    store: &S,
    household: &Household,
    acting: &mut Member,
    event: &'static str,
) -> CoreResult<()> {
    let previous = acting.household_id.clone();
    members::attach(store, acting, &household.id).await?;
    if let Some(previous) = previous.filter(|prev| prev != &household.id) {
        warn!(
            target: "choreboard",
            event = "household_reattached",
            member_id = %acting.id,
            previous_household_id = %previous,
            household_id = %household.id
        );
    }
    info!(
        target: "choreboard",
        event = event,
        member_id = %acting.id,
        household_id = %household.id
    );
    Ok(())
}

/// Removes a household whose creator could not be attached to it.
async fn discard_household<S: Store + ?Sized>(store: &S, household: &Household) {
    match store
        .delete(
            Collection::Households,
            &Filter::new().eq("id", household.id.as_str()),
        )
        .await
    {
        Ok(removed) => warn!(
            target: "choreboard",
            event = "household_create_rolled_back",
            household_id = %household.id,
            removed = removed
        ),
        Err(err) => error!(
            target: "choreboard",
            event = "household_rollback_failed",
            household_id = %household.id,
            error = %err
        ),
    }
}

/// Create a household with a fresh join code and attach `acting` to it.
/// If the attachment fails the inserted household is removed again.
pub async fn create_household<S: Store + ?Sized>(
    store: &S,
    name: &str,
    category: &str,
    acting: &mut Member,
    policy: &JoinCodePolicy,
) -> CoreResult<Household> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("name", "must not be empty"));
    }
    let category: HouseholdCategory = category.parse()?;

    // Fail before inserting anything if the member row is gone.
    members::get(store, &acting.id).await?;

    let mut rng = StdRng::from_entropy();
    for attempt in 1..=policy.max_attempts {
        let code = policy.sample(&mut rng);
        if code_in_use(store, &code).await? {
            info!(target: "choreboard", event = "join_code_collision", attempt = attempt);
            continue;
        }

        let household = Household {
            id: new_uuid_v7(),
            name: name.to_string(),
            category,
            code,
            created_at: now_ms(),
        };
        let stored = match store
            .insert(Collection::Households, to_record(&household)?)
            .await
        {
            Ok(record) => decode(record)?,
            Err(StoreError::Conflict(reason)) => {
                info!(target: "choreboard", event = "join_code_collision", attempt = attempt, reason = %reason);
                continue;
            }
            Err(other) => return Err(other.into()),
        };

        if let Err(err) = attach_member(store, &stored, acting, "household_created").await {
            discard_household(store, &stored).await;
            return Err(err);
        }
        return Ok(stored);
    }

    warn!(
        target: "choreboard",
        event = "join_code_exhausted",
        attempts = policy.max_attempts,
        member_id = %acting.id
    );
    Err(CoreError::CodeGenerationExhausted {
        attempts: policy.max_attempts,
    })
}

/// Attach `acting` to the household holding `code`. An existing attachment is replaced.
pub async fn join_household<S: Store + ?Sized>(
    store: &S,
    code: &str,
    acting: &mut Member,
) -> CoreResult<Household> {
    let household = match store
        .select_one(Collection::Households, &Filter::new().eq("code", code))
        .await
    {
        Ok(record) => decode(record)?,
        Err(StoreError::NotFound) => return Err(CoreError::not_found("household", code)),
        Err(other) => return Err(other.into()),
    };

    attach_member(store, &household, acting, "household_joined").await?;
    Ok(household)
}

/// Single onboarding entry point. A non-empty code wins over name and category.
pub async fn onboard<S: Store + ?Sized>(
    store: &S,
    request: &OnboardingRequest,
    acting: &mut Member,
    policy: &JoinCodePolicy,
) -> CoreResult<Household> {
    if let Some(code) = request.code.as_deref().filter(|c| !c.is_empty()) {
        return join_household(store, code, acting).await;
    }
    match (request.name.as_deref(), request.category.as_deref()) {
        (Some(name), Some(category)) => {
            create_household(store, name, category, acting, policy).await
        }
        _ => Err(CoreError::validation(
            "onboarding",
            "provide a join code or a household name and category",
        )),
    }
}

/// The household `acting` belongs to.
pub async fn household_of<S: Store + ?Sized>(store: &S, acting: &Member) -> CoreResult<Household> {
    let household_id = acting.require_household()?;
    match store
        .select_one(Collection::Households, &Filter::new().eq("id", household_id))
        .await
    {
        Ok(record) => decode(record),
        Err(StoreError::NotFound) => Err(CoreError::not_found("household", household_id)),
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Record};

    #[test]
    fn sampled_codes_use_the_alphabet_and_length() {
        let policy = JoinCodePolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let code = policy.sample(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| JOIN_CODE_ALPHABET.contains(c)));
        }
    }

    #[tokio::test]
    async fn create_attaches_creator() {
        let store = MemoryStore::new();
        let mut ana = members::register(&store, "Ana", "ana@example.com")
            .await
            .unwrap();
        let household = create_household(
            &store,
            "Flat 3B",
            "shared-flat",
            &mut ana,
            &JoinCodePolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(household.category, HouseholdCategory::SharedFlat);
        assert_eq!(ana.household_id.as_deref(), Some(household.id.as_str()));
        let stored = members::get(&store, &ana.id).await.unwrap();
        assert_eq!(stored.household_id, ana.household_id);
    }

    #[tokio::test]
    async fn create_rejects_blank_name_and_unknown_category() {
        let store = MemoryStore::new();
        let mut ana = members::register(&store, "Ana", "ana@example.com")
            .await
            .unwrap();
        let policy = JoinCodePolicy::default();

        let err = create_household(&store, "  ", "family", &mut ana, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "name", .. }));

        let err = create_household(&store, "Home", "castle", &mut ana, &policy)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "category", .. }));

        let all = store
            .select_where(Collection::Households, &Filter::new())
            .await
            .unwrap();
        assert!(all.is_empty());
        assert!(ana.household_id.is_none());
    }

    #[tokio::test]
    async fn create_for_unknown_member_leaves_no_household() {
        let store = MemoryStore::new();
        let mut ghost = Member {
            id: "ghost".into(),
            name: "Ghost".into(),
            email: "ghost@example.com".into(),
            household_id: None,
            created_at: 0,
        };
        let err = create_household(
            &store,
            "Home",
            "family",
            &mut ghost,
            &JoinCodePolicy::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, CoreError::not_found("member", "ghost"));
        let all = store
            .select_where(Collection::Households, &Filter::new())
            .await
            .unwrap();
        assert!(all.is_empty());
    }

    /// Delegates to a `MemoryStore` but fails every write to the users table.
    struct UserWritesFail {
        inner: MemoryStore,
    }

    #[async_trait::async_trait]
    impl Store for UserWritesFail {
        async fn select_where(
            &self,
            collection: Collection,
            filter: &Filter,
        ) -> Result<Vec<Record>, StoreError> {
            self.inner.select_where(collection, filter).await
        }

        async fn insert(
            &self,
            collection: Collection,
            record: Record,
        ) -> Result<Record, StoreError> {
            self.inner.insert(collection, record).await
        }

        async fn update(
            &self,
            collection: Collection,
            filter: &Filter,
            patch: Record,
        ) -> Result<Vec<Record>, StoreError> {
            if collection == Collection::Users {
                return Err(StoreError::Backend("users table is read-only".into()));
            }
            self.inner.update(collection, filter, patch).await
        }

        async fn delete(&self, collection: Collection, filter: &Filter) -> Result<u64, StoreError> {
            self.inner.delete(collection, filter).await
        }
    }

    #[tokio::test]
    async fn failed_attach_removes_the_new_household() {
        let store = UserWritesFail {
            inner: MemoryStore::new(),
        };
        let mut ana = members::register(&store.inner, "Ana", "ana@example.com")
            .await
            .unwrap();

        let err = create_household(
            &store,
            "Flat 3B",
            "shared-flat",
            &mut ana,
            &JoinCodePolicy::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::Store(_)));

        let all = store
            .select_where(Collection::Households, &Filter::new())
            .await
            .unwrap();
        assert!(all.is_empty());
        assert!(ana.household_id.is_none());
        let stored = members::get(&store, &ana.id).await.unwrap();
        assert!(stored.household_id.is_none());
    }

    #[tokio::test]
    async fn onboarding_prefers_code_over_name() {
        let store = MemoryStore::new();
        let policy = JoinCodePolicy::default();
        let mut ana = members::register(&store, "Ana", "ana@example.com")
            .await
            .unwrap();
        let mut ben = members::register(&store, "Ben", "ben@example.com")
            .await
            .unwrap();
        let flat = create_household(&store, "Flat 3B", "shared-flat", &mut ana, &policy)
            .await
            .unwrap();

        let request = OnboardingRequest {
            code: Some(flat.code.clone()),
            name: Some("Ignored".into()),
            category: Some("family".into()),
        };
        let joined = onboard(&store, &request, &mut ben, &policy).await.unwrap();
        assert_eq!(joined.id, flat.id);
        assert_eq!(ben.household_id, ana.household_id);

        let households = store
            .select_where(Collection::Households, &Filter::new())
            .await
            .unwrap();
        assert_eq!(households.len(), 1);
    }

    #[tokio::test]
    async fn onboarding_without_code_or_name_is_invalid() {
        let store = MemoryStore::new();
        let mut ana = members::register(&store, "Ana", "ana@example.com")
            .await
            .unwrap();
        let request = OnboardingRequest {
            code: Some(String::new()),
            name: None,
            category: Some("family".into()),
        };
        let err = onboard(&store, &request, &mut ana, &JoinCodePolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "onboarding", .. }));
    }

    #[tokio::test]
    async fn exhausted_code_space_fails_loudly() {
        let store = MemoryStore::new();
        let policy = JoinCodePolicy {
            alphabet: "A",
            length: 1,
            max_attempts: 3,
        };
        let mut ana = members::register(&store, "Ana", "ana@example.com")
            .await
            .unwrap();
        let mut ben = members::register(&store, "Ben", "ben@example.com")
            .await
            .unwrap();

        let first = create_household(&store, "One", "family", &mut ana, &policy)
            .await
            .unwrap();
        assert_eq!(first.code, "A");

        let err = create_household(&store, "Two", "family", &mut ben, &policy)
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::CodeGenerationExhausted { attempts: 3 });
        assert!(ben.household_id.is_none());
    }

    #[tokio::test]
    async fn household_of_requires_onboarding() {
        let store = MemoryStore::new();
        let ana = members::register(&store, "Ana", "ana@example.com")
            .await
            .unwrap();
        let err = household_of(&store, &ana).await.unwrap_err();
        assert!(matches!(err, CoreError::NotOnboarded { .. }));
    }
}
