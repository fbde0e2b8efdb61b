use std::sync::Mutex;

use tracing::info;

use crate::error::CoreError;
use crate::model::Member;

/// Source of the signed-in member. Sign-in itself happens elsewhere; the core only reads.
pub trait IdentityContext: Send + Sync {
    fn current_member(&self) -> Option<Member>;
    fn logout(&self);
}

/// Resolves the acting member or fails with `Unauthenticated`.
pub fn require_member(identity: &dyn IdentityContext) -> Result<Member, CoreError> {
    identity.current_member().ok_or(CoreError::Unauthenticated)
}

/// In-memory session holding the member a front end signed in.
#[derive(Default)]
pub struct SessionIdentity {
    current: Mutex<Option<Member>>,
}

impl SessionIdentity {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(member: Member) -> Self {
        Self {
            current: Mutex::new(Some(member)),
        }
    }
}

impl IdentityContext for SessionIdentity {
    fn current_member(&self) -> Option<Member> {
        self.current
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn logout(&self) {
        if let Ok(mut guard) = self.current.lock() {
            if let Some(member) = guard.take() {
                info!(target: "choreboard", event = "member_logged_out", member_id = %member.id);
            }
        }
    }
}
