//! Ownership predicates shared by the resource handlers.

use crate::error::ApiError;
use crate::users::repo_types::User;

pub fn ensure_owner(owner_id: &str, caller: &User) -> Result<(), ApiError> {
    if owner_id == caller.id {
        Ok(())
    } else {
        Err(ApiError::forbidden("you do not own this resource"))
    }
}

pub fn ensure_owner_or_admin(owner_id: &str, caller: &User) -> Result<(), ApiError> {
    if caller.is_admin() {
        return Ok(());
    }
    ensure_owner(owner_id, caller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::repo_types::{sample_user, Role};

    #[test]
    fn owner_passes_both_checks() {
        let ana = sample_user("ana", Role::User);
        assert!(ensure_owner("ana", &ana).is_ok());
        assert!(ensure_owner_or_admin("ana", &ana).is_ok());
    }

    #[test]
    fn stranger_is_forbidden() {
        let bob = sample_user("bob", Role::User);
        assert!(matches!(ensure_owner("ana", &bob), Err(ApiError::Forbidden(_))));
        assert!(matches!(ensure_owner_or_admin("ana", &bob), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn admin_only_passes_the_relaxed_check() {
        let root = sample_user("root", Role::Admin);
        assert!(ensure_owner("ana", &root).is_err());
        assert!(ensure_owner_or_admin("ana", &root).is_ok());
    }
}
