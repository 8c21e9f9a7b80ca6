use std::collections::BTreeMap;

use tracing::{error, info, warn};

use super::identity::IdentityProfile;
use crate::error::{is_unique_violation, ApiError, ApiResult};
use crate::slug;
use crate::state::AppState;
use crate::users::repo;
use crate::users::repo_types::{NewUser, User};

/// Outcome of the allowed-email-domain policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// No allowlist configured.
    Open,
    /// Address belongs to a listed institution.
    University(String),
    Denied,
}

impl Admission {
    pub fn university(&self) -> Option<&str> {
        match self {
            Admission::University(name) => Some(name),
            _ => None,
        }
    }
}

/// Matches the exact domain of `email` against the allowlist.
pub fn admit(allowed: &BTreeMap<String, String>, email: &str) -> Admission {
    if allowed.is_empty() {
        return Admission::Open;
    }
    let domain = match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() => domain.trim().to_lowercase(),
        _ => return Admission::Denied,
    };
    match allowed.get(&domain) {
        Some(name) => Admission::University(name.clone()),
        None => Admission::Denied,
    }
}

/// Returns the stored user for `subject`, creating it on first sight.
pub async fn provision(state: &AppState, subject: &str) -> ApiResult<User> {
    if let Some(user) = repo::find_by_id(&state.db, subject).await? {
        return Ok(user);
    }
    let profile = state.identity.get_profile(subject).await?;
    let admission = admit(&state.config.allowed_email_domains, &profile.email);
    if admission == Admission::Denied {
        warn!(%subject, "email domain not allowed");
        return Err(domain_denied());
    }
    create(state, subject, &profile, admission.university()).await
}

/// Login: provisions the user and copies identity profile changes onto the row.
/// A disallowed address loses its identity account.
pub async fn login(state: &AppState, subject: &str) -> ApiResult<User> {
    let profile = state.identity.get_profile(subject).await?;
    let admission = admit(&state.config.allowed_email_domains, &profile.email);
    if admission == Admission::Denied {
        if let Err(e) = state.identity.delete(subject).await {
            error!(error = %e, %subject, "failed to delete identity account with disallowed email");
            return Err(ApiError::Internal(anyhow::anyhow!(
                "delete identity account for disallowed email: {e}"
            )));
        }
        warn!(%subject, "rejected login from disallowed email domain");
        return Err(domain_denied());
    }
    let university = admission.university();

    let Some(user) = repo::find_by_id(&state.db, subject).await? else {
        return create(state, subject, &profile, university).await;
    };
    if user.deletion_requested_at.is_some() {
        return Err(ApiError::unauthorized("account deletion pending"));
    }

    let university = university.map(str::to_string).or_else(|| user.university.clone());
    let changed = user.display_name != profile.display_name
        || user.photo_url != profile.photo_url
        || user.university != university;
    if !changed {
        return Ok(user);
    }
    let user = repo::sync_profile(
        &state.db,
        subject,
        &profile.display_name,
        profile.photo_url.as_deref(),
        university.as_deref(),
    )
    .await?;
    info!(user_id = %user.id, "synced profile from identity provider");
    Ok(user)
}

async fn create(
    state: &AppState,
    subject: &str,
    profile: &IdentityProfile,
    university: Option<&str>,
) -> ApiResult<User> {
    let slug = slug::resolve_unique(&profile.display_name, "user", |s| {
        let db = state.db.clone();
        async move { repo::slug_exists(&db, &s).await }
    })
    .await?;

    let new = NewUser {
        id: subject.to_string(),
        display_name: profile.display_name.clone(),
        email: profile.email.clone(),
        photo_url: profile.photo_url.clone(),
        university: university.map(str::to_string),
    };
    match repo::insert(&state.db, &new, &slug).await {
        Ok(user) => {
            info!(user_id = %user.id, slug = %user.slug, "user provisioned");
            Ok(user)
        }
        // Concurrent first requests for the same subject: the other one won.
        Err(e) if is_unique_violation(&e, Some("users_pkey")) => repo::find_by_id(&state.db, subject)
            .await?
            .ok_or_else(|| ApiError::conflict("user was removed concurrently")),
        Err(e) if is_unique_violation(&e, Some("idx_users_email")) => {
            Err(ApiError::conflict("email already registered"))
        }
        Err(e) if is_unique_violation(&e, Some("idx_users_slug")) => {
            Err(ApiError::conflict("slug taken concurrently, retry"))
        }
        Err(e) => Err(e.into()),
    }
}

fn domain_denied() -> ApiError {
    ApiError::forbidden("an institutional email address is required")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::fake::FakeIdentity;
    use crate::state::AppState;
    use std::sync::Arc;

    fn allowlist() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("usp.br".to_string(), "Universidade de São Paulo".to_string()),
            ("estudante.ufscar.br".to_string(), "Universidade Federal de São Carlos".to_string()),
        ])
    }

    #[test]
    fn empty_allowlist_admits_everyone() {
        assert_eq!(admit(&BTreeMap::new(), "ana@gmail.com"), Admission::Open);
        assert_eq!(Admission::Open.university(), None);
    }

    #[test]
    fn exact_domain_maps_to_university() {
        let a = admit(&allowlist(), "ana@USP.br");
        assert_eq!(a.university(), Some("Universidade de São Paulo"));
    }

    #[test]
    fn other_domains_and_subdomains_are_denied() {
        let allowed = allowlist();
        assert_eq!(admit(&allowed, "ana@gmail.com"), Admission::Denied);
        assert_eq!(admit(&allowed, "ana@ime.usp.br"), Admission::Denied);
        assert_eq!(admit(&allowed, "not-an-email"), Admission::Denied);
        assert_eq!(admit(&allowed, "@usp.br"), Admission::Denied);
    }

    #[tokio::test]
    async fn login_with_disallowed_domain_deletes_identity_account() {
        let identity = Arc::new(FakeIdentity::with_account(
            "tok",
            "sub-1",
            IdentityProfile {
                display_name: "Ana".into(),
                email: "ana@gmail.com".into(),
                photo_url: None,
            },
        ));
        let mut state = AppState::fake();
        Arc::make_mut(&mut state.config).allowed_email_domains = allowlist();
        state.identity = identity.clone();

        let err = login(&state, "sub-1").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert_eq!(*identity.deleted.lock().unwrap(), vec!["sub-1".to_string()]);
    }
}
