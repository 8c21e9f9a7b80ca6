//! Firebase Authentication client.
//!
//! ID tokens are RS256 JWTs signed by Google; they are checked against the
//! published JWKS. Profile lookup and account deletion go through the Identity
//! Toolkit admin API with an OAuth token minted from the service account.

use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header, encode, jwk::JwkSet, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::identity::{IdentityError, IdentityProfile, IdentityProvider};
use crate::config::IdentityConfig;

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";
const SCOPES: &str =
    "https://www.googleapis.com/auth/identitytoolkit https://www.googleapis.com/auth/cloud-platform";
const JWKS_TTL: Duration = Duration::from_secs(60 * 60);
/// Minimum gap between refreshes forced by an unknown `kid`.
const JWKS_MIN_REFRESH: Duration = Duration::from_secs(60);

/// Service-account JSON as downloaded from the Firebase console.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: Option<String>,
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub jwks_url: String,
    pub token_url: String,
    pub identity_toolkit_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            jwks_url: JWKS_URL.into(),
            token_url: TOKEN_URL.into(),
            identity_toolkit_url: IDENTITY_TOOLKIT_URL.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    message: String,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct FirebaseIdentity {
    http: reqwest::Client,
    project_id: String,
    account: ServiceAccount,
    endpoints: Endpoints,
    keys: RwLock<Option<CachedKeys>>,
    token: Mutex<Option<CachedToken>>,
}

impl FirebaseIdentity {
    pub fn new(account: ServiceAccount, project_id: String, endpoints: Endpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id,
            account,
            endpoints,
            keys: RwLock::new(None),
            token: Mutex::new(None),
        }
    }

    pub async fn from_config(cfg: &IdentityConfig) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(&cfg.credentials_path)
            .await
            .with_context(|| format!("read credentials file {}", cfg.credentials_path))?;
        let account: ServiceAccount = serde_json::from_str(&raw).context("parse service account")?;
        let project_id = cfg
            .project_id
            .clone()
            .or_else(|| account.project_id.clone())
            .context("PROJECT_ID not set and missing from credentials")?;
        let mut endpoints = Endpoints::default();
        if let Some(uri) = &account.token_uri {
            endpoints.token_url = uri.clone();
        }
        tracing::info!(project_id = %project_id, "firebase identity client initialized");
        Ok(Self::new(account, project_id, endpoints))
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn fetch_keys(&self) -> anyhow::Result<JwkSet> {
        let set = self
            .http
            .get(&self.endpoints.jwks_url)
            .send()
            .await
            .context("fetch jwks")?
            .error_for_status()
            .context("fetch jwks")?
            .json::<JwkSet>()
            .await
            .context("decode jwks")?;
        debug!(keys = set.keys.len(), "jwks refreshed");
        Ok(set)
    }

    /// Decoding key for `kid`, refreshing the cached set when stale or missing the key.
    ///
    /// A missing key forces at most one refresh per [`JWKS_MIN_REFRESH`].
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        {
            let cached = self.keys.read().await;
            if let Some(key) = Self::cached_key(cached.as_ref(), kid)? {
                return Ok(key);
            }
        }

        let mut cached = self.keys.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(key) = Self::cached_key(cached.as_ref(), kid)? {
            return Ok(key);
        }
        if cached.as_ref().is_some_and(|c| c.fetched_at.elapsed() < JWKS_MIN_REFRESH) {
            debug!(kid, "unknown key id, jwks refreshed recently");
            return Err(IdentityError::InvalidToken(format!("unknown key id {kid}")));
        }

        let set = self.fetch_keys().await?;
        let key = set.find(kid).map(DecodingKey::from_jwk);
        *cached = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });
        match key {
            Some(Ok(k)) => Ok(k),
            Some(Err(e)) => Err(IdentityError::Other(anyhow::anyhow!("bad jwk: {e}"))),
            None => Err(IdentityError::InvalidToken(format!("unknown key id {kid}"))),
        }
    }

    fn cached_key(cached: Option<&CachedKeys>, kid: &str) -> Result<Option<DecodingKey>, IdentityError> {
        let Some(jwk) = cached
            .filter(|c| c.fetched_at.elapsed() < JWKS_TTL)
            .and_then(|c| c.set.find(kid))
        else {
            return Ok(None);
        };
        DecodingKey::from_jwk(jwk)
            .map(Some)
            .map_err(|e| IdentityError::Other(anyhow::anyhow!("bad jwk: {e}")))
    }

    async fn access_token(&self) -> anyhow::Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(t) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(t.value.clone());
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: SCOPES,
            aud: &self.endpoints.token_url,
            iat: now,
            exp: now + 3600,
        };
        let key = EncodingKey::from_rsa_pem(self.account.private_key.as_bytes())
            .context("parse service account private key")?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key).context("sign assertion")?;

        let res: TokenResponse = self
            .http
            .post(&self.endpoints.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("request access token")?
            .error_for_status()
            .context("request access token")?
            .json()
            .await
            .context("decode access token")?;

        let ttl = Duration::from_secs(res.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            value: res.access_token.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(res.access_token)
    }

    async fn admin_call(&self, action: &str, body: serde_json::Value) -> Result<reqwest::Response, IdentityError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/v1/projects/{}/accounts:{}",
            self.endpoints.identity_toolkit_url, self.project_id, action
        );
        let res = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("identity toolkit {action}"))?;
        if res.status().is_success() {
            return Ok(res);
        }

        let status = res.status();
        let message = res
            .json::<GoogleError>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_default();
        if message.starts_with("USER_NOT_FOUND") {
            return Err(IdentityError::NotFound);
        }
        Err(anyhow::anyhow!("identity toolkit {action} failed: {status} {message}").into())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn verify(&self, token: &str) -> Result<String, IdentityError> {
        let header = decode_header(token).map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("missing key id".into()))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(std::slice::from_ref(&self.project_id));
        validation.set_issuer(&[self.issuer()]);
        let data = decode::<IdTokenClaims>(token, &key, &validation).map_err(|e| {
            warn!(error = %e, "id token rejected");
            IdentityError::InvalidToken(e.to_string())
        })?;

        if data.claims.sub.is_empty() {
            return Err(IdentityError::InvalidToken("empty subject".into()));
        }
        debug!(subject = %data.claims.sub, "id token verified");
        Ok(data.claims.sub)
    }

    async fn get_profile(&self, subject: &str) -> Result<IdentityProfile, IdentityError> {
        let res = self.admin_call("lookup", json!({ "localId": [subject] })).await?;
        let body: LookupResponse = res.json().await.context("decode lookup response")?;
        let user = body.users.into_iter().next().ok_or(IdentityError::NotFound)?;
        let email = user
            .email
            .ok_or_else(|| anyhow::anyhow!("identity account {subject} has no email"))?;
        Ok(IdentityProfile {
            display_name: user.display_name.unwrap_or_default(),
            email,
            photo_url: user.photo_url.filter(|u| !u.is_empty()),
        })
    }

    async fn delete(&self, subject: &str) -> Result<(), IdentityError> {
        self.admin_call("delete", json!({ "localId": subject })).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    const TEST_KEY: &str = include_str!("testdata/firebase_test_key.pem");
    const TEST_N: &str = "q3PjRUARQnhtXduaNcf9_KyLg6eyTV3-9tTAcsWxFmKTQwACailWald9OJ-YRqLEWc1KT5dD67nx9SCuu0keZYJhFj4jr-0qVrDnZwaTT5_PaEj0ewg-UnXY_2LryZIrrEqlqR0q2n3UzmGpeWI7ogkXMPTysiu4boZIsWj46O2aHLqsSGOsqY3YpT_adyTmOAxZNwxx1mvA0WY7rVAO5ntu7bky0lkO4G0eVHimmmZwk90NXpNcrbIjK_bWHd7pQmmyw4lOxM3T155XxNqzF44AQgkMPMRhAUlrS3G2tb2QY8gdaAfhxVirqdyrCZQGo6zbcNZv34linHn7WZ81UQ";
    const PROJECT: &str = "marketplace-test";

    fn client(server: &Server) -> FirebaseIdentity {
        let account = ServiceAccount {
            project_id: Some(PROJECT.into()),
            client_email: "svc@marketplace-test.iam.gserviceaccount.com".into(),
            private_key: TEST_KEY.into(),
            token_uri: None,
        };
        FirebaseIdentity::new(
            account,
            PROJECT.into(),
            Endpoints {
                jwks_url: format!("{}/jwks", server.url()),
                token_url: format!("{}/token", server.url()),
                identity_toolkit_url: server.url(),
            },
        )
    }

    fn jwks_body() -> String {
        json!({
            "keys": [{ "kty": "RSA", "alg": "RS256", "use": "sig", "kid": "kid-1", "n": TEST_N, "e": "AQAB" }]
        })
        .to_string()
    }

    fn id_token(kid: &str, aud: &str, sub: &str) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.into());
        let claims = json!({
            "iss": format!("https://securetoken.google.com/{PROJECT}"),
            "aud": aud,
            "sub": sub,
            "iat": now,
            "exp": now + 600,
            "email": "ana@usp.br",
        });
        encode(&header, &claims, &EncodingKey::from_rsa_pem(TEST_KEY.as_bytes()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn verify_accepts_token_signed_by_published_key() {
        let mut server = Server::new_async().await;
        let jwks = server
            .mock("GET", "/jwks")
            .with_header("content-type", "application/json")
            .with_body(jwks_body())
            .expect(1)
            .create_async()
            .await;
        let firebase = client(&server);

        let sub = firebase.verify(&id_token("kid-1", PROJECT, "uid-123")).await.unwrap();
        assert_eq!(sub, "uid-123");
        // second call is served from the cached key set
        firebase.verify(&id_token("kid-1", PROJECT, "uid-456")).await.unwrap();
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn verify_rejects_foreign_audience_and_unknown_key() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/jwks")
            .with_header("content-type", "application/json")
            .with_body(jwks_body())
            .create_async()
            .await;
        let firebase = client(&server);

        let err = firebase.verify(&id_token("kid-1", "other-project", "uid")).await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));

        let err = firebase.verify(&id_token("kid-9", PROJECT, "uid")).await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));

        let err = firebase.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn unknown_key_ids_do_not_refetch_within_min_interval() {
        let mut server = Server::new_async().await;
        let jwks = server
            .mock("GET", "/jwks")
            .with_header("content-type", "application/json")
            .with_body(jwks_body())
            .expect(1)
            .create_async()
            .await;
        let firebase = client(&server);

        for kid in ["kid-7", "kid-8", "kid-9"] {
            let err = firebase.verify(&id_token(kid, PROJECT, "uid")).await.unwrap_err();
            assert!(matches!(err, IdentityError::InvalidToken(_)));
        }
        // the known key is still served from the set fetched by the first miss
        firebase.verify(&id_token("kid-1", PROJECT, "uid-1")).await.unwrap();
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_key_id_refetches_once_interval_has_passed() {
        let mut server = Server::new_async().await;
        let jwks = server
            .mock("GET", "/jwks")
            .with_header("content-type", "application/json")
            .with_body(jwks_body())
            .expect(2)
            .create_async()
            .await;
        let firebase = client(&server);

        assert!(firebase.verify(&id_token("kid-7", PROJECT, "uid")).await.is_err());
        if let Some(c) = firebase.keys.write().await.as_mut() {
            c.fetched_at = Instant::now() - JWKS_MIN_REFRESH - Duration::from_secs(1);
        }
        assert!(firebase.verify(&id_token("kid-7", PROJECT, "uid")).await.is_err());
        jwks.assert_async().await;
    }

    #[tokio::test]
    async fn profile_lookup_reuses_access_token() {
        let mut server = Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                "urn:ietf:params:oauth:grant-type:jwt-bearer".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3600,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let lookup = server
            .mock("POST", format!("/v1/projects/{PROJECT}/accounts:lookup").as_str())
            .match_header("authorization", "Bearer ya29.test")
            .match_body(Matcher::Json(json!({ "localId": ["uid-1"] })))
            .with_header("content-type", "application/json")
            .with_body(
                json!({ "users": [{ "localId": "uid-1", "email": "ana@usp.br", "displayName": "Ana Souza", "photoUrl": "" }] })
                    .to_string(),
            )
            .expect(2)
            .create_async()
            .await;
        let firebase = client(&server);

        let profile = firebase.get_profile("uid-1").await.unwrap();
        assert_eq!(
            profile,
            IdentityProfile {
                display_name: "Ana Souza".into(),
                email: "ana@usp.br".into(),
                photo_url: None,
            }
        );
        firebase.get_profile("uid-1").await.unwrap();

        token.assert_async().await;
        lookup.assert_async().await;
    }

    #[tokio::test]
    async fn lookup_without_users_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_body(r#"{"access_token":"t","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("POST", format!("/v1/projects/{PROJECT}/accounts:lookup").as_str())
            .with_body("{}")
            .create_async()
            .await;

        let err = client(&server).get_profile("ghost").await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn delete_maps_missing_account() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token")
            .with_body(r#"{"access_token":"t","expires_in":3600}"#)
            .create_async()
            .await;
        server
            .mock("POST", format!("/v1/projects/{PROJECT}/accounts:delete").as_str())
            .match_body(Matcher::Json(json!({ "localId": "gone" })))
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"USER_NOT_FOUND"}}"#)
            .create_async()
            .await;
        server
            .mock("POST", format!("/v1/projects/{PROJECT}/accounts:delete").as_str())
            .match_body(Matcher::Json(json!({ "localId": "uid-1" })))
            .with_body("{}")
            .create_async()
            .await;
        let firebase = client(&server);

        assert!(matches!(firebase.delete("gone").await, Err(IdentityError::NotFound)));
        firebase.delete("uid-1").await.unwrap();
    }
}
