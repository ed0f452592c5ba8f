//! Bearer tokens for the two control-plane audiences.
//!
//! Resource Manager and the Power Platform admin API use different token
//! audiences. A token for one is syntactically valid for the other and only
//! fails downstream, so every caller names its `Audience` explicitly and the
//! cache is keyed by it.

use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};

/// Token audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Audience {
    /// Azure Resource Manager.
    ResourceManager,
    /// Power Platform admin API.
    PowerPlatformAdmin,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::ResourceManager => "resource-manager",
            Audience::PowerPlatformAdmin => "power-platform-admin",
        }
    }

    /// Resource identifier requested from the identity provider.
    pub fn resource(&self) -> &'static str {
        match self {
            Audience::ResourceManager => "https://management.azure.com/",
            Audience::PowerPlatformAdmin => "https://service.powerapps.com/",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bearer token with its validity window.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Token acquired now.
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: secret.into(),
            acquired_at: Utc::now(),
            expires_at,
        }
    }

    pub fn with_acquired_at(mut self, acquired_at: DateTime<Utc>) -> Self {
        self.acquired_at = acquired_at;
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Total validity window.
    pub fn lifetime(&self) -> Duration {
        self.expires_at - self.acquired_at
    }

    /// Whether the token is still younger than `refresh_fraction` of its lifetime at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, refresh_fraction: f64) -> bool {
        let lifetime_ms = self.lifetime().num_milliseconds().max(0) as f64;
        let usable = Duration::milliseconds((lifetime_ms * refresh_fraction) as i64);
        now < self.acquired_at + usable
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Something that can mint tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a fresh token for `audience`.
    async fn fetch(&self, audience: Audience) -> CoreResult<AccessToken>;
}

/// Token source that serves fixed tokens.
pub struct StaticTokenSource {
    tokens: HashMap<Audience, String>,
    ttl: Duration,
    fetches: AtomicUsize,
    requested: RwLock<Vec<Audience>>,
}

impl Default for StaticTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticTokenSource {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            ttl: Duration::hours(1),
            fetches: AtomicUsize::new(0),
            requested: RwLock::new(Vec::new()),
        }
    }

    pub fn with_token(mut self, audience: Audience, token: impl Into<String>) -> Self {
        self.tokens.insert(audience, token.into());
        self
    }

    /// Lifetime given to every minted token.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of fetches served.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Audiences requested, in order.
    pub fn requested_audiences(&self) -> Vec<Audience> {
        self.requested.read().clone()
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self, audience: Audience) -> CoreResult<AccessToken> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.requested.write().push(audience);
        let secret = self
            .tokens
            .get(&audience)
            .ok_or_else(|| CoreError::Auth(format!("no token configured for {}", audience)))?;
        Ok(AccessToken::new(secret.clone(), Utc::now() + self.ttl))
    }
}

/// Token source that asks the Azure CLI.
#[derive(Debug, Clone)]
pub struct AzCliTokenSource {
    program: String,
    tenant_id: Option<String>,
    allow_login: bool,
}

impl Default for AzCliTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AzCliTokenSource {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
            tenant_id: None,
            allow_login: false,
        }
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Allow a device-code login when no cached session exists.
    pub fn allow_login(mut self, allow: bool) -> Self {
        self.allow_login = allow;
        self
    }

    /// Use a different executable (e.g. a wrapper script).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn get_access_token(&self, audience: Audience) -> CoreResult<Result<AccessToken, String>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["account", "get-access-token", "--resource", audience.resource(), "--output", "json"]);
        if let Some(tenant) = &self.tenant_id {
            cmd.args(["--tenant", tenant.as_str()]);
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        debug!("Requesting {} token from {}", audience, self.program);
        let output = cmd.output().await.map_err(|e| {
            CoreError::MissingPrerequisite(format!("cannot run '{}': {}", self.program, e))
        })?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(Ok(parse_az_token(&stdout)?))
        } else {
            Ok(Err(String::from_utf8_lossy(&output.stderr).trim().to_string()))
        }
    }

    async fn login(&self) -> CoreResult<()> {
        info!("No Azure CLI session, starting device-code login");
        let mut cmd = Command::new(&self.program);
        cmd.args(["login", "--use-device-code", "--output", "none"]);
        if let Some(tenant) = &self.tenant_id {
            cmd.args(["--tenant", tenant.as_str()]);
        }
        let status = cmd.status().await.map_err(|e| {
            CoreError::MissingPrerequisite(format!("cannot run '{}': {}", self.program, e))
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(CoreError::Auth(format!("'{} login' exited with {}", self.program, status)))
        }
    }
}

#[async_trait]
impl TokenSource for AzCliTokenSource {
    async fn fetch(&self, audience: Audience) -> CoreResult<AccessToken> {
        match self.get_access_token(audience).await? {
            Ok(token) => Ok(token),
            Err(stderr) if self.allow_login => {
                warn!("Token request failed: {}", stderr);
                self.login().await?;
                self.get_access_token(audience)
                    .await?
                    .map_err(CoreError::Auth)
            }
            Err(stderr) => Err(CoreError::Auth(format!(
                "{} (run 'az login' or pass --allow-login)",
                stderr
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AzCliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "expiresOn")]
    expires_on_local: Option<String>,
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<serde_json::Value>,
}

/// Parse the JSON printed by `az account get-access-token`.
///
/// Newer CLI versions print `expires_on` as a POSIX timestamp; older ones only
/// print `expiresOn` as a local-time string.
pub fn parse_az_token(json: &str) -> CoreResult<AccessToken> {
    let raw: AzCliToken = serde_json::from_str(json)?;

    let epoch = raw.expires_on_epoch.as_ref().and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    });

    let expires_at = match (epoch, raw.expires_on_local.as_deref()) {
        (Some(secs), _) => Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| CoreError::Auth(format!("invalid token expiry {}", secs)))?,
        (None, Some(local)) => {
            let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|e| CoreError::Auth(format!("invalid token expiry {:?}: {}", local, e)))?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(|| CoreError::Auth(format!("invalid token expiry {:?}", local)))?
                .with_timezone(&Utc)
        }
        (None, None) => return Err(CoreError::Auth("token response has no expiry".to_string())),
    };

    Ok(AccessToken::new(raw.access_token, expires_at))
}

/// Caching credential provider.
///
/// Tokens are reused until they pass `refresh_fraction` of their lifetime,
/// then fetched again. Callers ask before every request, so long polling
/// loops pick up a new token instead of running past expiry.
pub struct CredentialProvider {
    source: Arc<dyn TokenSource>,
    cache: Mutex<HashMap<Audience, AccessToken>>,
    refresh_fraction: f64,
}

impl CredentialProvider {
    /// Default share of a token's lifetime after which it is refreshed.
    pub const DEFAULT_REFRESH_FRACTION: f64 = 0.8;

    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            refresh_fraction: Self::DEFAULT_REFRESH_FRACTION,
        }
    }

    pub fn with_refresh_fraction(mut self, fraction: f64) -> Self {
        self.refresh_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Token for `audience`, from cache when still fresh.
    pub async fn token(&self, audience: Audience) -> CoreResult<AccessToken> {
        let cached = self.cache.lock().get(&audience).cloned();
        if let Some(token) = cached {
            if token.is_fresh_at(Utc::now(), self.refresh_fraction) {
                return Ok(token);
            }
            debug!("Refreshing {} token (expires {})", audience, token.expires_at());
        }

        let token = self.source.fetch(audience).await?;
        self.cache.lock().insert(audience, token.clone());
        Ok(token)
    }

    /// Drop the cached token for `audience`.
    pub fn invalidate(&self, audience: Audience) {
        self.cache.lock().remove(&audience);
    }
}

impl fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("cached", &self.cache.lock().keys().collect::<Vec<_>>())
            .field("refresh_fraction", &self.refresh_fraction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audiences_are_distinct() {
        assert_ne!(
            Audience::ResourceManager.resource(),
            Audience::PowerPlatformAdmin.resource()
        );
    }

    #[test]
    fn test_freshness_window() {
        let acquired = Utc::now();
        let token = AccessToken::new("t", acquired + Duration::minutes(60)).with_acquired_at(acquired);

        assert!(token.is_fresh_at(acquired + Duration::minutes(47), 0.8));
        assert!(!token.is_fresh_at(acquired + Duration::minutes(49), 0.8));
    }

    #[test]
    fn test_parse_az_token_epoch() {
        let json = r#"{"accessToken":"abc","expiresOn":"2030-01-01 10:00:00.000000","expires_on":1893492000,"tokenType":"Bearer"}"#;
        let token = parse_az_token(json).unwrap();
        assert_eq!(token.secret(), "abc");
        assert_eq!(token.expires_at().timestamp(), 1893492000);
    }

    #[test]
    fn test_parse_az_token_local_only() {
        let json = r#"{"accessToken":"abc","expiresOn":"2030-01-01 10:00:00.123456"}"#;
        let token = parse_az_token(json).unwrap();
        assert!(token.expires_at() > Utc::now());
    }

    #[test]
    fn test_parse_az_token_without_expiry() {
        let err = parse_az_token(r#"{"accessToken":"abc"}"#).unwrap_err();
        assert!(matches!(err, CoreError::Auth(_)));
    }

    #[tokio::test]
    async fn test_provider_caches_per_audience() {
        let source = Arc::new(
            StaticTokenSource::new()
                .with_token(Audience::ResourceManager, "arm")
                .with_token(Audience::PowerPlatformAdmin, "bap"),
        );
        let provider = CredentialProvider::new(source.clone());

        let arm = provider.token(Audience::ResourceManager).await.unwrap();
        let bap = provider.token(Audience::PowerPlatformAdmin).await.unwrap();
        provider.token(Audience::ResourceManager).await.unwrap();

        assert_eq!(arm.secret(), "arm");
        assert_eq!(bap.secret(), "bap");
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_provider_refreshes_expired_token() {
        let source = Arc::new(
            StaticTokenSource::new()
                .with_token(Audience::ResourceManager, "arm")
                .with_ttl(Duration::zero()),
        );
        let provider = CredentialProvider::new(source.clone());

        provider.token(Audience::ResourceManager).await.unwrap();
        provider.token(Audience::ResourceManager).await.unwrap();

        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_audience_is_auth_error() {
        let provider = CredentialProvider::new(Arc::new(
            StaticTokenSource::new().with_token(Audience::ResourceManager, "arm"),
        ));
        let err = provider.token(Audience::PowerPlatformAdmin).await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(_)));
    }

    #[tokio::test]
    async fn test_missing_az_binary_is_prerequisite_error() {
        let source = AzCliTokenSource::new().with_program("pplink-test-no-such-az-binary");
        let err = source.fetch(Audience::ResourceManager).await.unwrap_err();
        assert!(matches!(err, CoreError::MissingPrerequisite(_)));
    }
}
