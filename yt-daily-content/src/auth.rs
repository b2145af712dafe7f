//! Credential storage and access-token management.
//!
//! The token cache uses the same "authorized user" JSON layout that Google's client libraries
//! write, so a `token.json` produced by them can be dropped in as-is:
//!
//! ```json
//! {
//!   "token": "ya29.a0…",
//!   "refresh_token": "1//0g…",
//!   "token_uri": "https://oauth2.googleapis.com/token",
//!   "client_id": "…apps.googleusercontent.com",
//!   "client_secret": "GOCSPX-…",
//!   "scopes": ["https://www.googleapis.com/auth/youtube.readonly"],
//!   "expiry": "2024-01-01T12:00:00.000000Z"
//! }
//! ```

use crate::error::AuthError;
use crate::oauth::{GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, OAuthManager, YOUTUBE_READONLY_SCOPE};
use eyre::Context;
use jiff::{SignedDuration, Timestamp};
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::instrument;

/// Access tokens this close to their expiry are refreshed before use.
const EXPIRY_BUFFER: SignedDuration = SignedDuration::from_secs(300);

/// Lifetime assumed when the token endpoint does not say how long a token lives.
const DEFAULT_TOKEN_LIFETIME: SignedDuration = SignedDuration::from_secs(3600);

/// A user's OAuth credential: the client it was issued to plus the tokens themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    /// The current access token, if one was ever issued.
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When [`Self::access_token`] stops working.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Timestamp>,
    /// Fields written by other tools that we carry along untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URL.to_string()
}

impl StoredCredential {
    /// Builds a credential from the result of a fresh consent flow.
    pub fn from_authorization(
        secrets: &ClientSecrets,
        token: &BasicTokenResponse,
        now: Timestamp,
    ) -> Self {
        let mut credential = Self {
            access_token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: vec![YOUTUBE_READONLY_SCOPE.to_string()],
            expiry: None,
            extra: serde_json::Map::new(),
        };
        credential.apply(token, now);
        credential
    }

    /// Whether the access token can still be used at `now`.
    ///
    /// A credential without a recorded expiry is treated as expired so that tokens loaded from
    /// disk are validated through a refresh before use.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        match (&self.access_token, self.expiry) {
            (Some(_), Some(expiry)) => expiry > now + EXPIRY_BUFFER,
            _ => false,
        }
    }

    /// Installs a token-endpoint response into this credential.
    ///
    /// Google usually omits the refresh token when refreshing. In that case the existing one is
    /// kept, as losing it would force the user through the consent flow again.
    pub fn apply(&mut self, token: &BasicTokenResponse, now: Timestamp) {
        self.access_token = Some(token.access_token().secret().clone());
        if let Some(refresh_token) = token.refresh_token() {
            tracing::debug!("new token includes refresh token");
            self.refresh_token = Some(refresh_token.secret().clone());
        } else {
            tracing::trace!("new token lacks refresh token, preserving original");
        }
        let lifetime = token
            .expires_in()
            .and_then(|d| SignedDuration::try_from(d).ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        self.expiry = Some(now + lifetime);
    }
}

/// The OAuth client downloaded from the cloud console (`credentials.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URL.to_string()
}

/// The console wraps the client in an `installed` or a `web` section depending on its type.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: ClientSecretsFile = serde_json::from_str(json)?;
        match file.installed.or(file.web) {
            Some(secrets) => Ok(secrets),
            None => Err(serde::de::Error::custom(
                "expected an `installed` or `web` client section",
            )),
        }
    }
}

/// Where credentials live between runs.
///
/// The [`Authenticator`] only ever talks to its store through this trait, which keeps the token
/// cache out of ambient global state and lets tests swap in a [`MemoryCredentialStore`].
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Human-readable location, used in error messages.
    fn location(&self) -> PathBuf;

    /// Loads the cached user credential, or `None` if there is none yet.
    fn load(&self) -> Result<Option<StoredCredential>, AuthError>;

    /// Loads the OAuth client used to bootstrap a credential, or `None` if there is none.
    fn load_client_secrets(&self) -> Result<Option<ClientSecrets>, AuthError>;

    fn save(&self, credential: &StoredCredential) -> eyre::Result<()>;
}

/// Credentials kept as `token.json` and `credentials.json` in one directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn token_path(&self) -> PathBuf {
        self.dir.join("token.json")
    }

    pub fn client_secrets_path(&self) -> PathBuf {
        self.dir.join("credentials.json")
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, AuthError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(AuthError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

impl CredentialStore for FileCredentialStore {
    fn location(&self) -> PathBuf {
        self.dir.clone()
    }

    fn load(&self) -> Result<Option<StoredCredential>, AuthError> {
        let path = self.token_path();
        let Some(json) = read_optional(&path)? else {
            tracing::debug!(path = %path.display(), "no cached token");
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| AuthError::Malformed { path, source })
    }

    fn load_client_secrets(&self) -> Result<Option<ClientSecrets>, AuthError> {
        let path = self.client_secrets_path();
        let Some(json) = read_optional(&path)? else {
            return Ok(None);
        };
        ClientSecrets::from_json(&json)
            .map(Some)
            .map_err(|source| AuthError::Malformed { path, source })
    }

    fn save(&self, credential: &StoredCredential) -> eyre::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create {}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(credential).context("serialize credential")?;
        let path = self.token_path();
        write_private(&path, json.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "saved OAuth token");
        Ok(())
    }
}

/// Writes `contents` so that only the owner can read them back; the token cache holds the
/// refresh token and client secret.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        // mode only applies to newly created files
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[derive(Debug, Default)]
struct MemoryInner {
    credential: Option<StoredCredential>,
    client_secrets: Option<ClientSecrets>,
    saves: usize,
}

/// Keeps credentials in memory only. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: StoredCredential) -> Self {
        let store = Self::new();
        store.lock().credential = Some(credential);
        store
    }

    pub fn with_client_secrets(self, secrets: ClientSecrets) -> Self {
        self.lock().client_secrets = Some(secrets);
        self
    }

    /// The credential as last loaded or saved.
    pub fn credential(&self) -> Option<StoredCredential> {
        self.lock().credential.clone()
    }

    /// How many times [`CredentialStore::save`] was called.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }

    fn load(&self) -> Result<Option<StoredCredential>, AuthError> {
        Ok(self.lock().credential.clone())
    }

    fn load_client_secrets(&self) -> Result<Option<ClientSecrets>, AuthError> {
        Ok(self.lock().client_secrets.clone())
    }

    fn save(&self, credential: &StoredCredential) -> eyre::Result<()> {
        let mut inner = self.lock();
        inner.credential = Some(credential.clone());
        inner.saves += 1;
        Ok(())
    }
}

/// Hands out bearer tokens, refreshing the stored credential when needed.
#[derive(Debug)]
pub struct Authenticator {
    store: Box<dyn CredentialStore>,
    credential: Option<StoredCredential>,
    interactive: bool,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            credential: None,
            interactive: false,
            timeout: Duration::from_secs(30),
        }
    }

    /// Allow a missing token cache to be filled through the browser consent flow.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Timeout for each request to the token endpoint.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns an access token that is valid for at least the next few minutes.
    ///
    /// The credential is loaded from the store on first use. If its access token has expired a
    /// single refresh is attempted; if that fails the run cannot continue and an [`AuthError`]
    /// is returned.
    #[instrument(skip(self), err)]
    pub async fn bearer_token(&mut self) -> eyre::Result<String> {
        let mut credential = match self.credential.take() {
            Some(credential) => credential,
            None => self.load_or_authorize().await?,
        };

        let now = Timestamp::now();
        if !credential.is_fresh(now) {
            tracing::debug!("access token expired, attempting refresh");
            self.refresh(&mut credential, now).await?;
            if let Err(e) = self.store.save(&credential) {
                // the new token still works for this run
                tracing::warn!("could not persist refreshed token: {:#}", e);
            }
        }

        let token = credential
            .access_token
            .clone()
            .ok_or(AuthError::NoRefreshToken)?;
        self.credential = Some(credential);
        Ok(token)
    }

    async fn refresh(
        &self,
        credential: &mut StoredCredential,
        now: Timestamp,
    ) -> Result<(), AuthError> {
        let Some(refresh_token) = credential.refresh_token.clone() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Err(AuthError::NoRefreshToken);
        };
        let oauth = OAuthManager::new(
            &credential.client_id,
            &credential.client_secret,
            &credential.token_uri,
            self.timeout,
        )
        .map_err(|e| AuthError::Refresh(format!("{e:#}")))?;
        let token = oauth.refresh_token(&refresh_token).await?;
        credential.apply(&token, now);
        Ok(())
    }

    async fn load_or_authorize(&self) -> eyre::Result<StoredCredential> {
        if let Some(credential) = self.store.load()? {
            tracing::debug!("loaded cached OAuth credential");
            return Ok(credential);
        }

        let missing = || AuthError::MissingCredentials(self.store.location());
        let Some(secrets) = self.store.load_client_secrets()? else {
            return Err(missing().into());
        };
        if !self.interactive {
            tracing::warn!("token cache is empty and interactive login is disabled");
            return Err(missing().into());
        }

        let oauth = OAuthManager::new(
            &secrets.client_id,
            &secrets.client_secret,
            &secrets.token_uri,
            self.timeout,
        )?;
        let token = oauth
            .authenticate(&secrets.auth_uri)
            .await
            .map_err(|e| AuthError::Consent(format!("{e:#}")))?;
        let credential = StoredCredential::from_authorization(&secrets, &token, Timestamp::now());
        self.store
            .save(&credential)
            .context("save newly authorized OAuth token")?;
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const AUTHORIZED_USER: &str = r#"{
        "token": "ya29.old",
        "refresh_token": "1//refresh",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_id": "id.apps.googleusercontent.com",
        "client_secret": "GOCSPX-secret",
        "scopes": ["https://www.googleapis.com/auth/youtube.readonly"],
        "universe_domain": "googleapis.com",
        "account": "",
        "expiry": "2024-01-01T12:00:00.123456Z"
    }"#;

    fn token_response(json: &str) -> BasicTokenResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_google_authorized_user_file() {
        let credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        assert_eq!(credential.access_token.as_deref(), Some("ya29.old"));
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(
            credential.expiry,
            Some("2024-01-01T12:00:00.123456Z".parse().unwrap())
        );
        // unknown fields survive a round trip through the cache
        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["universe_domain"], "googleapis.com");
    }

    #[test]
    fn freshness_respects_buffer() {
        let mut credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        let expiry: Timestamp = "2024-01-01T12:00:00Z".parse().unwrap();
        credential.expiry = Some(expiry);

        let long_before = expiry - SignedDuration::from_mins(30);
        let just_before = expiry - SignedDuration::from_mins(2);
        assert!(credential.is_fresh(long_before));
        assert!(!credential.is_fresh(just_before));

        credential.expiry = None;
        assert!(!credential.is_fresh(long_before));
    }

    #[test]
    fn refresh_keeps_existing_refresh_token() {
        let mut credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        let now: Timestamp = "2025-06-01T00:00:00Z".parse().unwrap();
        credential.apply(
            &token_response(
                r#"{"access_token":"ya29.new","token_type":"Bearer","expires_in":3599}"#,
            ),
            now,
        );
        assert_eq!(credential.access_token.as_deref(), Some("ya29.new"));
        assert_eq!(credential.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(
            credential.expiry,
            Some(now + SignedDuration::from_secs(3599))
        );
    }

    #[test]
    fn refresh_replaces_rotated_refresh_token() {
        let mut credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        let now = Timestamp::UNIX_EPOCH;
        credential.apply(
            &token_response(
                r#"{"access_token":"a","token_type":"Bearer","refresh_token":"1//rotated"}"#,
            ),
            now,
        );
        assert_eq!(credential.refresh_token.as_deref(), Some("1//rotated"));
        assert_eq!(credential.expiry, Some(now + DEFAULT_TOKEN_LIFETIME));
    }

    #[test]
    fn client_secrets_sections() {
        let installed = ClientSecrets::from_json(
            r#"{"installed":{"client_id":"a","client_secret":"b","redirect_uris":["http://localhost"]}}"#,
        )
        .unwrap();
        assert_eq!(installed.client_id, "a");
        assert_eq!(installed.token_uri, GOOGLE_TOKEN_URL);

        let web = ClientSecrets::from_json(
            r#"{"web":{"client_id":"c","client_secret":"d","auth_uri":"https://x/auth","token_uri":"https://x/token"}}"#,
        )
        .unwrap();
        assert_eq!(web.auth_uri, "https://x/auth");

        assert!(ClientSecrets::from_json(r#"{"other":{}}"#).is_err());
    }

    #[test]
    fn memory_store_counts_saves() {
        let credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save(&credential).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), Some(credential));
    }

    #[tokio::test]
    async fn missing_everything_is_an_auth_error() {
        let mut auth = Authenticator::new(MemoryCredentialStore::new()).interactive(true);
        let err = auth.bearer_token().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MissingCredentials(_))
        ));
    }

    #[tokio::test]
    async fn client_secrets_alone_need_interactive_login() {
        let store = MemoryCredentialStore::new().with_client_secrets(ClientSecrets {
            client_id: "a".into(),
            client_secret: "b".into(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        });
        let mut auth = Authenticator::new(store).interactive(false);
        let err = auth.bearer_token().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::MissingCredentials(_))
        ));
    }

    #[tokio::test]
    async fn fresh_token_is_used_without_refresh() {
        let mut credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        credential.expiry = Some(Timestamp::now() + SignedDuration::from_hours(1));
        // an unroutable token endpoint proves no refresh happens
        credential.token_uri = "http://127.0.0.1:9/token".into();
        let store = MemoryCredentialStore::with_credential(credential);
        let mut auth = Authenticator::new(store.clone());

        assert_eq!(auth.bearer_token().await.unwrap(), "ya29.old");
        assert_eq!(auth.bearer_token().await.unwrap(), "ya29.old");
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn expired_token_without_refresh_token() {
        let mut credential: StoredCredential = serde_json::from_str(AUTHORIZED_USER).unwrap();
        credential.refresh_token = None;
        let mut auth = Authenticator::new(MemoryCredentialStore::with_credential(credential));
        let err = auth.bearer_token().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AuthError>(),
            Some(AuthError::NoRefreshToken)
        ));
    }
}
