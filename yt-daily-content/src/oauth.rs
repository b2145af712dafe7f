//! OAuth 2.0 flows against Google's identity platform.
//!
//! Two operations are supported: exchanging a refresh token for a new access token, and the
//! one-time installed-app consent flow that produces the first refresh token. The consent flow
//! opens the user's browser and receives the authorization code on a loopback HTTP server.

use crate::error::AuthError;
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RefreshToken, Scope, TokenUrl, reqwest,
};
use std::future::Future;
use std::time::Duration;

/// Read-only access is all we need to list subscriptions and uploads.
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

const OAUTH_DONE: &str = include_str!("../oauth_success.html");

/// Performs OAuth requests on behalf of one OAuth client.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: reqwest::Client,
}

impl OAuthManager {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        token_url: impl Into<String>,
        timeout: Duration,
    ) -> eyre::Result<Self> {
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: token_url.into(),
            http,
        })
    }

    /// Exchanges `refresh_token` for a fresh access token.
    ///
    /// This is a single attempt. An `invalid_grant` answer means the user revoked access (or the
    /// refresh token aged out) and maps to [`AuthError::Revoked`]; every other failure maps to
    /// [`AuthError::Refresh`].
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<BasicTokenResponse, AuthError> {
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| AuthError::Refresh(format!("invalid token endpoint: {e}")))?;
        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(token_url);

        tracing::debug!(token_url = %self.token_url, "attempting to refresh OAuth token");
        let refresh_token = RefreshToken::new(refresh_token.to_string());
        match client
            .exchange_refresh_token(&refresh_token)
            .request_async(&self.http)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(new_token)
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(sr.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Err(AuthError::Revoked)
            }
            Err(e) => {
                tracing::warn!("OAuth refresh failed: {}", e);
                Err(AuthError::Refresh(e.to_string()))
            }
        }
    }

    /// Runs the installed-app consent flow and returns the resulting token.
    ///
    /// 1. binds a loopback redirect server on a random port
    /// 2. opens the consent page in the user's browser
    /// 3. waits for Google to redirect back with an authorization code
    /// 4. exchanges the code (with the PKCE verifier) for tokens
    pub async fn authenticate(&self, auth_url: &str) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = setup_redirect(csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).context("parse auth_uri")?)
            .set_token_uri(TokenUrl::new(self.token_url.clone()).context("parse token_uri")?)
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (consent_url, _csrf_token) = client
            // The flow runs exactly once, so the CSRF token is never re-used.
            .authorize_url(move || csrf.clone())
            .add_scope(Scope::new(YOUTUBE_READONLY_SCOPE.to_string()))
            // Without offline access Google does not hand out a refresh token.
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %consent_url, "asking user to follow OAuth flow");
        eprintln!("Opening your browser to grant read-only YouTube access:\n  {consent_url}");
        if let Err(e) = webbrowser::open(consent_url.as_ref()) {
            tracing::warn!("could not open browser, visit the URL manually: {}", e);
        }
        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let token = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("exchange authorization code for access token")?;

        Ok(token)
    }
}

/// Starts a one-shot HTTP server on localhost that waits for the OAuth redirect.
///
/// Returns the redirect URL to hand to Google and a future resolving to the authorization code
/// once the browser has been redirected back with a matching `state`.
async fn setup_redirect(
    csrf: CsrfToken,
) -> eyre::Result<(
    RedirectUrl,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind to localhost")?;
    let addr = socket.local_addr().context("get local address")?;
    let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
        .context("construct redirect url")?;
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (conn, _) = socket.accept().await.context("accept")?;
            let conn = hyper_util::rt::TokioIo::new(conn);
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            let service = service_fn(move |req: Request<body::Incoming>| {
                let csrf = csrf.clone();
                let got = got.clone();
                async move {
                    let (state, code) = callback_params(req.uri().query().unwrap_or(""));
                    if state.as_deref() != Some(csrf.secret().as_str()) {
                        return Err("invalid csrf token");
                    }
                    let Some(code) = code else {
                        return Err("no authorization code found");
                    };
                    if got.send(AuthorizationCode::new(code)).await.is_err() {
                        return Err("authorization code receiver went away");
                    }
                    Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE)))
                }
            });
            let mut serve = std::pin::pin!(
                hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
            );

            tokio::select! {
                exit = &mut serve => {
                    if let Err(e) = exit {
                        Err(e).context("redirect server got bad request")
                    } else {
                        eyre::bail!("redirect server exit prematurely");
                    }
                }
                code = gotten.recv() => {
                    serve.as_mut().graceful_shutdown();
                    // let the success page reach the browser
                    let _ = serve.await;
                    code.ok_or_else(|| eyre::eyre!("redirect handler dropped without a code"))
                }
            }
        };
        let _ = tx.send(r.await);
    });
    Ok((url, async move {
        rx.await.context("redirect future dropped prematurely")?
    }))
}

/// Extracts `state` and `code` from the redirect's query string.
fn callback_params(query: &str) -> (Option<String>, Option<String>) {
    let mut state = None;
    let mut code = None;
    for (k, v) in form_urlencoded::parse(query.as_bytes()) {
        match &*k {
            "state" => state = Some(v.into_owned()),
            "code" => code = Some(v.into_owned()),
            _ => {}
        }
    }
    (state, code)
}
