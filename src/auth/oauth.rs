//! Browser side of the sign-in flow: build the provider's authorization URL,
//! listen on the loopback redirect URI, and hand the returned code to the
//! backend.

use base64::Engine as _;
use reqwest::Url;
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const OAUTH_SCOPE: &str = "openid profile email";
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug)]
pub enum OAuthError {
    InvalidUrl { url: String, reason: String },
    NotLoopback(String),
    Io(std::io::Error),
    Random(String),
    TimedOut,
    /// The provider redirected back with `error=`.
    Denied(String),
    StateMismatch,
    MissingCode,
    Malformed(String),
    Browser(String),
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OAuthError::InvalidUrl { url, reason } => write!(f, "Invalid URL '{url}': {reason}"),
            OAuthError::NotLoopback(url) => write!(
                f,
                "Redirect URI {url} is not a local http address; use `rapport login --code <code>` instead"
            ),
            OAuthError::Io(err) => write!(f, "OAuth callback listener failed: {err}"),
            OAuthError::Random(reason) => write!(f, "Could not generate OAuth state: {reason}"),
            OAuthError::TimedOut => f.write_str("Timed out waiting for the browser to sign in"),
            OAuthError::Denied(error) => write!(f, "Authentication failed: {error}"),
            OAuthError::StateMismatch => f.write_str("OAuth callback state mismatch"),
            OAuthError::MissingCode => f.write_str("OAuth callback missing code"),
            OAuthError::Malformed(reason) => write!(f, "Malformed OAuth callback: {reason}"),
            OAuthError::Browser(reason) => write!(f, "Could not open a browser: {reason}"),
        }
    }
}

impl Error for OAuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OAuthError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OAuthError {
    fn from(err: std::io::Error) -> Self {
        OAuthError::Io(err)
    }
}

fn parse_url(url: &str) -> Result<Url, OAuthError> {
    Url::parse(url).map_err(|err| OAuthError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })
}

pub struct AuthorizationRequest<'a> {
    pub authorize_url: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub state: &'a str,
}

pub fn build_authorization_url(request: AuthorizationRequest<'_>) -> Result<Url, OAuthError> {
    let mut url = parse_url(request.authorize_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", request.client_id)
        .append_pair("response_type", "code")
        .append_pair("scope", OAUTH_SCOPE)
        .append_pair("redirect_uri", request.redirect_uri)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent")
        .append_pair("state", request.state);
    Ok(url)
}

pub fn random_state() -> Result<String, OAuthError> {
    let mut bytes = [0_u8; 24];
    getrandom::fill(&mut bytes).map_err(|err| OAuthError::Random(err.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Where to listen for the redirect: loopback host, port, and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAddress {
    pub host: String,
    pub port: u16,
    pub path: String,
}

pub fn callback_address(redirect_uri: &str) -> Result<CallbackAddress, OAuthError> {
    let url = parse_url(redirect_uri)?;
    let host = url.host_str().unwrap_or_default().to_string();
    let loopback = matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]");
    if url.scheme() != "http" || !loopback {
        return Err(OAuthError::NotLoopback(redirect_uri.to_string()));
    }
    let bind_host = match host.as_str() {
        "[::1]" => "::1".to_string(),
        "localhost" => "127.0.0.1".to_string(),
        other => other.to_string(),
    };
    Ok(CallbackAddress {
        host: bind_host,
        port: url.port_or_known_default().unwrap_or(80),
        path: url.path().to_string(),
    })
}

pub async fn bind_callback_listener(address: &CallbackAddress) -> Result<TcpListener, OAuthError> {
    Ok(TcpListener::bind((address.host.as_str(), address.port)).await?)
}

enum CallbackVariant {
    Success,
    Error,
}

fn render_callback_page(heading: &str, detail: &str, variant: CallbackVariant) -> String {
    let accent = match variant {
        CallbackVariant::Success => "#2e9d5b",
        CallbackVariant::Error => "#c9372c",
    };
    include_str!("../builtins/oauth-callback.html")
        .replace("{{TITLE}}", "rapport sign-in")
        .replace("{{HEADING}}", &escape_html(heading))
        .replace("{{DETAIL}}", &escape_html(detail))
        .replace("{{ACCENT}}", accent)
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

async fn respond(
    stream: &mut TcpStream,
    status: &str,
    heading: &str,
    detail: &str,
    variant: CallbackVariant,
) -> Result<(), OAuthError> {
    let body = render_callback_page(heading, detail, variant);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_request_target(stream: &mut TcpStream) -> Result<String, OAuthError> {
    let mut buffer = vec![0_u8; 16 * 1024];
    let bytes_read = stream.read(&mut buffer).await?;
    if bytes_read == 0 {
        return Err(OAuthError::Malformed("no data received".to_string()));
    }
    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let first_line = request
        .lines()
        .next()
        .ok_or_else(|| OAuthError::Malformed("request line missing".to_string()))?;
    first_line
        .split_whitespace()
        .nth(1)
        .map(str::to_owned)
        .ok_or_else(|| OAuthError::Malformed("request target missing".to_string()))
}

/// Waits for the browser to hit the redirect path and returns the code.
/// Requests for other paths (favicons and the like) get a 404 and the
/// listener keeps waiting.
pub async fn wait_for_callback(
    listener: TcpListener,
    callback_path: &str,
    expected_state: &str,
    timeout: Duration,
) -> Result<String, OAuthError> {
    tokio::time::timeout(
        timeout,
        accept_callback(listener, callback_path, expected_state),
    )
    .await
    .map_err(|_| OAuthError::TimedOut)?
}

async fn accept_callback(
    listener: TcpListener,
    callback_path: &str,
    expected_state: &str,
) -> Result<String, OAuthError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let target = read_request_target(&mut stream).await?;
        let callback_url = parse_url(&format!("http://localhost{target}"))?;
        if callback_url.path() != callback_path {
            debug!(%peer, path = callback_url.path(), "Ignoring request outside the callback path");
            respond(
                &mut stream,
                "404 Not Found",
                "Nothing here",
                "This address only accepts the sign-in redirect.",
                CallbackVariant::Error,
            )
            .await?;
            continue;
        }

        let mut state = None::<String>;
        let mut code = None::<String>;
        let mut error = None::<String>;
        for (key, value) in callback_url.query_pairs() {
            match key.as_ref() {
                "state" => state = Some(value.into_owned()),
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            respond(
                &mut stream,
                "400 Bad Request",
                "Sign-in was not completed",
                "The identity provider rejected the request. Close this tab and retry in rapport.",
                CallbackVariant::Error,
            )
            .await?;
            return Err(OAuthError::Denied(error));
        }

        if state.as_deref() != Some(expected_state) {
            respond(
                &mut stream,
                "400 Bad Request",
                "Sign-in state did not match",
                "This redirect does not belong to the running login. Close this tab and retry in rapport.",
                CallbackVariant::Error,
            )
            .await?;
            return Err(OAuthError::StateMismatch);
        }

        let Some(code) = code.filter(|code| !code.is_empty()) else {
            respond(
                &mut stream,
                "400 Bad Request",
                "No authorization code",
                "The redirect did not include an authorization code. Close this tab and retry in rapport.",
                CallbackVariant::Error,
            )
            .await?;
            return Err(OAuthError::MissingCode);
        };

        respond(
            &mut stream,
            "200 OK",
            "You're signed in to rapport",
            "Close this tab and return to your terminal.",
            CallbackVariant::Success,
        )
        .await?;
        return Ok(code);
    }
}

pub fn open_in_browser(url: &str) -> Result<(), OAuthError> {
    #[cfg(target_os = "macos")]
    let status = std::process::Command::new("open").arg(url).status();
    #[cfg(target_os = "windows")]
    let status = std::process::Command::new("cmd")
        .args(["/C", "start", "", url])
        .status();
    #[cfg(all(unix, not(target_os = "macos")))]
    let status = std::process::Command::new("xdg-open").arg(url).status();
    #[cfg(not(any(unix, target_os = "windows")))]
    let status: std::io::Result<std::process::ExitStatus> = Err(std::io::Error::other(
        "no browser launcher for this platform",
    ));

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(OAuthError::Browser(format!("launcher exited with {status}"))),
        Err(err) => Err(OAuthError::Browser(err.to_string())),
    }
}
