use std::error::Error;
use tracing::warn;

use crate::auth::oauth::{self, AuthorizationRequest, CALLBACK_TIMEOUT};
use crate::cli::context::Context;
use crate::core::config::Settings;
use crate::ui::render;

pub async fn login(
    ctx: &Context,
    code: Option<String>,
    no_browser: bool,
) -> Result<(), Box<dyn Error>> {
    let code = match code {
        Some(code) => code.trim().to_string(),
        None => browser_code(&ctx.settings, no_browser).await?,
    };
    if code.is_empty() {
        return Err("No authorization code provided".into());
    }

    let outcome = ctx.auth.login(&code).await?;
    println!("✅ Logged in as {}", render::profile_header(&outcome.user));
    Ok(())
}

/// Runs the browser flow and returns the authorization code the provider
/// redirects back with.
async fn browser_code(settings: &Settings, no_browser: bool) -> Result<String, Box<dyn Error>> {
    let client_id = settings.google_client_id.as_deref().ok_or(
        "No Google client id configured. Run `rapport set google-client-id <ID>`, or pass --code.",
    )?;
    let address = oauth::callback_address(&settings.redirect_uri)?;
    // Listen before the browser can redirect.
    let listener = oauth::bind_callback_listener(&address).await?;
    let state = oauth::random_state()?;
    let url = oauth::build_authorization_url(AuthorizationRequest {
        authorize_url: &settings.authorize_url,
        client_id,
        redirect_uri: &settings.redirect_uri,
        state: &state,
    })?;

    if no_browser {
        println!("Open this URL in your browser to sign in:\n  {url}");
    } else if let Err(err) = oauth::open_in_browser(url.as_str()) {
        warn!(error = %err, "Browser launch failed");
        println!("Could not open a browser ({err}). Open this URL to sign in:\n  {url}");
    } else {
        println!("Opened your browser to sign in. If nothing happened, open:\n  {url}");
    }
    println!("Waiting for the sign-in to finish...");

    Ok(oauth::wait_for_callback(listener, &address.path, &state, CALLBACK_TIMEOUT).await?)
}

pub fn logout(ctx: &Context) -> Result<(), Box<dyn Error>> {
    if ctx.auth.logout()? {
        println!("✅ Logged out of {}", ctx.auth.account());
    } else {
        println!("Already logged out of {}", ctx.auth.account());
    }
    Ok(())
}
