//! Remote token validation: one "who am I" call per service.
//!
//! Probes are issued sequentially, one service at a time, and a failure for
//! one service never aborts the rest; the caller reports each outcome on its
//! own. Probes only confirm that a stored token still authenticates; they
//! never mutate anything remotely.

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Check that a stored token still authenticates against its service.
///
/// Returns a short account label (login, username, account id) suitable for
/// a "connected as" line.
///
/// # Errors
///
/// Fails when the service has no known probe endpoint, the request fails,
/// or the service rejects the token.
pub async fn probe_service(client: &reqwest::Client, service: &str, token: &str) -> Result<String> {
    match service {
        "github" => {
            let body = get_json(
                client
                    .get("https://api.github.com/user")
                    .header("Accept", "application/vnd.github+json")
                    .header("User-Agent", "infravault")
                    .bearer_auth(token),
                "GitHub",
            )
            .await?;
            string_field(&body, &["login"], "GitHub")
        }
        "vercel" => {
            let body = get_json(
                client
                    .get("https://api.vercel.com/v2/user")
                    .bearer_auth(token),
                "Vercel",
            )
            .await?;
            string_field(&body, &["user", "username"], "Vercel")
        }
        "cloudflare" => {
            let body = get_json(
                client
                    .get("https://api.cloudflare.com/client/v4/user/tokens/verify")
                    .bearer_auth(token),
                "Cloudflare",
            )
            .await?;
            let status = string_field(&body, &["result", "status"], "Cloudflare")?;
            if status != "active" {
                bail!("Cloudflare token is not active (status: {status})");
            }
            Ok("active token".to_string())
        }
        "stripe" => {
            let body = get_json(
                client
                    .get("https://api.stripe.com/v1/account")
                    .bearer_auth(token),
                "Stripe",
            )
            .await?;
            string_field(&body, &["id"], "Stripe")
        }
        "supabase" => {
            let body = get_json(
                client
                    .get("https://api.supabase.com/v1/projects")
                    .bearer_auth(token),
                "Supabase",
            )
            .await?;
            let count = body.as_array().map_or(0, Vec::len);
            Ok(format!("{count} project(s) accessible"))
        }
        other => bail!("no remote validation available for '{other}'"),
    }
}

/// Issue a GET and parse the JSON body, with a useful error on rejection.
async fn get_json(request: reqwest::RequestBuilder, service: &str) -> Result<Value> {
    let response = request
        .send()
        .await
        .with_context(|| format!("failed to reach {service} API"))?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        bail!("{service} rejected the token ({status})");
    }
    if !status.is_success() {
        bail!("{service} API returned {status}");
    }

    response
        .json::<Value>()
        .await
        .with_context(|| format!("failed to parse {service} API response"))
}

/// Walk a path of object keys and expect a string leaf.
fn string_field(body: &Value, path: &[&str], service: &str) -> Result<String> {
    let mut node = body;
    for key in path {
        node = node
            .get(key)
            .with_context(|| format!("{service} response is missing '{key}'"))?;
    }
    node.as_str()
        .map(ToString::to_string)
        .with_context(|| format!("{service} response field is not a string"))
}
