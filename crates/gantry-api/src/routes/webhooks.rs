//! Webhook endpoints for Git providers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha1::Sha1;
use sha2::Sha256;
use tracing::{info, warn};

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new().route("/github", post(github_webhook))
}

/// A build request extracted from a verified webhook payload.
#[derive(Debug, PartialEq)]
struct WebhookTrigger {
    branch: String,
    revision: String,
    description: String,
}

/// Handle GitHub webhook events.
///
/// The signature is verified over the exact raw body bytes before any
/// payload field is trusted; a failed check rejects the request without
/// enqueueing anything.
async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("X-Hub-Signature-256")
        .or_else(|| headers.get("X-Hub-Signature"))
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Forbidden("missing webhook signature".to_string()))?;

    if !verify_signature(&state.webhook_secret, &body, signature) {
        warn!("Invalid webhook signature");
        return Err(ApiError::Forbidden("invalid webhook signature".to_string()));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let event = headers
        .get("X-GitHub-Event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    match extract_trigger(event, &payload) {
        Some(trigger) => {
            info!(
                event,
                branch = %trigger.branch,
                revision = %trigger.revision,
                "Webhook build request"
            );
            let build = state
                .lifecycle
                .create(&trigger.branch, &trigger.revision)
                .await?;
            Ok(Json(json!({
                "message": format!("Build queued for {}", trigger.description),
                "build_id": build.id.to_string(),
            })))
        }
        None => {
            info!(event, "Ignoring webhook event");
            Ok(Json(json!({
                "message": format!("Event {} ignored", event),
            })))
        }
    }
}

/// Normalize a webhook event into a build request, or `None` for events that
/// are acknowledged but not built.
fn extract_trigger(event: &str, payload: &Value) -> Option<WebhookTrigger> {
    match event {
        "push" => {
            let git_ref = payload.get("ref")?.as_str()?;
            let branch = git_ref.strip_prefix("refs/heads/").unwrap_or(git_ref);
            let revision = payload.get("after")?.as_str()?;
            Some(WebhookTrigger {
                branch: branch.to_string(),
                revision: revision.to_string(),
                description: format!("branch {}", branch),
            })
        }
        "pull_request" => {
            let action = payload.get("action")?.as_str()?;
            if !matches!(action, "opened" | "synchronize" | "reopened") {
                return None;
            }
            let head = payload.get("pull_request")?.get("head")?;
            let branch = head.get("ref")?.as_str()?;
            let number = payload.get("number")?.as_u64()?;
            Some(WebhookTrigger {
                branch: branch.to_string(),
                // PR builds carry the PR tag as their revision identifier.
                revision: format!("PR-{}", number),
                description: format!("PR #{}", number),
            })
        }
        _ => None,
    }
}

/// Verify a webhook signature of the form `algorithm=hexdigest`.
///
/// The digest is HMAC over the raw body with the shared secret. Only
/// SHA-family algorithms are meaningful; comparison is constant-time via
/// `Mac::verify_slice`.
fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Some((algorithm, digest_hex)) = signature.split_once('=') else {
        return false;
    };

    let Ok(digest) = hex::decode(digest_hex) else {
        return false;
    };

    match algorithm {
        "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
                .expect("HMAC can take any size key");
            mac.update(body);
            mac.verify_slice(&digest).is_ok()
        }
        "sha1" => {
            let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes())
                .expect("HMAC can take any size key");
            mac.update(body);
            mac.verify_slice(&digest).is_ok()
        }
        _ => false,
    }
}
