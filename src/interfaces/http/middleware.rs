//! API key authentication
//!
//! Keys are configured as SHA-256 hex digests, each bound to an access
//! scope. The key is read from `X-API-Key` or `Authorization` (a `Bearer `
//! prefix is accepted). Authenticated requests carry a [`Caller`]
//! extension.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::application::AccessScope;
use crate::infrastructure::crypto::hash_api_key;
use crate::interfaces::http::common::ApiError;
use crate::interfaces::http::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The authenticated client of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Key name from configuration, for logs
    pub name: String,
    pub scope: AccessScope,
}

/// One configured key
#[derive(Debug, Clone)]
pub struct ApiKeyEntry {
    pub name: String,
    pub key_hash: String,
    pub scope: AccessScope,
}

/// Lookup table from key digest to caller
#[derive(Debug, Clone, Default)]
pub struct ApiKeyRegistry {
    by_hash: HashMap<String, Caller>,
}

impl ApiKeyRegistry {
    pub fn new(entries: impl IntoIterator<Item = ApiKeyEntry>) -> Self {
        let by_hash = entries
            .into_iter()
            .map(|e| {
                (
                    e.key_hash.trim().to_ascii_lowercase(),
                    Caller {
                        name: e.name,
                        scope: e.scope,
                    },
                )
            })
            .collect();
        Self { by_hash }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn authenticate(&self, key: &str) -> Option<Caller> {
        self.by_hash.get(&hash_api_key(key)).cloned()
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    Some(auth.strip_prefix("Bearer ").unwrap_or(auth).trim())
}

/// Reject requests without a known key (401), attach [`Caller`] otherwise
pub async fn api_key_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(key) = presented_key(request.headers()).filter(|k| !k.is_empty()) else {
        return ApiError::unauthenticated("Missing API key").into_response();
    };

    match state.api_keys.authenticate(key) {
        Some(caller) => {
            debug!(caller = %caller.name, scope = ?caller.scope, "Authenticated");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected unknown API key");
            ApiError::unauthenticated("Invalid API key").into_response()
        }
    }
}
