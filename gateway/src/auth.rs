//! Bearer-token auth: a 32-byte key generated with `OsRng` on first run and
//! persisted at `<root>/config/secrets/api_key` with `0600` permissions (§4.5).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use rand::rngs::OsRng;
use rand::RngCore;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::AppState;

/// Loads the persisted key at `path`, generating and persisting a fresh one
/// if it is absent. Parent directories are created as needed.
pub fn load_or_create(path: &Path) -> io::Result<String> {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let key = existing.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let key = hex_encode(&bytes);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &key)?;
    set_owner_only_permissions(path)?;
    Ok(key)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn default_secret_path(root: &Path) -> PathBuf {
    root.join("config").join("secrets").join("api_key")
}

/// `tower`/axum middleware enforcing `Authorization: Bearer <key>` on every
/// route it wraps. GET `/health` is mounted outside this layer (§6).
pub async fn require_bearer_token(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match header {
        Some(value) if value.strip_prefix("Bearer ") == Some(state.api_key.as_str()) => {
            Ok(next.run(request).await)
        }
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_persists_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets").join("api_key");
        let key = load_or_create(&path).unwrap();
        assert_eq!(key.len(), 64);
        let reloaded = load_or_create(&path).unwrap();
        assert_eq!(key, reloaded);
    }

    #[cfg(unix)]
    #[test]
    fn persisted_key_is_owner_only_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_key");
        load_or_create(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
