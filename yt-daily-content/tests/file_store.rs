//! The on-disk credential store: `token.json` and `credentials.json` in one directory.

use pretty_assertions::assert_eq;
use yt_daily_content::auth::{CredentialStore, FileCredentialStore, StoredCredential};
use yt_daily_content::error::AuthError;

const TOKEN_JSON: &str = r#"{
  "token": "ya29.cached",
  "refresh_token": "1//refresh",
  "token_uri": "https://oauth2.googleapis.com/token",
  "client_id": "id.apps.googleusercontent.com",
  "client_secret": "GOCSPX-secret",
  "scopes": ["https://www.googleapis.com/auth/youtube.readonly"],
  "expiry": "2025-06-01T12:00:00Z"
}"#;

#[test]
fn empty_directory_has_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path());
    assert_eq!(store.load().unwrap(), None);
    assert_eq!(store.load_client_secrets().unwrap(), None);
}

#[test]
fn saved_token_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("token.json"), TOKEN_JSON).unwrap();
    let store = FileCredentialStore::new(dir.path());

    let mut credential = store.load().unwrap().unwrap();
    assert_eq!(credential.access_token.as_deref(), Some("ya29.cached"));

    credential.access_token = Some("ya29.newer".into());
    store.save(&credential).unwrap();
    let reloaded: StoredCredential = store.load().unwrap().unwrap();
    assert_eq!(reloaded, credential);
}

#[test]
fn save_creates_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("auth");
    let credential: StoredCredential = serde_json::from_str(TOKEN_JSON).unwrap();
    FileCredentialStore::new(&nested).save(&credential).unwrap();
    assert!(nested.join("token.json").is_file());
}

#[test]
fn malformed_token_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = FileCredentialStore::new(dir.path()).load().unwrap_err();
    let AuthError::Malformed { path: reported, .. } = &err else {
        panic!("expected Malformed, got {err:?}");
    };
    assert_eq!(reported, &path);
    assert!(err.to_string().contains("token.json"), "{err}");
}

#[test]
fn installed_client_secrets_are_read() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("credentials.json"),
        r#"{"installed":{"client_id":"id","client_secret":"secret","project_id":"p",
            "auth_uri":"https://accounts.google.com/o/oauth2/auth",
            "token_uri":"https://oauth2.googleapis.com/token",
            "redirect_uris":["http://localhost"]}}"#,
    )
    .unwrap();

    let secrets = FileCredentialStore::new(dir.path())
        .load_client_secrets()
        .unwrap()
        .unwrap();
    assert_eq!(secrets.client_id, "id");
    assert_eq!(secrets.client_secret, "secret");
}

#[cfg(unix)]
#[test]
fn saved_token_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let credential: StoredCredential = serde_json::from_str(TOKEN_JSON).unwrap();
    let store = FileCredentialStore::new(dir.path());
    store.save(&credential).unwrap();

    let mode = std::fs::metadata(store.token_path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[cfg(unix)]
#[test]
fn resaving_tightens_existing_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = FileCredentialStore::new(dir.path());
    std::fs::write(store.token_path(), TOKEN_JSON).unwrap();
    std::fs::set_permissions(store.token_path(), std::fs::Permissions::from_mode(0o644)).unwrap();

    let credential = store.load().unwrap().unwrap();
    store.save(&credential).unwrap();

    let mode = std::fs::metadata(store.token_path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
