use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::db;
use crate::error::AppError;

pub const HOME_ENV: &str = "GOALPILOT_HOME";
pub const USER_ID_ENV: &str = "GOALPILOT_USER_ID";
pub const FUNCTIONS_URL_ENV: &str = "GOALPILOT_FUNCTIONS_URL";
pub const LOG_ENV: &str = "GOALPILOT_LOG";

const HOME_DIR_NAME: &str = ".goalpilot";

#[derive(Clone, Debug)]
pub struct Config {
    pub home: PathBuf,
    pub user_id: Option<String>,
    pub functions_url: Option<Url>,
}

/// Signed-in user persisted between invocations.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
}

impl Config {
    /// Flags win over environment, environment wins over the stored session.
    pub fn resolve(home: Option<PathBuf>, user_id: Option<String>) -> Result<Self, AppError> {
        let home = resolve_home(home)?;
        let user_id = match non_empty(user_id).or_else(|| non_empty(env_var(USER_ID_ENV))) {
            Some(user_id) => Some(user_id),
            None => load_session(&home)?.map(|session| session.user_id),
        };
        let functions_url = match non_empty(env_var(FUNCTIONS_URL_ENV)) {
            Some(raw) => Some(Url::parse(&raw).map_err(|err| {
                AppError::InvalidInput(format!("{FUNCTIONS_URL_ENV} is not a valid url: {err}"))
            })?),
            None => None,
        };
        Ok(Self {
            home,
            user_id,
            functions_url,
        })
    }

    pub fn db_path(&self) -> PathBuf {
        db::resolve_db_path(&self.home)
    }
}

fn resolve_home(flag: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(home) = flag {
        return Ok(home);
    }
    if let Some(home) = non_empty(env_var(HOME_ENV)) {
        return Ok(PathBuf::from(home));
    }
    if let Some(home) = non_empty(env_var("HOME")) {
        return Ok(PathBuf::from(home).join(HOME_DIR_NAME));
    }
    Err(AppError::InvalidInput(format!(
        "unable to resolve data directory; set {HOME_ENV} or pass --home"
    )))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn load_session(home: &Path) -> Result<Option<StoredSession>, AppError> {
    let path = db::resolve_session_path(home);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let session: StoredSession = serde_json::from_str(&raw)?;
    if session.user_id.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(session))
}

pub fn save_session(home: &Path, user_id: &str) -> Result<StoredSession, AppError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::InvalidInput("user id cannot be empty".to_string()));
    }
    let path = db::resolve_session_path(home);
    db::ensure_parent_dir(&path)?;
    let session = StoredSession {
        user_id: user_id.to_string(),
    };
    fs::write(&path, serde_json::to_string_pretty(&session)?)?;
    Ok(session)
}

pub fn clear_session(home: &Path) -> Result<bool, AppError> {
    let path = db::resolve_session_path(home);
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn session_round_trips_through_home() {
        let dir = TempDir::new().expect("temp dir");
        assert_eq!(load_session(dir.path()).expect("load"), None);

        save_session(dir.path(), "  user-1 ").expect("save");
        let session = load_session(dir.path()).expect("load").expect("session");
        assert_eq!(session.user_id, "user-1");

        assert!(clear_session(dir.path()).expect("clear"));
        assert!(!clear_session(dir.path()).expect("clear again"));
        assert_eq!(load_session(dir.path()).expect("load"), None);
    }

    #[test]
    fn save_session_rejects_blank_user() {
        let dir = TempDir::new().expect("temp dir");
        let err = save_session(dir.path(), "   ").unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn explicit_flags_win_over_stored_session() {
        let dir = TempDir::new().expect("temp dir");
        save_session(dir.path(), "stored").expect("save");
        let config = Config::resolve(Some(dir.path().to_path_buf()), Some("flag".to_string()))
            .expect("resolve");
        assert_eq!(config.home, dir.path());
        assert_eq!(config.user_id.as_deref(), Some("flag"));
    }
}
