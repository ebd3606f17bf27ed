use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

const PRINCIPAL_FILE: &str = "user_id.txt";
const SESSION_FILE: &str = "bot-data.json";

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    /// Directory holding the principal file and the session blob.
    pub config_dir: PathBuf,
    pub principal_file: PathBuf,
    pub session_file: PathBuf,

    /// Per-request timeout for ledger calls.
    pub ledger_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let config_dir = resolve_config_dir(env_path("CONFIG_PATH"), home_dir())?;
        let ledger_timeout = Duration::from_secs(env_u64("LEDGER_TIMEOUT_SECS").unwrap_or(30));

        Ok(Self::with_dir(telegram_bot_token, config_dir, ledger_timeout))
    }

    pub fn with_dir(
        telegram_bot_token: impl Into<String>,
        config_dir: PathBuf,
        ledger_timeout: Duration,
    ) -> Self {
        Self {
            telegram_bot_token: telegram_bot_token.into(),
            principal_file: config_dir.join(PRINCIPAL_FILE),
            session_file: config_dir.join(SESSION_FILE),
            config_dir,
            ledger_timeout,
        }
    }
}

/// `CONFIG_PATH` wins when set and non-empty; otherwise `~/.config/firefly-bot`,
/// created if missing.
fn resolve_config_dir(explicit: Option<PathBuf>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(dir);
    }

    let home = home.ok_or_else(|| {
        Error::Config("HOME is not set and CONFIG_PATH was not provided".to_string())
    })?;
    let dir = home.join(".config").join("firefly-bot");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    #[test]
    fn explicit_config_path_is_used_verbatim() {
        let dir = resolve_config_dir(Some(PathBuf::from("/srv/ffb")), None).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/ffb"));
    }

    #[test]
    fn default_config_dir_is_created_under_home() {
        let home = tmp("ffb-home");
        let dir = resolve_config_dir(Some(PathBuf::new()), Some(home.clone())).unwrap();
        assert_eq!(dir, home.join(".config/firefly-bot"));
        assert!(dir.is_dir());
        let _ = fs::remove_dir_all(&home);
    }

    #[test]
    fn missing_home_without_config_path_is_an_error() {
        assert!(matches!(
            resolve_config_dir(None, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn storage_files_live_in_config_dir() {
        let cfg = Config::with_dir("t", PathBuf::from("/data"), Duration::from_secs(5));
        assert_eq!(cfg.principal_file, PathBuf::from("/data/user_id.txt"));
        assert_eq!(cfg.session_file, PathBuf::from("/data/bot-data.json"));
    }

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv("# comment\nTELEGRAM_BOT_TOKEN=\"abc\"\n\nCONFIG_PATH='/x'\nbogus\n");
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc".to_string()),
                ("CONFIG_PATH".to_string(), "/x".to_string()),
            ]
        );
    }
}
