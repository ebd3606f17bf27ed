use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{domain::ChatId, errors::Error, ledger::LedgerCredentials, Result};

/// Where a chat stands in the setup dialogue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingLedgerUrl,
    AwaitingToken,
    AwaitingDefaultAccount,
    Ready,
}

impl ConversationState {
    /// True while a setup step is waiting for input from the user.
    pub fn in_setup(self) -> bool {
        matches!(
            self,
            ConversationState::AwaitingLedgerUrl
                | ConversationState::AwaitingToken
                | ConversationState::AwaitingDefaultAccount
        )
    }
}

/// Connection details collected by the setup dialogue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    #[serde(default)]
    pub ledger_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub default_account_id: Option<String>,
}

impl SessionProfile {
    pub fn credentials(&self) -> Option<LedgerCredentials> {
        let base_url = self.ledger_url.clone()?;
        let token = self.auth_token.clone()?;
        Some(LedgerCredentials { base_url, token })
    }
}

/// Everything persisted for one conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(default)]
    pub state: ConversationState,
    #[serde(default)]
    pub profile: SessionProfile,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Pluggable key-value backing for sessions.
pub trait SessionBackend: Send + Sync {
    fn load(&self, chat_id: ChatId) -> Result<Option<ChatSession>>;
    /// Must be durable when it returns.
    fn save(&self, chat_id: ChatId, session: &ChatSession) -> Result<()>;
}

/// Sessions in one JSON object on disk, keyed by chat id.
///
/// Every save rewrites the whole file through a temp file + rename, so a crash
/// leaves either the old or the new blob, never a torn one.
#[derive(Debug)]
pub struct FileSessionBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, ChatSession>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&txt)?)
    }

    fn write_all(&self, all: &BTreeMap<String, ChatSession>) -> Result<()> {
        let txt = serde_json::to_string_pretty(all)?;
        write_atomic(&self.path, txt.as_bytes())
    }
}

/// Write through `<path>.tmp` + fsync + rename, creating parent dirs.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl SessionBackend for FileSessionBackend {
    fn load(&self, chat_id: ChatId) -> Result<Option<ChatSession>> {
        Ok(self.read_all()?.remove(&chat_id.to_string()))
    }

    fn save(&self, chat_id: ChatId, session: &ChatSession) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::External("session file lock poisoned".to_string()))?;
        let mut all = self.read_all()?;
        all.insert(chat_id.to_string(), session.clone());
        self.write_all(&all)
    }
}

/// Process-local backend for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemorySessionBackend {
    inner: Mutex<HashMap<ChatId, ChatSession>>,
}

impl SessionBackend for MemorySessionBackend {
    fn load(&self, chat_id: ChatId) -> Result<Option<ChatSession>> {
        let map = self
            .inner
            .lock()
            .map_err(|_| Error::External("session map lock poisoned".to_string()))?;
        Ok(map.get(&chat_id).cloned())
    }

    fn save(&self, chat_id: ChatId, session: &ChatSession) -> Result<()> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| Error::External("session map lock poisoned".to_string()))?;
        map.insert(chat_id, session.clone());
        Ok(())
    }
}

/// Per-conversation session access used by the handlers.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionBackend::default()))
    }

    /// The stored session, or a fresh idle one.
    pub fn get(&self, chat_id: ChatId) -> Result<ChatSession> {
        Ok(self.backend.load(chat_id)?.unwrap_or_default())
    }

    /// Load, mutate, persist. Returns the saved session.
    pub fn update(
        &self,
        chat_id: ChatId,
        mutate: impl FnOnce(&mut ChatSession),
    ) -> Result<ChatSession> {
        let mut session = self.get(chat_id)?;
        mutate(&mut session);
        session.updated_at = Some(Utc::now().to_rfc3339());
        self.backend.save(chat_id, &session)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}/bot-data.json"))
    }

    #[test]
    fn unknown_chat_gets_idle_default() {
        let store = SessionStore::in_memory();
        let s = store.get(ChatId(1)).unwrap();
        assert_eq!(s.state, ConversationState::Idle);
        assert_eq!(s.profile, SessionProfile::default());
    }

    #[test]
    fn update_persists_and_stamps() {
        let store = SessionStore::in_memory();
        store
            .update(ChatId(1), |s| {
                s.state = ConversationState::AwaitingToken;
                s.profile.ledger_url = Some("https://ff.example".to_string());
            })
            .unwrap();

        let s = store.get(ChatId(1)).unwrap();
        assert_eq!(s.state, ConversationState::AwaitingToken);
        assert_eq!(s.profile.ledger_url.as_deref(), Some("https://ff.example"));
        assert!(s.updated_at.is_some());
        assert_eq!(store.get(ChatId(2)).unwrap().state, ConversationState::Idle);
    }

    #[test]
    fn file_backend_survives_reopen() {
        let path = tmp("ffb-sessions");
        let store = SessionStore::new(Arc::new(FileSessionBackend::new(&path)));
        store
            .update(ChatId(10), |s| {
                s.state = ConversationState::Ready;
                s.profile = SessionProfile {
                    ledger_url: Some("https://ff.example".to_string()),
                    auth_token: Some("tok".to_string()),
                    default_account_id: Some("3".to_string()),
                };
            })
            .unwrap();
        store
            .update(ChatId(11), |s| s.state = ConversationState::AwaitingLedgerUrl)
            .unwrap();

        let reopened = SessionStore::new(Arc::new(FileSessionBackend::new(&path)));
        let s = reopened.get(ChatId(10)).unwrap();
        assert_eq!(s.state, ConversationState::Ready);
        assert_eq!(s.profile.default_account_id.as_deref(), Some("3"));
        assert_eq!(
            reopened.get(ChatId(11)).unwrap().state,
            ConversationState::AwaitingLedgerUrl
        );
        assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());
    }

    #[test]
    fn file_format_is_keyed_by_chat_id() {
        let path = tmp("ffb-sessions-format");
        let backend = FileSessionBackend::new(&path);
        backend
            .save(
                ChatId(-5),
                &ChatSession {
                    state: ConversationState::AwaitingDefaultAccount,
                    ..Default::default()
                },
            )
            .unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(backend.path()).unwrap()).unwrap();
        assert_eq!(v["-5"]["state"], "awaiting_default_account");
    }

    #[test]
    fn credentials_need_url_and_token() {
        let mut p = SessionProfile {
            ledger_url: Some("https://ff.example".to_string()),
            ..Default::default()
        };
        assert!(p.credentials().is_none());
        p.auth_token = Some("tok".to_string());
        assert_eq!(
            p.credentials(),
            Some(LedgerCredentials {
                base_url: "https://ff.example".to_string(),
                token: "tok".to_string(),
            })
        );
    }

    #[test]
    fn only_setup_steps_count_as_in_setup() {
        assert!(!ConversationState::Idle.in_setup());
        assert!(ConversationState::AwaitingLedgerUrl.in_setup());
        assert!(ConversationState::AwaitingToken.in_setup());
        assert!(ConversationState::AwaitingDefaultAccount.in_setup());
        assert!(!ConversationState::Ready.in_setup());
    }
}
