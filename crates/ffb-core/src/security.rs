use std::{
    fs,
    path::{Path, PathBuf},
};

use tokio::sync::Mutex;

use crate::{domain::ChatId, errors::Error, session::write_atomic, Result};

// ============== Authorization ==============

/// Outcome of an access check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied { authorized: ChatId },
}

impl Access {
    pub fn is_granted(self) -> bool {
        matches!(self, Access::Granted)
    }
}

/// Single-principal access guard.
///
/// The first chat that talks to the bot becomes the only authorized principal.
/// The claim is written to `path` before it is honoured, so it survives
/// restarts and is written exactly once per deployment.
#[derive(Debug)]
pub struct AccessGuard {
    path: PathBuf,
    principal: Mutex<Option<ChatId>>,
}

impl AccessGuard {
    /// Read a previously claimed principal, if any. A missing or empty file means
    /// nobody has claimed the bot yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let principal = read_principal_file(&path)?;
        Ok(Self {
            path,
            principal: Mutex::new(principal),
        })
    }

    pub async fn principal(&self) -> Option<ChatId> {
        *self.principal.lock().await
    }

    pub async fn authorize(&self, candidate: ChatId) -> Result<Access> {
        // Held across check + persist: concurrent first messages must not both claim.
        let mut principal = self.principal.lock().await;
        match *principal {
            Some(authorized) if authorized == candidate => Ok(Access::Granted),
            Some(authorized) => Ok(Access::Denied { authorized }),
            None => {
                write_principal_file(&self.path, candidate)?;
                *principal = Some(candidate);
                tracing::info!(chat_id = %candidate, "claimed bot for first user");
                Ok(Access::Granted)
            }
        }
    }
}

pub fn rejection_message(candidate: ChatId, authorized: ChatId) -> String {
    format!("Unauthorized access denied for {candidate}.\n Only {authorized} is authorized")
}

fn read_principal_file(path: &Path) -> Result<Option<ChatId>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = fs::read_to_string(path)?;
    let txt = txt.trim();
    if txt.is_empty() {
        return Ok(None);
    }
    txt.parse::<i64>().map(|id| Some(ChatId(id))).map_err(|e| {
        Error::Config(format!(
            "invalid authorized user id in {}: {e}",
            path.display()
        ))
    })
}

fn write_principal_file(path: &Path, principal: ChatId) -> Result<()> {
    write_atomic(path, principal.0.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}"))
    }

    #[tokio::test]
    async fn first_caller_claims_and_persists() {
        let path = tmp("ffb-principal").join("user_id.txt");
        let guard = AccessGuard::load(&path).unwrap();
        assert_eq!(guard.principal().await, None);

        assert_eq!(guard.authorize(ChatId(42)).await.unwrap(), Access::Granted);
        assert_eq!(fs::read_to_string(&path).unwrap(), "42");
        assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());
        assert_eq!(guard.authorize(ChatId(42)).await.unwrap(), Access::Granted);
    }

    #[tokio::test]
    async fn other_identities_are_rejected_without_mutation() {
        let path = tmp("ffb-principal-reject");
        let guard = AccessGuard::load(&path).unwrap();
        guard.authorize(ChatId(1)).await.unwrap();

        for _ in 0..3 {
            let access = guard.authorize(ChatId(2)).await.unwrap();
            assert_eq!(access, Access::Denied { authorized: ChatId(1) });
            assert!(!access.is_granted());
        }
        assert_eq!(guard.principal().await, Some(ChatId(1)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
    }

    #[tokio::test]
    async fn claim_survives_reload() {
        let path = tmp("ffb-principal-reload");
        AccessGuard::load(&path)
            .unwrap()
            .authorize(ChatId(-100123))
            .await
            .unwrap();

        let reloaded = AccessGuard::load(&path).unwrap();
        assert_eq!(reloaded.principal().await, Some(ChatId(-100123)));
        assert!(!reloaded.authorize(ChatId(5)).await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn concurrent_first_messages_yield_exactly_one_principal() {
        let path = tmp("ffb-principal-race");
        let guard = Arc::new(AccessGuard::load(&path).unwrap());

        let mut tasks = Vec::new();
        for id in 1..=16 {
            let guard = guard.clone();
            tasks.push(tokio::spawn(async move {
                (id, guard.authorize(ChatId(id)).await.unwrap())
            }));
        }

        let mut winners = Vec::new();
        for t in tasks {
            let (id, access) = t.await.unwrap();
            if access.is_granted() {
                winners.push(id);
            }
        }

        assert_eq!(winners.len(), 1);
        let winner = ChatId(winners[0]);
        assert_eq!(guard.principal().await, Some(winner));
        assert_eq!(fs::read_to_string(&path).unwrap(), winner.0.to_string());
    }

    #[test]
    fn empty_file_means_unclaimed() {
        let path = tmp("ffb-principal-empty");
        fs::write(&path, "  \n").unwrap();
        let guard = AccessGuard::load(&path).unwrap();
        assert!(guard.principal.try_lock().unwrap().is_none());
    }

    #[test]
    fn garbage_file_is_a_config_error() {
        let path = tmp("ffb-principal-garbage");
        fs::write(&path, "not-a-number").unwrap();
        assert!(matches!(AccessGuard::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn rejection_names_both_ids() {
        let msg = rejection_message(ChatId(7), ChatId(1));
        assert_eq!(msg, "Unauthorized access denied for 7.\n Only 1 is authorized");
    }
}
