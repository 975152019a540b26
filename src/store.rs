// src/store.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, broadcast};
use uuid::Uuid;

use crate::errors::AppError;

/// Prefiks klucza tokenu sesji (token + rola), jeden wpis na klienta.
pub const KEY_TOKEN: &str = "token";
/// Prefiks klucza zapamiętanych danych klienta.
pub const KEY_USER: &str = "user";

/// Klucz wpisu należącego do jednego klienta, np. `token:<id>`.
pub fn scoped_key(base: &str, owner: impl fmt::Display) -> String {
    format!("{}:{}", base, owner)
}

/// Klient, do którego należy klucz tokenu.
pub fn token_owner(key: &str) -> Option<Uuid> {
    key.strip_prefix(KEY_TOKEN)?
        .strip_prefix(':')?
        .parse()
        .ok()
}

const CHANNEL_CAPACITY: usize = 32;

/// Zdarzenie zmiany w magazynie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Set(String),
    Removed(String),
}

impl StoreChange {
    pub fn key(&self) -> &str {
        match self {
            StoreChange::Set(key) | StoreChange::Removed(key) => key,
        }
    }
}

/// Płaski magazyn klucz-wartość zapisywany jako jeden plik JSON.
///
/// Zastępuje okresowe odpytywanie: każdy zapis publikuje [`StoreChange`]
/// do subskrybentów. Ostatni zapis wygrywa.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: Option<PathBuf>,
    data: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl LocalStore {
    /// Otwiera magazyn z pliku. Brak pliku oznacza pusty magazyn.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Map::new(),
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes)? {
                Value::Object(map) => map,
                other => {
                    tracing::warn!(
                        "Plik {} nie zawiera obiektu JSON ({}), zaczynam od pustego magazynu",
                        path.display(),
                        other
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "Brak pliku magazynu {}, zostanie utworzony przy pierwszym zapisie",
                    path.display()
                );
                Map::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self::from_parts(Some(path), data))
    }

    /// Magazyn trzymany tylko w pamięci.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::from_parts(None, Map::new())
    }

    fn from_parts(path: Option<PathBuf>, data: Map<String, Value>) -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        LocalStore {
            inner: Arc::new(StoreInner {
                path,
                data: Mutex::new(data),
                changes,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let data = self.inner.data.lock().await;
        let value = data.get(key)?.clone();
        drop(data);

        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                // Stary lub uszkodzony wpis traktujemy jak brak wpisu
                tracing::warn!("Nie można odczytać klucza '{}' z magazynu: {}", key, e);
                None
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let value = serde_json::to_value(value)?;
        {
            let mut data = self.inner.data.lock().await;
            // Pamięć zmieniamy dopiero po udanym zapisie pliku
            let mut next = data.clone();
            next.insert(key.to_string(), value);
            self.persist(&next).await?;
            *data = next;
        }
        self.publish(StoreChange::Set(key.to_string()));
        Ok(())
    }

    /// Usuwa klucz. Zwraca `true`, jeśli coś zostało usunięte.
    pub async fn remove(&self, key: &str) -> Result<bool, AppError> {
        let removed = {
            let mut data = self.inner.data.lock().await;
            if data.contains_key(key) {
                let mut next = data.clone();
                next.remove(key);
                self.persist(&next).await?;
                *data = next;
                true
            } else {
                false
            }
        };
        if removed {
            self.publish(StoreChange::Removed(key.to_string()));
        }
        Ok(removed)
    }

    fn publish(&self, change: StoreChange) {
        // Brak subskrybentów to nie błąd
        let _ = self.inner.changes.send(change);
    }

    async fn persist(&self, data: &Map<String, Value>) -> Result<(), AppError> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Zapis przez plik tymczasowy, żeby nie zostawić połowy JSON-a
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(data)?;
        tokio::fs::write(&tmp_path, bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        tracing::debug!("Zapisano magazyn lokalny: {}", path.display());
        Ok(())
    }
}
