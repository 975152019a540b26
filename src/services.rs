// src/services.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::{Mutex, broadcast::error::RecvError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::stored_token;
use crate::checkout::WizardHandle;
use crate::errors::AppError;
use crate::models::Cafe;
use crate::state::{AppState, CAFES_CACHE_KEY};
use crate::store::{KEY_TOKEN, LocalStore, StoreChange, scoped_key, token_owner};
use crate::wizard::OrderWizard;

/// Pobiera listę kawiarni z menu.
///
/// Najpierw sprawdza cache, a dopiero przy braku wpisu pyta API sklepu.
/// Wynik trafia do cache'u na czas określony w konfiguracji.
pub async fn get_cafes(app_state: &AppState) -> Result<Arc<Vec<Cafe>>, AppError> {
    // Krok 1: Sprawdzenie cache'u
    if let Some(cached_cafes) = app_state.cafe_cache.get(CAFES_CACHE_KEY).await {
        tracing::info!("Cache HIT dla listy kawiarni");
        return Ok(cached_cafes);
    }

    // Krok 2: Pobranie danych z API w przypadku "cache miss"
    tracing::info!("Cache MISS dla listy kawiarni. Pobieranie z API sklepu.");
    let cafes = Arc::new(app_state.api.list_cafes().await?);

    // Krok 3: Zapisanie wyniku w cache'u
    app_state
        .cafe_cache
        .insert(CAFES_CACHE_KEY, cafes.clone())
        .await;

    Ok(cafes)
}

#[derive(Clone)]
struct WizardEntry {
    // Klient, którego zapisany token otworzył sesję konta
    owner: Option<Uuid>,
    wizard: WizardHandle,
}

/// Aktywne sesje kreatora. Nieużywana sesja wygasa po czasie bezczynności.
#[derive(Clone)]
pub struct WizardSessions {
    cache: Cache<Uuid, WizardEntry>,
}

impl WizardSessions {
    pub fn new(idle: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(idle)
            .support_invalidation_closures()
            .build();
        WizardSessions { cache }
    }

    /// Dodaje sesję. `owner` ustawiamy tylko dla sesji konta opartych na
    /// tokenie z magazynu, żeby wylogowanie klienta je zamknęło.
    pub async fn insert(&self, wizard: OrderWizard, owner: Option<Uuid>) -> WizardHandle {
        let id = wizard.id();
        let entry = WizardEntry {
            owner,
            wizard: Arc::new(Mutex::new(wizard)),
        };
        let handle = entry.wizard.clone();
        self.cache.insert(id, entry).await;
        handle
    }

    pub async fn get(&self, id: Uuid) -> Result<WizardHandle, AppError> {
        match self.cache.get(&id).await {
            Some(entry) => Ok(entry.wizard),
            None => {
                tracing::warn!("Nie znaleziono sesji kreatora {}", id);
                Err(AppError::NotFound)
            }
        }
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.cache.remove(&id).await.is_some()
    }

    /// Usuwa sesje kont danego klienta (po wylogowaniu lub wygaśnięciu tokenu).
    pub fn invalidate_client(&self, client: Uuid) {
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |_, entry| entry.owner == Some(client))
        {
            tracing::error!("Nie udało się unieważnić sesji kreatora: {}", e);
        }
    }

    fn owners(&self) -> HashSet<Uuid> {
        self.cache
            .iter()
            .filter_map(|(_, entry)| entry.owner)
            .collect()
    }
}

/// Nasłuchuje zmian w magazynie lokalnym. Zniknięcie tokenu klienta kończy
/// jego sesje kont.
pub fn spawn_store_listener(store: &LocalStore, sessions: WizardSessions) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    let store = store.clone();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(StoreChange::Removed(key)) => match token_owner(&key) {
                    Some(client) => {
                        tracing::info!(
                            "Token klienta {} usunięty z magazynu, zamykam jego sesje kreatora",
                            client
                        );
                        sessions.invalidate_client(client);
                    }
                    None => tracing::debug!("Usunięto z magazynu: {}", key),
                },
                Ok(change) => {
                    tracing::debug!("Zmiana w magazynie: {}", change.key());
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Pominięto {} zdarzeń magazynu", skipped);
                    for client in sessions.owners() {
                        if stored_token(&store, client).await.is_none() {
                            sessions.invalidate_client(client);
                        }
                    }
                }
                Err(RecvError::Closed) => {
                    tracing::info!("Kanał zmian magazynu zamknięty, kończę nasłuch");
                    break;
                }
            }
        }
    })
}

/// Przy wygaśnięciu sesji (401 z API) usuwa token zapisany dla klienta.
pub async fn guard_session<T>(
    store: &LocalStore,
    client: Option<Uuid>,
    result: Result<T, AppError>,
) -> Result<T, AppError> {
    if let (Err(AppError::SessionExpired), Some(client)) = (&result, client) {
        match store.remove(&scoped_key(KEY_TOKEN, client)).await {
            Ok(true) => tracing::info!("Usunięto wygasły token klienta {}", client),
            Ok(false) => {}
            Err(e) => tracing::error!("Nie udało się usunąć tokenu z magazynu: {}", e),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthToken, CartContext};
    use crate::config::ClearCartPolicy;
    use crate::models::Role;
    use crate::test_support::{FakeApi, guest_context, sample_cart};
    use std::sync::atomic::Ordering;

    fn test_state(api: Arc<FakeApi>) -> AppState {
        AppState::with_settings(
            api,
            LocalStore::in_memory(),
            Duration::from_secs(60),
            Duration::from_secs(60),
            ClearCartPolicy::BestEffort,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn cafes_are_fetched_once_and_then_cached() {
        let api = Arc::new(FakeApi::new(sample_cart(&[])));
        let state = test_state(api.clone());

        let first = get_cafes(&state).await.unwrap();
        let second = get_cafes(&state).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(api.cafe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn removing_token_closes_only_that_clients_sessions() {
        let store = LocalStore::in_memory();
        let client = Uuid::new_v4();
        let other_client = Uuid::new_v4();
        for id in [client, other_client] {
            store
                .set(&scoped_key(KEY_TOKEN, id), &AuthToken::new(Role::User, "abc"))
                .await
                .unwrap();
        }
        let sessions = WizardSessions::new(Duration::from_secs(60));
        let cart = Arc::new(sample_cart(&[("p1", 1)]));
        let account_ctx = CartContext::Account(AuthToken::new(Role::User, "abc"));

        let account = OrderWizard::new(cart.clone(), account_ctx.clone(), None);
        let account_id = account.id();
        let other = OrderWizard::new(cart.clone(), account_ctx, None);
        let other_id = other.id();
        let guest = OrderWizard::new(cart, guest_context(), None);
        let guest_id = guest.id();
        sessions.insert(account, Some(client)).await;
        sessions.insert(other, Some(other_client)).await;
        sessions.insert(guest, None).await;

        let listener = spawn_store_listener(&store, sessions.clone());
        store.remove(&scoped_key(KEY_TOKEN, client)).await.unwrap();

        let mut closed = false;
        for _ in 0..50 {
            if sessions.get(account_id).await.is_err() {
                closed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(closed);
        assert!(sessions.get(other_id).await.is_ok());
        assert!(sessions.get(guest_id).await.is_ok());
        listener.abort();
    }

    #[tokio::test]
    async fn expired_session_clears_only_the_callers_token() {
        let store = LocalStore::in_memory();
        let client = Uuid::new_v4();
        let other_client = Uuid::new_v4();
        for id in [client, other_client] {
            store
                .set(&scoped_key(KEY_TOKEN, id), &AuthToken::new(Role::User, "abc"))
                .await
                .unwrap();
        }

        let result: Result<(), AppError> =
            guard_session(&store, Some(client), Err(AppError::SessionExpired)).await;
        assert!(matches!(result, Err(AppError::SessionExpired)));
        assert!(stored_token(&store, client).await.is_none());
        assert!(stored_token(&store, other_client).await.is_some());
    }

    #[tokio::test]
    async fn other_errors_keep_the_token() {
        let store = LocalStore::in_memory();
        let client = Uuid::new_v4();
        store
            .set(&scoped_key(KEY_TOKEN, client), &AuthToken::new(Role::User, "abc"))
            .await
            .unwrap();

        let _ = guard_session::<()>(&store, Some(client), Err(AppError::NotFound)).await;
        assert!(stored_token(&store, client).await.is_some());
    }
}
