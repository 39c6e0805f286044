//! Single-flight coalescing for concurrent OAuth2 refresh attempts (§4.3.4).
//!
//! When several requests against the same `ExternalCredentials` discover a
//! stale access token at once, only one of them should hit the provider's
//! token endpoint; the rest wait for its result instead of racing it (and
//! potentially invalidating each other's refresh token, for providers that
//! rotate it on every use).

use gravy_crypto::Credentials;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Refreshed(Credentials),
    Failed(String),
}

/// Coalesces concurrent refreshes keyed by the credentials record they
/// belong to. One `SingleFlightRefresher` is shared across a process, or
/// scoped per-request — either works since the map only holds entries for
/// the lifetime of an in-flight refresh.
pub struct SingleFlightRefresher {
    inflight: Mutex<HashMap<Uuid, broadcast::Sender<RefreshOutcome>>>,
}

impl Default for SingleFlightRefresher {
    fn default() -> Self {
        Self::new()
    }
}

impl SingleFlightRefresher {
    pub fn new() -> Self {
        Self { inflight: Mutex::new(HashMap::new()) }
    }

    /// Runs `refresh` for `account_id` if no refresh is already in flight
    /// for it; otherwise awaits the in-flight one's result. `refresh` is
    /// only ever invoked by whichever caller wins the race to register it.
    pub async fn refresh<F, Fut>(&self, account_id: Uuid, refresh: F) -> Result<Credentials, String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Credentials, String>>,
    {
        let mut receiver = {
            let mut inflight = self.inflight.lock().await;
            if let Some(sender) = inflight.get(&account_id) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(1);
                inflight.insert(account_id, sender);
                drop(inflight);
                return self.run_and_broadcast(account_id, refresh).await;
            }
        };

        match receiver.recv().await {
            Ok(RefreshOutcome::Refreshed(creds)) => Ok(creds),
            Ok(RefreshOutcome::Failed(message)) => Err(message),
            Err(_) => Err("refresh coordinator dropped before completing".to_string()),
        }
    }

    async fn run_and_broadcast<F, Fut>(&self, account_id: Uuid, refresh: F) -> Result<Credentials, String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Credentials, String>>,
    {
        let result = refresh().await;

        let sender = {
            let mut inflight = self.inflight.lock().await;
            inflight.remove(&account_id)
        };
        if let Some(sender) = sender {
            let outcome = match &result {
                Ok(creds) => RefreshOutcome::Refreshed(creds.clone()),
                Err(message) => RefreshOutcome::Failed(message.clone()),
            };
            // No receivers is the common case (no contention); ignore.
            let _ = sender.send(outcome);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fresh_oauth2(token: &str) -> Credentials {
        Credentials::OAuth2 {
            access_token: Some(token.to_string()),
            refresh_token: Some("RT1".to_string()),
            access_token_expires_at: None,
            state_token: None,
            authorized_scopes: vec![],
        }
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_coalesce_into_one_call() {
        let refresher = Arc::new(SingleFlightRefresher::new());
        let account_id = Uuid::new_v4();
        let call_count = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let refresher = refresher.clone();
            let call_count = call_count.clone();
            handles.push(tokio::spawn(async move {
                refresher
                    .refresh(account_id, || async move {
                        call_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(fresh_oauth2("AT-new"))
                    })
                    .await
            }));
        }

        let mut results = vec![];
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        for result in results {
            match result.unwrap() {
                Credentials::OAuth2 { access_token, .. } => assert_eq!(access_token, Some("AT-new".to_string())),
                _ => panic!("expected OAuth2 credentials"),
            }
        }
    }

    #[tokio::test]
    async fn test_distinct_accounts_refresh_independently() {
        let refresher = SingleFlightRefresher::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let ra = refresher.refresh(a, || async { Ok(fresh_oauth2("A")) }).await.unwrap();
        let rb = refresher.refresh(b, || async { Ok(fresh_oauth2("B")) }).await.unwrap();

        assert_ne!(ra, rb);
    }

    #[tokio::test]
    async fn test_failure_propagates_to_waiters() {
        let refresher = Arc::new(SingleFlightRefresher::new());
        let account_id = Uuid::new_v4();

        let refresher2 = refresher.clone();
        let waiter = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            refresher2.refresh(account_id, || async { unreachable!("waiter must not run refresh itself") }).await
        });

        let leader = refresher
            .refresh(account_id, || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err("provider rejected refresh".to_string())
            })
            .await;

        assert!(leader.is_err());
        assert!(waiter.await.unwrap().is_err());
    }
}
