//! etcd-backed directory.
//!
//! Each announcement is a key `<service>/<address>` attached to its own
//! lease. A background task keeps the lease alive, reconnecting with backoff
//! and re-announcing under a fresh lease if the old one expired. Deregistering
//! stops that task and revokes the lease, which removes the key. If the node
//! dies without deregistering, the key disappears when the lease expires.

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, PutOptions};
use rand::Rng;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

use super::{Directory, DirectoryError, Endpoint, Registration};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_BASE: Duration = Duration::from_millis(250);

pub struct EtcdDirectory {
    client: Client,
    lease_ttl_secs: i64,
}

impl EtcdDirectory {
    pub async fn connect(servers: &[String], lease_ttl_secs: i64) -> Result<Self, DirectoryError> {
        let options = ConnectOptions::new()
            .with_connect_timeout(CONNECT_TIMEOUT)
            .with_timeout(REQUEST_TIMEOUT);
        let client = Client::connect(servers, Some(options)).await?;
        tracing::info!(servers = ?servers, "Connected to etcd");
        Ok(Self {
            client,
            lease_ttl_secs,
        })
    }
}

pub(crate) fn endpoint_key(endpoint: &Endpoint) -> String {
    format!("{}/{}", endpoint.service, endpoint.address)
}

fn keep_alive_period(ttl_secs: i64) -> Duration {
    Duration::from_secs((ttl_secs / 3).max(1) as u64)
}

/// Delay before keep-alive retry `attempt` (1-based): doubling from
/// `RETRY_BASE`, capped at the keep-alive period, plus up to 10% jitter.
fn retry_backoff(attempt: u32, ttl_secs: i64) -> Duration {
    let cap = keep_alive_period(ttl_secs);
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    let delay = RETRY_BASE.saturating_mul(factor).min(cap);

    let jitter_range = delay / 10;
    if jitter_range.is_zero() {
        return delay;
    }
    delay + rand::thread_rng().gen_range(Duration::ZERO..jitter_range)
}

/// Grant a lease and put `key` under it. A lease whose put failed is
/// revoked before returning the error.
async fn put_leased(
    client: &mut Client,
    key: &str,
    value: &str,
    ttl_secs: i64,
) -> Result<i64, DirectoryError> {
    let lease_id = client.lease_grant(ttl_secs, None).await?.id();
    let put = client
        .put(key, value, Some(PutOptions::new().with_lease(lease_id)))
        .await;
    if let Err(e) = put {
        if let Err(revoke) = client.lease_revoke(lease_id).await {
            tracing::warn!(lease_id, error = %revoke, "Failed to revoke lease after failed put");
        }
        return Err(e.into());
    }
    Ok(lease_id)
}

#[async_trait]
impl Directory for EtcdDirectory {
    async fn announce(&self, endpoint: &Endpoint) -> Result<Registration, DirectoryError> {
        let mut client = self.client.clone();
        let key = endpoint_key(endpoint);
        let lease_id = put_leased(&mut client, &key, &endpoint.address, self.lease_ttl_secs).await?;
        let current = Arc::new(AtomicI64::new(lease_id));

        let keeper = tokio::spawn(keep_alive(
            client.clone(),
            key.clone(),
            endpoint.address.clone(),
            self.lease_ttl_secs,
            current.clone(),
        ));
        tracing::info!(key = %key, lease_id, "Announced endpoint in etcd");

        Ok(Registration::new(endpoint.clone(), move || async move {
            keeper.abort();
            let lease_id = current.load(Ordering::SeqCst);
            let mut client = client;
            client.lease_revoke(lease_id).await?;
            tracing::info!(key = %key, lease_id, "Revoked etcd announcement");
            Ok(())
        }))
    }
}

/// Why a keep-alive stream ended.
enum LeaseEnd {
    /// etcd no longer knows the lease; the key is gone with it.
    Expired,
    Failed(String),
}

/// Keep the announcement alive until the task is aborted by deregistration.
///
/// A broken stream is reopened on the same lease. An expired lease is
/// replaced by a new lease and the key is put again. `current` always holds
/// the lease deregistration must revoke.
async fn keep_alive(mut client: Client, key: String, value: String, ttl_secs: i64, current: Arc<AtomicI64>) {
    let mut attempt = 0u32;
    loop {
        let lease_id = current.load(Ordering::SeqCst);
        match hold_lease(&mut client, lease_id, ttl_secs, &mut attempt).await {
            LeaseEnd::Expired => {
                tracing::error!(key = %key, lease_id, "Lease expired, re-announcing");
                match put_leased(&mut client, &key, &value, ttl_secs).await {
                    Ok(renewed) => {
                        current.store(renewed, Ordering::SeqCst);
                        attempt = 0;
                        tracing::info!(key = %key, lease_id = renewed, "Re-announced endpoint in etcd");
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(key = %key, error = %e, "Re-announce failed");
                    }
                }
            }
            LeaseEnd::Failed(reason) => {
                tracing::warn!(key = %key, lease_id, error = %reason, "Lease keep-alive interrupted");
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = retry_backoff(attempt, ttl_secs);
        tracing::debug!(key = %key, attempt, delay = ?delay, "Retrying lease keep-alive");
        time::sleep(delay).await;
    }
}

/// Renew `lease_id` every keep-alive period until the stream breaks or the
/// lease is gone. Each successful renewal resets `attempt`.
async fn hold_lease(client: &mut Client, lease_id: i64, ttl_secs: i64, attempt: &mut u32) -> LeaseEnd {
    let (mut keeper, mut responses) = match client.lease_keep_alive(lease_id).await {
        Ok(pair) => pair,
        Err(e) => return LeaseEnd::Failed(e.to_string()),
    };

    let mut ticker = time::interval(keep_alive_period(ttl_secs));
    loop {
        ticker.tick().await;
        if let Err(e) = keeper.keep_alive().await {
            return LeaseEnd::Failed(e.to_string());
        }
        match responses.message().await {
            Ok(Some(resp)) if resp.ttl() > 0 => *attempt = 0,
            Ok(Some(_)) => return LeaseEnd::Expired,
            Ok(None) => return LeaseEnd::Failed("keep-alive stream closed".to_string()),
            Err(e) => return LeaseEnd::Failed(e.to_string()),
        }
    }
}
