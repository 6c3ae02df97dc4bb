//! Asynchronous accounting: access-log append and quota increment.
//!
//! Fire-and-forget with a bounded deadline. The spawned task owns its
//! own store handle, so cancelling the originating request never
//! cancels accounting, and nothing here can block the response path.

use std::time::Duration;

use crate::models::{NewAccessLog, WINDOW_DAILY};
use crate::store::{AccessLogRepository as _, DynStore, QuotaRepository as _, Store as _};

const ACCOUNTING_DEADLINE: Duration = Duration::from_secs(5);

/// Quota units to add once the invocation completed; present only
/// when quota admission ran for the request.
#[derive(Debug, Clone)]
pub struct QuotaCharge {
    pub user_id: i64,
    pub service_name: String,
    pub cost: i64,
}

pub struct Accounting {
    store: DynStore,
}

impl Accounting {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Hands the entry (and optional charge) to a background task.
    /// Failures are logged and swallowed; the client response is
    /// already on its way.
    pub fn record(&self, entry: NewAccessLog, charge: Option<QuotaCharge>) {
        let store = self.store.clone();

        tokio::spawn(async move {
            let work = async {
                if let Err(err) = store.access_logs().create(&entry).await {
                    tracing::error!(
                        error = %err,
                        service = %entry.service_name,
                        user_id = entry.user_id,
                        "failed to write access log"
                    );
                }

                if let Some(charge) = charge {
                    if let Err(err) = store
                        .quotas()
                        .increment_usage(
                            charge.user_id,
                            &charge.service_name,
                            WINDOW_DAILY,
                            charge.cost,
                        )
                        .await
                    {
                        tracing::error!(
                            error = %err,
                            service = %charge.service_name,
                            user_id = charge.user_id,
                            "failed to increment quota usage"
                        );
                    }
                }
            };

            if tokio::time::timeout(ACCOUNTING_DEADLINE, work).await.is_err() {
                tracing::warn!(
                    service = %entry.service_name,
                    "accounting task exceeded its deadline"
                );
            }
        });
    }
}
