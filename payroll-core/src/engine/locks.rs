use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per payslip id.
///
/// Holding the guard serialises the read-compute-write cycle of a payslip
/// so two mutations of the same payslip cannot interleave.
#[derive(Default)]
pub(crate) struct PayslipLocks {
    inner: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl PayslipLocks {
    pub(crate) async fn acquire(
        &self,
        payslip_id: i64,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries referenced only by the map are idle.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(payslip_id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_payslip_is_serialised() {
        let locks = Arc::new(PayslipLocks::default());
        let guard = locks.acquire(1).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(1).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.expect("contender completes");
    }

    #[tokio::test]
    async fn different_payslips_do_not_block() {
        let locks = PayslipLocks::default();
        let _first = locks.acquire(1).await;

        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;

        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn idle_entries_are_pruned() {
        let locks = PayslipLocks::default();
        drop(locks.acquire(1).await);
        drop(locks.acquire(2).await);

        let _held = locks.acquire(3).await;

        assert_eq!(locks.tracked(), 1);
    }
}
