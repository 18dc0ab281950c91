//! Bound on tasks simultaneously scheduled or running.
//!
//! Admission hands out an [`AdmissionPermit`]; the slot is released exactly once, when the
//! permit is dropped. The registry keeps the permit with its entry and drops it inside the
//! terminal transition, so the in-flight count always equals the number of scheduled records.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("tasks overflow: {limit} tasks already in flight")]
pub struct Overflow {
    pub limit: usize,
}

#[derive(Debug)]
pub struct Admission {
    limit: usize,
    slots: Arc<Semaphore>,
}

/// One reserved in-flight slot.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl Admission {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            slots: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Reserve a slot without waiting.
    pub fn try_admit(&self) -> Result<AdmissionPermit, Overflow> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => Ok(AdmissionPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => {
                Err(Overflow { limit: self.limit })
            }
        }
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.limit - self.slots.available_permits()
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit() {
        let admission = Admission::new(2);
        let a = admission.try_admit().unwrap();
        let _b = admission.try_admit().unwrap();
        assert_eq!(admission.in_flight(), 2);
        assert_eq!(admission.try_admit().unwrap_err(), Overflow { limit: 2 });

        drop(a);
        assert_eq!(admission.in_flight(), 1);
        assert!(admission.try_admit().is_ok());
    }

    #[test]
    fn zero_limit_rejects_everything() {
        let admission = Admission::new(0);
        assert!(admission.try_admit().is_err());
        assert_eq!(admission.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_admission_rejects_exactly_the_excess() {
        let admission = Arc::new(Admission::new(5));
        let mut joins = Vec::new();
        for _ in 0..20 {
            let admission = Arc::clone(&admission);
            joins.push(tokio::spawn(async move { admission.try_admit() }));
        }

        let mut held = Vec::new();
        let mut rejected = 0;
        for join in joins {
            match join.await.unwrap() {
                Ok(permit) => held.push(permit),
                Err(_) => rejected += 1,
            }
        }
        assert_eq!(held.len(), 5);
        assert_eq!(rejected, 15);

        held.clear();
        assert_eq!(admission.in_flight(), 0);
    }
}
