// Thread-safe findings log
// Append-only, indexable store shared by the pipeline, replay tasks and any viewer

use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::error::FindingLogError;
use crate::finding::Finding;

/// Callback invoked after each append with the inserted index range
pub type Observer = Arc<dyn Fn(Range<usize>) + Send + Sync>;

/// Ordered, append-only list of findings.
///
/// An index, once handed out by `append`, keeps pointing at the same finding for the
/// lifetime of the log. All entry access goes through one mutex, so `count()` and
/// `get(i)` never see a half-inserted entry.
#[derive(Default)]
pub struct FindingLog {
    entries: Mutex<Vec<Arc<Finding>>>,
    observers: RwLock<Vec<Observer>>,
}

impl FindingLog {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere never leaves the Vec half-pushed, so a poisoned lock is safe to reuse.
    fn entries(&self) -> MutexGuard<'_, Vec<Arc<Finding>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a finding and return its index.
    /// Observers run on the caller's thread after the entry lock is released.
    pub fn append(&self, finding: Finding) -> usize {
        let index = {
            let mut entries = self.entries();
            entries.push(Arc::new(finding));
            entries.len() - 1
        };
        self.notify(index..index + 1);
        index
    }

    /// Number of findings recorded so far
    pub fn count(&self) -> usize {
        self.entries().len()
    }

    /// Finding at `index`, or `OutOfRange` when `index >= count()`
    pub fn get(&self, index: usize) -> Result<Arc<Finding>, FindingLogError> {
        let entries = self.entries();
        entries
            .get(index)
            .cloned()
            .ok_or(FindingLogError::OutOfRange {
                index,
                count: entries.len(),
            })
    }

    /// Copy of every finding recorded so far, in insertion order
    pub fn snapshot(&self) -> Vec<Arc<Finding>> {
        self.entries().clone()
    }

    /// Register an observer for future appends
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(Range<usize>) + Send + Sync + 'static,
    {
        let mut observers = self.observers.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        observers.push(Arc::new(observer));
    }

    fn notify(&self, inserted: Range<usize>) {
        // Copy the list out so observers may subscribe or append without holding the lock
        let observers: Vec<Observer> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for observer in &observers {
            observer(inserted.clone());
        }
    }
}

impl std::fmt::Debug for FindingLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FindingLog").field("count", &self.count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Exchange, HttpRequest, HttpResponse, Method};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(message: &str) -> Finding {
        let exchange = Exchange::new(
            HttpRequest::new(Method::GET, "http://localhost/"),
            HttpResponse::new(200),
        );
        Finding::new("test", message, &exchange)
    }

    #[test]
    fn append_returns_sequential_indices() {
        let log = FindingLog::new();
        assert_eq!(log.append(sample("a")), 0);
        assert_eq!(log.append(sample("b")), 1);
        assert_eq!(log.count(), 2);
        assert_eq!(log.get(1).unwrap().message(), "b");
    }

    #[test]
    fn get_past_end_is_out_of_range() {
        let log = FindingLog::new();
        log.append(sample("a"));
        assert_eq!(
            log.get(1).unwrap_err(),
            FindingLogError::OutOfRange { index: 1, count: 1 }
        );
    }

    #[test]
    fn observer_can_read_back_the_new_row() {
        let log = Arc::new(FindingLog::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let reader = Arc::clone(&log);
        let seen_in_observer = Arc::clone(&seen);
        log.subscribe(move |rows| {
            // Re-entering the log from an observer must not deadlock
            for i in rows {
                assert!(reader.get(i).is_ok());
                seen_in_observer.fetch_add(1, Ordering::SeqCst);
            }
        });

        log.append(sample("a"));
        log.append(sample("b"));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn observer_can_subscribe_another_observer() {
        let log = Arc::new(FindingLog::new());
        let late_calls = Arc::new(AtomicUsize::new(0));
        let subscribed = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let weak = Arc::downgrade(&log);
        let late = Arc::clone(&late_calls);
        log.subscribe(move |_| {
            if subscribed.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(log) = weak.upgrade() {
                let late = Arc::clone(&late);
                log.subscribe(move |_| {
                    late.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        log.append(sample("a"));
        assert_eq!(late_calls.load(Ordering::SeqCst), 0, "new observer only sees later appends");
        log.append(sample("b"));
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }
}
