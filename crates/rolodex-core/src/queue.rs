use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::AppError;
use crate::models::{LinkId, PersonRecord, QueueCounts};
use crate::store::RecordStore;

/// Work queue moving link identifiers through pending → in-progress →
/// finalized.
///
/// Single-owner: two processes claiming from the same backing store can
/// both receive the same head of `pending`.
pub trait LinkQueue: Send + Sync {
    /// True if `id` is finalized or currently claimed.
    fn identifier_exists(&self, id: &str) -> Result<bool, AppError>;

    /// Append ids not yet seen anywhere in the queue, keeping input order.
    ///
    /// Returns how many were appended.
    fn add_pending(&self, ids: &[LinkId]) -> Result<usize, AppError>;

    /// Move the head of `pending` to `in_progress` and return it.
    ///
    /// Returns `None` when nothing is pending.
    fn claim_next(&self) -> Result<Option<LinkId>, AppError>;

    /// Record a finished person. A profile that is already stored is left
    /// untouched (first write wins). Does not release the claim; call
    /// [`remove_in_progress`](Self::remove_in_progress) afterwards.
    fn finalize(&self, id: &str, record: &PersonRecord) -> Result<(), AppError>;

    /// Drop `id` from `in_progress`, and from `pending` for callers that
    /// never claimed it. Absent ids are ignored.
    fn remove_in_progress(&self, id: &str) -> Result<(), AppError>;

    fn list_pending(&self) -> Result<Vec<LinkId>, AppError>;

    fn list_in_progress(&self) -> Result<Vec<LinkId>, AppError>;

    fn list_persons(&self) -> Result<Vec<PersonRecord>, AppError>;

    fn counts(&self) -> Result<QueueCounts, AppError>;

    /// Put claimed-but-unfinished ids back into `pending`.
    ///
    /// An id stranded for the first time goes to the front; one stranded
    /// again goes to the back so it cannot block the rest of the queue.
    /// Claims whose person is already stored are simply released.
    /// Returns how many ids were requeued.
    fn requeue_stranded(&self) -> Result<usize, AppError>;
}

/// [`LinkQueue`] persisted through a [`RecordStore`].
///
/// Each operation, reads included, is one `load → mutate → save` cycle, so
/// the file reflects every step and a crash loses at most the step in flight.
#[derive(Debug, Clone)]
pub struct QueueManager {
    store: RecordStore,
}

impl QueueManager {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(RecordStore::new(path))
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }
}

impl LinkQueue for QueueManager {
    fn identifier_exists(&self, id: &str) -> Result<bool, AppError> {
        self.store
            .update(|doc| doc.has_person(id) || doc.in_progress.iter().any(|p| p == id))
    }

    fn add_pending(&self, ids: &[LinkId]) -> Result<usize, AppError> {
        let added = self.store.update(|doc| {
            let fresh: Vec<LinkId> = {
                let mut seen: HashSet<&str> = doc
                    .pending
                    .iter()
                    .chain(doc.in_progress.iter())
                    .map(String::as_str)
                    .chain(doc.persons.iter().map(|p| p.profile.as_str()))
                    .collect();
                ids.iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .cloned()
                    .collect()
            };

            let count = fresh.len();
            doc.pending.extend(fresh);
            count
        })?;

        tracing::debug!(offered = ids.len(), added, "Added pending links");
        Ok(added)
    }

    fn claim_next(&self) -> Result<Option<LinkId>, AppError> {
        self.store.update(|doc| {
            if doc.pending.is_empty() {
                return None;
            }
            let next = doc.pending.remove(0);
            doc.in_progress.push(next.clone());
            Some(next)
        })
    }

    fn finalize(&self, id: &str, record: &PersonRecord) -> Result<(), AppError> {
        record.validate()?;
        if record.profile != id {
            return Err(AppError::ValidationError(format!(
                "record profile '{}' does not match identifier '{id}'",
                record.profile
            )));
        }

        let inserted = self.store.update(|doc| {
            if doc.has_person(&record.profile) {
                false
            } else {
                doc.persons.push(record.clone());
                true
            }
        })?;

        if !inserted {
            tracing::debug!(profile = %id, "Person already stored, keeping first record");
        }
        Ok(())
    }

    fn remove_in_progress(&self, id: &str) -> Result<(), AppError> {
        self.store.update(|doc| {
            if let Some(pos) = doc.in_progress.iter().position(|p| p == id) {
                doc.in_progress.remove(pos);
            }
            if let Some(pos) = doc.pending.iter().position(|p| p == id) {
                doc.pending.remove(pos);
            }
            doc.recoveries.remove(id);
        })
    }

    fn list_pending(&self) -> Result<Vec<LinkId>, AppError> {
        self.store.update(|doc| doc.pending.clone())
    }

    fn list_in_progress(&self) -> Result<Vec<LinkId>, AppError> {
        self.store.update(|doc| doc.in_progress.clone())
    }

    fn list_persons(&self) -> Result<Vec<PersonRecord>, AppError> {
        self.store.update(|doc| doc.persons.clone())
    }

    fn counts(&self) -> Result<QueueCounts, AppError> {
        self.store.update(|doc| doc.counts())
    }

    fn requeue_stranded(&self) -> Result<usize, AppError> {
        let (front, back) = self.store.update(|doc| {
            let stranded = std::mem::take(&mut doc.in_progress);
            let mut front: Vec<LinkId> = Vec::new();
            let mut back: Vec<LinkId> = Vec::new();
            for id in stranded {
                if doc.has_person(&id) {
                    doc.recoveries.remove(&id);
                    continue;
                }
                if front.contains(&id) || back.contains(&id) {
                    continue;
                }
                let seen = doc.recoveries.entry(id.clone()).or_default();
                *seen += 1;
                if *seen > 1 {
                    back.push(id);
                } else {
                    front.push(id);
                }
            }
            doc.pending.retain(|p| !front.contains(p) && !back.contains(p));

            let counts = (front.len(), back.len());
            front.append(&mut doc.pending);
            front.append(&mut back);
            doc.pending = front;
            counts
        })?;

        if back > 0 {
            tracing::warn!(repeated = back, "Links stranded more than once moved to the back");
        }
        Ok(front + back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn queue_in(dir: &TempDir) -> QueueManager {
        QueueManager::open(dir.path().join("connections_links.json"))
    }

    fn person(profile: &str, name: &str) -> PersonRecord {
        PersonRecord {
            profile: profile.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    fn ids(items: &[&str]) -> Vec<LinkId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_pending_dedupes_within_input() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        let added = queue.add_pending(&ids(&["a", "a", "b"])).unwrap();

        assert_eq!(added, 2);
        assert_eq!(queue.list_pending().unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn add_pending_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        queue.add_pending(&ids(&["a", "b"])).unwrap();
        let added = queue.add_pending(&ids(&["a", "b"])).unwrap();

        assert_eq!(added, 0);
        assert_eq!(queue.list_pending().unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn add_pending_skips_claimed_and_finalized() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        queue.add_pending(&ids(&["a", "b"])).unwrap();
        let a = queue.claim_next().unwrap().unwrap();
        let b = queue.claim_next().unwrap().unwrap();
        queue.finalize(&b, &person(&b, "Bea")).unwrap();
        queue.remove_in_progress(&b).unwrap();

        let added = queue.add_pending(&ids(&[a.as_str(), b.as_str(), "c"])).unwrap();

        assert_eq!(added, 1);
        assert_eq!(queue.list_pending().unwrap(), ids(&["c"]));
    }

    #[test]
    fn claim_next_is_fifo_and_returns_none_when_empty() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b"])).unwrap();

        assert_eq!(queue.claim_next().unwrap().as_deref(), Some("a"));
        assert_eq!(queue.claim_next().unwrap().as_deref(), Some("b"));
        assert_eq!(queue.claim_next().unwrap(), None);
        assert!(queue.list_pending().unwrap().is_empty());
        assert_eq!(queue.list_in_progress().unwrap(), ids(&["a", "b"]));
    }

    #[test]
    fn claim_then_finalize_moves_id_through_states() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["x"])).unwrap();

        let x = queue.claim_next().unwrap().unwrap();
        assert!(!queue.list_pending().unwrap().contains(&x));
        assert!(queue.list_in_progress().unwrap().contains(&x));

        queue.finalize(&x, &person(&x, "Xavier")).unwrap();
        queue.remove_in_progress(&x).unwrap();

        assert!(!queue.list_in_progress().unwrap().contains(&x));
        let persons = queue.list_persons().unwrap();
        assert_eq!(persons.iter().filter(|p| p.profile == x).count(), 1);
    }

    #[test]
    fn finalize_keeps_first_write() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        queue.finalize("a", &person("a", "First")).unwrap();
        queue.finalize("a", &person("a", "Second")).unwrap();

        let persons = queue.list_persons().unwrap();
        assert_eq!(persons.len(), 1);
        assert_eq!(persons[0].name, "First");
    }

    #[test]
    fn finalize_rejects_empty_profile() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        let err = queue.finalize("a", &person("", "Nobody")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(queue.list_persons().unwrap().is_empty());
    }

    #[test]
    fn finalize_rejects_mismatched_profile() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);

        let err = queue.finalize("a", &person("b", "Bea")).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn finalize_does_not_release_claim() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a"])).unwrap();
        let a = queue.claim_next().unwrap().unwrap();

        queue.finalize(&a, &person(&a, "Ada")).unwrap();

        assert_eq!(queue.list_in_progress().unwrap(), ids(&["a"]));
    }

    #[test]
    fn identifier_exists_covers_persons_and_in_progress_only() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b", "c"])).unwrap();
        queue.claim_next().unwrap();
        queue.finalize("z", &person("z", "Zed")).unwrap();

        assert!(queue.identifier_exists("a").unwrap());
        assert!(queue.identifier_exists("z").unwrap());
        assert!(!queue.identifier_exists("b").unwrap());
        assert!(!queue.identifier_exists("nope").unwrap());
    }

    #[test]
    fn remove_in_progress_removes_first_occurrence_only() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue
            .store()
            .update(|doc| doc.in_progress = ids(&["a", "b", "a"]))
            .unwrap();

        queue.remove_in_progress("a").unwrap();

        assert_eq!(queue.list_in_progress().unwrap(), ids(&["b", "a"]));
    }

    #[test]
    fn remove_in_progress_also_drops_unclaimed_pending() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b"])).unwrap();

        queue.remove_in_progress("b").unwrap();

        assert_eq!(queue.list_pending().unwrap(), ids(&["a"]));
    }

    #[test]
    fn remove_in_progress_absent_is_noop() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a"])).unwrap();

        queue.remove_in_progress("ghost").unwrap();

        assert_eq!(queue.list_pending().unwrap(), ids(&["a"]));
    }

    #[test]
    fn list_pending_is_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a"])).unwrap();

        let mut snapshot = queue.list_pending().unwrap();
        snapshot.push("local-only".into());

        assert_eq!(queue.list_pending().unwrap(), ids(&["a"]));
    }

    #[test]
    fn requeue_stranded_puts_claims_back_in_front() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b", "c", "d"])).unwrap();
        queue.claim_next().unwrap();
        queue.claim_next().unwrap();
        // "a" finished but its claim was never released.
        queue.finalize("a", &person("a", "Ada")).unwrap();

        let requeued = queue.requeue_stranded().unwrap();

        assert_eq!(requeued, 1);
        assert_eq!(queue.list_pending().unwrap(), ids(&["b", "c", "d"]));
        assert!(queue.list_in_progress().unwrap().is_empty());
    }

    #[test]
    fn requeue_stranded_twice_moves_link_to_back() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b", "c"])).unwrap();

        queue.claim_next().unwrap();
        assert_eq!(queue.requeue_stranded().unwrap(), 1);
        assert_eq!(queue.list_pending().unwrap(), ids(&["a", "b", "c"]));

        // "a" fails again on the retry.
        queue.claim_next().unwrap();
        assert_eq!(queue.requeue_stranded().unwrap(), 1);
        assert_eq!(queue.list_pending().unwrap(), ids(&["b", "c", "a"]));
    }

    #[test]
    fn releasing_claim_forgets_recoveries() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b"])).unwrap();
        queue.claim_next().unwrap();
        queue.requeue_stranded().unwrap();
        queue.claim_next().unwrap();

        queue.finalize("a", &person("a", "Ada")).unwrap();
        queue.remove_in_progress("a").unwrap();

        assert!(queue.store().load().unwrap().recoveries.is_empty());
    }

    #[test]
    fn requeue_stranded_on_clean_queue_is_noop() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a"])).unwrap();

        assert_eq!(queue.requeue_stranded().unwrap(), 0);
        assert_eq!(queue.list_pending().unwrap(), ids(&["a"]));
    }

    #[test]
    fn counts_reflect_all_lists() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        queue.add_pending(&ids(&["a", "b", "c"])).unwrap();
        queue.claim_next().unwrap();
        queue.finalize("z", &person("z", "Zed")).unwrap();

        let counts = queue.counts().unwrap();
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.in_progress, 1);
        assert_eq!(counts.persons, 1);
    }

    #[test]
    fn operations_surface_parse_errors() {
        let dir = TempDir::new().unwrap();
        let queue = queue_in(&dir);
        std::fs::write(queue.store().path(), "not json").unwrap();

        assert!(matches!(
            queue.claim_next().unwrap_err(),
            AppError::ParseError(_)
        ));
        assert!(matches!(
            queue.add_pending(&ids(&["a"])).unwrap_err(),
            AppError::ParseError(_)
        ));
    }
}
