//! Substrate-backed history collection for one operation kind

use crate::history::{HistoryItem, NewHistoryItem, OperationKind};
use crate::storage::Substrate;
use crate::Result;
use tracing::{debug, warn};

/// Millisecond clock used to stamp saved items
pub type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// In-memory view of one kind's history, rebuilt from the substrate after
/// every mutation
pub struct HistoryStore<S: Substrate> {
    substrate: S,
    kind: OperationKind,
    items: Vec<HistoryItem>,
    clock: Clock,
}

impl<S: Substrate> HistoryStore<S> {
    /// Create a store over `substrate` and load its current contents
    pub fn new(substrate: S, kind: OperationKind) -> Result<Self> {
        Self::with_clock(substrate, kind, Box::new(now_millis))
    }

    /// Like [`HistoryStore::new`] with a custom timestamp source
    pub fn with_clock(substrate: S, kind: OperationKind, clock: Clock) -> Result<Self> {
        let mut store = Self {
            substrate,
            kind,
            items: Vec::new(),
            clock,
        };
        store.load()?;
        Ok(store)
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Current items, most recent first
    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rebuild the cache from every entry under this kind's prefix.
    ///
    /// Entries that fail to decode are skipped.
    pub fn load(&mut self) -> Result<()> {
        let prefix = self.kind.prefix();
        let mut loaded = Vec::new();

        for key in self.substrate.keys()? {
            if !key.starts_with(prefix) {
                continue;
            }

            let Some(value) = self.substrate.read(&key)? else {
                continue;
            };

            match serde_json::from_str::<HistoryItem>(&value) {
                Ok(item) => loaded.push(item),
                Err(e) => warn!(key = %key, error = %e, "Skipping unreadable history entry"),
            }
        }

        loaded.sort_unstable_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        debug!(kind = %self.kind, count = loaded.len(), "Loaded history");
        self.items = loaded;
        Ok(())
    }

    /// Record an operation, overwriting any entry with the same identity
    pub fn save(&mut self, data: NewHistoryItem) -> Result<()> {
        let key = self.kind.key_for(&data.text, &data.cipher);
        let item = HistoryItem::new(data.text, data.cipher, (self.clock)());
        let value = serde_json::to_string(&item)?;

        self.substrate.write(&key, &value)?;
        debug!(kind = %self.kind, timestamp = item.timestamp(), "Saved history item");

        self.load()
    }

    /// Remove the entry whose `(text, cipher)` matches `item`.
    ///
    /// A missing entry is a no-op.
    pub fn delete(&mut self, item: &HistoryItem) -> Result<()> {
        if let Some(key) = self.find_key(item)? {
            self.substrate.remove(&key)?;
            self.items.retain(|i| !i.same_identity(item));
            debug!(kind = %self.kind, "Deleted history item");
        } else {
            debug!(kind = %self.kind, "No history entry to delete");
        }

        self.load()?;
        debug!(kind = %self.kind, remaining = self.items.len(), "History after delete");
        Ok(())
    }

    fn find_key(&self, item: &HistoryItem) -> Result<Option<String>> {
        let prefix = self.kind.prefix();

        for key in self.substrate.keys()? {
            if !key.starts_with(prefix) {
                continue;
            }

            let Some(value) = self.substrate.read(&key)? else {
                continue;
            };

            if let Ok(stored) = serde_json::from_str::<HistoryItem>(&value) {
                if stored.same_identity(item) {
                    return Ok(Some(key));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemorySubstrate, StorageError};
    use crate::Error;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Clock that ticks one millisecond per call, starting at `start`
    fn ticking_clock(start: i64) -> Clock {
        let next = AtomicI64::new(start);
        Box::new(move || next.fetch_add(1, Ordering::SeqCst))
    }

    fn store_over(
        substrate: &Arc<MemorySubstrate>,
        kind: OperationKind,
    ) -> HistoryStore<Arc<MemorySubstrate>> {
        HistoryStore::with_clock(Arc::clone(substrate), kind, ticking_clock(1_000)).unwrap()
    }

    fn identities(store: &HistoryStore<Arc<MemorySubstrate>>) -> Vec<(String, String)> {
        store
            .items()
            .iter()
            .map(|i| (i.text().to_string(), i.cipher().to_string()))
            .collect()
    }

    #[test]
    fn test_new_store_starts_empty() {
        let substrate = Arc::new(MemorySubstrate::new());
        let store = store_over(&substrate, OperationKind::Encrypt);
        assert!(store.is_empty());
        assert_eq!(store.kind(), OperationKind::Encrypt);
    }

    #[rstest]
    #[case(OperationKind::Encrypt)]
    #[case(OperationKind::Decrypt)]
    fn test_save_round_trip(#[case] kind: OperationKind) {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut store = store_over(&substrate, kind);

        store.save(NewHistoryItem::new("hello", "4f2a")).unwrap();

        assert_eq!(store.len(), 1);
        let item = &store.items()[0];
        assert_eq!(item.text(), "hello");
        assert_eq!(item.cipher(), "4f2a");
        assert_eq!(item.timestamp(), 1_000);
        assert!(substrate
            .read(&kind.key_for("hello", "4f2a"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_sorted_most_recent_first() {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut store = store_over(&substrate, OperationKind::Encrypt);

        store.save(NewHistoryItem::new("a", "1")).unwrap();
        store.save(NewHistoryItem::new("b", "2")).unwrap();
        store.save(NewHistoryItem::new("c", "3")).unwrap();

        assert_eq!(
            identities(&store),
            vec![
                ("c".to_string(), "3".to_string()),
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_same_identity_overwrites() {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut store = store_over(&substrate, OperationKind::Encrypt);

        store.save(NewHistoryItem::new("a", "1")).unwrap();
        store.save(NewHistoryItem::new("b", "2")).unwrap();
        store.save(NewHistoryItem::new("a", "1")).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[0].text(), "a");
        assert_eq!(store.items()[0].timestamp(), 1_002);
    }

    #[test]
    fn test_delete_matches_by_content() {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut store = store_over(&substrate, OperationKind::Decrypt);

        store.save(NewHistoryItem::new("a", "1")).unwrap();
        store.save(NewHistoryItem::new("b", "2")).unwrap();

        // Distinct value, different timestamp, same identity
        let target = HistoryItem::new("a", "1", 0);
        store.delete(&target).unwrap();

        assert_eq!(identities(&store), vec![("b".to_string(), "2".to_string())]);
        assert_eq!(substrate.len().unwrap(), 1);
    }

    #[test]
    fn test_delete_cached_item() {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut store = store_over(&substrate, OperationKind::Encrypt);

        store.save(NewHistoryItem::new("a", "1")).unwrap();
        let item = store.items()[0].clone();
        store.delete(&item).unwrap();

        assert!(store.is_empty());
        assert!(substrate.is_empty().unwrap());
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut store = store_over(&substrate, OperationKind::Encrypt);

        store.save(NewHistoryItem::new("a", "1")).unwrap();
        let before = store.items().to_vec();

        store.delete(&HistoryItem::new("a", "2", 0)).unwrap();

        assert_eq!(store.items(), before.as_slice());
        assert_eq!(substrate.len().unwrap(), 1);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let substrate = Arc::new(MemorySubstrate::new());
        let mut encrypt = store_over(&substrate, OperationKind::Encrypt);
        let mut decrypt = store_over(&substrate, OperationKind::Decrypt);

        encrypt.save(NewHistoryItem::new("a", "1")).unwrap();
        decrypt.load().unwrap();
        assert!(decrypt.is_empty());

        // Deleting the same identity through the other kind leaves it alone
        decrypt.delete(&HistoryItem::new("a", "1", 0)).unwrap();
        encrypt.load().unwrap();
        assert_eq!(encrypt.len(), 1);
    }

    #[test]
    fn test_corrupt_entries_are_skipped() {
        let substrate = Arc::new(MemorySubstrate::new());
        let kind = OperationKind::Encrypt;

        substrate.write(&kind.key_for("x", "y"), "{not json").unwrap();
        substrate
            .write(&kind.key_for("t", "c"), r#"{"text":"t"}"#)
            .unwrap();
        substrate
            .write(
                &kind.key_for("a", "1"),
                r#"{"text":"a","cipher":"1","timestamp":10}"#,
            )
            .unwrap();
        substrate
            .write(
                &kind.key_for("b", "2"),
                r#"{"text":"b","cipher":"2","timestamp":20}"#,
            )
            .unwrap();

        let store = store_over(&substrate, kind);
        assert_eq!(
            identities(&store),
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_foreign_keys_ignored() {
        let substrate = Arc::new(MemorySubstrate::new());
        substrate
            .write("theme", r#"{"text":"a","cipher":"1","timestamp":10}"#)
            .unwrap();

        let store = store_over(&substrate, OperationKind::Encrypt);
        assert!(store.is_empty());
    }

    /// Substrate whose every call fails
    struct BrokenSubstrate;

    impl Substrate for BrokenSubstrate {
        fn keys(&self) -> std::result::Result<Vec<String>, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn read(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn write(&self, _key: &str, _value: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn remove(&self, _key: &str) -> std::result::Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn test_substrate_failure_is_propagated() {
        let result = HistoryStore::new(BrokenSubstrate, OperationKind::Encrypt);
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::Poisoned))
        ));
    }

    #[test]
    fn test_new_loads_existing_entries() {
        let substrate = Arc::new(MemorySubstrate::new());
        {
            let mut store = store_over(&substrate, OperationKind::Encrypt);
            store.save(NewHistoryItem::new("a", "1")).unwrap();
        }

        let store = store_over(&substrate, OperationKind::Encrypt);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_default_clock_stamps_current_time() {
        let substrate = MemorySubstrate::new();
        let before = chrono::Utc::now().timestamp_millis();

        let mut store = HistoryStore::new(&substrate, OperationKind::Encrypt).unwrap();
        store.save(NewHistoryItem::new("a", "1")).unwrap();

        let after = chrono::Utc::now().timestamp_millis();
        let stamped = store.items()[0].timestamp();
        assert!(stamped >= before && stamped <= after);
    }
}
