use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// ドキュメントIDごとの排他ロック。
///
/// 同じIDに対する抽出・リメディエーションを直列化する。異なるIDは並行に実行できる。
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// `key`のロックを保持したまま`f`を実行する。
    ///
    /// 待機している呼び出しがなければ、終了後にエントリを取り除く。
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(key);
        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            f()
        };
        self.release(key, &lock);
        result
    }

    fn release(&self, key: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // マップと自分の2つだけ
        if Arc::strong_count(lock) == 2 {
            locks.remove(key);
        }
    }

    fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }

    /// 使用中（実行中または待機中）のキーがないか。
    pub fn is_idle(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (locks, inside, max_seen) =
                    (Arc::clone(&locks), Arc::clone(&inside), Arc::clone(&max_seen));
                thread::spawn(move || {
                    locks.with_lock("doc", || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(5));
                        inside.fetch_sub(1, Ordering::SeqCst);
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_idle());
    }

    #[test]
    fn test_entries_are_dropped_after_use() {
        let locks = KeyedLocks::new();
        for i in 0..100 {
            locks.with_lock(&format!("doc{i}"), || {});
        }
        assert_eq!(locks.len(), 0);

        locks.with_lock("outer", || {
            locks.with_lock("inner", || assert_eq!(locks.len(), 2));
            assert_eq!(locks.len(), 1);
        });
        assert!(locks.is_idle());
    }

    #[test]
    fn test_returns_closure_value() {
        let locks = KeyedLocks::new();
        assert_eq!(locks.with_lock("a", || 41 + 1), 42);
    }
}
