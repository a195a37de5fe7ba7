#[cfg(any(test, feature = "test_support"))]
pub mod env {
    //! Serialized, self-restoring access to process environment variables
    //! for tests that exercise `SPOTLOG_*` configuration.

    use std::sync::{Mutex, MutexGuard, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    pub struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    /// Take the process-wide env lock, snapshot the given keys, and clear
    /// them so the test starts from an empty environment. Everything
    /// snapshotted is restored on drop.
    pub fn isolate(keys: &[&str]) -> EnvGuard {
        let lk = ENV_LOCK.get_or_init(|| Mutex::new(()));
        let mut guard = EnvGuard {
            _lock: lk.lock().expect("env lock"),
            saved: Vec::new(),
        };
        for key in keys {
            guard.snapshot(key);
            std::env::remove_var(key);
        }
        guard
    }

    impl EnvGuard {
        fn snapshot(&mut self, key: &str) {
            if self.saved.iter().any(|(k, _)| k == key) {
                return;
            }
            self.saved.push((key.to_string(), std::env::var(key).ok()));
        }

        pub fn set(&mut self, key: &str, value: &str) {
            self.snapshot(key);
            std::env::set_var(key, value);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, val) in self.saved.drain(..) {
                match val {
                    Some(v) => std::env::set_var(&key, v),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}
