use camino::Utf8PathBuf;
use std::cell::RefCell;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Resolve reqflow home:
/// 1) thread-local override (tests use this)
/// 2) env `REQFLOW_HOME`
/// 3) default ".reqflow"
#[must_use]
pub fn reqflow_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var("REQFLOW_HOME") {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(".reqflow")
}

/// Returns `<REQFLOW_HOME>/cache`
#[must_use]
pub fn cache_dir() -> Utf8PathBuf {
    reqflow_home().join("cache")
}

/// Returns `<REQFLOW_HOME>/data`
#[must_use]
pub fn data_dir() -> Utf8PathBuf {
    reqflow_home().join("data")
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for an isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Point `reqflow_home()` at a fresh temp dir for the current thread.
#[cfg(any(test, feature = "test-utils"))]
#[must_use]
#[allow(clippy::expect_used)]
pub fn with_isolated_home() -> HomeGuard {
    let inner = tempfile::TempDir::new().expect("create temp home");
    let path = Utf8PathBuf::from_path_buf(inner.path().to_path_buf()).expect("utf-8 temp path");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(path));
    HomeGuard { inner }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_home_is_thread_local() {
        let guard = with_isolated_home();
        let home = reqflow_home();
        assert_eq!(home.as_std_path(), guard.path());
        assert_eq!(cache_dir(), home.join("cache"));
        drop(guard);
        assert_ne!(reqflow_home(), home);
    }

    #[test]
    fn ensure_dir_all_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        ensure_dir_all(&dir).unwrap();
        ensure_dir_all(&dir).unwrap();
        assert!(dir.is_dir());
    }
}
