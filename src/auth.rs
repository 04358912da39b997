use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("token cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Raw session token persisted between runs. The file holds the token bytes
/// and nothing else.
#[derive(Clone, Debug)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_token(&self) -> Result<Option<String>, CacheError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(self.io_error(err)),
        };

        let token = String::from_utf8_lossy(&bytes).trim().to_string();
        if token.is_empty() {
            return Ok(None);
        }
        debug!(path = %self.path.display(), "loaded cached token");
        Ok(Some(token))
    }

    pub fn store_token(&self, token: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }

        fs::write(&self.path, token.as_bytes()).map_err(|err| self.io_error(err))?;
        set_file_permissions(&self.path, 0o600).map_err(|err| self.io_error(err))?;
        debug!(path = %self.path.display(), "stored session token");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path, mode: u32) -> Result<(), io::Error> {
    use std::os::unix::fs::PermissionsExt;
    let perm = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perm)
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path, _mode: u32) -> Result<(), io::Error> {
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    pub(crate) fn scratch_path(name: &str) -> PathBuf {
        let id = NEXT_DIR.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("chord-test-{}-{id}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir.join(name)
    }

    #[test]
    fn missing_file_is_no_token() {
        let cache = TokenCache::new(scratch_path("absent"));
        assert_eq!(cache.load_token().expect("load"), None);
    }

    #[test]
    fn blank_file_is_no_token() {
        let path = scratch_path("blank");
        fs::write(&path, "  \n").expect("write");
        let cache = TokenCache::new(path);
        assert_eq!(cache.load_token().expect("load"), None);
    }

    #[test]
    fn store_overwrites_previous_token() {
        let cache = TokenCache::new(scratch_path("token"));
        cache.store_token("first-token-value").expect("store");
        cache.store_token("second").expect("store");

        let raw = fs::read(cache.path()).expect("read");
        assert_eq!(raw, b"second");
        assert_eq!(cache.load_token().expect("load").as_deref(), Some("second"));
    }

    #[cfg(unix)]
    #[test]
    fn stored_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let cache = TokenCache::new(scratch_path("mode"));
        cache.store_token("secret").expect("store");
        let mode = fs::metadata(cache.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
