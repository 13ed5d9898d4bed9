//! On-disk configuration and session store
//!
//! All documents are JSON files in a single directory. Session documents are
//! rewritten under an exclusive lock file and replaced by atomic rename, so a
//! concurrent reader sees either the old or the new document, never a torn
//! one.

use crate::types::{
    BrowserCookie, Credentials, PortalLayout, ProjectId, RequestTemplate, SessionCookieSet,
};
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SESSION_COOKIES_FILE: &str = "cookies_for_request.json";
pub const BROWSER_SNAPSHOTS_FILE: &str = "cookies_for_webdriver.json";
pub const ACCOUNTS_FILE: &str = "mno_account.json";
pub const PORTAL_LAYOUT_FILE: &str = "url_and_element.json";
pub const REQUEST_TEMPLATES_FILE: &str = "http_request_parameter.json";

type SessionCookieDoc = BTreeMap<ProjectId, SessionCookieSet>;
type BrowserSnapshotDoc = BTreeMap<ProjectId, Vec<BrowserCookie>>;

/// Typed handle on one JSON document.
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing or blank file yields `None`; malformed
    /// JSON is an error.
    pub fn load(&self) -> Result<Option<T>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Replace the document atomically: write a sibling temp file, sync it,
    /// then rename it over the target.
    pub fn save(&self, data: &T) -> Result<()> {
        let parent = self.parent_dir()?;
        fs::create_dir_all(&parent)?;

        let content = serde_json::to_string_pretty(data)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Load-modify-write under an exclusive lock.
    ///
    /// A missing, blank or unparseable document starts from `default`.
    pub fn update<F>(&self, default: T, f: F) -> Result<()>
    where
        F: FnOnce(&mut T),
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut data = match self.load() {
            Ok(Some(data)) => data,
            Ok(None) => default,
            Err(Error::Serialization(e)) => {
                warn!("{} is not valid JSON ({}), rewriting it", self.path.display(), e);
                default
            }
            Err(e) => return Err(e),
        };
        f(&mut data);
        self.save(&data)
    }

    fn parent_dir(&self) -> Result<PathBuf> {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => Ok(p.to_path_buf()),
            Some(_) => Ok(PathBuf::from(".")),
            None => Err(Error::InvalidConfig(format!(
                "{} has no parent directory",
                self.path.display()
            ))),
        }
    }
}

/// Exclusive advisory lock held on `<file>.lock` until dropped.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock_path = PathBuf::from(lock_name);

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        fs2::FileExt::lock_exclusive(&file)
            .map_err(|e| Error::StoreLock(format!("{}: {}", lock_path.display(), e)))?;

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

/// The configuration directory and the documents in it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
    session_cookies: JsonDocument<SessionCookieDoc>,
    browser_snapshots: JsonDocument<BrowserSnapshotDoc>,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            session_cookies: JsonDocument::new(dir.join(SESSION_COOKIES_FILE)),
            browser_snapshots: JsonDocument::new(dir.join(BROWSER_SNAPSHOTS_FILE)),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // Session cookies

    /// Cached cookie set for `project`, if the store has one.
    pub fn load_session_cookies(&self, project: &str) -> Result<Option<SessionCookieSet>> {
        let doc = self.session_cookies.load()?;
        Ok(doc.and_then(|mut all| all.remove(project)))
    }

    /// Replace the cookie set of `project`, leaving other projects untouched.
    pub fn save_session_cookies(&self, project: &str, cookies: &SessionCookieSet) -> Result<()> {
        if cookies.is_empty() {
            return Err(Error::Internal(format!(
                "refusing to persist an empty cookie set for {}",
                project
            )));
        }
        self.session_cookies.update(SessionCookieDoc::new(), |all| {
            all.insert(project.to_string(), cookies.clone());
        })?;
        info!("Persisted {} session cookies for {}", cookies.len(), project);
        Ok(())
    }

    /// Projects that have a cached cookie set.
    pub fn session_projects(&self) -> Result<Vec<ProjectId>> {
        Ok(self
            .session_cookies
            .load()?
            .map(|all| all.into_keys().collect())
            .unwrap_or_default())
    }

    // Browser snapshots

    pub fn load_browser_snapshot(&self, project: &str) -> Result<Option<Vec<BrowserCookie>>> {
        let doc = self.browser_snapshots.load()?;
        Ok(doc.and_then(|mut all| all.remove(project)))
    }

    pub fn save_browser_snapshot(&self, project: &str, cookies: &[BrowserCookie]) -> Result<()> {
        self.browser_snapshots.update(BrowserSnapshotDoc::new(), |all| {
            all.insert(project.to_string(), cookies.to_vec());
        })?;
        debug!("Persisted browser snapshot ({} cookies) for {}", cookies.len(), project);
        Ok(())
    }

    // Read-only documents. Re-read on every call so edits apply without a restart.

    pub fn credentials(&self, project: &str) -> Result<Credentials> {
        let mut accounts: BTreeMap<ProjectId, Credentials> = self.read_required(ACCOUNTS_FILE)?;
        accounts
            .remove(project)
            .ok_or_else(|| Error::UnknownProject(project.to_string()))
    }

    pub fn portal_layout(&self) -> Result<PortalLayout> {
        self.read_required(PORTAL_LAYOUT_FILE)
    }

    pub fn request_template(&self, name: &str) -> Result<RequestTemplate> {
        let mut templates: BTreeMap<String, RequestTemplate> =
            self.read_required(REQUEST_TEMPLATES_FILE)?;
        templates
            .remove(name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }

    fn read_required<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        let path = self.dir.join(file);
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
    }
}
