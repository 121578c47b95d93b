//! Resolution of resources a model references by relative path.
//!
//! Self-contained payloads never touch this module. When a glTF document
//! points at sibling files, the loader registers a temporary object URL for
//! the model's resolver and resolves every reference through it. The URL is
//! revoked when the [`ObjectUrl`] guard drops, on success and failure alike.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Debug;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Source of files referenced by a model (buffers, textures).
pub trait ResourceResolver: Debug + Send + Sync {
    /// Fetch the bytes behind a relative reference such as `textures/wood.png`.
    fn resolve(&self, uri: &str) -> io::Result<Vec<u8>>;
}

/// Resolves references against a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ResourceResolver for DirectoryResolver {
    fn resolve(&self, uri: &str) -> io::Result<Vec<u8>> {
        let relative = PathBuf::from(percent_decode(uri));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("reference leaves the model directory: {}", uri),
            ));
        }
        std::fs::read(self.root.join(relative))
    }
}

/// Resolves references against an in-memory set of files.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }
}

impl ResourceResolver for MemoryResolver {
    fn resolve(&self, uri: &str) -> io::Result<Vec<u8>> {
        let decoded = percent_decode(uri);
        let key = decoded.trim_start_matches("./");
        self.files
            .get(key)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no resource named {}", uri)))
    }
}

/// Registry of live temporary object URLs.
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    next: Cell<u64>,
    live: RefCell<HashMap<String, Arc<dyn ResourceResolver>>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under a fresh URL. The URL lives as long as the guard.
    pub fn create(&self, resolver: Arc<dyn ResourceResolver>) -> ObjectUrl<'_> {
        let id = self.next.get() + 1;
        self.next.set(id);
        let url = format!("blob:model-snapshot/{}", id);
        self.live.borrow_mut().insert(url.clone(), resolver);
        tracing::debug!("Created object URL {}", url);
        ObjectUrl { registry: self, url }
    }

    /// Fetch a reference relative to a live URL.
    pub fn fetch(&self, url: &str, uri: &str) -> io::Result<Vec<u8>> {
        let resolver = self.live.borrow().get(url).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("object URL revoked: {}", url))
        })?;
        resolver.resolve(uri)
    }

    /// Number of URLs not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    fn revoke(&self, url: &str) {
        if self.live.borrow_mut().remove(url).is_some() {
            tracing::debug!("Revoked object URL {}", url);
        }
    }
}

/// A temporary object URL, revoked on drop.
#[derive(Debug)]
pub struct ObjectUrl<'a> {
    registry: &'a ObjectUrlRegistry,
    url: String,
}

impl ObjectUrl<'_> {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn fetch(&self, uri: &str) -> io::Result<Vec<u8>> {
        self.registry.fetch(&self.url, uri)
    }
}

impl Drop for ObjectUrl<'_> {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

/// Decode `%XX` escapes in a URI reference.
fn percent_decode(uri: &str) -> String {
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
