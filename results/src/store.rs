//! Content-addressed object store contract, plus an in-memory implementation.
//!
//! Results are laid out one JSON file per test, mirroring the test suite's
//! directory structure. Every object is identified by the SHA-256 of its
//! content, so identical files and identical directories collapse to one
//! object no matter how many runs contain them.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::{ObjectId, RunId};

/// Kind of a tree entry as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A directory.
    Tree,
    /// A result file.
    Blob,
    /// Anything else (symlink, submodule, ...). Fatal when loaded.
    Other(String),
}

impl EntryKind {
    fn tag(&self) -> &str {
        match self {
            EntryKind::Tree => "40000",
            EntryKind::Blob => "100644",
            EntryKind::Other(kind) => kind,
        }
    }
}

/// One named entry of a stored tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Raw entry name (still percent-escaped for blobs).
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Id of the referenced object.
    pub id: ObjectId,
}

/// A raw stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    /// Directory listing, sorted by name.
    Tree(Vec<TreeEntry>),
    /// File content.
    Blob(Vec<u8>),
}

/// Read access to a content-addressed results store.
pub trait ObjectStore {
    /// Reads the object with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectNotFound`] if the store has no such object.
    fn read(&self, id: &ObjectId) -> Result<Cow<'_, Object>>;

    /// Returns the root tree id of a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRun`] if the run is not in the store.
    fn run_root(&self, run_id: RunId) -> Result<ObjectId>;

    /// Ids of all runs present in the store.
    fn run_ids(&self) -> BTreeSet<RunId>;
}

/// Hashes a blob payload.
#[must_use]
pub fn blob_id(content: &[u8]) -> ObjectId {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    ObjectId::from_bytes(hasher.finalize().into())
}

/// Hashes a tree listing. Entries must already be sorted by name.
#[must_use]
pub fn tree_id(entries: &[TreeEntry]) -> ObjectId {
    let mut body = Vec::new();
    for entry in entries {
        body.extend_from_slice(entry.kind.tag().as_bytes());
        body.push(b' ');
        body.extend_from_slice(entry.name.as_bytes());
        body.push(0);
        body.extend_from_slice(entry.id.as_bytes());
    }
    let mut hasher = Sha256::new();
    hasher.update(format!("tree {}\0", body.len()).as_bytes());
    hasher.update(&body);
    ObjectId::from_bytes(hasher.finalize().into())
}

/// In-memory object store.
///
/// Objects are deduplicated on insert: inserting the same content twice
/// returns the same id and stores one copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<ObjectId, Object>,
    runs: BTreeMap<RunId, ObjectId>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a blob and returns its id.
    pub fn insert_blob(&mut self, content: Vec<u8>) -> ObjectId {
        let id = blob_id(&content);
        self.objects.entry(id).or_insert(Object::Blob(content));
        id
    }

    /// Stores a tree listing and returns its id. Entries are sorted by name.
    pub fn insert_tree(&mut self, mut entries: Vec<TreeEntry>) -> ObjectId {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        let id = tree_id(&entries);
        self.objects.entry(id).or_insert(Object::Tree(entries));
        id
    }

    /// Points a run at its root tree.
    pub fn set_run_root(&mut self, run_id: RunId, root: ObjectId) {
        self.runs.insert(run_id, root);
    }

    /// Number of distinct objects stored.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Imports a directory of per-test result files as the tree of a run.
    ///
    /// Directories become trees, regular files become blobs, and symlinks are
    /// recorded as `symlink` entries (rejected later by the loader).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be read, or
    /// [`Error::UnexpectedFileName`] for a non-UTF-8 file name.
    pub fn import_run_dir(&mut self, run_id: RunId, dir: &Path) -> Result<ObjectId> {
        let root = self.import_dir(dir)?;
        debug!(run_id, root = %root, objects = self.objects.len(), "imported run directory");
        self.set_run_root(run_id, root);
        Ok(root)
    }

    fn import_dir(&mut self, dir: &Path) -> Result<ObjectId> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| walk_error(dir, e))?;
            let path = entry.path();
            let name = entry
                .file_name()
                .to_str()
                .ok_or_else(|| Error::UnexpectedFileName {
                    name: entry.file_name().to_string_lossy().into_owned(),
                })?
                .to_string();
            let file_type = entry.file_type();
            let (kind, id) = if file_type.is_dir() {
                (EntryKind::Tree, self.import_dir(path)?)
            } else if file_type.is_file() {
                let content = std::fs::read(path).map_err(|source| Error::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                (EntryKind::Blob, self.insert_blob(content))
            } else {
                let target = std::fs::read_link(path).map_err(|source| Error::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let id = self.insert_blob(target.to_string_lossy().into_owned().into_bytes());
                (EntryKind::Other("symlink".to_string()), id)
            };
            entries.push(TreeEntry { name, kind, id });
        }
        Ok(self.insert_tree(entries))
    }
}

fn walk_error(dir: &Path, e: walkdir::Error) -> Error {
    let path = e.path().unwrap_or(dir).to_path_buf();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    Error::Io { path, source }
}

impl ObjectStore for MemoryStore {
    fn read(&self, id: &ObjectId) -> Result<Cow<'_, Object>> {
        self.objects
            .get(id)
            .map(Cow::Borrowed)
            .ok_or(Error::ObjectNotFound { id: *id })
    }

    fn run_root(&self, run_id: RunId) -> Result<ObjectId> {
        self.runs
            .get(&run_id)
            .copied()
            .ok_or(Error::UnknownRun { run_id })
    }

    fn run_ids(&self) -> BTreeSet<RunId> {
        self.runs.keys().copied().collect()
    }
}
