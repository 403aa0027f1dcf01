//! Directory-backed segment store for persistent storage.

use crate::codec::{
    decode_segment_file, decode_segment_header, decode_segment_prefix, encode_segment_file,
    SEGMENT_PREFIX_SIZE,
};
use crate::error::{StorageError, StorageResult};
use crate::key::{AtomKey, KeyKind, RefKey, StreamId};
use crate::segment::{Segment, SegmentHeader};
use crate::store::SegmentStore;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

const SEGMENT_EXT: &str = "seg";
const REF_EXT: &str = "ref";
const REFS_DIR: &str = "refs";

/// A directory-backed segment store.
///
/// Every segment and every ref lives in its own file:
///
/// ```text
/// <root>/
/// ├─ append_data/<stream>/<encoded key>.seg
/// ├─ table_data/<stream>/<encoded key>.seg
/// └─ refs/
///    ├─ append_ref/<stream>.ref
///    └─ head_ref/<stream>.ref
/// ```
///
/// # Durability
///
/// Writes go to a uniquely named hidden temporary file in the destination
/// directory, which is synced and then renamed into place; the directory is
/// synced afterwards. A crash therefore leaves either the old file, the new
/// file, or a stray temporary file that listings ignore.
///
/// # Thread Safety
///
/// The store holds no in-process state beyond its root path. Any number of
/// threads or processes may write distinct keys concurrently.
///
/// # Example
///
/// ```no_run
/// use stagehand_storage::{FileStore, KeyKind, SegmentStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("staging")).unwrap();
/// let keys = store.list_keys(KeyKind::AppendData, None).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens or creates a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or is not a directory.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root)?;
        if !root.is_dir() {
            return Err(StorageError::unavailable(format!(
                "store root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_dir(&self, kind: KeyKind, stream_id: &StreamId) -> PathBuf {
        self.root.join(kind.dir_name()).join(stream_id.token())
    }

    fn segment_path(&self, key: &AtomKey) -> PathBuf {
        self.stream_dir(key.kind(), key.stream_id())
            .join(format!("{}.{SEGMENT_EXT}", key.encode()))
    }

    fn refs_dir(&self, kind: KeyKind) -> PathBuf {
        self.root.join(REFS_DIR).join(kind.dir_name())
    }

    fn ref_path(&self, ref_key: &RefKey) -> PathBuf {
        self.refs_dir(ref_key.kind())
            .join(format!("{}.{REF_EXT}", ref_key.stream_id().token()))
    }

    /// Writes `data` to `path` via a temporary file and an atomic rename.
    fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
        fs::create_dir_all(dir)?;

        let temp_path = dir.join(format!(".tmp-{}", Uuid::new_v4().simple()));
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, path)?;
            sync_directory(dir)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }

    fn read_file(path: &Path, missing: impl FnOnce() -> String) -> StorageResult<Vec<u8>> {
        match fs::read(path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StorageError::not_found(missing())),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn remove_file(path: &Path) -> StorageResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Returns the visible entries of `dir` carrying extension `ext`, as file stems.
    ///
    /// A missing directory is an empty listing.
    fn list_stems(dir: &Path, ext: &str) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::unavailable(format!(
                    "cannot list {}: {e}",
                    dir.display()
                )))
            }
        };

        let mut stems = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::unavailable(e.to_string()))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(stem) = name.strip_suffix(ext).and_then(|s| s.strip_suffix('.')) {
                stems.push(stem.to_string());
            }
        }
        Ok(stems)
    }

    fn stream_dirs(&self, kind: KeyKind) -> StorageResult<Vec<PathBuf>> {
        let kind_dir = self.root.join(kind.dir_name());
        let entries = match fs::read_dir(&kind_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::unavailable(e.to_string())),
        };

        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::unavailable(e.to_string()))?;
            if entry.path().is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}

impl SegmentStore for FileStore {
    fn put(&self, key: &AtomKey, segment: &Segment) -> StorageResult<()> {
        let data = encode_segment_file(segment)?;
        Self::write_atomic(&self.segment_path(key), &data)
            .map_err(|e| StorageError::write_failed(key.encode(), e.to_string()))
    }

    fn get(&self, key: &AtomKey) -> StorageResult<Segment> {
        let data = Self::read_file(&self.segment_path(key), || key.encode())?;
        decode_segment_file(&data)
    }

    fn read_header(&self, key: &AtomKey) -> StorageResult<SegmentHeader> {
        let mut file = match File::open(self.segment_path(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(key.encode()))
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut prefix = [0u8; SEGMENT_PREFIX_SIZE];
        file.read_exact(&mut prefix)
            .map_err(|_| StorageError::Corrupted(format!("segment {key} truncated")))?;
        let header_len = decode_segment_prefix(&prefix)?;

        let mut data = vec![0u8; SEGMENT_PREFIX_SIZE + header_len];
        data[..SEGMENT_PREFIX_SIZE].copy_from_slice(&prefix);
        file.read_exact(&mut data[SEGMENT_PREFIX_SIZE..])
            .map_err(|_| StorageError::Corrupted(format!("segment {key} header truncated")))?;
        decode_segment_header(&data)
    }

    fn visit_keys(
        &self,
        kind: KeyKind,
        stream_id: Option<&StreamId>,
        visitor: &mut dyn FnMut(AtomKey) -> ControlFlow<()>,
    ) -> StorageResult<()> {
        let dirs = match stream_id {
            Some(id) => vec![self.stream_dir(kind, id)],
            None => self.stream_dirs(kind)?,
        };

        for dir in dirs {
            for stem in Self::list_stems(&dir, SEGMENT_EXT)? {
                let key = match AtomKey::decode(&stem) {
                    Ok(key) if key.kind() == kind => key,
                    Ok(_) | Err(_) => {
                        warn!(entry = %stem, dir = %dir.display(), "skipping unrecognised segment file");
                        continue;
                    }
                };
                if visitor(key).is_break() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn contains(&self, key: &AtomKey) -> StorageResult<bool> {
        Ok(self.segment_path(key).is_file())
    }

    fn delete(&self, key: &AtomKey) -> StorageResult<()> {
        Self::remove_file(&self.segment_path(key))
    }

    fn write_ref(&self, ref_key: &RefKey, record: &[u8]) -> StorageResult<()> {
        Self::write_atomic(&self.ref_path(ref_key), record)
            .map_err(|e| StorageError::write_failed(ref_key.encode(), e.to_string()))
    }

    fn read_ref(&self, ref_key: &RefKey) -> StorageResult<Vec<u8>> {
        Self::read_file(&self.ref_path(ref_key), || ref_key.encode())
    }

    fn delete_ref(&self, ref_key: &RefKey) -> StorageResult<()> {
        Self::remove_file(&self.ref_path(ref_key))
    }

    fn list_refs(&self, kind: KeyKind) -> StorageResult<Vec<StreamId>> {
        let mut streams = Vec::new();
        for stem in Self::list_stems(&self.refs_dir(kind), REF_EXT)? {
            match StreamId::from_token(&stem) {
                Ok(id) => streams.push(id),
                Err(_) => warn!(entry = %stem, %kind, "skipping unrecognised ref file"),
            }
        }
        Ok(streams)
    }
}

/// Syncs a directory so that renames and creations inside it are durable.
#[cfg(unix)]
fn sync_directory(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_directory(_dir: &Path) -> io::Result<()> {
    // NTFS journals metadata updates; directories cannot be opened for sync.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::AtomKeyBuilder;
    use crate::segment::{Column, ColumnData, SegmentIndex};
    use tempfile::TempDir;

    fn segment(ts: Vec<i64>) -> Segment {
        let n = ts.len();
        Segment::new(
            SegmentIndex::Timestamp(ts),
            vec![Column::new("qty", ColumnData::Int64(vec![7; n]))],
        )
    }

    fn staged_key(stream: impl Into<StreamId>, start: i64) -> AtomKey {
        AtomKeyBuilder::new()
            .index_range(start, start + 10)
            .build(stream, KeyKind::AppendData)
    }

    #[test]
    fn file_put_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = staged_key("fx/eurusd", 0);
        let seg = segment(vec![0, 5, 9]);

        store.put(&key, &seg).unwrap();
        assert_eq!(store.get(&key).unwrap(), seg);
        assert_eq!(store.read_header(&key).unwrap(), seg.header());
        assert!(store.contains(&key).unwrap());
    }

    #[test]
    fn file_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = staged_key("a", 0);

        assert!(store.get(&key).unwrap_err().is_not_found());
        assert!(store.read_header(&key).unwrap_err().is_not_found());
    }

    #[test]
    fn file_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let key = staged_key(7u64, 0);
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.put(&key, &segment(vec![1])).unwrap();
            store
                .write_ref(&RefKey::new(KeyKind::HeadRef, 7u64), b"head")
                .unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.list_keys(KeyKind::AppendData, None).unwrap(), vec![key]);
        assert_eq!(
            store.read_ref(&RefKey::new(KeyKind::HeadRef, 7u64)).unwrap(),
            b"head"
        );
        assert_eq!(store.list_refs(KeyKind::HeadRef).unwrap(), vec![StreamId::Num(7)]);
    }

    #[test]
    fn file_listing_ignores_temp_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = staged_key("a", 0);
        store.put(&key, &segment(vec![1])).unwrap();

        let stream_dir = store.stream_dir(KeyKind::AppendData, &StreamId::from("a"));
        fs::write(stream_dir.join(".tmp-deadbeef"), b"partial").unwrap();
        fs::write(stream_dir.join("notes.txt"), b"hello").unwrap();
        fs::write(stream_dir.join("garbage.seg"), b"x").unwrap();

        assert_eq!(store.list_keys(KeyKind::AppendData, None).unwrap(), vec![key]);
    }

    #[test]
    fn file_listing_scoped_to_stream() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.put(&staged_key("a", 0), &segment(vec![1])).unwrap();
        store.put(&staged_key("b", 0), &segment(vec![1])).unwrap();

        let a = StreamId::from("a");
        assert_eq!(store.list_keys(KeyKind::AppendData, Some(&a)).unwrap().len(), 1);
        assert_eq!(store.list_keys(KeyKind::AppendData, None).unwrap().len(), 2);
        assert!(store.list_keys(KeyKind::TableData, None).unwrap().is_empty());
    }

    #[test]
    fn file_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = staged_key("a", 0);
        store.put(&key, &segment(vec![1])).unwrap();

        store.delete(&key).unwrap();
        store.delete(&key).unwrap();
        assert!(store.list_keys(KeyKind::AppendData, None).unwrap().is_empty());

        let r = RefKey::new(KeyKind::AppendRef, "a");
        store.delete_ref(&r).unwrap();
    }

    #[test]
    fn file_ref_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let r = RefKey::new(KeyKind::AppendRef, "a");

        store.write_ref(&r, b"first").unwrap();
        store.write_ref(&r, b"second").unwrap();
        assert_eq!(store.read_ref(&r).unwrap(), b"second");
    }

    #[test]
    fn file_corrupted_segment_detected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let key = staged_key("a", 0);
        store.put(&key, &segment(vec![1, 2, 3])).unwrap();

        let path = store.segment_path(&key);
        let mut data = fs::read(&path).unwrap();
        let i = data.len() - 6;
        data[i] ^= 0xFF;
        fs::write(&path, data).unwrap();

        assert!(matches!(store.get(&key), Err(StorageError::Corrupted(_))));
    }
}
