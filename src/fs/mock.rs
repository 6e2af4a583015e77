// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File,
    Dir(Vec<OsString>), // List of child names
}

/// In-memory filesystem for driving the scheduler without touching disk.
///
/// Clones share the same tree, so a test can keep a handle while the
/// scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    /// Mutations under these prefixes fail, to simulate permission errors.
    read_only: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            read_only: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.files.lock().unwrap();
        if let Some(parent) = path.parent() {
            Self::ensure_dir_entry(&mut files, parent);
        }
        files.insert(path.clone(), MockEntry::File);
        Self::link_to_parent(&mut files, &path);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.files.lock().unwrap();
        Self::ensure_dir_entry(&mut files, path.as_ref());
    }

    /// Remove a file or a whole directory subtree.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = self.files.lock().unwrap();
        files.retain(|p, _| !p.starts_with(path));
        Self::unlink_from_parent(&mut files, path);
    }

    /// Make every mutation at or below `prefix` fail.
    pub fn set_read_only(&self, prefix: impl AsRef<Path>) {
        self.read_only
            .lock()
            .unwrap()
            .push(prefix.as_ref().to_path_buf());
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        let read_only = self.read_only.lock().unwrap();
        if read_only.iter().any(|p| path.starts_with(p)) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        Ok(())
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            Self::ensure_dir_entry(files, parent);
            Self::link_to_parent(files, path);
        }
    }

    fn link_to_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if !children.iter().any(|c| c.as_os_str() == name) {
                children.push(name.to_os_string());
            }
        }
    }

    fn unlink_from_parent(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            children.retain(|c| c.as_os_str() != name);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(path), Some(MockEntry::File))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        matches!(files.get(path), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // In mock, we just return the path as is, assuming absolute paths are used in tests
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn touch(&self, path: &Path) -> Result<()> {
        self.check_writable(path)?;
        let parent_is_dir = path.parent().is_some_and(|p| self.is_dir(p));
        if !parent_is_dir {
            return Err(anyhow!("Parent directory missing: {:?}", path));
        }
        if self.is_dir(path) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        self.add_file(path);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.check_writable(path)?;
        if !self.is_file(path) {
            return Err(anyhow!("File not found: {:?}", path));
        }
        self.remove(path);
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check_writable(path)?;
        if self.is_file(path) {
            return Err(anyhow!("File exists: {:?}", path));
        }
        self.add_dir(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_list_children_in_insertion_order() {
        let fs = MockFileSystem::new();
        fs.add_dir("/watch/runB");
        fs.add_file("/watch/runA/READY");
        fs.add_file("/watch/notes.txt");

        let entries = fs.read_dir(Path::new("/watch")).unwrap();
        assert_eq!(
            entries,
            vec![
                PathBuf::from("/watch/runB"),
                PathBuf::from("/watch/runA"),
                PathBuf::from("/watch/notes.txt"),
            ]
        );
        assert!(fs.is_dir(Path::new("/watch/runA")));
    }

    #[test]
    fn removing_a_directory_drops_its_subtree() {
        let fs = MockFileSystem::new();
        fs.add_file("/watch/runA/.processing");

        fs.remove("/watch");

        assert!(!fs.exists(Path::new("/watch/runA/.processing")));
        assert!(fs.read_dir(Path::new("/watch")).is_err());
        assert!(fs.read_dir(Path::new("/")).unwrap().is_empty());
    }

    #[test]
    fn read_only_prefix_rejects_mutations() {
        let fs = MockFileSystem::new();
        fs.add_dir("/out");
        fs.set_read_only("/out");

        assert!(fs.create_dir_all(Path::new("/out/runA")).is_err());
        assert!(fs.touch(Path::new("/out/file")).is_err());
        assert!(!fs.exists(Path::new("/out/runA")));
    }
}
