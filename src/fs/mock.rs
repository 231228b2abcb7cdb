// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { contents: Vec<u8>, modified: SystemTime },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock in seconds since the epoch; every write advances it so
    /// timestamps are strictly ordered.
    clock: u64,
}

/// In-memory filesystem with a deterministic clock.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Ensure root exists
        entries.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(MockState { entries, clock: 0 })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of the logical clock.
    pub fn now(&self) -> SystemTime {
        time_at(self.state().clock)
    }

    /// Create or overwrite a file, stamping it with the next clock tick.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mut state = self.state();
        state.clock += 1;
        let modified = time_at(state.clock);
        insert_entry(
            &mut state.entries,
            &path,
            MockEntry::File {
                contents: content.into(),
                modified,
            },
        );
    }

    /// Bump a file's modification time to the next clock tick, creating an
    /// empty file if it does not exist.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let path = &normalize(path.as_ref());
        let mut guard = self.state();
        let state = &mut *guard;
        state.clock += 1;
        let now = time_at(state.clock);
        if let Some(entry) = state.entries.get_mut(path) {
            if let MockEntry::File { modified, .. } = entry {
                *modified = now;
            }
            return;
        }
        insert_entry(
            &mut state.entries,
            path,
            MockEntry::File {
                contents: Vec::new(),
                modified: now,
            },
        );
    }

    /// Set a file's modification time explicitly.
    pub fn set_modified(&self, path: impl AsRef<Path>, time: SystemTime) {
        if let Some(MockEntry::File { modified, .. }) = self.state().entries.get_mut(&normalize(path.as_ref())) {
            *modified = time;
        }
    }

    /// Remove a file or directory entry (children are not removed).
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = &normalize(path.as_ref());
        let mut state = self.state();
        if state.entries.remove(path).is_some() {
            detach_from_parent(&mut state.entries, path);
        }
    }
}

/// `./src/A.java` and `src/A.java` name the same entry.
fn normalize(path: &Path) -> PathBuf {
    let stripped: PathBuf = path
        .components()
        .skip_while(|c| matches!(c, Component::CurDir))
        .collect();
    if stripped.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        stripped
    }
}

fn time_at(clock: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_000_000 + clock)
}

fn parent_of(path: &Path) -> Option<&Path> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        if path == Path::new(".") {
            None
        } else {
            Some(Path::new("."))
        }
    } else {
        Some(parent)
    }
}

fn child_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(|n| n.to_string())
}

fn insert_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path, entry: MockEntry) {
    entries.insert(path.to_path_buf(), entry);
    attach_to_parent(entries, path);
}

fn attach_to_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let Some(parent) = parent_of(path) else {
        return;
    };
    if parent == path {
        return;
    }
    if !entries.contains_key(parent) {
        entries.insert(parent.to_path_buf(), MockEntry::Dir(Vec::new()));
        attach_to_parent(entries, parent);
    }
    if let (Some(MockEntry::Dir(children)), Some(name)) = (entries.get_mut(parent), child_name(path)) {
        if !children.contains(&name) {
            children.push(name);
        }
    }
}

fn detach_from_parent(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    let Some(parent) = parent_of(path) else {
        return;
    };
    if let (Some(MockEntry::Dir(children)), Some(name)) = (entries.get_mut(parent), child_name(path)) {
        children.retain(|c| *c != name);
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.state().entries.get(&normalize(path)) {
            Some(MockEntry::File { contents, .. }) => Ok(contents.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let (from, to) = (&normalize(from), &normalize(to));
        let mut state = self.state();
        let entry = state
            .entries
            .remove(from)
            .ok_or_else(|| anyhow!("File not found: {:?}", from))?;
        detach_from_parent(&mut state.entries, from);
        insert_entry(&mut state.entries, to, entry);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = &normalize(path);
        let mut state = self.state();
        match state.entries.remove(path) {
            Some(MockEntry::File { .. }) => {
                detach_from_parent(&mut state.entries, path);
                Ok(())
            }
            Some(dir @ MockEntry::Dir(_)) => {
                state.entries.insert(path.to_path_buf(), dir);
                Err(anyhow!("Is a directory: {:?}", path))
            }
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().entries.contains_key(&normalize(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.state().entries.get(&normalize(path)), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.state().entries.get(&normalize(path)), Some(MockEntry::Dir(_)))
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        match self.state().entries.get(&normalize(path)) {
            Some(MockEntry::File { modified, .. }) => Some(*modified),
            Some(MockEntry::Dir(_)) => Some(UNIX_EPOCH),
            None => None,
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        match self.state().entries.get(&normalize(path)) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
