//! Where class facts come from.
//!
//! A [`ClassSource`] answers "what does class X look like". The analysis
//! session only ever talks to this trait, so the same engine runs over a
//! classpath on disk or over facts registered in memory.

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::facts::ClassFacts;
use super::names::ClassName;
use super::reader::read_class_bytes;
use crate::error::MutcheckError;

/// Provider of class facts. Must be shareable across analysis threads.
pub trait ClassSource: Send + Sync {
    /// Facts for `name`, or `MutcheckError::ClassNotFound`.
    fn read_class(&self, name: &ClassName) -> Result<Arc<ClassFacts>, MutcheckError>;

    /// Every class this source can provide, sorted.
    fn list_classes(&self) -> Result<Vec<ClassName>, MutcheckError>;
}

enum ClasspathEntry {
    Directory(PathBuf),
    Jar {
        path: PathBuf,
        archive: Mutex<ZipArchive<File>>,
    },
}

/// Classes read from directories and jar files, searched in order.
///
/// Decoded classes are memoised; each class file is parsed at most once.
pub struct ClasspathSource {
    entries: Vec<ClasspathEntry>,
    cache: RwLock<HashMap<ClassName, Arc<ClassFacts>>>,
}

impl ClasspathSource {
    /// Open a classpath. Directories are used as-is; any other path is
    /// opened as a jar (zip) archive.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Result<Self, MutcheckError> {
        let mut entries = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                entries.push(ClasspathEntry::Directory(path.to_path_buf()));
                continue;
            }
            let file = File::open(path).map_err(|source| MutcheckError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let archive = ZipArchive::new(file).map_err(|err| MutcheckError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidData, err),
            })?;
            debug!(jar = %path.display(), entries = archive.len(), "opened jar");
            entries.push(ClasspathEntry::Jar {
                path: path.to_path_buf(),
                archive: Mutex::new(archive),
            });
        }
        Ok(Self {
            entries,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn read_bytes(&self, name: &ClassName) -> Result<Option<Vec<u8>>, MutcheckError> {
        let relative = format!("{}.class", name.internal_name());
        for entry in &self.entries {
            match entry {
                ClasspathEntry::Directory(dir) => {
                    let path = dir.join(&relative);
                    if path.is_file() {
                        trace!(path = %path.display(), "reading class file");
                        return fs::read(&path)
                            .map(Some)
                            .map_err(|source| MutcheckError::Io { path, source });
                    }
                }
                ClasspathEntry::Jar { path, archive } => {
                    let mut archive = archive.lock().map_err(|_| MutcheckError::Io {
                        path: path.clone(),
                        source: io::Error::new(io::ErrorKind::Other, "jar lock poisoned"),
                    })?;
                    let Ok(mut file) = archive.by_name(&relative) else {
                        continue;
                    };
                    let mut data = Vec::new();
                    file.read_to_end(&mut data)
                        .map_err(|source| MutcheckError::Io {
                            path: path.join(&relative),
                            source,
                        })?;
                    return Ok(Some(data));
                }
            }
        }
        Ok(None)
    }
}

impl ClassSource for ClasspathSource {
    fn read_class(&self, name: &ClassName) -> Result<Arc<ClassFacts>, MutcheckError> {
        if let Ok(cache) = self.cache.read() {
            if let Some(facts) = cache.get(name) {
                return Ok(Arc::clone(facts));
            }
        }

        let data = self
            .read_bytes(name)?
            .ok_or_else(|| MutcheckError::ClassNotFound(name.clone()))?;
        let facts = read_class_bytes(&data).map_err(|err| MutcheckError::MalformedClass {
            class: name.clone(),
            message: format!("{:#}", err),
        })?;
        let facts = Arc::new(facts);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name.clone(), Arc::clone(&facts));
        }
        Ok(facts)
    }

    fn list_classes(&self) -> Result<Vec<ClassName>, MutcheckError> {
        let mut names = BTreeSet::new();
        for entry in &self.entries {
            match entry {
                ClasspathEntry::Directory(dir) => {
                    for file in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
                        if !file.file_type().is_file() {
                            continue;
                        }
                        let Ok(relative) = file.path().strip_prefix(dir) else {
                            continue;
                        };
                        let relative = relative.to_string_lossy().replace('\\', "/");
                        if let Some(name) = class_name_for_entry(&relative) {
                            names.insert(name);
                        }
                    }
                }
                ClasspathEntry::Jar { path, archive } => {
                    let archive = archive.lock().map_err(|_| MutcheckError::Io {
                        path: path.clone(),
                        source: io::Error::new(io::ErrorKind::Other, "jar lock poisoned"),
                    })?;
                    names.extend(archive.file_names().filter_map(class_name_for_entry));
                }
            }
        }
        Ok(names.into_iter().collect())
    }
}

/// Map an archive or directory entry to a class name, skipping
/// non-class files and `module-info` / `package-info`.
fn class_name_for_entry(entry: &str) -> Option<ClassName> {
    let stem = entry.strip_suffix(".class")?;
    if stem.ends_with("module-info") || stem.ends_with("package-info") || stem.starts_with("META-INF/") {
        return None;
    }
    Some(ClassName::new(stem))
}

/// Classes registered directly as facts.
#[derive(Default)]
pub struct InMemorySource {
    classes: HashMap<ClassName, Arc<ClassFacts>>,
    reads: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class, replacing any previous facts under the same name.
    pub fn add(&mut self, facts: ClassFacts) {
        self.classes.insert(facts.name.clone(), Arc::new(facts));
    }

    pub fn with(mut self, facts: ClassFacts) -> Self {
        self.add(facts);
        self
    }

    /// Number of successful and failed `read_class` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FromIterator<ClassFacts> for InMemorySource {
    fn from_iter<I: IntoIterator<Item = ClassFacts>>(iter: I) -> Self {
        let mut source = Self::new();
        for facts in iter {
            source.add(facts);
        }
        source
    }
}

impl ClassSource for InMemorySource {
    fn read_class(&self, name: &ClassName) -> Result<Arc<ClassFacts>, MutcheckError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| MutcheckError::ClassNotFound(name.clone()))
    }

    fn list_classes(&self) -> Result<Vec<ClassName>, MutcheckError> {
        let mut names: Vec<_> = self.classes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
