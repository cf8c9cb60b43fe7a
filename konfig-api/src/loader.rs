//! Shared artifact loading
//!
//! A built artifact is decoded once per file identity and shared by every
//! caller that opens the same file, the way a dynamic loader shares a
//! library between `dlopen` calls. Identity is device, inode, size and
//! modification time where the platform exposes them, so hard links share
//! one loaded unit while a copy gets its own (with identical behavior).
//!
//! The registry mutex only guards the map and the reference counts. The
//! decode itself runs through a per-entry `OnceCell`, so concurrent openers
//! of one file wait for a single decode and openers of different files never
//! wait for each other.

use crate::config::RunConfig;
use crate::error::KonfigError;
use crate::exec::evaluate;
use crate::store;
use crate::types::{ExecProgramArgs, ExecProgramResult};
use konfig_config::Phase;
use konfig_core::{decode_artifact, Artifact, LoadError, PluginRegistry};
use konfig_log::{debug, trace, Logger};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// A decoded artifact shared between handles
#[derive(Debug)]
pub struct LoadedArtifact {
    path: String,
    artifact: Artifact,
}

impl LoadedArtifact {
    /// Path of the file this unit was first loaded from
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    fn files(&self) -> Option<&[String]> {
        self.artifact.debug_info.as_ref().map(|d| d.files.as_slice())
    }

    pub(crate) fn exec(
        &self,
        args: &ExecProgramArgs,
        config: &RunConfig,
        plugins: &PluginRegistry,
    ) -> Result<ExecProgramResult, KonfigError> {
        evaluate(&self.artifact.program, self.files(), args, config, plugins)
    }
}

/// Hard links share an identity; copies and rewritten files do not
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FileIdentity {
    #[cfg(unix)]
    Inode {
        dev: u64,
        ino: u64,
        size: u64,
        mtime_ns: i128,
    },
    #[cfg(not(unix))]
    Path(std::path::PathBuf),
}

fn identify(path: &Path) -> Result<FileIdentity, LoadError> {
    let display = path.display().to_string();
    let metadata = std::fs::metadata(path).map_err(|e| LoadError::io(display.clone(), &e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        Ok(FileIdentity::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
            size: metadata.size(),
            mtime_ns: metadata.mtime() as i128 * 1_000_000_000 + metadata.mtime_nsec() as i128,
        })
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
        path.canonicalize()
            .map(FileIdentity::Path)
            .map_err(|e| LoadError::io(display, &e))
    }
}

type UnitCell = Arc<OnceCell<Arc<LoadedArtifact>>>;

struct Slot {
    cell: UnitCell,
    refs: usize,
}

struct Registry {
    slots: Mutex<HashMap<FileIdentity, Slot>>,
    logger: Arc<Logger>,
}

impl Registry {
    fn retain(&self, key: &FileIdentity) -> UnitCell {
        let mut slots = self.slots.lock();
        let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
            cell: Arc::new(OnceCell::new()),
            refs: 0,
        });
        slot.refs += 1;
        Arc::clone(&slot.cell)
    }

    /// Drop one reference; the entry goes away with its last reference
    fn release(&self, key: &FileIdentity, cell: &UnitCell) {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        // the entry may have been cleared and recreated
        if !Arc::ptr_eq(&slot.cell, cell) {
            return;
        }
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs == 0 {
            slots.remove(key);
        }
    }

    fn refs(&self, key: &FileIdentity) -> usize {
        self.slots.lock().get(key).map_or(0, |slot| slot.refs)
    }
}

/// Registry of loaded artifacts
#[derive(Clone)]
pub struct ArtifactLoader {
    registry: Arc<Registry>,
}

impl Default for ArtifactLoader {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_LOADER: Lazy<ArtifactLoader> =
    Lazy::new(|| ArtifactLoader::with_logger(Arc::clone(&crate::config::config().logger)));

impl ArtifactLoader {
    pub fn new() -> Self {
        Self::with_logger(Logger::noop())
    }

    pub fn with_logger(logger: Arc<Logger>) -> Self {
        Self {
            registry: Arc::new(Registry {
                slots: Mutex::new(HashMap::new()),
                logger,
            }),
        }
    }

    /// Process-wide loader used by [`ArtifactHandle::open`] and the native client
    pub fn global() -> &'static ArtifactLoader {
        &GLOBAL_LOADER
    }

    /// Load the artifact at `path`, or share an already loaded one
    pub fn open(&self, path: impl AsRef<Path>) -> Result<ArtifactHandle, KonfigError> {
        let path = path.as_ref();
        let key = identify(path)?;
        let cell = self.registry.retain(&key);

        let loaded = cell.get_or_try_init(|| {
            let bytes = store::read(path)?;
            let artifact =
                decode_artifact(bytes).map_err(|e| e.with_path(path.display().to_string()))?;
            debug!(
                self.registry.logger,
                target: Phase::Loader.target(),
                "loaded artifact {} ({} packages)",
                path.display(),
                artifact.program.packages.len()
            );
            Ok::<_, LoadError>(Arc::new(LoadedArtifact {
                path: path.display().to_string(),
                artifact,
            }))
        });

        match loaded {
            Ok(unit) => {
                trace!(
                    self.registry.logger,
                    target: Phase::Loader.target(),
                    "opened {} (refs={})",
                    path.display(),
                    self.registry.refs(&key)
                );
                Ok(ArtifactHandle {
                    registry: Arc::clone(&self.registry),
                    unit: Arc::clone(unit),
                    key,
                    cell,
                    released: false,
                })
            }
            Err(e) => {
                self.registry.release(&key, &cell);
                Err(e.into())
            }
        }
    }

    /// Number of distinct files currently loaded
    pub fn loaded_count(&self) -> usize {
        self.registry.slots.lock().len()
    }

    /// Forget every entry. Open handles keep their loaded units.
    pub fn clear(&self) {
        self.registry.slots.lock().clear();
    }
}

/// A held, reference-counted load of an artifact
///
/// The loaded unit stays shared while any handle for the same file is open.
/// `close()` or dropping the handle releases it.
pub struct ArtifactHandle {
    registry: Arc<Registry>,
    unit: Arc<LoadedArtifact>,
    key: FileIdentity,
    cell: UnitCell,
    released: bool,
}

impl std::fmt::Debug for ArtifactHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactHandle")
            .field("path", &self.unit.path)
            .field("released", &self.released)
            .finish()
    }
}

impl ArtifactHandle {
    /// Open through the global loader
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KonfigError> {
        ArtifactLoader::global().open(path)
    }

    pub fn unit(&self) -> &Arc<LoadedArtifact> {
        &self.unit
    }

    pub fn artifact(&self) -> &Artifact {
        self.unit.artifact()
    }

    /// Open handles for this file, across all holders
    pub fn ref_count(&self) -> usize {
        self.registry.refs(&self.key)
    }

    /// Run the artifact with the global configuration and plugins
    pub fn exec(&self, args: &ExecProgramArgs) -> Result<ExecProgramResult, KonfigError> {
        self.unit
            .exec(args, crate::config::config(), konfig_core::runtime::global_plugins())
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release(&self.key, &self.cell);
        }
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        self.release();
    }
}
