//! Archive container abstraction
//!
//! The resolver never reads zip/jar structures itself. It works against the
//! [`Directory`] trait (a listable tree of named, independently openable
//! entries) and an [`ArchiveOpener`] that turns a copied archive file into
//! such a directory. The shipped opener unpacks tar containers into the
//! unit's working directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File extension for nested unit archives.
pub const UNIT_EXTENSION: &str = ".esa";

/// File extension for leaf module archives.
pub const MODULE_EXTENSION: &str = ".jar";

/// Relative path of the unit manifest inside an expanded archive.
pub const UNIT_MANIFEST_PATH: &str = "UNIT-INF/UNIT.MF";

/// Relative path of the optional deployment manifest.
pub const DEPLOYMENT_MANIFEST_PATH: &str = "UNIT-INF/DEPLOYMENT.MF";

/// A directory-style view over expanded archive contents.
pub trait Directory: Send + Sync {
    /// Names of the direct entries, in a stable order.
    fn list(&self) -> Result<Vec<String>>;

    /// Read a (possibly nested) entry in full. `Ok(None)` when absent.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Best-effort filesystem path for a direct entry, used as a module
    /// resource's addressable location when available.
    fn locate(&self, _name: &str) -> Option<PathBuf> {
        None
    }
}

/// Opens a copied archive file as a [`Directory`], using `scratch` for any
/// extraction it needs to perform.
pub trait ArchiveOpener: Send + Sync {
    fn open(&self, archive: &Path, scratch: &Path) -> Result<Box<dyn Directory>>;
}

/// A [`Directory`] over a real filesystem tree.
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new(root: impl Into<PathBuf>) -> FsDirectory {
        FsDirectory { root: root.into() }
    }
}

impl Directory for FsDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        // read_dir order is platform-dependent; sort for deterministic
        // resource discovery.
        names.sort();
        Ok(names)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(fs::read(full)?))
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let full = self.root.join(name);
        full.is_file().then_some(full)
    }
}

/// Opener for tar-container unit archives.
pub struct TarOpener;

impl ArchiveOpener for TarOpener {
    fn open(&self, archive: &Path, scratch: &Path) -> Result<Box<dyn Directory>> {
        let extracted = scratch.join("extracted");
        fs::create_dir(&extracted)?;
        let file = fs::File::open(archive)?;
        let mut tar = tar::Archive::new(file);
        tar.unpack(&extracted)?;
        Ok(Box::new(FsDirectory::new(extracted)))
    }
}
