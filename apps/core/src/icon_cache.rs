use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::shortcut_file::ShortcutEntry;

const CACHE_EXTENSION: &str = "icon";
const IMAGE_EXTENSIONS: [&str; 5] = ["ico", "png", "svg", "xpm", "bmp"];

/// Produces icon image bytes for a source path or icon name.
pub trait IconExtractor: Send + Sync + 'static {
    fn extract(&self, source: &str) -> Option<Vec<u8>>;
}

/// Reads sources that are already image files, and resolves bare icon names
/// against the given theme directories.
#[derive(Debug, Clone)]
pub struct FileIconExtractor {
    theme_dirs: Vec<PathBuf>,
}

impl Default for FileIconExtractor {
    fn default() -> Self {
        Self {
            theme_dirs: vec![
                PathBuf::from("/usr/share/icons/hicolor/256x256/apps"),
                PathBuf::from("/usr/share/icons/hicolor/48x48/apps"),
                PathBuf::from("/usr/share/icons/hicolor/scalable/apps"),
                PathBuf::from("/usr/share/pixmaps"),
            ],
        }
    }
}

impl FileIconExtractor {
    pub fn with_theme_dirs(theme_dirs: Vec<PathBuf>) -> Self {
        Self { theme_dirs }
    }

    fn named_icon(&self, name: &str) -> Option<PathBuf> {
        self.theme_dirs.iter().find_map(|dir| {
            IMAGE_EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{name}.{ext}")))
                .find(|candidate| candidate.is_file())
        })
    }
}

impl IconExtractor for FileIconExtractor {
    fn extract(&self, source: &str) -> Option<Vec<u8>> {
        let location = strip_icon_index(source.trim());
        if location.is_empty() {
            return None;
        }

        let is_bare_name = !location.contains(['/', '\\']) && !location.contains('.');
        let path = if is_bare_name {
            self.named_icon(location)?
        } else {
            let path = PathBuf::from(location);
            if !has_image_extension(&path) {
                return None;
            }
            path
        };
        std::fs::read(path).ok().filter(|bytes| !bytes.is_empty())
    }
}

/// `C:\app.exe,0` style locators carry a resource index after the comma.
fn strip_icon_index(locator: &str) -> &str {
    match locator.rsplit_once(',') {
        Some((path, index)) if index.trim().parse::<i32>().is_ok() => path.trim(),
        _ => locator,
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

/// On-disk icon images keyed by a hash of the shortcut's own path.
#[derive(Clone)]
pub struct IconCache {
    dir: PathBuf,
    extractor: Arc<dyn IconExtractor>,
}

impl std::fmt::Debug for IconCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconCache").field("dir", &self.dir).finish_non_exhaustive()
    }
}

impl IconCache {
    pub fn new(dir: impl Into<PathBuf>, extractor: Arc<dyn IconExtractor>) -> Self {
        Self {
            dir: dir.into(),
            extractor,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_path_for(&self, shortcut_path: &Path) -> PathBuf {
        let identity = shortcut_path.to_string_lossy().to_lowercase();
        let digest = Sha256::digest(identity.as_bytes());
        self.dir
            .join(format!("{}.{CACHE_EXTENSION}", hex::encode(digest)))
    }

    /// Returns a cached icon for `entry`, extracting it when the cache is
    /// missing or older than the shortcut. A missing icon is not an error.
    pub fn ensure(&self, entry: &ShortcutEntry) -> Option<PathBuf> {
        let cache_path = self.cache_path_for(&entry.shortcut_path);
        if is_fresh(&cache_path, &entry.shortcut_path) {
            return Some(cache_path);
        }

        let shortcut_path = entry.shortcut_path.to_string_lossy();
        let sources = entry
            .icon_locator
            .iter()
            .map(String::as_str)
            .chain([entry.target_path.as_str(), shortcut_path.as_ref()]);
        let Some(bytes) = sources
            .filter(|source| !source.trim().is_empty())
            .find_map(|source| self.extractor.extract(source))
        else {
            debug!(shortcut = %entry.shortcut_path.display(), "no icon source");
            return None;
        };

        match self.write_atomically(&cache_path, &bytes) {
            Ok(()) => Some(cache_path),
            Err(error) => {
                debug!(shortcut = %entry.shortcut_path.display(), %error, "icon cache write failed");
                None
            }
        }
    }

    fn write_atomically(&self, cache_path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut staged = tempfile::NamedTempFile::new_in(&self.dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged.persist(cache_path).map_err(|error| error.error)?;
        Ok(())
    }
}

fn is_fresh(cache_path: &Path, shortcut_path: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(cache_path), modified(shortcut_path)) {
        (Some(cached), Some(source)) => cached >= source,
        _ => false,
    }
}
