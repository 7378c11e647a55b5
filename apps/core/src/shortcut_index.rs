use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::{Config, ShortcutRoot};
use crate::icon_cache::{FileIconExtractor, IconCache};
use crate::shortcut_file::{FileShortcutReader, ShortcutEntry, ShortcutReader};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to start shortcut worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("shortcut worker stopped")]
    WorkerStopped,
}

struct ScanJob {
    roots: Vec<ShortcutRoot>,
    reply: oneshot::Sender<Vec<ShortcutEntry>>,
}

/// Owns the one thread that talks to shortcut files and icon extraction.
struct ShortcutWorker {
    jobs: mpsc::Sender<ScanJob>,
}

impl ShortcutWorker {
    fn spawn(reader: Box<dyn ShortcutReader>, icons: Option<IconCache>) -> Result<Self, IndexError> {
        let (jobs, inbox) = mpsc::channel::<ScanJob>();
        std::thread::Builder::new()
            .name("shortcut-worker".to_string())
            .spawn(move || {
                // Ends once the owning index drops its sender.
                for job in inbox {
                    let entries = scan_roots(reader.as_ref(), icons.as_ref(), &job.roots);
                    let _ = job.reply.send(entries);
                }
            })?;
        Ok(Self { jobs })
    }

    async fn scan(&self, roots: Vec<ShortcutRoot>) -> Result<Vec<ShortcutEntry>, IndexError> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(ScanJob { roots, reply })
            .map_err(|_| IndexError::WorkerStopped)?;
        response.await.map_err(|_| IndexError::WorkerStopped)
    }
}

#[derive(Default)]
struct IndexState {
    loaded_at: Option<Instant>,
    generation: u64,
    entries: Arc<Vec<ShortcutEntry>>,
}

/// Time-bounded index of installed-application shortcuts.
pub struct ShortcutIndex {
    roots: Vec<ShortcutRoot>,
    ttl: Duration,
    worker: ShortcutWorker,
    state: RwLock<IndexState>,
    refresh_gate: Mutex<()>,
    scans: AtomicUsize,
}

impl std::fmt::Debug for ShortcutIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcutIndex")
            .field("roots", &self.roots)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl ShortcutIndex {
    pub fn new(
        roots: Vec<ShortcutRoot>,
        ttl: Duration,
        reader: impl ShortcutReader,
        icons: Option<IconCache>,
    ) -> Result<Self, IndexError> {
        Ok(Self {
            roots,
            ttl,
            worker: ShortcutWorker::spawn(Box::new(reader), icons)?,
            state: RwLock::new(IndexState::default()),
            refresh_gate: Mutex::new(()),
            scans: AtomicUsize::new(0),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, IndexError> {
        let icons = IconCache::new(&cfg.icon_cache_dir, Arc::new(FileIconExtractor::default()));
        Self::new(
            cfg.effective_shortcut_roots(),
            Duration::from_secs(cfg.shortcut_cache_ttl_secs),
            FileShortcutReader,
            Some(icons),
        )
    }

    /// Rescans unless the index is younger than its TTL. Overlapping callers
    /// wait for the scan in flight instead of starting another.
    pub async fn refresh(&self) -> Result<(), IndexError> {
        if self.is_fresh() {
            return Ok(());
        }

        let _gate = self.refresh_gate.lock().await;
        if self.is_fresh() {
            return Ok(());
        }

        let generation = self.read_state(|state| state.generation);
        self.scans.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        info!(roots = self.roots.len(), "scanning shortcut roots");

        let entries = self.worker.scan(self.roots.clone()).await?;
        info!(
            entries = entries.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "shortcut scan finished"
        );

        if let Ok(mut state) = self.state.write() {
            // An invalidation during the scan keeps the result but not its freshness.
            if state.generation == generation {
                state.loaded_at = Some(Instant::now());
            }
            state.entries = Arc::new(entries);
        }
        Ok(())
    }

    /// Forces the next [`refresh`](Self::refresh) to rescan.
    pub fn invalidate(&self) {
        if let Ok(mut state) = self.state.write() {
            state.loaded_at = None;
            state.generation += 1;
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.read_state(|state| {
            state
                .loaded_at
                .is_some_and(|loaded| loaded.elapsed() < self.ttl)
        })
    }

    pub fn entries(&self) -> Arc<Vec<ShortcutEntry>> {
        self.read_state(|state| Arc::clone(&state.entries))
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn find_first(&self, needle: &str) -> Option<ShortcutEntry> {
        self.find_all(needle, 1).into_iter().next()
    }

    /// Case-insensitive substring matches, earliest match first, then shortest name.
    pub fn find_all(&self, needle: &str, limit: usize) -> Vec<ShortcutEntry> {
        let entries = self.entries();
        rank_matches(&entries, needle, limit)
    }

    fn read_state<T>(&self, read: impl FnOnce(&IndexState) -> T) -> T
    where
        T: Default,
    {
        self.state
            .read()
            .map(|state| read(&state))
            .unwrap_or_default()
    }
}

pub fn rank_matches(entries: &[ShortcutEntry], needle: &str, limit: usize) -> Vec<ShortcutEntry> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(usize, usize, usize, &ShortcutEntry)> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let name = entry.name.to_lowercase();
            let position = name.find(&needle)?;
            Some((position, name.chars().count(), index, entry))
        })
        .collect();

    ranked.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(_, _, _, entry)| entry.clone())
        .collect()
}

fn scan_roots(
    reader: &dyn ShortcutReader,
    icons: Option<&IconCache>,
    roots: &[ShortcutRoot],
) -> Vec<ShortcutEntry> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for root in roots {
        if !root.path.is_dir() {
            debug!(root = %root.path.display(), "shortcut root missing");
            continue;
        }

        let max_depth = if root.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&root.path)
            .follow_links(false)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_reparse_point(entry));

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() || !reader.is_shortcut(entry.path()) {
                continue;
            }
            let Some(mut shortcut) = reader.read(entry.path()) else {
                continue;
            };
            let identity = (
                shortcut.name.to_lowercase(),
                shortcut.target_path.to_lowercase(),
            );
            if !seen.insert(identity) {
                continue;
            }
            shortcut.cached_icon_path = icons.and_then(|cache| cache.ensure(&shortcut));
            out.push(shortcut);
        }
    }

    out
}

#[cfg(target_os = "windows")]
fn is_reparse_point(entry: &DirEntry) -> bool {
    use std::os::windows::fs::MetadataExt;
    use windows_sys::Win32::Storage::FileSystem::FILE_ATTRIBUTE_REPARSE_POINT;

    let skip = entry
        .metadata()
        .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_REPARSE_POINT != 0)
        .unwrap_or(false);
    if skip {
        debug!(path = %entry.path().display(), "skipping reparse point");
    }
    skip
}

#[cfg(not(target_os = "windows"))]
fn is_reparse_point(entry: &DirEntry) -> bool {
    let skip = entry.path_is_symlink();
    if skip {
        debug!(path = %entry.path().display(), "skipping symlink");
    }
    skip
}
