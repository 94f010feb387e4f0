//! Safe copy engine
//!
//! Replaces a suite folder on a target with a fresh copy of the source tree.
//! Full syncs use a rotate-then-delete-then-copy sequence tuned for slow FAT32
//! media on removable radios:
//!
//! 1. delete a leftover `<dest>.old` from an interrupted run
//! 2. rename `<dest>` to `<dest>.old`, or delete `<dest>` if the rename fails
//! 3. delete `<dest>.old`
//! 4. copy the source tree into `<dest>`
//!
//! Each destructive step is followed by a flush and a settle pause. Between
//! step 2 and the end of step 4 the destination is absent or partial; a power
//! loss in that window leaves the previous suite gone.
//!
//! Two lighter modes exist: an extension resync that only touches files with
//! one suffix, and a fast sync that copies files newer than their destination
//! copy without deleting anything.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use walkdir::WalkDir;

use crate::config::defaults;
use crate::error::SyncError;
use crate::infra::filesystem;

/// Progress callback type: (`files_done`, `total_files`)
///
/// Fast sync counts skipped files as done so the position reaches the total.
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Which copy strategy to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Rotate, delete and copy the whole tree
    Full,
    /// Replace only files with this suffix (e.g. `.lua`)
    Extension(String),
    /// Copy new or newer files, never delete
    Fast,
}

impl SyncMode {
    /// Interpret the `--fileext` flag
    pub fn from_fileext(fileext: Option<&str>) -> Self {
        match fileext.map(str::trim) {
            None | Some("") => Self::Full,
            Some(f) if f.eq_ignore_ascii_case("fast") => Self::Fast,
            Some(ext) if ext.starts_with('.') => Self::Extension(ext.to_string()),
            Some(ext) => Self::Extension(format!(".{ext}")),
        }
    }

    /// Human label for logs
    pub fn label(&self) -> String {
        match self {
            Self::Full => "all".to_string(),
            Self::Extension(ext) => ext.clone(),
            Self::Fast => "fast".to_string(),
        }
    }
}

/// Suffixes removed from the destination by an extension resync
///
/// Lua sources also drop their compiled `.luac` companions, which would
/// otherwise shadow the fresh sources on the radio.
pub fn companion_suffixes(ext: &str) -> Vec<String> {
    let mut suffixes = vec![ext.to_string()];
    if ext.eq_ignore_ascii_case(".lua") {
        suffixes.push(".luac".to_string());
    }
    suffixes
}

/// Flush and pause policy for the destination medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after each destructive step
    pub settle_delay: Duration,
    /// Flush filesystem buffers when settling
    pub flush: bool,
    /// Files larger than this get a flush and pause before copying
    pub large_file_threshold: Option<u64>,
    /// Pause before copying a large file
    pub large_file_pause: Duration,
}

impl Pacing {
    /// Removable radio storage
    pub fn removable() -> Self {
        Self {
            settle_delay: defaults::SETTLE_DELAY,
            flush: true,
            large_file_threshold: Some(defaults::LARGE_FILE_THRESHOLD),
            large_file_pause: defaults::LARGE_FILE_PAUSE,
        }
    }

    /// Local folders (simulators)
    pub fn local() -> Self {
        Self {
            large_file_threshold: None,
            large_file_pause: Duration::ZERO,
            ..Self::removable()
        }
    }

    /// No flushing or pauses at all
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            flush: false,
            large_file_threshold: None,
            large_file_pause: Duration::ZERO,
        }
    }

    fn settle(&self) {
        if self.flush {
            filesystem::flush_buffers();
        }
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
    }

    /// Flush and pause before a file larger than the threshold; true when it did
    fn pace_file(&self, size: u64) -> bool {
        if !self.large_file_threshold.is_some_and(|t| size > t) {
            return false;
        }
        if self.flush {
            filesystem::flush_buffers();
        }
        if !self.large_file_pause.is_zero() {
            std::thread::sleep(self.large_file_pause);
        }
        true
    }
}

/// One copy of a source tree into one destination
#[derive(Debug, Clone)]
pub struct CopyJob {
    /// Tree being copied
    pub source_root: PathBuf,
    /// Tree being replaced
    pub destination_root: PathBuf,
    /// Files found by the pre-scan
    pub total_file_count: u64,
    /// Files copied so far
    pub copied_file_count: u64,
    /// Files left alone because the destination was current
    pub skipped_file_count: u64,
    /// Large files that got a flush and pause before copying
    pub paced_file_count: u64,
    /// Flush and pause policy
    pub pacing: Pacing,
}

impl CopyJob {
    /// Create a job; counts start at zero until [`CopyJob::prescan`]
    pub fn new(source_root: &Path, destination_root: &Path, pacing: Pacing) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
            total_file_count: 0,
            copied_file_count: 0,
            skipped_file_count: 0,
            paced_file_count: 0,
            pacing,
        }
    }

    /// Count the source files matching `ext` (all files when `None`)
    pub fn prescan(&mut self, ext: Option<&str>) {
        self.total_file_count = filesystem::count_files(&self.source_root, ext);
        self.copied_file_count = 0;
        self.skipped_file_count = 0;
    }

    /// Files copied or skipped, never above `total_file_count`
    pub fn done_file_count(&self) -> u64 {
        self.copied_file_count + self.skipped_file_count
    }

    fn record_copy(&mut self) {
        self.grow_if_full();
        self.copied_file_count += 1;
    }

    fn record_skip(&mut self) {
        self.grow_if_full();
        self.skipped_file_count += 1;
    }

    // Files created after the pre-scan grow the total rather than overshoot it
    fn grow_if_full(&mut self) {
        if self.done_file_count() == self.total_file_count {
            self.total_file_count += 1;
        }
    }

    fn result(&self, removed: u64) -> CopyResult {
        CopyResult {
            total: self.total_file_count,
            copied: self.copied_file_count,
            skipped: self.skipped_file_count,
            removed,
            paced: self.paced_file_count,
        }
    }
}

/// Outcome of a sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyResult {
    /// Files considered for copying
    pub total: u64,
    /// Files actually copied
    pub copied: u64,
    /// Files left alone because the destination was up to date (fast sync)
    pub skipped: u64,
    /// Destination files removed (extension resync)
    pub removed: u64,
    /// Large files that got a flush and pause before copying
    pub paced: u64,
}

impl CopyResult {
    /// Whether every considered file was copied or deliberately skipped
    pub fn is_complete(&self) -> bool {
        self.copied + self.skipped == self.total
    }
}

/// Copies source trees onto targets
pub struct SafeCopyEngine {
    pacing: Pacing,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for SafeCopyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeCopyEngine")
            .field("pacing", &self.pacing)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl SafeCopyEngine {
    /// Create an engine with the given pacing
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            progress: None,
        }
    }

    /// Report per-file progress through `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Pacing in use
    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Run the sync selected by `mode`
    pub fn run(&self, mode: &SyncMode, source: &Path, dest: &Path) -> Result<CopyResult, SyncError> {
        match mode {
            SyncMode::Full => self.synchronize(source, dest),
            SyncMode::Extension(ext) => self.sync_extension(source, dest, ext),
            SyncMode::Fast => self.sync_fast(source, dest),
        }
    }

    /// Replace `dest` with a fresh copy of `source`
    pub fn synchronize(&self, source: &Path, dest: &Path) -> Result<CopyResult, SyncError> {
        ensure_source(source)?;

        if dest.is_dir() {
            self.rotate_out(dest)?;
        }

        let mut job = CopyJob::new(source, dest, self.pacing);
        job.prescan(None);
        tracing::info!(
            "Copying {} files from {} to {}",
            job.total_file_count,
            source.display(),
            dest.display()
        );

        filesystem::create_dir_all(dest)?;
        self.copy_tree(&mut job, None)?;
        self.pacing.settle();

        Ok(job.result(0))
    }

    /// Remove `dest` by rotating it to `<dest>.old` and deleting the backup
    fn rotate_out(&self, dest: &Path) -> Result<(), SyncError> {
        let old = backup_path(dest);

        if old.is_dir() {
            tracing::info!("Deleting previous backup {}", old.display());
            filesystem::remove_dir_all(&old)?;
            self.pacing.settle();
        }

        tracing::info!("Renaming existing folder to {}", old.display());
        if let Err(e) = std::fs::rename(dest, &old) {
            tracing::warn!("Rename failed ({e}). Falling back to direct delete.");
            filesystem::remove_dir_all(dest)?;
        }
        self.pacing.settle();

        if old.is_dir() {
            tracing::info!("Deleting {}", old.display());
            filesystem::remove_dir_all(&old)?;
            self.pacing.settle();
        }
        Ok(())
    }

    /// Replace only files ending in `ext`, leaving everything else in `dest`
    pub fn sync_extension(
        &self,
        source: &Path,
        dest: &Path,
        ext: &str,
    ) -> Result<CopyResult, SyncError> {
        ensure_source(source)?;

        let mut removed = 0;
        if dest.is_dir() {
            let suffixes = companion_suffixes(ext);
            let stale: Vec<PathBuf> = WalkDir::new(dest)
                .follow_links(false)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .filter(|e| suffixes.iter().any(|s| filesystem::has_suffix(e.path(), s)))
                .map(walkdir::DirEntry::into_path)
                .collect();
            for path in &stale {
                filesystem::remove_file(path)?;
                removed += 1;
            }
            tracing::info!("Removed {removed} '{ext}' files from {}", dest.display());
        }

        filesystem::create_dir_all(dest)?;
        let mut job = CopyJob::new(source, dest, self.pacing);
        job.prescan(Some(ext));
        self.copy_tree(&mut job, Some(ext))?;

        Ok(job.result(removed))
    }

    /// Copy files that are missing from `dest` or older there than in `source`
    pub fn sync_fast(&self, source: &Path, dest: &Path) -> Result<CopyResult, SyncError> {
        ensure_source(source)?;

        let mut job = CopyJob::new(source, dest, self.pacing);
        job.prescan(None);

        for entry in walk(source) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative(source, entry.path())?;
            let target = dest.join(rel);

            if !is_newer(entry.path(), &target) {
                job.record_skip();
                self.report_progress(&job);
                continue;
            }
            if let Some(parent) = target.parent() {
                filesystem::create_dir_all(parent)?;
            }
            self.copy_file(&mut job, entry.path(), &target)?;
            tracing::info!("Copy {}", rel.display());
        }

        Ok(job.result(0))
    }

    fn copy_tree(&self, job: &mut CopyJob, ext: Option<&str>) -> Result<(), SyncError> {
        let source = job.source_root.clone();
        let dest = job.destination_root.clone();

        for entry in walk(&source) {
            let entry = entry?;
            let rel = relative(&source, entry.path())?;
            let target = dest.join(rel);

            if entry.file_type().is_dir() {
                if ext.is_none() {
                    filesystem::create_dir_all(&target)?;
                }
                continue;
            }
            if ext.is_some_and(|x| !filesystem::has_suffix(entry.path(), x)) {
                continue;
            }
            if let Some(parent) = target.parent() {
                filesystem::create_dir_all(parent)?;
            }
            self.copy_file(job, entry.path(), &target)?;
        }
        Ok(())
    }

    fn copy_file(&self, job: &mut CopyJob, from: &Path, to: &Path) -> Result<(), SyncError> {
        let copy_error = |job: &CopyJob, error: std::io::Error| SyncError::Copy {
            path: from.to_path_buf(),
            copied: job.copied_file_count,
            total: job.total_file_count,
            error: error.to_string(),
        };

        let size = match std::fs::metadata(from) {
            Ok(meta) => meta.len(),
            Err(e) => return Err(copy_error(job, e)),
        };
        if job.pacing.pace_file(size) {
            job.paced_file_count += 1;
        }

        if let Err(e) = std::fs::copy(from, to) {
            return Err(copy_error(job, e));
        }
        job.record_copy();
        self.report_progress(job);
        Ok(())
    }

    fn report_progress(&self, job: &CopyJob) {
        if let Some(cb) = &self.progress {
            cb(job.done_file_count(), job.total_file_count);
        }
    }
}

/// `<dest>.old`
pub fn backup_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".old");
    PathBuf::from(name)
}

fn ensure_source(source: &Path) -> Result<(), SyncError> {
    if source.is_dir() {
        Ok(())
    } else {
        Err(SyncError::SourceMissing {
            path: source.to_path_buf(),
        })
    }
}

fn walk(root: &Path) -> impl Iterator<Item = Result<walkdir::DirEntry, SyncError>> + '_ {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .map(move |e| {
            e.map_err(|e| SyncError::Walk {
                path: e.path().unwrap_or(root).to_path_buf(),
                error: e.to_string(),
            })
        })
}

fn relative<'a>(root: &Path, path: &'a Path) -> Result<&'a Path, SyncError> {
    path.strip_prefix(root).map_err(|e| SyncError::Walk {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Source strictly newer than destination, or destination missing
fn is_newer(source: &Path, dest: &Path) -> bool {
    let Ok(dest_meta) = std::fs::metadata(dest) else {
        return true;
    };
    match (
        std::fs::metadata(source).and_then(|m| m.modified()),
        dest_meta.modified(),
    ) {
        (Ok(src), Ok(dst)) => src > dst,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_fileext_parsing() {
        assert_eq!(SyncMode::from_fileext(None), SyncMode::Full);
        assert_eq!(SyncMode::from_fileext(Some("fast")), SyncMode::Fast);
        assert_eq!(
            SyncMode::from_fileext(Some(".lua")),
            SyncMode::Extension(".lua".to_string())
        );
        assert_eq!(
            SyncMode::from_fileext(Some("lua")),
            SyncMode::Extension(".lua".to_string())
        );
    }

    #[test]
    fn test_companion_suffixes() {
        assert_eq!(companion_suffixes(".lua"), [".lua", ".luac"]);
        assert_eq!(companion_suffixes(".png"), [".png"]);
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/radio/scripts/rfsuite")),
            PathBuf::from("/radio/scripts/rfsuite.old")
        );
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let engine = SafeCopyEngine::new(Pacing::immediate());
        let err = engine
            .synchronize(&dir.path().join("nope"), &dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, SyncError::SourceMissing { .. }));
    }

    #[test]
    fn test_full_sync_into_empty_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "main.lua", "main");
        write(&src, "app/tasks/msp.lua", "msp");
        std::fs::create_dir_all(src.join("empty")).unwrap();
        let dest = dir.path().join("radio/rfsuite");

        let result = SafeCopyEngine::new(Pacing::immediate())
            .synchronize(&src, &dest)
            .unwrap();

        assert_eq!(result.total, 2);
        assert_eq!(result.copied, 2);
        assert!(result.is_complete());
        assert_eq!(std::fs::read_to_string(dest.join("app/tasks/msp.lua")).unwrap(), "msp");
        assert!(dest.join("empty").is_dir());
    }

    #[test]
    fn test_full_sync_clears_stale_backup_and_old_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "main.lua", "new");
        let dest = dir.path().join("rfsuite");
        write(&dest, "main.lua", "old");
        write(&dest, "obsolete.lua", "gone");
        write(&backup_path(&dest), "leftover.lua", "stale");

        SafeCopyEngine::new(Pacing::immediate())
            .synchronize(&src, &dest)
            .unwrap();

        assert!(!backup_path(&dest).exists());
        assert!(!dest.join("obsolete.lua").exists());
        assert_eq!(std::fs::read_to_string(dest.join("main.lua")).unwrap(), "new");
    }

    #[test]
    fn test_progress_reports_every_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        for i in 0..5 {
            write(&src, &format!("f{i}.lua"), "x");
        }
        let seen = Arc::new(AtomicU64::new(0));
        let seen_cb = Arc::clone(&seen);
        let engine = SafeCopyEngine::new(Pacing::immediate()).with_progress(Box::new(
            move |copied, total| {
                assert!(copied <= total);
                seen_cb.store(copied, Ordering::SeqCst);
            },
        ));

        engine.synchronize(&src, &dir.path().join("out")).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_extension_sync_removes_compiled_companions() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "app/main.lua", "fresh");
        write(&src, "app/logo.png", "png");
        let dest = dir.path().join("dest");
        write(&dest, "app/main.luac", "compiled");
        write(&dest, "app/logo.png", "old png");

        let result = SafeCopyEngine::new(Pacing::immediate())
            .sync_extension(&src, &dest, ".lua")
            .unwrap();

        assert_eq!(result.removed, 1);
        assert_eq!(result.copied, 1);
        assert!(!dest.join("app/main.luac").exists());
        assert_eq!(std::fs::read_to_string(dest.join("app/main.lua")).unwrap(), "fresh");
        assert_eq!(std::fs::read_to_string(dest.join("app/logo.png")).unwrap(), "old png");
    }

    #[test]
    fn test_fast_sync_copies_missing_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "a.lua", "a");
        write(&src, "sub/b.lua", "b");
        let dest = dir.path().join("dest");

        let result = SafeCopyEngine::new(Pacing::immediate())
            .sync_fast(&src, &dest)
            .unwrap();
        assert_eq!(result.copied, 2);
        assert_eq!(result.skipped, 0);
        assert!(dest.join("sub/b.lua").exists());

        // Freshly copied files are newer than their sources
        let again = SafeCopyEngine::new(Pacing::immediate())
            .sync_fast(&src, &dest)
            .unwrap();
        assert_eq!(again.copied, 0);
        assert_eq!(again.skipped, 2);
    }

    #[test]
    fn test_job_counts_never_overshoot() {
        let mut job = CopyJob::new(Path::new("a"), Path::new("b"), Pacing::immediate());
        job.total_file_count = 1;
        job.record_copy();
        job.record_copy();
        assert_eq!(job.copied_file_count, 2);
        assert_eq!(job.total_file_count, 2);
    }

    #[test]
    fn test_job_skips_count_toward_total() {
        let mut job = CopyJob::new(Path::new("a"), Path::new("b"), Pacing::immediate());
        job.total_file_count = 2;
        job.record_skip();
        job.record_copy();
        assert_eq!(job.done_file_count(), 2);
        assert_eq!(job.total_file_count, 2);
    }

    #[test]
    fn test_fast_sync_progress_reaches_total() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "a.lua", "a");
        write(&src, "b.lua", "b");
        let dest = dir.path().join("dest");
        SafeCopyEngine::new(Pacing::immediate())
            .sync_fast(&src, &dest)
            .unwrap();
        write(&src, "c.lua", "c");

        let last = Arc::new(std::sync::Mutex::new((0, 0)));
        let last_cb = Arc::clone(&last);
        let engine = SafeCopyEngine::new(Pacing::immediate()).with_progress(Box::new(
            move |done, total| {
                assert!(done <= total);
                *last_cb.lock().unwrap() = (done, total);
            },
        ));
        let result = engine.sync_fast(&src, &dest).unwrap();

        assert_eq!(result.copied, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(*last.lock().unwrap(), (3, 3));
    }

    #[test]
    fn test_large_files_are_paced() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "small.lua", "12345");
        write(&src, "exact.lua", "1234567890");
        write(&src, "big.png", &"x".repeat(64));
        let pacing = Pacing {
            large_file_threshold: Some(10),
            ..Pacing::immediate()
        };

        let result = SafeCopyEngine::new(pacing)
            .synchronize(&src, &dir.path().join("radio"))
            .unwrap();

        assert_eq!(result.copied, 3);
        assert_eq!(result.paced, 1);
    }

    #[test]
    fn test_local_pacing_never_paces_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "big.png", &"x".repeat(64 * 1024));
        let pacing = Pacing {
            settle_delay: Duration::ZERO,
            flush: false,
            ..Pacing::local()
        };

        let result = SafeCopyEngine::new(pacing)
            .synchronize(&src, &dir.path().join("sim"))
            .unwrap();

        assert_eq!(result.paced, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_rename_failure_falls_back_to_delete() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src, "main.lua", "new");
        let dest = dir.path().join("rfsuite");
        write(&dest, "main.lua", "old");
        write(&dest, "obsolete.lua", "gone");
        // A plain file where the backup folder goes makes the rename fail
        std::fs::write(backup_path(&dest), "not a folder").unwrap();

        let result = SafeCopyEngine::new(Pacing::immediate())
            .synchronize(&src, &dest)
            .unwrap();

        assert_eq!(result.copied, 1);
        assert!(!dest.join("obsolete.lua").exists());
        assert_eq!(std::fs::read_to_string(dest.join("main.lua")).unwrap(), "new");
        assert!(backup_path(&dest).is_file());
    }

    #[test]
    fn test_pacing_presets() {
        assert_eq!(Pacing::removable().large_file_threshold, Some(5 * 1024));
        assert!(Pacing::local().large_file_threshold.is_none());
        assert!(Pacing::local().flush);
        assert!(Pacing::immediate().settle_delay.is_zero());
    }
}
