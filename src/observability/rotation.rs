//! Size-based log file rotation.
//!
//! [`RollingFile`] is a `file-rotate` writer configured from the log settings.
//! The active file rolls over once it has grown past the size threshold, and
//! the rolled file keeps the original name with the rotation time appended,
//! e.g. `app.log` → `app.log.20261018T145600`.
//!
//! `file-rotate` enforces a single retention rule. When both a count and an
//! age are configured, the count is left to the crate and expired files are
//! removed here after each rotation.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, TimeDelta};
use file_rotate::compression::Compression;
use file_rotate::suffix::{AppendTimestamp, FileLimit};
use file_rotate::{ContentLimit, FileRotate};

/// Timestamp format `AppendTimestamp::default` writes after the file name.
const SUFFIX_FORMAT: &str = "%Y%m%dT%H%M%S";
const MEGABYTE: usize = 1024 * 1024;
const DEFAULT_MAX_SIZE_MB: usize = 100;

/// Retention rules for rotated files. Zero disables a rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retention {
    pub max_backups: usize,
    pub max_age: Duration,
}

impl Retention {
    /// The age rule, when set and small enough to yield a valid cutoff.
    fn age(&self) -> Option<TimeDelta> {
        if self.max_age.is_zero() {
            return None;
        }
        let age = TimeDelta::from_std(self.max_age).ok()?;
        Local::now().checked_sub_signed(age)?;
        Some(age)
    }

    fn file_limit(&self) -> FileLimit {
        match (self.max_backups, self.age()) {
            (0, None) => FileLimit::Unlimited,
            (0, Some(age)) => FileLimit::Age(age),
            (count, _) => FileLimit::MaxFiles(count),
        }
    }

    fn needs_sweep(&self) -> bool {
        self.max_backups > 0 && self.age().is_some()
    }
}

/// An `io::Write` destination that rotates itself by size.
pub struct RollingFile {
    path: PathBuf,
    max_bytes: usize,
    retention: Retention,
    inner: FileRotate<AppendTimestamp>,
    rotated: Vec<PathBuf>,
}

impl std::fmt::Debug for RollingFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollingFile")
            .field("path", &self.path)
            .field("max_bytes", &self.max_bytes)
            .field("retention", &self.retention)
            .finish()
    }
}

impl RollingFile {
    /// Open `path` for appending with a threshold given in megabytes.
    pub fn open(path: impl AsRef<Path>, max_size_mb: u64, retention: Retention) -> io::Result<Self> {
        let mb = match usize::try_from(max_size_mb) {
            Ok(0) => DEFAULT_MAX_SIZE_MB,
            Ok(mb) => mb,
            Err(_) => usize::MAX / MEGABYTE,
        };
        Self::with_max_bytes(path, mb.saturating_mul(MEGABYTE), retention)
    }

    /// Open `path` for appending with a threshold given in bytes.
    pub fn with_max_bytes(
        path: impl AsRef<Path>,
        max_bytes: usize,
        retention: Retention,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        // Surface permission problems now rather than on the first record.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let max_bytes = max_bytes.max(1);
        let mut inner = rotator(&path, max_bytes, &retention);
        let rotated = inner.log_paths();
        let mut file = Self {
            path,
            max_bytes,
            retention,
            inner,
            rotated,
        };
        if file.retention.needs_sweep() {
            file.expire()?;
        }
        Ok(file)
    }

    /// Path of the active destination.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotated files currently kept, oldest first.
    pub fn backups(&mut self) -> Vec<PathBuf> {
        self.inner.log_paths()
    }

    fn expire(&mut self) -> io::Result<()> {
        let Some(age) = self.retention.age() else {
            return Ok(());
        };
        let Some(cutoff) = Local::now().naive_local().checked_sub_signed(age) else {
            return Ok(());
        };

        let mut removed = false;
        for backup in &self.rotated {
            if rotated_at(&self.path, backup).is_some_and(|at| at < cutoff) {
                fs::remove_file(backup)?;
                removed = true;
            }
        }
        if removed {
            // Rebuild so the crate rescans and forgets the removed files.
            self.inner = rotator(&self.path, self.max_bytes, &self.retention);
            self.rotated = self.inner.log_paths();
        }
        Ok(())
    }
}

fn rotator(path: &Path, max_bytes: usize, retention: &Retention) -> FileRotate<AppendTimestamp> {
    FileRotate::new(
        path,
        AppendTimestamp::default(retention.file_limit()),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    )
}

/// Rotation time encoded in a backup name (`<name>.<stamp>[.<n>]`).
fn rotated_at(active: &Path, backup: &Path) -> Option<NaiveDateTime> {
    let base = active.file_name()?.to_str()?;
    let name = backup.file_name()?.to_str()?;
    let suffix = name.strip_prefix(base)?.strip_prefix('.')?;
    let stamp = suffix.split('.').next()?;
    NaiveDateTime::parse_from_str(stamp, SUFFIX_FORMAT).ok()
}

impl Write for RollingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if self.retention.needs_sweep() {
            let rotated = self.inner.log_paths();
            if rotated != self.rotated {
                self.rotated = rotated;
                self.expire()?;
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);
    const LINE: &[u8] = b"xxxxxxx\n";

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn fake_backup(dir: &Path, age: Duration) -> PathBuf {
        let stamp = Local::now() - TimeDelta::from_std(age).unwrap();
        let path = dir.join(format!("app.log.{}", stamp.format(SUFFIX_FORMAT)));
        fs::write(&path, b"old\n").unwrap();
        path
    }

    /// Three 8-byte lines against an 8-byte threshold: exactly one rollover.
    fn roll_once(file: &mut RollingFile) {
        for _ in 0..3 {
            file.write_all(LINE).unwrap();
        }
    }

    #[test]
    fn rotates_when_threshold_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut file = RollingFile::with_max_bytes(&path, 16, Retention::default()).unwrap();

        file.write_all(b"0123456789\n").unwrap();
        assert_eq!(files_in(dir.path()), vec!["app.log"]);

        file.write_all(b"abcdefghij\n").unwrap();
        file.write_all(b"klmnopqrst\n").unwrap();
        file.flush().unwrap();

        let names = files_in(dir.path());
        assert_eq!(names.len(), 2);
        assert!(names.iter().any(|n| n.starts_with("app.log.")));
        assert_eq!(fs::read_to_string(&path).unwrap(), "klmnopqrst\n");
        assert_eq!(file.backups().len(), 1);
    }

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"previous\n").unwrap();

        let mut file = RollingFile::with_max_bytes(&path, 1024, Retention::default()).unwrap();
        file.write_all(b"next\n").unwrap();
        file.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "previous\nnext\n");
    }

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/app.log");
        let mut file = RollingFile::open(&path, 1, Retention::default()).unwrap();
        file.write_all(b"hello\n").unwrap();
        file.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn prunes_beyond_backup_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let oldest = fake_backup(dir.path(), Duration::from_secs(300));
        let older = fake_backup(dir.path(), Duration::from_secs(200));
        let retention = Retention {
            max_backups: 2,
            max_age: Duration::ZERO,
        };
        let mut file = RollingFile::with_max_bytes(&path, 8, retention).unwrap();

        roll_once(&mut file);

        assert!(!oldest.exists());
        assert!(older.exists());
        assert_eq!(files_in(dir.path()).len(), 3);
    }

    #[test]
    fn prunes_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let stale = fake_backup(dir.path(), 10 * DAY);
        let fresh = fake_backup(dir.path(), DAY / 2);
        let retention = Retention {
            max_backups: 0,
            max_age: 3 * DAY,
        };
        let mut file = RollingFile::with_max_bytes(&path, 8, retention).unwrap();

        roll_once(&mut file);

        assert!(!stale.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn count_and_age_apply_together() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let stale = fake_backup(dir.path(), 10 * DAY);
        let fresh = fake_backup(dir.path(), DAY / 2);
        let retention = Retention {
            max_backups: 5,
            max_age: 3 * DAY,
        };
        let mut file = RollingFile::with_max_bytes(&path, 8, retention).unwrap();

        roll_once(&mut file);

        assert!(!stale.exists());
        assert!(fresh.exists());
        assert_eq!(file.backups().len(), 2);
    }

    #[test]
    fn unrepresentable_age_disables_the_rule() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let ancient = fake_backup(dir.path(), 400 * DAY);
        let retention = Retention {
            max_backups: 0,
            max_age: DAY * 100_000_000,
        };
        let mut file = RollingFile::with_max_bytes(&path, 8, retention).unwrap();

        roll_once(&mut file);
        roll_once(&mut file);

        assert!(ancient.exists());
        assert!(files_in(dir.path()).len() >= 3);
    }

    #[test]
    fn zero_retention_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let ancient = fake_backup(dir.path(), 400 * DAY);
        let mut file = RollingFile::with_max_bytes(&path, 8, Retention::default()).unwrap();

        roll_once(&mut file);

        assert!(ancient.exists());
        assert_eq!(files_in(dir.path()).len(), 3);
    }

    #[test]
    fn ignores_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let other = dir.path().join("app.log.notes");
        fs::write(&other, b"keep").unwrap();
        let retention = Retention {
            max_backups: 1,
            max_age: Duration::ZERO,
        };
        let mut file = RollingFile::with_max_bytes(&path, 8, retention).unwrap();

        roll_once(&mut file);
        roll_once(&mut file);

        assert!(other.exists());
    }

    #[test]
    fn backup_names_carry_the_rotation_time() {
        let active = Path::new("/var/log/app.log");
        let at = rotated_at(active, Path::new("/var/log/app.log.20261018T145600.1")).unwrap();
        assert_eq!(at.format(SUFFIX_FORMAT).to_string(), "20261018T145600");
        assert!(rotated_at(active, Path::new("/var/log/app.log.notes")).is_none());
        assert!(rotated_at(active, Path::new("/var/log/other.log.20261018T145600")).is_none());
    }
}
