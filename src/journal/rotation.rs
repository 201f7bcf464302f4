//! journal/rotation — смена живого файла журнала.
//!
//! RotationCoordinator решает, когда ротировать, и выполняет саму замену:
//!   pre_rotation_action(ctx) -> rename(live, archived) -> post_rotation_action(ctx)
//! Хуки реализует писатель (SecureAppendLog) на уже захваченном состоянии.
//!
//! FileRotator:
//! - политика размера: max_file_size байт (0 = никогда);
//! - архивные имена "<file>.<N>", N монотонно растёт, 6 цифр с ведущими нулями;
//! - после удачной ротации — политика хранения (RetentionPolicy): самые старые
//!   архивы удаляются вместе с их "<archive>.keystore".
//!
//! Если post_rotation_action упал, переименование уже сделано: восстановление
//! (вернуть файл или начать новый) — забота хуков, координатор только
//! возвращает ошибку.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::error::{AuditLogError, Result};
use crate::keystore::keyring::fsync_parent_dir;
use crate::keystore::FileKeyStore;

#[derive(Debug, Clone)]
pub struct RotationContext {
    pub live_path: PathBuf,
    pub archived_path: PathBuf,
}

pub trait RotationHooks {
    /// Перед переименованием: финальная подпись, flush, закрытие файла.
    fn pre_rotation_action(&mut self, ctx: &RotationContext) -> Result<()>;
    /// После переименования: новые ключи, заголовок, перенос подписи.
    fn post_rotation_action(&mut self, ctx: &RotationContext) -> Result<()>;
}

pub trait RotationCoordinator: Send {
    fn should_rotate(&self, current_len: u64) -> bool;
    /// Выполнить ротацию `live`; возвращает путь архивного файла.
    fn rotate(&mut self, live: &Path, hooks: &mut dyn RotationHooks) -> Result<PathBuf>;
}

/// Сколько архивов держать. Все лимиты 0 = выключены; живой файл не трогается.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_history_files: usize,
    /// Суммарный размер архивов, байт.
    pub max_disk_space: u64,
    /// Минимум свободного места на томе, байт.
    pub min_free_space: u64,
}

impl RetentionPolicy {
    pub fn is_enabled(&self) -> bool {
        self.max_history_files > 0 || self.max_disk_space > 0 || self.min_free_space > 0
    }
}

#[derive(Debug, Clone)]
pub struct FileRotator {
    max_file_size: u64,
    retention: RetentionPolicy,
}

impl FileRotator {
    pub fn new(max_file_size: u64) -> Self {
        Self {
            max_file_size,
            retention: RetentionPolicy::default(),
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

impl RotationCoordinator for FileRotator {
    fn should_rotate(&self, current_len: u64) -> bool {
        self.max_file_size > 0 && current_len >= self.max_file_size
    }

    fn rotate(&mut self, live: &Path, hooks: &mut dyn RotationHooks) -> Result<PathBuf> {
        let next = ArchiveSet::list(live)?
            .last()
            .map(|(n, _)| n + 1)
            .unwrap_or(1);
        let archived = archive_path(live, next);
        if archived.exists() {
            return Err(AuditLogError::Format(format!(
                "archive target already exists: {}",
                archived.display()
            )));
        }
        let ctx = RotationContext {
            live_path: live.to_path_buf(),
            archived_path: archived.clone(),
        };

        hooks.pre_rotation_action(&ctx)?;
        debug!("rotating {} -> {}", live.display(), archived.display());
        std::fs::rename(live, &archived)?;
        let _ = fsync_parent_dir(&archived);
        hooks.post_rotation_action(&ctx)?;

        info!("log rotated: {} archived as {}", live.display(), archived.display());
        if self.retention.is_enabled() {
            // ротация уже состоялась; ошибка хранения её не отменяет
            if let Err(e) = apply_retention(live, &self.retention) {
                warn!("retention for {} failed: {}", live.display(), e);
            }
        }
        Ok(archived)
    }
}

/// Удалить самые старые архивы сверх лимитов политики. Возвращает удалённые пути.
pub fn apply_retention(live: &Path, policy: &RetentionPolicy) -> Result<Vec<PathBuf>> {
    let mut archives: Vec<(PathBuf, u64)> = ArchiveSet::list(live)?
        .into_iter()
        .map(|(_, p)| {
            let len = std::fs::metadata(&p).map(|m| m.len()).unwrap_or(0);
            (p, len)
        })
        .collect();
    let mut removed = Vec::new();

    if policy.max_history_files > 0 {
        while archives.len() > policy.max_history_files {
            let (p, _) = archives.remove(0);
            remove_archive(&p)?;
            removed.push(p);
        }
    }

    if policy.max_disk_space > 0 {
        let mut total: u64 = archives.iter().map(|(_, len)| len).sum();
        while total > policy.max_disk_space && !archives.is_empty() {
            let (p, len) = archives.remove(0);
            remove_archive(&p)?;
            total -= len;
            removed.push(p);
        }
    }

    if policy.min_free_space > 0 {
        let dir = match live.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        while !archives.is_empty() && fs2::available_space(&dir)? < policy.min_free_space {
            let (p, _) = archives.remove(0);
            remove_archive(&p)?;
            removed.push(p);
        }
    }

    Ok(removed)
}

fn remove_archive(path: &Path) -> Result<()> {
    std::fs::remove_file(path)?;
    let ks = FileKeyStore::keystore_path(path);
    if ks.exists() {
        std::fs::remove_file(&ks)?;
    }
    info!("retention: removed {}", path.display());
    Ok(())
}

pub fn archive_path(live: &Path, index: u64) -> PathBuf {
    let mut s = live.as_os_str().to_os_string();
    s.push(format!(".{:06}", index));
    PathBuf::from(s)
}

/// Архивные соседи живого файла.
pub struct ArchiveSet;

impl ArchiveSet {
    /// (N, path) для всех "<live>.<N>", по возрастанию N.
    pub fn list(live: &Path) -> Result<Vec<(u64, PathBuf)>> {
        let name = match live.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => return Ok(Vec::new()),
        };
        let dir = match live.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}.", name);
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let fname = entry.file_name();
            let fname = fname.to_string_lossy();
            let Some(suffix) = fname.strip_prefix(&prefix) else {
                continue;
            };
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if let Ok(n) = suffix.parse::<u64>() {
                out.push((n, dir.join(&*fname)));
            }
        }
        out.sort_by_key(|(n, _)| *n);
        Ok(out)
    }

    /// Архивы по порядку, затем живой файл (если существует).
    pub fn with_live(live: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = Self::list(live)?.into_iter().map(|(_, p)| p).collect();
        if live.exists() {
            files.push(live.to_path_buf());
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_names_are_zero_padded() {
        assert_eq!(
            archive_path(Path::new("/var/log/access.csv"), 7),
            PathBuf::from("/var/log/access.csv.000007")
        );
    }

    #[test]
    fn size_policy() {
        let r = FileRotator::new(100);
        assert!(!r.should_rotate(99));
        assert!(r.should_rotate(100));
        assert!(!FileRotator::new(0).should_rotate(u64::MAX));
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "chainlog-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn retention_drops_oldest_archives_and_their_keystores() {
        let dir = scratch_dir("retention");
        let live = dir.join("a.csv");
        std::fs::write(&live, b"live").unwrap();
        for n in 1..=4u64 {
            std::fs::write(archive_path(&live, n), vec![b'x'; 100]).unwrap();
            std::fs::write(FileKeyStore::keystore_path(&archive_path(&live, n)), b"k").unwrap();
        }

        let by_count = RetentionPolicy {
            max_history_files: 3,
            ..Default::default()
        };
        let removed = apply_retention(&live, &by_count).unwrap();
        assert_eq!(removed, vec![archive_path(&live, 1)]);
        assert!(!FileKeyStore::keystore_path(&archive_path(&live, 1)).exists());

        let by_space = RetentionPolicy {
            max_disk_space: 150,
            ..Default::default()
        };
        let removed = apply_retention(&live, &by_space).unwrap();
        assert_eq!(removed, vec![archive_path(&live, 2), archive_path(&live, 3)]);

        let left: Vec<u64> = ArchiveSet::list(&live).unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(left, vec![4]);
        assert!(live.exists());
        assert!(apply_retention(&live, &RetentionPolicy::default()).unwrap().is_empty());
    }

    #[test]
    fn list_ignores_sidecars() {
        let dir = scratch_dir("archset");
        let live = dir.join("a.csv");
        for f in ["a.csv", "a.csv.000002", "a.csv.000010", "a.csv.000002.keystore", "a.csv.lock", "b.csv.000001"] {
            std::fs::write(dir.join(f), b"x").unwrap();
        }
        let got: Vec<u64> = ArchiveSet::list(&live).unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(got, vec![2, 10]);
        assert_eq!(ArchiveSet::with_live(&live).unwrap().last().unwrap(), &live);
    }
}
