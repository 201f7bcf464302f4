//! keystore/keyring — файловый стор именованных blob'ов.
//!
//! Формат файла (LE):
//! - Header (16 B):
//!   [magic8="CLKEYR01"][version u32=1][reserved u32=0]
//! - Body: последовательность записей
//!   [name_len u16][name bytes (UTF-8, name_len)]
//!   [blob_len u32][blob bytes]
//!
//! Политика:
//! - put_many(entries) — атомарная перезапись файла (tmp+rename) под файловой блокировкой.
//! - get(name)         — читает все записи и берёт последнюю для имени.
//! - list()            — диагностический список (name, blob_len).
//!
//! Шифрования здесь нет: blob'ы приходят уже запечатанными (см. crypto::seal).

use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"CLKEYR01";
const VERSION: u32 = 1;
const HDR_SIZE: usize = 16;

fn lock_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".lock");
    PathBuf::from(s)
}

fn lock_keyring(path: &Path) -> Result<File> {
    let lp = lock_path(path);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&lp)
        .with_context(|| format!("open lock {}", lp.display()))?;
    f.lock_exclusive()
        .with_context(|| format!("lock_exclusive {}", lp.display()))?;
    Ok(f)
}

#[cfg(unix)]
pub(crate) fn fsync_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
pub(crate) fn fsync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

pub struct KeyRing {
    path: PathBuf,
}

impl KeyRing {
    /// Открыть существующий keyring и проверить заголовок.
    pub fn open(path: &Path) -> Result<Self> {
        let mut f = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open keyring {}", path.display()))?;
        let mut hdr = [0u8; HDR_SIZE];
        f.read_exact(&mut hdr)
            .with_context(|| format!("read keyring header {}", path.display()))?;
        check_header(&hdr, path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Открыть или создать keyring с валидным заголовком.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let _lk = lock_keyring(path)?;
            // повторная проверка под блокировкой
            if !path.exists() {
                let mut f = OpenOptions::new()
                    .create_new(true)
                    .write(true)
                    .open(path)
                    .with_context(|| format!("create keyring {}", path.display()))?;
                f.write_all(&header_bytes())?;
                let _ = f.sync_all();
                let _ = fsync_parent_dir(path);
            }
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Вернуть blob для имени (если есть).
    pub fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().rev().find(|(n, _)| n == name).map(|(_, b)| b))
    }

    pub fn put(&self, name: &str, blob: &[u8]) -> Result<()> {
        self.put_many(&[(name, blob)])
    }

    /// Записать/обновить несколько записей одной атомарной перезаписью.
    pub fn put_many(&self, entries: &[(&str, &[u8])]) -> Result<()> {
        for (name, _) in entries {
            if name.len() > u16::MAX as usize {
                return Err(anyhow!("entry name too long"));
            }
        }
        let _lk = lock_keyring(&self.path)?;

        let mut map: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for (k, b) in self.read_all()? {
            map.insert(k, b);
        }
        for (name, blob) in entries {
            map.insert((*name).to_string(), blob.to_vec());
        }
        self.rewrite(&map)
    }

    /// Удалить записи (отсутствующие имена игнорируются).
    pub fn remove(&self, names: &[&str]) -> Result<()> {
        let _lk = lock_keyring(&self.path)?;
        let mut map: BTreeMap<String, Vec<u8>> = self.read_all()?.into_iter().collect();
        for n in names {
            map.remove(*n);
        }
        self.rewrite(&map)
    }

    /// Диагностический список всех записей (name, blob_len).
    pub fn list(&self) -> Result<Vec<(String, usize)>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().map(|(k, v)| (k, v.len())).collect())
    }

    // tmp + rename + fsync parent; детерминированный порядок по имени
    fn rewrite(&self, map: &BTreeMap<String, Vec<u8>>) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow!("keyring path has no file name: {}", self.path.display()))?;
        let tmp = self
            .path
            .with_file_name(format!("{}.tmp", file_name.to_string_lossy()));
        let _ = std::fs::remove_file(&tmp);
        let mut tf = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)
            .with_context(|| format!("open tmp {}", tmp.display()))?;

        let mut body = Vec::with_capacity(HDR_SIZE + map.len() * 64);
        body.extend_from_slice(&header_bytes());
        let mut buf2 = [0u8; 2];
        let mut buf4 = [0u8; 4];
        for (k, v) in map {
            let kbytes = k.as_bytes();
            LittleEndian::write_u16(&mut buf2, kbytes.len() as u16);
            body.extend_from_slice(&buf2);
            body.extend_from_slice(kbytes);
            LittleEndian::write_u32(&mut buf4, v.len() as u32);
            body.extend_from_slice(&buf4);
            body.extend_from_slice(v);
        }
        tf.write_all(&body)?;
        tf.sync_all()
            .with_context(|| format!("fsync {}", tmp.display()))?;

        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        let _ = fsync_parent_dir(&self.path);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out: Vec<(String, Vec<u8>)> = Vec::new();
        let mut f = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .with_context(|| format!("open keyring {}", self.path.display()))?;
        let mut data = Vec::new();
        f.read_to_end(&mut data)?;
        if data.len() < HDR_SIZE {
            return Err(anyhow!("keyring too small (< header)"));
        }
        check_header(&data[..HDR_SIZE], &self.path)?;

        let len = data.len();
        let mut pos = HDR_SIZE;
        while pos + 2 <= len {
            let name_len = LittleEndian::read_u16(&data[pos..pos + 2]) as usize;
            pos += 2;
            if pos + name_len + 4 > len {
                return Err(anyhow!("keyring truncated at entry name ({})", self.path.display()));
            }
            let name = String::from_utf8(data[pos..pos + name_len].to_vec())
                .map_err(|e| anyhow!("entry name utf8: {}", e))?;
            pos += name_len;
            let blob_len = LittleEndian::read_u32(&data[pos..pos + 4]) as usize;
            pos += 4;
            if pos + blob_len > len {
                return Err(anyhow!("keyring truncated at entry '{}'", name));
            }
            out.push((name, data[pos..pos + blob_len].to_vec()));
            pos += blob_len;
        }
        Ok(out)
    }
}

fn header_bytes() -> [u8; HDR_SIZE] {
    let mut hdr = [0u8; HDR_SIZE];
    hdr[0..8].copy_from_slice(MAGIC);
    LittleEndian::write_u32(&mut hdr[8..12], VERSION);
    hdr
}

fn check_header(hdr: &[u8], path: &Path) -> Result<()> {
    if &hdr[0..8] != MAGIC {
        return Err(anyhow!("bad keyring magic at {}", path.display()));
    }
    let ver = LittleEndian::read_u32(&hdr[8..12]);
    if ver != VERSION {
        return Err(anyhow!("unsupported keyring version {}", ver));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(tag: &str) -> PathBuf {
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("chainlog-keyring-{}-{}-{}", tag, std::process::id(), t))
    }

    #[test]
    fn put_get_overwrite_remove() {
        let p = tmp_path("basic");
        let ring = KeyRing::open_or_create(&p).unwrap();
        assert!(ring.get("a").unwrap().is_none());

        ring.put_many(&[("a", &b"1"[..]), ("b", &b"22"[..])]).unwrap();
        ring.put("a", b"333").unwrap();
        assert_eq!(ring.get("a").unwrap().unwrap(), b"333");
        assert_eq!(ring.list().unwrap(), vec![("a".to_string(), 3), ("b".to_string(), 2)]);

        ring.remove(&["a"]).unwrap();
        assert!(ring.get("a").unwrap().is_none());
        assert!(ring.get("b").unwrap().is_some());
    }

    #[test]
    fn bad_magic_rejected() {
        let p = tmp_path("magic");
        std::fs::write(&p, b"NOTAKEYRING12345").unwrap();
        assert!(KeyRing::open(&p).is_err());
    }
}
