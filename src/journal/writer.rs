//! journal/writer — SecureAppendLog: журнал с HMAC-цепочкой и периодическими подписями.
//!
//! Состояния: Uninitialized -> Open -> Closing -> Closed, а также Open -> Rotating -> Open.
//!
//! Все публичные операции сериализуются на одном Mutex<Inner>. Хуки ротации и
//! принудительная подпись — методы уже захваченного Inner. Фоновая подпись
//! выполняется потоком SignatureScheduler и берёт тот же замок.
//!
//! Порядок замков: writer (Inner) -> scheduler. Поток таймера вызывает задачу
//! без замка scheduler, поэтому обратного порядка нет.
//!
//! Строка данных:  v1,...,vN,"<base64 hmac>",""
//! Строка подписи: "",...,"","","<base64 signature>"
//!
//! Коммит строки: строка целиком записана и сброшена в backend. Неудачная
//! запись откатывается (truncate до прежней длины), состояние цепочки не
//! двигается. CurrentKey/CurrentSignature пишутся в keystore после коммита;
//! сбой keystore в этот момент строку не отменяет: записи помечаются грязными
//! и догоняются следующей операцией, close() или ротацией.

use log::{debug, error, info, trace, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use super::backend::{FileBackend, LogBackend};
use super::rotation::{FileRotator, RotationContext, RotationCoordinator, RotationHooks};
use super::scheduler::SignatureScheduler;
use crate::config::ChainLogConfig;
use crate::crypto::{b64_encode, data_to_sign, HmacChainCalculator, SymmetricKey};
use crate::error::{AuditLogError, Result};
use crate::format::{check_record, hmac_input, secure_header, Record, RecordFormatter, HEADER_HMAC, HEADER_SIGNATURE};
use crate::keystore::SecureKeyStore;
use crate::lock::{try_lock_writer, LockGuard};
use crate::metrics;
use crate::verify::{read_header, ChainVerifier};

const CLOSE_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    Uninitialized,
    Open,
    Rotating,
    Closing,
    Closed,
}

/// Копия состояния цепочки (диагностика, тесты).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub current_key: SymmetricKey,
    pub last_hmac: Option<String>,
    pub last_signature: Option<Vec<u8>>,
}

pub struct SecureAppendLog {
    inner: Arc<Mutex<Inner>>,
    scheduler: Arc<SignatureScheduler>,
}

struct Inner {
    path: PathBuf,
    columns: Vec<String>,
    formatter: RecordFormatter,
    keystore: Arc<dyn SecureKeyStore>,
    config: ChainLogConfig,
    scheduler: Arc<SignatureScheduler>,
    coordinator: Option<Box<dyn RotationCoordinator>>,

    backend: Option<Box<dyn LogBackend>>,
    /// backend — файл `path` (его можно переоткрыть и проверить).
    file_backed: bool,
    calculator: HmacChainCalculator,
    last_hmac: Option<String>,
    last_signature: Option<Vec<u8>>,
    /// Есть строки данных после последней подписи.
    unsigned: bool,
    /// CurrentKey в keystore отстаёт от калькулятора.
    key_dirty: bool,
    /// CurrentSignature в keystore отстаёт от last_signature.
    signature_dirty: bool,
    /// Старый файл уже в архиве со своими ключами, живой файл надо начать заново.
    restart_pending: bool,
    state: LogState,
    _lock: Option<LockGuard>,
}

struct ResumeState {
    current_key: SymmetricKey,
    last_hmac: Option<String>,
    last_signature: Option<Vec<u8>>,
    /// Хвост без подписи после сбоя; подписывается сразу при открытии.
    unsigned: bool,
}

impl SecureAppendLog {
    /// Открыть журнал; при max_file_size > 0 ротация по размеру (FileRotator
    /// с политикой хранения из конфигурации).
    pub fn open(
        path: &Path,
        columns: Vec<String>,
        keystore: Arc<dyn SecureKeyStore>,
        config: ChainLogConfig,
    ) -> Result<Self> {
        let coordinator: Option<Box<dyn RotationCoordinator>> = if config.max_file_size > 0 {
            Some(Box::new(
                FileRotator::new(config.max_file_size).with_retention(config.retention()),
            ))
        } else {
            None
        };
        Self::open_with(path, columns, keystore, config, coordinator)
    }

    /// Открыть журнал с явным координатором ротации (None — мягкая ротация).
    pub fn open_with(
        path: &Path,
        columns: Vec<String>,
        keystore: Arc<dyn SecureKeyStore>,
        config: ChainLogConfig,
        coordinator: Option<Box<dyn RotationCoordinator>>,
    ) -> Result<Self> {
        validate_columns(&columns)?;
        let lock = try_lock_writer(path)?;
        let formatter = RecordFormatter::new(config.csv_format());
        let existing = std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);

        let mut inner = if existing {
            let resumed = load_resume_state(path, &columns, &formatter, keystore.as_ref())?;
            let backend = FileBackend::open(path, config.fsync)?;
            info!(
                "resuming secure log {} (last signature: {})",
                path.display(),
                if resumed.last_signature.is_some() { "present" } else { "none" }
            );
            let mut inner = Inner::new(path, columns, formatter, keystore, config, resumed.current_key);
            inner.backend = Some(Box::new(backend));
            inner.last_hmac = resumed.last_hmac;
            inner.last_signature = resumed.last_signature;
            inner.unsigned = resumed.unsigned;
            if inner.unsigned {
                inner.write_signature_locked()?;
            }
            inner
        } else {
            let key = SymmetricKey::random();
            let mut inner = Inner::new(path, columns, formatter, keystore, config, key.clone());
            let backend = FileBackend::open(path, inner.config.fsync)?;
            inner.start_chain(key, Box::new(backend))?;
            info!("created secure log {}", path.display());
            inner
        };
        inner.file_backed = true;
        inner.coordinator = coordinator;
        inner._lock = Some(lock);
        Self::start(inner)
    }

    /// Новый журнал поверх произвольного backend. `name` именует журнал в
    /// логах; файловой блокировки и ротации нет, продолжение существующего
    /// содержимого возможно только с файловым backend.
    pub fn open_with_backend(
        name: &Path,
        columns: Vec<String>,
        keystore: Arc<dyn SecureKeyStore>,
        config: ChainLogConfig,
        backend: Box<dyn LogBackend>,
    ) -> Result<Self> {
        validate_columns(&columns)?;
        if !backend.is_empty() {
            return Err(AuditLogError::Format(format!(
                "backend of {} is not empty; resuming needs the file backend",
                name.display()
            )));
        }
        let formatter = RecordFormatter::new(config.csv_format());
        let key = SymmetricKey::random();
        let mut inner = Inner::new(name, columns, formatter, keystore, config, key.clone());
        inner.start_chain(key, backend)?;
        debug!("secure log {} started over a custom backend", name.display());
        Self::start(inner)
    }

    fn start(mut inner: Inner) -> Result<Self> {
        inner.state = LogState::Open;
        let scheduler = inner.scheduler.clone();
        let thread_name = format!(
            "chainlog-sig-{}",
            inner.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        );
        let inner = Arc::new(Mutex::new(inner));
        let weak = Arc::downgrade(&inner);
        scheduler.spawn(&thread_name, move || signature_task(&weak))?;
        Ok(Self { inner, scheduler })
    }

    /// Добавить событие: HMAC, строка данных, сохранение CurrentKey,
    /// планирование подписи; затем проверка политики ротации.
    pub fn append(&self, record: &Record) -> Result<()> {
        let mut inner = self.lock()?;
        inner.ensure_open()?;
        check_record(record, &inner.columns)?;
        inner.append_locked(record)?;

        let interval = inner.config.signature_interval();
        self.scheduler.schedule_if_idle(interval);

        let len = inner.backend.as_ref().map(|b| b.len()).unwrap_or(0);
        let due = inner
            .coordinator
            .as_ref()
            .map(|c| c.should_rotate(len))
            .unwrap_or(false);
        if due {
            debug!("size policy fired at {} bytes", len);
            rotate_locked(&mut inner)?;
        }
        Ok(())
    }

    /// Немедленно записать строку подписи (без данных — no-op).
    pub fn write_signature(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.ensure_writable()?;
        inner.write_signature_locked().map(|_| ())
    }

    /// Ротация: через координатор, иначе мягкая (закрыть и переоткрыть тот же файл).
    /// Возвращает путь архивного файла, если он был создан.
    pub fn force_rotation(&self) -> Result<Option<PathBuf>> {
        let mut inner = self.lock()?;
        inner.ensure_open()?;
        rotate_locked(&mut inner)
    }

    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock()?;
        inner.ensure_writable()?;
        inner.backend_mut()?.flush()?;
        inner.flush_keystore()
    }

    /// Отменить ожидающую подпись, записать финальную, дождаться
    /// выполняющейся задачи, закрыть файл. Повторный вызов — no-op.
    pub fn close(&self) -> Result<()> {
        let mut first_err: Option<AuditLogError> = None;
        {
            let mut inner = self.lock()?;
            match inner.state {
                LogState::Closed | LogState::Closing => return Ok(()),
                _ => {}
            }
            // отменённая задача подписала бы хвост; если хвост уже подписан, подпись не нужна
            let cancelled = self.scheduler.cancel();
            if inner.unsigned {
                trace!("writing final signature (cancelled pending task: {})", cancelled);
                if let Err(e) = inner.write_signature_locked() {
                    error!("final signature for {} failed: {}", inner.path.display(), e);
                    first_err = Some(e);
                }
            }
            if let Err(e) = inner.flush_keystore() {
                error!("keystore entries of {} are stale: {}", inner.path.display(), e);
                first_err.get_or_insert(e);
            }
            inner.state = LogState::Closing;
        }

        if !self.scheduler.wait_idle(CLOSE_WAIT) {
            warn!("closing while a signature task is still running");
        }
        self.scheduler.shutdown();

        let mut inner = self.lock()?;
        if let Some(mut backend) = inner.backend.take() {
            if let Err(e) = backend.flush().and_then(|_| backend.close()) {
                first_err.get_or_insert(e);
            }
        }
        inner.state = LogState::Closed;
        inner._lock = None;
        info!("secure log {} closed", inner.path.display());
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn state(&self) -> LogState {
        match self.inner.lock() {
            Ok(g) => g.state,
            Err(p) => p.into_inner().state,
        }
    }

    pub fn chain_snapshot(&self) -> Result<ChainState> {
        let inner = self.lock()?;
        Ok(ChainState {
            current_key: inner.calculator.current_key().clone(),
            last_hmac: inner.last_hmac.clone(),
            last_signature: inner.last_signature.clone(),
        })
    }

    pub fn path(&self) -> Result<PathBuf> {
        Ok(self.lock()?.path.clone())
    }

    /// Заголовок файла целиком (колонки + HMAC + SIGNATURE).
    pub fn header(&self) -> Result<Vec<String>> {
        Ok(secure_header(&self.lock()?.columns))
    }

    /// Текущий размер живого файла в байтах.
    pub fn len(&self) -> Result<u64> {
        Ok(self.lock()?.backend.as_ref().map(|b| b.len()).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AuditLogError::Io(std::io::Error::other("writer mutex poisoned")))
    }
}

impl Drop for SecureAppendLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("secure log close on drop failed: {}", e);
        }
    }
}

fn signature_task(weak: &Weak<Mutex<Inner>>) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let mut inner = match shared.lock() {
        Ok(g) => g,
        Err(_) => {
            error!("writer mutex poisoned, scheduled signature dropped");
            return;
        }
    };
    if !matches!(inner.state, LogState::Open | LogState::Closing) || !inner.unsigned {
        trace!("scheduled signature not needed");
        return;
    }
    if let Err(e) = inner.write_signature_locked() {
        metrics::record_signature_failure();
        error!("an error occurred while writing the signature: {}", e);
        if inner.state == LogState::Open {
            let interval = inner.config.signature_interval();
            inner.scheduler.schedule_if_idle(interval);
        }
    }
}

fn rotate_locked(inner: &mut MutexGuard<'_, Inner>) -> Result<Option<PathBuf>> {
    let live = inner.path.clone();
    let res = match inner.coordinator.take() {
        None => inner.soft_rotate().map(|_| None),
        Some(mut coordinator) => {
            let r = coordinator.rotate(&live, &mut **inner);
            inner.coordinator = Some(coordinator);
            r.map(Some)
        }
    };
    match res {
        Ok(archived) => {
            if archived.is_some() {
                metrics::record_rotation();
            }
            Ok(archived)
        }
        Err(e) => {
            error!("rotation of {} failed: {}", live.display(), e);
            if let Err(re) = inner.recover_from_rotation() {
                error!("{} stays unavailable after failed rotation: {}", live.display(), re);
            }
            Err(e)
        }
    }
}

impl Inner {
    fn new(
        path: &Path,
        columns: Vec<String>,
        formatter: RecordFormatter,
        keystore: Arc<dyn SecureKeyStore>,
        config: ChainLogConfig,
        key: SymmetricKey,
    ) -> Self {
        Inner {
            path: path.to_path_buf(),
            columns,
            formatter,
            keystore,
            config,
            scheduler: Arc::new(SignatureScheduler::new()),
            coordinator: None,
            backend: None,
            file_backed: false,
            calculator: HmacChainCalculator::new(key),
            last_hmac: None,
            last_signature: None,
            unsigned: false,
            key_dirty: false,
            signature_dirty: false,
            restart_pending: false,
            state: LogState::Uninitialized,
            _lock: None,
        }
    }

    /// Open; после неудачной ротации сначала попытка восстановиться.
    fn ensure_open(&mut self) -> Result<()> {
        if self.state == LogState::Rotating {
            self.recover_from_rotation()?;
        }
        match self.state {
            LogState::Open => Ok(()),
            _ => Err(AuditLogError::Closed),
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        match self.state {
            LogState::Open | LogState::Closing | LogState::Rotating => Ok(()),
            LogState::Uninitialized | LogState::Closed => Err(AuditLogError::Closed),
        }
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn LogBackend>> {
        self.backend.as_mut().ok_or(AuditLogError::Closed)
    }

    /// Новая цепочка в пустом `backend`: ключ в InitialKey/CurrentKey, строка заголовка.
    fn start_chain(&mut self, key: SymmetricKey, mut backend: Box<dyn LogBackend>) -> Result<()> {
        self.keystore.write_initial_key(&key).map_err(AuditLogError::into_io)?;
        self.keystore.write_current_key(&key).map_err(AuditLogError::into_io)?;
        self.calculator.set_current_key(key);
        self.last_hmac = None;
        self.unsigned = false;
        self.key_dirty = false;

        let line = self.formatter.format_header(&secure_header(&self.columns))?;
        backend.append_row(&line)?;
        backend.flush()?;
        self.backend = Some(backend);
        Ok(())
    }

    /// Живой файл после архивации: новые ключи, заголовок, строка 2 с подписью
    /// предыдущего файла. Остатки неудачной попытки удаляются.
    fn start_next_file(&mut self) -> Result<()> {
        self.backend = None;
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            debug!("discarded partial {}", self.path.display());
        }
        let backend = FileBackend::open(&self.path, self.config.fsync)?;
        self.start_chain(SymmetricKey::random(), Box::new(backend))?;
        if let Some(signature) = self.last_signature.clone() {
            self.write_signature_row(&signature)?;
            self.keystore
                .write_current_signature(&signature)
                .map_err(AuditLogError::into_io)?;
            self.signature_dirty = false;
            trace!("signature of the previous file carried over");
        }
        self.restart_pending = false;
        self.state = LogState::Open;
        Ok(())
    }

    fn reopen_resumed(&mut self) -> Result<()> {
        self.backend = None;
        let resumed = load_resume_state(&self.path, &self.columns, &self.formatter, self.keystore.as_ref())?;
        self.calculator.set_current_key(resumed.current_key);
        self.last_hmac = resumed.last_hmac;
        self.last_signature = resumed.last_signature;
        self.unsigned = resumed.unsigned;
        self.backend = Some(Box::new(FileBackend::open(&self.path, self.config.fsync)?));
        self.state = LogState::Open;
        if self.unsigned {
            self.write_signature_locked()?;
        }
        Ok(())
    }

    /// Вернуть писатель в Open после неудачной ротации: файл на месте —
    /// продолжить его, старый файл уже в архиве — начать новый.
    fn recover_from_rotation(&mut self) -> Result<()> {
        if self.state != LogState::Rotating {
            return Ok(());
        }
        if self.restart_pending {
            self.start_next_file()?;
        } else if self.backend.is_some() {
            self.state = LogState::Open;
        } else if self.file_backed {
            self.reopen_resumed()?;
        } else {
            return Err(AuditLogError::Closed);
        }
        info!("{} usable again after failed rotation", self.path.display());
        Ok(())
    }

    /// Записать строку целиком или ничего: при ошибке backend откатывается
    /// к прежней длине.
    fn write_line(&mut self, line: &[u8]) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(AuditLogError::Closed)?;
        let before = backend.len();
        let res = backend.append_row(line).and_then(|_| backend.flush());
        let Err(e) = res else {
            return Ok(());
        };
        if let Err(te) = backend.truncate(before) {
            // хвост файла неизвестен: дальнейшие строки сломали бы цепочку
            error!(
                "rollback of {} to {} bytes failed, log closed: {}",
                self.path.display(),
                before,
                te
            );
            self.backend = None;
            self.state = LogState::Closed;
        }
        Err(e)
    }

    fn append_locked(&mut self, record: &Record) -> Result<()> {
        let mut next = HmacChainCalculator::new(self.calculator.current_key().clone());
        let hmac = next.calculate(&hmac_input(record, &self.columns))?;

        let values = self.columns.iter().map(|c| record.get(c).unwrap_or(""));
        let line = self
            .formatter
            .format_cells(values.chain([hmac.as_str(), ""]))?;

        if let Err(e) = self.write_line(&line) {
            metrics::record_append_failure();
            return Err(e);
        }

        self.calculator = next;
        self.last_hmac = Some(hmac);
        self.unsigned = true;
        self.key_dirty = true;
        metrics::record_append(line.len());
        self.flush_keystore_deferred();
        Ok(())
    }

    /// Подписать last_signature ‖ decode(last_hmac) и записать строку подписи.
    /// false — данных ещё нет, подписывать нечего.
    fn write_signature_locked(&mut self) -> Result<bool> {
        let Some(last_hmac) = self.last_hmac.as_deref() else {
            debug!("no data row in {} yet, signature skipped", self.path.display());
            return Ok(false);
        };
        let data = data_to_sign(self.last_signature.as_deref(), last_hmac)
            .map_err(|e| AuditLogError::Crypto(format!("{:#}", e)))?;
        let signature = self.keystore.sign(&data).map_err(AuditLogError::into_io)?;
        trace!("calculated new signature");

        self.write_signature_row(&signature)?;
        self.last_signature = Some(signature);
        self.unsigned = false;
        self.key_dirty = true;
        self.signature_dirty = true;
        self.flush_keystore_deferred();
        Ok(true)
    }

    fn write_signature_row(&mut self, signature: &[u8]) -> Result<()> {
        let encoded = b64_encode(signature);
        let blanks = std::iter::repeat("").take(self.columns.len() + 1);
        let line = self.formatter.format_cells(blanks.chain([encoded.as_str()]))?;
        self.write_line(&line)?;
        metrics::record_signature(line.len());
        Ok(())
    }

    /// Догнать CurrentKey / CurrentSignature в keystore.
    fn flush_keystore(&mut self) -> Result<()> {
        if self.key_dirty {
            self.keystore
                .write_current_key(self.calculator.current_key())
                .map_err(AuditLogError::into_io)?;
            self.key_dirty = false;
        }
        if self.signature_dirty {
            if let Some(signature) = self.last_signature.as_deref() {
                self.keystore
                    .write_current_signature(signature)
                    .map_err(AuditLogError::into_io)?;
            }
            self.signature_dirty = false;
            trace!("signature written to keystore");
        }
        Ok(())
    }

    /// То же после уже закоммиченной строки: ошибка не отменяет строку.
    fn flush_keystore_deferred(&mut self) {
        if let Err(e) = self.flush_keystore() {
            warn!(
                "keystore update for {} deferred, will retry: {}",
                self.path.display(),
                e
            );
        }
    }

    fn soft_rotate(&mut self) -> Result<()> {
        self.state = LogState::Rotating;
        self.scheduler.cancel();
        if self.unsigned {
            self.write_signature_locked()?;
        }
        self.flush_keystore()?;
        if !self.file_backed {
            self.backend_mut()?.flush()?;
            self.state = LogState::Open;
            debug!("soft rotation of {}: backend kept", self.path.display());
            return Ok(());
        }
        if let Some(mut backend) = self.backend.take() {
            backend.flush()?;
            backend.close()?;
        }
        self.reopen_resumed()?;
        info!("soft rotation of {} done", self.path.display());
        Ok(())
    }
}

impl RotationHooks for Inner {
    fn pre_rotation_action(&mut self, ctx: &RotationContext) -> Result<()> {
        if !self.file_backed {
            return Err(AuditLogError::Format(format!(
                "{} is not file backed and cannot be rotated",
                ctx.live_path.display()
            )));
        }
        self.state = LogState::Rotating;
        self.scheduler.cancel();
        if self.unsigned {
            self.write_signature_locked()?;
        }
        // архив уносит записи keystore: они должны совпадать с файлом
        self.flush_keystore()?;
        if let Some(mut backend) = self.backend.take() {
            backend.flush()?;
            backend.close()?;
        }
        debug!("chain segment of {} closed", ctx.live_path.display());
        Ok(())
    }

    fn post_rotation_action(&mut self, ctx: &RotationContext) -> Result<()> {
        if let Err(e) = self.keystore.archive(&ctx.archived_path) {
            // записи ключей остались у живого имени: файл возвращается на место
            match std::fs::rename(&ctx.archived_path, &ctx.live_path) {
                Ok(()) => warn!(
                    "keystore archive failed, {} restored",
                    ctx.live_path.display()
                ),
                Err(re) => error!(
                    "keystore archive failed and {} could not be restored: {}",
                    ctx.live_path.display(),
                    re
                ),
            }
            return Err(e.into_io());
        }
        self.restart_pending = true;
        self.start_next_file()
    }
}

fn validate_columns(columns: &[String]) -> Result<()> {
    if columns.is_empty() {
        return Err(AuditLogError::Format("header must have at least one column".into()));
    }
    for (i, c) in columns.iter().enumerate() {
        if c == HEADER_HMAC || c == HEADER_SIGNATURE {
            return Err(AuditLogError::Format(format!("column name '{}' is reserved", c)));
        }
        if columns[..i].contains(c) {
            return Err(AuditLogError::Format(format!("duplicate column '{}'", c)));
        }
    }
    Ok(())
}

/// Проверить существующий файл и восстановить состояние цепочки.
/// Файл не модифицируется.
fn load_resume_state(
    path: &Path,
    columns: &[String],
    formatter: &RecordFormatter,
    keystore: &dyn SecureKeyStore,
) -> Result<ResumeState> {
    let expected = secure_header(columns);
    let found = read_header(path, formatter.format())?;
    if found != expected {
        return Err(AuditLogError::Format(format!(
            "header of {} does not match: expected {:?}, found {:?}",
            path.display(),
            expected,
            found
        )));
    }

    let res = ChainVerifier::new(formatter.format())
        .verify(path, keystore)
        .map_err(AuditLogError::into_io)?;
    let unsigned = !res.ok && res.missing_final_signature;
    let res = if unsigned {
        warn!(
            "{} ends without a signature; chain and CurrentKey match, resuming",
            path.display()
        );
        res
    } else {
        res.into_result()?
    };

    let current_key = keystore
        .read_current_key()
        .map_err(AuditLogError::into_io)?
        .ok_or_else(|| {
            AuditLogError::Io(std::io::Error::other(format!(
                "no CurrentKey entry for resumed log {}",
                path.display()
            )))
        })?;

    Ok(ResumeState {
        current_key,
        last_hmac: res.last_hmac,
        last_signature: res.last_signature,
        unsigned,
    })
}
