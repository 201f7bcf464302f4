//! journal/scheduler — отменяемый таймер фоновой подписи.
//!
//! Один рабочий поток на писателя. Состояние под Mutex + Condvar:
//! - deadline   — момент запуска запланированной задачи (None = ничего не ждём);
//! - generation — счётчик изменений deadline (schedule/cancel), будит поток;
//! - running    — задача уже стартовала (её нельзя отменить, можно только дождаться).
//!
//! Семантика "выстрелить или быть отменённой": cancel() успешен только пока
//! задача не стартовала.

use log::{debug, info, trace, warn};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{AuditLogError, Result};

#[derive(Debug, Default)]
struct SchedState {
    deadline: Option<Instant>,
    generation: u64,
    running: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<SchedState>,
    cv: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedState> {
        // Состояние таймера не содержит инвариантов, которые ломает паника.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct SignatureScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SignatureScheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedState::default()),
                cv: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Запустить рабочий поток. `task` вызывается без удержания замка таймера.
    pub fn spawn<F>(&self, name: &str, task: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return Ok(());
        }
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(&shared, task))
            .map_err(AuditLogError::Io)?;
        *worker = Some(handle);
        Ok(())
    }

    /// Запланировать задачу через `delay`, если ничего не запланировано.
    /// Уже выполняющаяся задача не мешает: новая строка получит свою подпись.
    pub fn schedule_if_idle(&self, delay: Duration) -> bool {
        let mut st = self.shared.lock();
        if st.shutdown || st.deadline.is_some() {
            return false;
        }
        st.deadline = Some(Instant::now() + delay);
        st.generation += 1;
        trace!("signature task scheduled in {:?} (gen={})", delay, st.generation);
        self.shared.cv.notify_all();
        true
    }

    /// Отменить запланированную (ещё не стартовавшую) задачу.
    pub fn cancel(&self) -> bool {
        let mut st = self.shared.lock();
        if st.deadline.take().is_some() {
            st.generation += 1;
            self.shared.cv.notify_all();
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.shared.lock().deadline.is_some()
    }

    /// Ограниченное ожидание завершения выполняющейся задачи.
    /// false — задача всё ещё выполняется по истечении `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let started = Instant::now();
        let mut st = self.shared.lock();
        let mut last_log = started;
        while st.running {
            let now = Instant::now();
            if now.duration_since(started) >= timeout {
                warn!("signature task still running after {:?}", timeout);
                return false;
            }
            if now.duration_since(last_log) >= Duration::from_secs(1) {
                info!("waiting for the running signature task to complete");
                last_log = now;
            }
            st = self
                .shared
                .cv
                .wait_timeout(st, Duration::from_millis(50))
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
        }
        true
    }

    /// Остановить поток (запланированная задача отбрасывается).
    pub fn shutdown(&self) {
        {
            let mut st = self.shared.lock();
            st.shutdown = true;
            st.deadline = None;
            st.generation += 1;
            self.shared.cv.notify_all();
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(h) = handle {
            if h.thread().id() == thread::current().id() {
                // последний владелец писателя — сам рабочий поток; он выйдет сам
                return;
            }
            if h.join().is_err() {
                warn!("signature worker panicked");
            }
        }
    }
}

impl Default for SignatureScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignatureScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop<F: Fn()>(shared: &Shared, task: F) {
    let mut st = shared.lock();
    loop {
        if st.shutdown {
            break;
        }
        let deadline = match st.deadline {
            None => {
                st = shared.cv.wait(st).unwrap_or_else(|e| e.into_inner());
                continue;
            }
            Some(d) => d,
        };
        let now = Instant::now();
        if now < deadline {
            let gen = st.generation;
            st = shared
                .cv
                .wait_timeout(st, deadline - now)
                .map(|(g, _)| g)
                .unwrap_or_else(|e| e.into_inner().0);
            if st.generation != gen {
                trace!("signature timer changed (gen {} -> {})", gen, st.generation);
            }
            continue;
        }

        st.deadline = None;
        st.running = true;
        let gen = st.generation;
        drop(st);

        debug!("signature task fired (gen={})", gen);
        task();

        st = shared.lock();
        st.running = false;
        shared.cv.notify_all();
    }
    trace!("signature worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn fires_after_delay_and_reschedules() {
        let hits = Arc::new(AtomicU64::new(0));
        let s = SignatureScheduler::new();
        let h = hits.clone();
        s.spawn("sig-test", move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(s.schedule_if_idle(Duration::from_millis(20)));
        assert!(!s.schedule_if_idle(Duration::from_millis(20)));
        let t0 = Instant::now();
        while hits.load(Ordering::SeqCst) == 0 && t0.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(s.wait_idle(Duration::from_secs(5)));
        assert!(!s.is_pending());
        assert!(s.schedule_if_idle(Duration::from_millis(1)));
        s.shutdown();
    }

    #[test]
    fn cancel_before_start() {
        let hits = Arc::new(AtomicU64::new(0));
        let s = SignatureScheduler::new();
        let h = hits.clone();
        s.spawn("sig-test", move || {
            h.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(s.schedule_if_idle(Duration::from_secs(30)));
        assert!(s.is_pending());
        assert!(s.cancel());
        assert!(!s.cancel());
        s.shutdown();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
