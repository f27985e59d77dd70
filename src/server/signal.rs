//! # Señalización entre threads
//! src/server/signal.rs
//!
//! Rendezvous entre el thread administrativo (`start`/`stop`) y el thread
//! del listener. En vez de flags de bits hay un único estado protegido por
//! un `Mutex` y un `Condvar` que avisa cada cambio:
//!
//! ```text
//! Starting ──► Listening ──► StopRequested ──► Exited
//!     └──────► StartFailed
//! ```
//!
//! Garantías de orden:
//! - `start` no retorna antes de `Listening` o `StartFailed`
//! - el listener no sale sin haber publicado `Exited`
//! - `stop` no retorna antes de ver `Exited`

use std::net::SocketAddr;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Estado publicado por el thread del listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerState {
    /// Thread lanzado, socket todavía sin abrir
    Starting,
    /// Socket escuchando en la dirección indicada
    Listening(SocketAddr),
    /// No se pudo abrir el socket (mensaje del error de sistema)
    StartFailed(String),
    /// El thread administrativo pidió detener el servidor
    StopRequested,
    /// El listener cerró el socket y terminó su loop
    Exited,
}

/// Objeto de señalización compartido entre ambos threads
#[derive(Debug)]
pub struct Signal {
    state: Mutex<ListenerState>,
    changed: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState::Starting),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publica un nuevo estado y despierta a quien esté esperando
    pub fn set(&self, next: ListenerState) {
        let mut state = self.lock();
        *state = next;
        self.changed.notify_all();
    }

    pub fn current(&self) -> ListenerState {
        self.lock().clone()
    }

    /// Bloquea hasta que el listener salga de `Starting`
    pub fn wait_started(&self) -> ListenerState {
        let state = self
            .changed
            .wait_while(self.lock(), |s| *s == ListenerState::Starting)
            .unwrap_or_else(PoisonError::into_inner);
        state.clone()
    }

    /// Pide detener el listener
    ///
    /// Retorna `false` si el listener ya había terminado.
    pub fn request_stop(&self) -> bool {
        let mut state = self.lock();
        if *state == ListenerState::Exited {
            return false;
        }
        *state = ListenerState::StopRequested;
        self.changed.notify_all();
        true
    }

    pub fn stop_requested(&self) -> bool {
        *self.lock() == ListenerState::StopRequested
    }

    /// Duerme hasta `timeout` o hasta que se pida stop
    ///
    /// Retorna `true` si se pidió stop.
    pub fn wait_for_stop(&self, timeout: Duration) -> bool {
        let (state, _) = self
            .changed
            .wait_timeout_while(self.lock(), timeout, |s| *s != ListenerState::StopRequested)
            .unwrap_or_else(PoisonError::into_inner);
        *state == ListenerState::StopRequested
    }

    /// Bloquea hasta que el listener publique `Exited`
    ///
    /// Con `timeout` retorna `false` si venció antes.
    pub fn wait_exited(&self, timeout: Option<Duration>) -> bool {
        let not_exited = |s: &mut ListenerState| *s != ListenerState::Exited;
        match timeout {
            None => {
                let _state = self
                    .changed
                    .wait_while(self.lock(), not_exited)
                    .unwrap_or_else(PoisonError::into_inner);
                true
            }
            Some(timeout) => {
                let (_state, result) = self
                    .changed
                    .wait_timeout_while(self.lock(), timeout, not_exited)
                    .unwrap_or_else(PoisonError::into_inner);
                !result.timed_out()
            }
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

/// Publica `Exited` al salir del scope, incluso si el thread entra en pánico
pub(crate) struct ExitGuard<'a>(pub(crate) &'a Signal);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.set(ListenerState::Exited);
    }
}
