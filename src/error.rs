//! # Errores del Servidor
//! src/error.rs
//!
//! Taxonomía de errores compartida por todo el crate:
//!
//! - **Argumento inválido**: parámetro vacío o fuera de rango
//! - **Parseo**: request line con método desconocido o malformada
//! - **Transporte**: fallos de socket (bind, listen, accept, send, recv)
//! - **Secuencia**: llamadas fuera de orden (doble respuesta, escritura
//!   sin respuesta previa, ciclo de vida incorrecto)

use crate::http::request::ParseError;
use thiserror::Error;

/// Alias de resultado para las operaciones del servidor
pub type Result<T> = std::result::Result<T, Error>;

/// Errores que puede reportar el servidor
#[derive(Debug, Error)]
pub enum Error {
    /// Parámetro requerido vacío o inválido
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Request que no se pudo parsear (la conexión se descarta)
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Fallo del socket subyacente
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Fallo leyendo el body; `received` bytes ya fueron copiados al buffer
    #[error("Body read failed after {received} bytes: {source}")]
    BodyRead {
        received: usize,
        #[source]
        source: std::io::Error,
    },

    /// Operación llamada fuera de orden
    #[error("Sequencing violation: {0}")]
    Sequence(&'static str),

    /// El terminador de headers no cupo en el buffer de recepción
    #[error("Header block exceeds {0} bytes")]
    HeaderOverflow(usize),

    /// El thread del listener no pudo abrir el socket
    #[error("Server start failed: {0}")]
    StartFailed(String),

    /// El thread del listener terminó por un pánico
    #[error("Listener thread panicked")]
    ThreadPanicked,
}

impl Error {
    /// Indica si el error proviene del socket (la conexión ya no es usable)
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::BodyRead { .. })
    }
}
