//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto con backlog de uno
//! 2. Acepta una conexión por vez
//! 3. Lee los headers, resuelve la ruta y llama al handler
//! 4. Cierra el socket cuando el handler termina
//!
//! Los handlers reciben un [`Exchange`] con el request parseado y las
//! operaciones para leer el body y escribir la respuesta.

pub mod connection;
pub mod exchange;
pub mod signal;
pub mod tcp;
pub mod transport;

// Re-exportar para facilitar el uso
pub use connection::{serve_connection, ConnectionState, Outcome};
pub use exchange::Exchange;
pub use tcp::{HttpServer, ServerConfig, ServerState};
pub use transport::Transport;
