//! # Embedded HTTP
//! src/lib.rs
//!
//! Servidor HTTP/1.x mínimo para dispositivos embebidos: un solo thread de
//! escucha, una conexión por vez, sockets bloqueantes y un buffer fijo de
//! recepción de headers. Cada request se atiende de principio a fin y la
//! conexión se cierra (`Connection: close`).
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: parseo del request y construcción de respuestas
//! - `router`: tabla ordenada de handlers por path exacto
//! - `server`: listener, máquina de estados de la conexión, lector de body
//!   y escritor de respuesta
//! - `config`: configuración CLI/env del binario de demostración
//! - `error`: taxonomía de errores compartida
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use embedded_http::http::{Response, StatusCode};
//! use embedded_http::server::{Exchange, HttpServer, ServerConfig};
//!
//! fn hello(exchange: &mut Exchange<'_>) -> embedded_http::Result<()> {
//!     exchange.send_response(&Response::text(StatusCode::OK, "Hola"))
//! }
//!
//! let mut server = HttpServer::new(ServerConfig::new(8080).with_handler("/hello", hello))?;
//! server.start()?;
//! # server.stop()?;
//! # Ok::<(), embedded_http::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod router;
pub mod server;

pub use error::{Error, Result};
