//! # Módulo HTTP
//!
//! Este módulo implementa el lado "puro" del protocolo HTTP/1.x, sin tocar
//! sockets:
//!
//! - Parsing de la request line, query string y headers
//! - Construcción de la cabecera de respuesta
//! - Códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! POST /connect?mode=ap HTTP/1.1\r\n
//! Content-Length: 5\r\n
//! \r\n
//! hello
//! ```
//!
//! ### Formato de Response
//!
//! ```text
//! HTTP/1.1 200\r\n
//! Content-Type: text/plain\r\n
//! Content-Length: 4\r\n
//! Connection: close\r\n
//! \r\n
//! Done
//! ```

pub mod request;   // Parsing de HTTP requests
pub mod response;  // Construcción de HTTP responses
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Header, Method, ParseError, QueryParam, Request, Version};
pub use response::{content_type, Response};
pub use status::StatusCode;
