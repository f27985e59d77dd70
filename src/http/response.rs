//! # Construcción de Respuestas HTTP
//!
//! Una [`Response`] describe lo que el handler quiere enviar: código,
//! `Content-Type`, headers propios, los bytes disponibles ya y el total de
//! bytes prometidos. Si el total supera lo disponible, el resto se envía
//! después con [`Exchange::write_data`](crate::server::Exchange::write_data).
//!
//! ## Formato emitido
//!
//! ```text
//! HTTP/1.1 200\r\n
//! Content-Type: text/plain\r\n
//! Content-Length: 2\r\n
//! X-Custom: value\r\n
//! Connection: close\r\n
//! \r\n
//! OK
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use embedded_http::http::{content_type, Response, StatusCode, Version};
//!
//! let response = Response::new(StatusCode::OK)
//!     .with_content_type(content_type::TEXT_PLAIN)
//!     .with_body("OK");
//!
//! let head = response.head(Version::Http11);
//! assert!(head.starts_with(b"HTTP/1.1 200\r\n"));
//! ```

use super::{StatusCode, Version};

/// Terminador fijo: el servidor siempre cierra la conexión
pub const CONNECTION_CLOSE: &str = "Connection: close\r\n\r\n";

/// Valores de `Content-Type` de uso común
pub mod content_type {
    pub const TEXT_HTML: &str = "text/html";
    pub const TEXT_PLAIN: &str = "text/plain";
    pub const TEXT_CSS: &str = "text/css";
    pub const TEXT_XML: &str = "text/xml";
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_JAVASCRIPT: &str = "application/javascript";
    pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
    pub const IMAGE_PNG: &str = "image/png";
    pub const IMAGE_JPEG: &str = "image/jpeg";
}

/// Respuesta construida por un handler
///
/// Se consume de forma síncrona en `send_response` y no se retiene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    content_type: Option<String>,
    /// Headers del handler, en el orden en que se agregaron
    headers: Vec<(String, String)>,
    /// Bytes disponibles ahora (`current_data_length`)
    data: Vec<u8>,
    /// Total de bytes prometidos (`expected_data_length`)
    expected_length: usize,
}

impl Response {
    /// Crea una respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: Vec::new(),
            data: Vec::new(),
            expected_length: 0,
        }
    }

    /// Respuesta de texto plano con el body completo
    pub fn text(status: StatusCode, body: &str) -> Self {
        Self::new(status)
            .with_content_type(content_type::TEXT_PLAIN)
            .with_body(body)
    }

    /// Respuesta JSON exitosa (200)
    pub fn json(body: &str) -> Self {
        Self::new(StatusCode::OK)
            .with_content_type(content_type::APPLICATION_JSON)
            .with_body(body)
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// Agrega un header; los duplicados se emiten tal cual
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Establece el body completo desde un string
    ///
    /// El total prometido pasa a ser la longitud del body.
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    /// Establece el body completo desde bytes
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.expected_length = body.len();
        self.data = body;
        self
    }

    /// Entrega solo una parte del body ahora
    ///
    /// `data` son los bytes disponibles y `expected_length` el total que se
    /// anuncia en `Content-Length`. La diferencia queda adeudada.
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_http::http::{Response, StatusCode};
    ///
    /// let response = Response::new(StatusCode::OK).with_partial_body(b"abc".to_vec(), 10);
    /// assert_eq!(response.current_data_length(), 3);
    /// assert_eq!(response.expected_data_length(), 10);
    /// ```
    pub fn with_partial_body(mut self, data: Vec<u8>, expected_length: usize) -> Self {
        self.data = data;
        self.expected_length = expected_length;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn current_data_length(&self) -> usize {
        self.data.len()
    }

    pub fn expected_data_length(&self) -> usize {
        self.expected_length
    }

    /// Bytes que quedarán adeudados después de enviar la cabecera y `data`
    pub fn owed_length(&self) -> usize {
        self.expected_length.saturating_sub(self.data.len())
    }

    /// Serializa la cabecera de la respuesta
    ///
    /// Orden: status line, `Content-Type` (si hay), `Content-Length` (si el
    /// total es distinto de cero), headers del handler y `Connection: close`.
    pub fn head(&self, version: Version) -> Vec<u8> {
        let mut head = format!("{} {}\r\n", version, self.status.as_u16());

        if let Some(content_type) = &self.content_type {
            head.push_str("Content-Type: ");
            head.push_str(content_type);
            head.push_str("\r\n");
        }

        if self.expected_length > 0 {
            head.push_str(&format!("Content-Length: {}\r\n", self.expected_length));
        }

        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }

        head.push_str(CONNECTION_CLOSE);
        head.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::OK);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().is_empty());
        assert!(response.data().is_empty());
        assert_eq!(response.expected_data_length(), 0);
    }

    #[test]
    fn test_head_matches_wire_format() {
        let response = Response::text(StatusCode::OK, "OK");
        let head = response.head(Version::Http11);

        assert_eq!(
            head,
            b"HTTP/1.1 200\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn test_head_mirrors_request_version() {
        let head = Response::new(StatusCode::NOT_FOUND).head(Version::Http10);
        assert_eq!(head, b"HTTP/1.0 404\r\nConnection: close\r\n\r\n");
    }

    #[test]
    fn test_custom_headers_keep_order() {
        let response = Response::new(StatusCode::OK)
            .with_header("Server", "embedded")
            .with_header("X-A", "1")
            .with_header("X-A", "2");

        let text = String::from_utf8(response.head(Version::Http11)).unwrap();
        assert!(text.contains("Server: embedded\r\nX-A: 1\r\nX-A: 2\r\nConnection: close\r\n\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(!text.contains("Content-Type"));
    }

    #[test]
    fn test_partial_body_announces_total() {
        let response = Response::new(StatusCode::OK).with_partial_body(b"abc".to_vec(), 10);

        assert_eq!(response.owed_length(), 7);
        let text = String::from_utf8(response.head(Version::Http11)).unwrap();
        assert!(text.contains("Content-Length: 10\r\n"));
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(r#"{"status": "ok"}"#);

        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.data(), br#"{"status": "ok"}"#);
        assert_eq!(response.owed_length(), 0);
    }
}
