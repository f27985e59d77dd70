//! # Parsing de Requests HTTP/1.x
//! src/http/request.rs
//!
//! Parser tolerante pensado para los clientes típicos de un arnés de pruebas
//! IoT. No valida la gramática completa del RFC: solo extrae lo que el
//! servidor necesita para despachar.
//!
//! ## Formato aceptado
//!
//! ```text
//! <METHOD> <path>[?<query>] [HTTP/1.1]\r\n
//! Header-Name: Header-Value\r\n
//! Content-Length: 5\r\n
//! \r\n
//! hello
//! ```
//!
//! ## Componentes
//!
//! 1. **Request Line**: método, target y versión (opcional)
//! 2. **Query**: pares `key=value` separados por `&` (máximo
//!    [`MAX_QUERY_PARAMETERS`])
//! 3. **Headers**: se guardan tal cual; solo `Content-Length` se interpreta
//! 4. **Body**: no lo toca el parser, lo sirve el lector de body

use std::fmt;

/// Máximo de query parameters que se registran por request
pub const MAX_QUERY_PARAMETERS: usize = 8;

/// Terminador del bloque de headers
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

const CONTENT_LENGTH: &str = "Content-Length";

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
}

impl Method {
    /// Parsea el token del método (sensible a mayúsculas)
    ///
    /// # Errores
    ///
    /// Retorna error si el método no es uno de los cinco soportados
    pub fn from_token(token: &str) -> Result<Self, ParseError> {
        match token {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "HEAD" => Ok(Method::HEAD),
            _ => Err(ParseError::UnsupportedMethod(token.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Versión HTTP del request; la respuesta usa la misma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    #[default]
    Http10,
    Http11,
}

impl Version {
    /// Solo el literal exacto `HTTP/1.1` selecciona 1.1; todo lo demás es 1.0
    fn from_literal(literal: &str) -> Self {
        if literal == "HTTP/1.1" {
            Version::Http11
        } else {
            Version::Http10
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Un parámetro de la query string
///
/// `value` es `None` cuando el parámetro no trae `=` (ej: `?debug`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub key: String,
    pub value: Option<String>,
}

/// Un header del request tal como llegó por el cable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Request line sin separador entre método y target
    InvalidRequestLine,

    /// Método HTTP no soportado
    UnsupportedMethod(String),

    /// Request vacío
    EmptyRequest,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidRequestLine => write!(f, "Invalid request line format"),
            ParseError::UnsupportedMethod(m) => write!(f, "Unsupported HTTP method: {}", m),
            ParseError::EmptyRequest => write!(f, "Empty request"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Vista parseada del request en curso
///
/// Se reconstruye en cada conexión y nunca sobrevive a ella.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    version: Version,
    path: String,
    query_params: Vec<QueryParam>,
    /// Líneas de headers sin la request line, separadas por `\r\n`
    header_block: String,
    header_count: usize,
    request_data_length: usize,
}

/// Busca el terminador `\r\n\r\n` a partir de `from`
///
/// Retorna el offset del primer byte del terminador.
pub fn find_header_end(buffer: &[u8], from: usize) -> Option<usize> {
    let start = from.min(buffer.len());
    buffer[start..]
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| start + pos)
}

impl Request {
    /// Parsea el bloque de headers (sin el terminador `\r\n\r\n`)
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use embedded_http::http::{Method, Request};
    ///
    /// let request = Request::parse(b"GET /search?q=abc&limit=10 HTTP/1.1").unwrap();
    ///
    /// assert_eq!(request.method(), Method::GET);
    /// assert_eq!(request.path(), "/search");
    /// assert_eq!(request.query_param("limit"), Some("10"));
    /// ```
    pub fn parse(head: &[u8]) -> Result<Self, ParseError> {
        let text = String::from_utf8_lossy(head);
        if text.is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        let (request_line, header_block) = match text.split_once("\r\n") {
            Some((line, rest)) => (line, rest),
            None => (&text[..], ""),
        };

        let (token, rest) = request_line
            .split_once(' ')
            .ok_or(ParseError::InvalidRequestLine)?;
        let method = Method::from_token(token)?;

        let (target, version) = match rest.split_once(' ') {
            Some((target, literal)) => (target, Version::from_literal(literal)),
            None => (rest, Version::Http10),
        };

        let (path, query_params) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query_string(query)),
            None => (target, Vec::new()),
        };

        let mut header_count = 0;
        let mut request_data_length = 0;
        if !header_block.is_empty() {
            for line in header_block.split("\r\n") {
                header_count += 1;
                if line.starts_with(CONTENT_LENGTH) {
                    if let Some(length) = parse_content_length(line) {
                        request_data_length = length;
                    }
                }
            }
        }

        Ok(Request {
            method,
            version,
            path: path.to_string(),
            query_params,
            header_block: header_block.to_string(),
            header_count,
            request_data_length,
        })
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Obtiene el path del request (sin query string)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene todos los query parameters en orden de llegada
    pub fn query_params(&self) -> &[QueryParam] {
        &self.query_params
    }

    /// Obtiene el valor del primer query parameter con ese nombre
    ///
    /// Un parámetro sin `=` se reporta como `None`, igual que uno ausente.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|p| p.key == name)
            .and_then(|p| p.value.as_deref())
    }

    /// Cantidad de líneas de header recibidas
    pub fn header_count(&self) -> usize {
        self.header_count
    }

    /// Longitud declarada del body (`Content-Length`, 0 si no vino)
    pub fn request_data_length(&self) -> usize {
        self.request_data_length
    }

    /// Itera los headers en orden de llegada
    ///
    /// La clave pierde los espacios previos a `:` y el valor los espacios y
    /// tabs posteriores. Las líneas sin `:` se omiten.
    pub fn headers(&self) -> impl Iterator<Item = Header<'_>> {
        self.header_block
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                Some(Header {
                    key: key.trim_end_matches(' '),
                    value: value.trim_start_matches([' ', '\t']),
                })
            })
    }

    /// Obtiene un header específico (nombre sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers()
            .find(|h| h.key.eq_ignore_ascii_case(name))
            .map(|h| h.value)
    }
}

/// Separa la query string en parámetros
///
/// Ejemplo: "q=abc&limit=10&debug"
/// Retorna: [("q", "abc"), ("limit", "10"), ("debug", None)]
fn parse_query_string(query: &str) -> Vec<QueryParam> {
    query
        .split('&')
        .take(MAX_QUERY_PARAMETERS)
        .map(|param| match param.split_once('=') {
            Some((key, value)) => QueryParam {
                key: key.to_string(),
                value: Some(value.to_string()),
            },
            None => QueryParam {
                key: param.to_string(),
                value: None,
            },
        })
        .collect()
}

/// Extrae el valor decimal de una línea `Content-Length`
///
/// Se salta exactamente un espacio opcional después de `:` y se leen los
/// dígitos iniciales; un valor sin dígitos cuenta como 0.
fn parse_content_length(line: &str) -> Option<usize> {
    let (_, value) = line.split_once(':')?;
    let value = value.strip_prefix(' ').unwrap_or(value);
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    Some(value[..digits_end].parse().unwrap_or(0))
}
