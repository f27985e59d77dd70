//! # Manejo de una Conexión
//! src/server/connection.rs
//!
//! Ciclo de vida de un request sobre una conexión ya aceptada:
//!
//! ```text
//! AwaitingHeaders → HeadersComplete → BodyPending (opcional)
//!                 → Dispatched → ResponseSent → Closed
//! ```
//!
//! Cualquier fallo antes de despachar (lectura, buffer lleno, método
//! desconocido) corta la conexión sin enviar un solo byte. Una vez
//! despachado, siempre se envía exactamente una respuesta: si el handler no
//! respondió, se invoca el handler por defecto como red de seguridad.

use crate::error::{Error, Result};
use crate::http::request::{find_header_end, HEADER_TERMINATOR};
use crate::http::Request;
use crate::router::{not_found_handler, Router};
use crate::server::exchange::Exchange;
use crate::server::transport::Transport;
use std::io::{self, ErrorKind, Read};
use tracing::{debug, warn};

/// Estados de una conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingHeaders,
    HeadersComplete,
    BodyPending,
    Dispatched,
    ResponseSent,
    Closed,
    /// Se cortó antes de despachar; no se envió nada
    Aborted,
}

/// Resultado de servir una conexión
#[derive(Debug)]
pub enum Outcome {
    Served {
        path: String,
        /// Hubo una ruta registrada para el path
        matched: bool,
        /// Se tuvo que invocar la red de seguridad
        fallback: bool,
        /// Bytes prometidos que el handler nunca escribió
        bytes_owed: usize,
    },
    Aborted(Error),
}

impl Outcome {
    pub fn state(&self) -> ConnectionState {
        match self {
            Outcome::Served { .. } => ConnectionState::Closed,
            Outcome::Aborted(_) => ConnectionState::Aborted,
        }
    }
}

fn advance(state: &mut ConnectionState, next: ConnectionState) {
    debug!(from = ?*state, to = ?next, "Transición de conexión");
    *state = next;
}

/// Sirve un único request sobre `transport`
///
/// `buffer` es el buffer fijo de recepción de headers; el último byte queda
/// reservado. El caller cierra el transporte después.
pub fn serve_connection(
    transport: &mut dyn Transport,
    router: &Router,
    buffer: &mut [u8],
    send_window: Option<usize>,
) -> Outcome {
    let mut state = ConnectionState::AwaitingHeaders;

    let (header_end, received) = match read_headers(transport, buffer) {
        Ok(found) => found,
        Err(e) => {
            debug!(error = %e, "Conexión cortada leyendo headers");
            return Outcome::Aborted(e);
        }
    };

    let request = match Request::parse(&buffer[..header_end]) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Request inválido, descartando conexión");
            return Outcome::Aborted(e.into());
        }
    };
    advance(&mut state, ConnectionState::HeadersComplete);

    debug!(
        method = %request.method(),
        path = request.path(),
        version = %request.version(),
        headers = request.header_count(),
        content_length = request.request_data_length(),
        "Headers parseados"
    );

    if request.request_data_length() > 0 {
        advance(&mut state, ConnectionState::BodyPending);
    }

    let body_start = header_end + HEADER_TERMINATOR.len();
    let buffered = buffer[body_start..received].to_vec();
    let path = request.path().to_string();
    let (handler, matched) = router.resolve(&path);

    let mut exchange = Exchange::new(transport, request, buffered, send_window);
    advance(&mut state, ConnectionState::Dispatched);
    if let Err(e) = handler(&mut exchange) {
        warn!(path = %path, error = %e, "El handler retornó error");
    }

    let fallback = !exchange.response_sent();
    if fallback {
        // Si el que no respondió fue el propio handler por defecto, se usa el 404 interno
        let safety_net = if matched {
            router.default_handler()
        } else {
            not_found_handler
        };
        warn!(path = %path, "El handler no respondió, usando handler por defecto");
        if let Err(e) = safety_net(&mut exchange) {
            warn!(path = %path, error = %e, "Falló la respuesta de respaldo");
        }
    }
    advance(&mut state, ConnectionState::ResponseSent);

    let bytes_owed = exchange.bytes_owed();
    if bytes_owed > 0 {
        warn!(path = %path, bytes_owed, "Respuesta truncada: faltaron bytes prometidos");
    }
    advance(&mut state, ConnectionState::Closed);

    Outcome::Served {
        path,
        matched,
        fallback,
        bytes_owed,
    }
}

/// Lee hasta encontrar `\r\n\r\n`
///
/// Retorna el offset del terminador y el total de bytes recibidos, que
/// puede incluir el comienzo del body.
fn read_headers(transport: &mut dyn Transport, buffer: &mut [u8]) -> Result<(usize, usize)> {
    let capacity = buffer.len().saturating_sub(1);
    let mut received = 0;

    loop {
        if received >= capacity {
            return Err(Error::HeaderOverflow(buffer.len()));
        }

        let n = match transport.read(&mut buffer[received..capacity]) {
            Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof).into()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        // El terminador puede haber quedado partido entre dos lecturas
        let search_from = received.saturating_sub(HEADER_TERMINATOR.len() - 1);
        received += n;

        if let Some(end) = find_header_end(&buffer[..received], search_from) {
            return Ok((end, received));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{content_type, Response, StatusCode};
    use crate::router::NOT_FOUND_BODY;
    use crate::server::transport::scripted::ScriptedStream;

    const BUFFER_SIZE: usize = 1024;

    fn status_handler(exchange: &mut Exchange<'_>) -> Result<()> {
        let response = Response::new(StatusCode::OK)
            .with_content_type(content_type::TEXT_PLAIN)
            .with_body("OK");
        exchange.send_response(&response)
    }

    fn query_handler(exchange: &mut Exchange<'_>) -> Result<()> {
        let body = exchange
            .request()
            .query_params()
            .iter()
            .map(|p| format!("{}={}", p.key, p.value.as_deref().unwrap_or("<none>")))
            .collect::<Vec<_>>()
            .join(";");
        exchange.send_response(&Response::text(StatusCode::OK, &body))
    }

    fn echo_handler(exchange: &mut Exchange<'_>) -> Result<()> {
        let mut body = vec![0u8; exchange.request().request_data_length()];
        let n = exchange.read_request_data(&mut body)?;
        body.truncate(n);
        exchange.send_response(&Response::new(StatusCode::OK).with_body_bytes(body))
    }

    fn silent_handler(_exchange: &mut Exchange<'_>) -> Result<()> {
        Ok(())
    }

    fn failing_handler(_exchange: &mut Exchange<'_>) -> Result<()> {
        Err(Error::InvalidArgument("boom"))
    }

    fn double_send_handler(exchange: &mut Exchange<'_>) -> Result<()> {
        let first = Response::new(StatusCode::OK).with_partial_body(b"1".to_vec(), 2);
        exchange.send_response(&first)?;
        let verdict: &[u8] = match exchange.send_response(&Response::text(StatusCode::OK, "2")) {
            Err(Error::Sequence(_)) => b"Y",
            _ => b"N",
        };
        exchange.write_data(verdict)
    }

    fn custom_default(exchange: &mut Exchange<'_>) -> Result<()> {
        exchange.send_response(&Response::text(StatusCode::NOT_FOUND, "Invalid request!"))
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.register("/status", status_handler);
        router.register("/search", query_handler);
        router.register("/echo", echo_handler);
        router.register("/silent", silent_handler);
        router.register("/failing", failing_handler);
        router.register("/double", double_send_handler);
        router
    }

    fn serve(stream: &mut ScriptedStream, router: &Router) -> Outcome {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        serve_connection(stream, router, &mut buffer, None)
    }

    fn body_of(text: &str) -> &str {
        text.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
    }

    #[test]
    fn test_get_registered_path() {
        let mut stream = ScriptedStream::new(&[b"GET /status HTTP/1.1\r\n\r\n"]);
        let outcome = serve(&mut stream, &router());

        assert_eq!(outcome.state(), ConnectionState::Closed);
        assert!(matches!(outcome, Outcome::Served { matched: true, fallback: false, .. }));
        assert_eq!(
            stream.written_text(),
            "HTTP/1.1 200\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK"
        );
    }

    #[test]
    fn test_query_reaches_handler() {
        let mut stream = ScriptedStream::new(&[b"GET /search?q=abc&limit=10&flag HTTP/1.0\r\n\r\n"]);
        serve(&mut stream, &router());

        let text = stream.written_text();
        assert!(text.starts_with("HTTP/1.0 200\r\n"));
        assert_eq!(body_of(&text), "q=abc;limit=10;flag=<none>");
    }

    #[test]
    fn test_unmatched_path_gets_404() {
        let mut stream = ScriptedStream::new(&[b"GET /nope HTTP/1.1\r\n\r\n"]);
        let outcome = serve(&mut stream, &router());

        assert!(matches!(outcome, Outcome::Served { matched: false, fallback: false, .. }));
        let text = stream.written_text();
        assert!(text.starts_with("HTTP/1.1 404\r\n"));
        assert_eq!(body_of(&text), NOT_FOUND_BODY);
    }

    #[test]
    fn test_silent_handler_falls_back_to_default() {
        let mut stream = ScriptedStream::new(&[b"GET /silent HTTP/1.1\r\n\r\n"]);
        let outcome = serve(&mut stream, &router());

        assert!(matches!(outcome, Outcome::Served { matched: true, fallback: true, .. }));
        assert_eq!(body_of(&stream.written_text()), NOT_FOUND_BODY);
    }

    #[test]
    fn test_failing_handler_still_gets_one_response() {
        let mut stream = ScriptedStream::new(&[b"GET /failing HTTP/1.1\r\n\r\n"]);
        serve(&mut stream, &router());

        let text = stream.written_text();
        assert_eq!(text.matches("HTTP/1.1 ").count(), 1);
        assert!(text.starts_with("HTTP/1.1 404\r\n"));
    }

    #[test]
    fn test_custom_default_handler() {
        let mut router = router();
        router.set_default(custom_default);

        let mut stream = ScriptedStream::new(&[b"GET /silent HTTP/1.1\r\n\r\n"]);
        serve(&mut stream, &router);
        assert_eq!(body_of(&stream.written_text()), "Invalid request!");

        let mut stream = ScriptedStream::new(&[b"DELETE /other HTTP/1.1\r\n\r\n"]);
        serve(&mut stream, &router);
        assert_eq!(body_of(&stream.written_text()), "Invalid request!");
    }

    #[test]
    fn test_silent_default_handler_uses_internal_404() {
        let mut router = router();
        router.set_default(silent_handler);

        let mut stream = ScriptedStream::new(&[b"GET /unknown HTTP/1.1\r\n\r\n"]);
        let outcome = serve(&mut stream, &router);

        assert!(matches!(outcome, Outcome::Served { matched: false, fallback: true, .. }));
        assert_eq!(body_of(&stream.written_text()), NOT_FOUND_BODY);
    }

    #[test]
    fn test_second_send_is_rejected() {
        let mut stream = ScriptedStream::new(&[b"GET /double HTTP/1.1\r\n\r\n"]);
        let outcome = serve(&mut stream, &router());

        assert!(matches!(outcome, Outcome::Served { bytes_owed: 0, .. }));
        let text = stream.written_text();
        assert_eq!(text.matches("HTTP/1.1 ").count(), 1);
        assert_eq!(body_of(&text), "1Y");
    }

    #[test]
    fn test_unknown_method_aborts_silently() {
        let mut stream = ScriptedStream::new(&[b"PATCH /x HTTP/1.1\r\n\r\n"]);
        let outcome = serve(&mut stream, &router());

        assert_eq!(outcome.state(), ConnectionState::Aborted);
        assert!(matches!(outcome, Outcome::Aborted(Error::Parse(_))));
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_body_in_separate_segment() {
        let mut stream = ScriptedStream::new(&[
            b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\n",
            b"hello",
        ]);
        serve(&mut stream, &router());

        let text = stream.written_text();
        assert!(text.contains("Content-Length: 5\r\n"));
        assert_eq!(body_of(&text), "hello");
    }

    #[test]
    fn test_body_bundled_with_headers() {
        let mut stream = ScriptedStream::new(&[
            b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel",
            b"lo",
        ]);
        serve(&mut stream, &router());

        assert_eq!(body_of(&stream.written_text()), "hello");
    }

    #[test]
    fn test_terminator_split_across_reads() {
        let mut stream = ScriptedStream::new(&[b"GET /status HTTP/1.1\r\n\r", b"\n"]);
        serve(&mut stream, &router());

        assert!(stream.written_text().starts_with("HTTP/1.1 200\r\n"));
    }

    #[test]
    fn test_headers_in_many_segments() {
        let mut stream = ScriptedStream::new(&[b"GET /sta", b"tus HTTP/1.1\r\nHo", b"st: x\r\n", b"\r\n"]);
        serve(&mut stream, &router());

        assert!(stream.written_text().ends_with("\r\n\r\nOK"));
    }

    #[test]
    fn test_header_overflow_aborts() {
        let long = format!("GET /status HTTP/1.1\r\nX-Pad: {}\r\n\r\n", "a".repeat(64));
        let mut stream = ScriptedStream::new(&[long.as_bytes()]);
        let mut buffer = vec![0u8; 32];

        let outcome = serve_connection(&mut stream, &router(), &mut buffer, None);
        assert!(matches!(outcome, Outcome::Aborted(Error::HeaderOverflow(32))));
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_peer_closed_before_headers() {
        let mut stream = ScriptedStream::new(&[b"GET /status HTTP/1.1\r\n"]);
        let outcome = serve(&mut stream, &router());

        assert!(matches!(outcome, Outcome::Aborted(Error::Transport(_))));
        assert!(stream.written.is_empty());
    }

    #[test]
    fn test_read_error_before_headers() {
        let mut stream = ScriptedStream::new(&[]).then_fail(ErrorKind::TimedOut);
        let outcome = serve(&mut stream, &router());

        match outcome {
            Outcome::Aborted(Error::Transport(e)) => assert_eq!(e.kind(), ErrorKind::TimedOut),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
