//! # Contexto de un Request
//! src/server/exchange.rs
//!
//! Un [`Exchange`] vive lo que dura una conexión y es lo único que ve un
//! handler. Agrupa:
//!
//! 1. **Lector de body**: primero entrega los bytes que llegaron pegados a
//!    los headers, después lee del socket hasta completar `Content-Length`.
//! 2. **Escritor de respuesta**: `send_response` una sola vez y, si se
//!    prometieron más bytes de los entregados, `write_data` hasta saldar la
//!    deuda.
//!
//! ## Contrato de escritura
//!
//! ```text
//! send_response(expected = 10, current = 4)   → adeudados: 6
//! write_data(4 bytes)                         → adeudados: 2
//! write_data(2 bytes)                         → adeudados: 0
//! write_data(1 byte)                          → Error::Sequence
//! ```

use crate::error::{Error, Result};
use crate::http::{Header, Request, Response};
use crate::server::transport::{write_chunked, Transport, DEFAULT_SEND_WINDOW};
use std::io::{self, ErrorKind, Read};
use tracing::{debug, warn};

/// Estado de un request en curso, prestado al handler
pub struct Exchange<'a> {
    transport: &'a mut dyn Transport,
    request: Request,

    /// Bytes de body recibidos en la misma lectura que el terminador
    buffered: Vec<u8>,
    buffered_pos: usize,

    /// Bytes de body que todavía no se entregaron al handler
    body_remaining: usize,

    response_sent: bool,

    /// Bytes prometidos en `Content-Length` que faltan enviar
    bytes_owed: usize,

    /// Ventana fija configurada; `None` consulta `SO_SNDBUF`
    send_window: Option<usize>,
}

impl<'a> Exchange<'a> {
    /// Crea el contexto para un request ya parseado
    ///
    /// `buffered` son los bytes que siguieron al terminador en la lectura
    /// de headers; lo que exceda el body declarado se descarta.
    pub(crate) fn new(
        transport: &'a mut dyn Transport,
        request: Request,
        mut buffered: Vec<u8>,
        send_window: Option<usize>,
    ) -> Self {
        let body_remaining = request.request_data_length();
        buffered.truncate(body_remaining);

        Self {
            transport,
            request,
            buffered,
            buffered_pos: 0,
            body_remaining,
            response_sent: false,
            bytes_owed: 0,
            send_window,
        }
    }

    /// Request parseado de esta conexión
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Devuelve hasta `max` headers del request en orden de llegada
    ///
    /// # Errores
    ///
    /// `Error::InvalidArgument` si `max` es cero.
    pub fn request_headers(&self, max: usize) -> Result<Vec<Header<'_>>> {
        if max == 0 {
            return Err(Error::InvalidArgument("header count must be non-zero"));
        }
        Ok(self.request.headers().take(max).collect())
    }

    /// Bytes de body pendientes de leer
    pub fn body_remaining(&self) -> usize {
        self.body_remaining
    }

    pub fn response_sent(&self) -> bool {
        self.response_sent
    }

    /// Bytes anunciados en `Content-Length` que aún no se escribieron
    pub fn bytes_owed(&self) -> usize {
        self.bytes_owed
    }

    /// Lee el body del request en `buffer`
    ///
    /// Puede llamarse varias veces para recorrer un body grande en trozos.
    /// Retorna la cantidad de bytes copiados; 0 cuando el body ya se
    /// consumió por completo.
    ///
    /// # Errores
    ///
    /// - `Error::InvalidArgument` si el request no declaró body o `buffer`
    ///   está vacío.
    /// - `Error::BodyRead` si el socket falla o se cierra antes de tiempo.
    ///   Los bytes ya copiados quedan en `buffer` (ver `received`) y la
    ///   conexión se cierra.
    pub fn read_request_data(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if self.request.request_data_length() == 0 {
            return Err(Error::InvalidArgument("request has no body"));
        }
        if buffer.is_empty() {
            return Err(Error::InvalidArgument("buffer must be non-empty"));
        }

        // 1. Drenar lo que llegó junto con los headers
        let pending = &self.buffered[self.buffered_pos..];
        let mut filled = pending.len().min(buffer.len());
        buffer[..filled].copy_from_slice(&pending[..filled]);
        self.buffered_pos += filled;
        self.body_remaining -= filled;

        // 2. Completar desde el socket
        let wanted = (buffer.len() - filled).min(self.body_remaining);
        let end = filled + wanted;
        while filled < end {
            match self.transport.read(&mut buffer[filled..end]) {
                Ok(0) => {
                    return Err(self.abort_read(filled, io::Error::from(ErrorKind::UnexpectedEof)));
                }
                Ok(n) => {
                    filled += n;
                    self.body_remaining -= n;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.abort_read(filled, e)),
            }
        }

        Ok(filled)
    }

    fn abort_read(&mut self, received: usize, source: io::Error) -> Error {
        warn!(
            received,
            remaining = self.body_remaining,
            error = %source,
            "Fallo leyendo el body, cerrando conexión"
        );
        let _ = self.transport.shutdown();
        Error::BodyRead { received, source }
    }

    /// Envía la cabecera y los bytes disponibles de la respuesta
    ///
    /// Solo puede llamarse una vez por request. La respuesta se marca como
    /// enviada antes de escribir el primer byte, así que un fallo de
    /// transporte a mitad de camino no habilita un segundo intento.
    ///
    /// # Errores
    ///
    /// - `Error::InvalidArgument` si `current_data_length > expected_data_length`
    ///   (no se envía nada).
    /// - `Error::Sequence` si ya se envió una respuesta.
    /// - `Error::Transport` si el socket falla.
    pub fn send_response(&mut self, response: &Response) -> Result<()> {
        if response.current_data_length() > response.expected_data_length() {
            return Err(Error::InvalidArgument(
                "current data length exceeds expected data length",
            ));
        }
        if self.response_sent {
            return Err(Error::Sequence("response already sent"));
        }
        self.response_sent = true;

        let window = self.send_window();
        let head = response.head(self.request.version());
        write_chunked(&mut *self.transport, &head, window)?;
        if !response.data().is_empty() {
            write_chunked(&mut *self.transport, response.data(), window)?;
        }

        self.bytes_owed = response.owed_length();
        debug!(
            status = response.status().as_u16(),
            sent = response.current_data_length(),
            bytes_owed = self.bytes_owed,
            "Respuesta enviada"
        );
        Ok(())
    }

    /// Envía más bytes de body después de `send_response`
    ///
    /// # Errores
    ///
    /// - `Error::Sequence` si aún no se envió la respuesta o si `data`
    ///   excede lo adeudado.
    /// - `Error::InvalidArgument` si `data` está vacío.
    /// - `Error::Transport` si el socket falla.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        if !self.response_sent {
            return Err(Error::Sequence("write_data called before send_response"));
        }
        if data.is_empty() {
            return Err(Error::InvalidArgument("data must be non-empty"));
        }
        if data.len() > self.bytes_owed {
            return Err(Error::Sequence("write exceeds the promised content length"));
        }

        let window = self.send_window();
        write_chunked(&mut *self.transport, data, window)?;
        self.bytes_owed -= data.len();
        Ok(())
    }

    fn send_window(&self) -> usize {
        match self.send_window {
            Some(window) if window > 0 => window,
            _ => match self.transport.send_buffer_size() {
                Ok(size) if size > 0 => size,
                _ => DEFAULT_SEND_WINDOW,
            },
        }
    }
}
