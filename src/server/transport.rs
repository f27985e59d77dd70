//! # Transporte de bytes
//! src/server/transport.rs
//!
//! El servidor solo necesita un stream duplex confiable con dos extras: el
//! tamaño del buffer de envío (para trocear las escrituras) y poder cerrar
//! la conexión. `TcpStream` lo implementa vía `socket2`; los tests usan un
//! stream guionado en memoria.

use socket2::SockRef;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Ventana de envío cuando el socket no informa `SO_SNDBUF`
pub const DEFAULT_SEND_WINDOW: usize = 1460;

/// Stream duplex sobre el que se sirve una conexión
pub trait Transport: Read + Write {
    /// Capacidad del buffer de envío del socket
    fn send_buffer_size(&self) -> io::Result<usize>;

    /// Cierra ambos sentidos; las lecturas y escrituras siguientes fallan
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn send_buffer_size(&self) -> io::Result<usize> {
        SockRef::from(self).send_buffer_size()
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Escribe `data` en trozos de a lo sumo `window` bytes
///
/// Cada trozo se vacía antes de encolar el siguiente para acotar el tiempo
/// bloqueado por llamada.
pub fn write_chunked<W: Write + ?Sized>(writer: &mut W, data: &[u8], window: usize) -> io::Result<()> {
    for chunk in data.chunks(window.max(1)) {
        writer.write_all(chunk)?;
        writer.flush()?;
    }
    Ok(())
}
