//! # Servidor TCP de una conexión
//! src/server/tcp.rs
//!
//! Dueño del socket de escucha. Corre el loop de accept en un thread
//! dedicado y atiende una conexión por vez hasta completarla antes de
//! aceptar la siguiente (backlog de 1).
//!
//! ## Ciclo de vida
//!
//! ```text
//! Uninitialized ─init─► Initialized ─start─► Running
//!       ▲                   │  ▲                 │
//!       └──────deinit───────┘  └──────stop───────┘
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use embedded_http::http::{Response, StatusCode};
//! use embedded_http::server::{Exchange, HttpServer, ServerConfig};
//!
//! fn status(exchange: &mut Exchange<'_>) -> embedded_http::Result<()> {
//!     exchange.send_response(&Response::text(StatusCode::OK, "OK"))
//! }
//!
//! let config = ServerConfig::new(8080).with_handler("/status", status);
//! let mut server = HttpServer::default();
//! server.init(config)?;
//! server.start()?;
//! // ... atender requests ...
//! server.stop()?;
//! server.deinit()?;
//! # Ok::<(), embedded_http::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::http::request::HEADER_TERMINATOR;
use crate::router::{not_found_handler, Handler, Router};
use crate::server::connection::{serve_connection, Outcome};
use crate::server::signal::{ExitGuard, ListenerState, Signal};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

/// Se atiende una conexión por vez, así que la cola de pendientes es de uno
pub const LISTEN_BACKLOG: i32 = 1;

/// Tamaño por defecto del buffer de headers (un byte queda reservado)
pub const DEFAULT_HEADER_BUFFER_SIZE: usize = 1024;

/// Cada cuánto se reintenta `accept` mientras no hay clientes
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tiempo máximo drenando la entrada del cliente antes de cerrar
const CLOSE_LINGER: Duration = Duration::from_millis(100);

/// Configuración del servidor, inmutable mientras está inicializado
#[derive(Clone)]
pub struct ServerConfig {
    /// Dirección de escucha (por defecto `0.0.0.0`)
    pub host: IpAddr,

    /// Puerto TCP; 0 elige uno libre (ver [`HttpServer::local_addr`])
    pub port: u16,

    /// Rutas en orden de registro; gana el primer path idéntico
    pub handlers: Vec<(String, Handler)>,

    /// Handler para paths sin ruta; `None` usa el 404 interno
    pub default_handler: Option<Handler>,

    /// Timeout de lectura por cliente; cero lo desactiva
    pub client_idle_time: Duration,

    /// Capacidad del buffer fijo de recepción de headers
    pub header_buffer_size: usize,

    /// Ventana de envío fija; `None` usa `SO_SNDBUF` del socket
    pub send_window: Option<usize>,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_handler(mut self, path: &str, handler: Handler) -> Self {
        self.handlers.push((path.to_string(), handler));
        self
    }

    pub fn with_default_handler(mut self, handler: Handler) -> Self {
        self.default_handler = Some(handler);
        self
    }

    /// Timeout de inactividad en segundos (0 = sin timeout)
    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.client_idle_time = Duration::from_secs(secs);
        self
    }

    pub fn with_header_buffer_size(mut self, size: usize) -> Self {
        self.header_buffer_size = size;
        self
    }

    pub fn with_send_window(mut self, window: usize) -> Self {
        self.send_window = Some(window);
        self
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    fn router(&self) -> Router {
        let mut router = Router::new();
        for (path, handler) in &self.handlers {
            router.register(path, *handler);
        }
        router.set_default(self.default_handler.unwrap_or(not_found_handler));
        router
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 80,
            handlers: Vec::new(),
            default_handler: None,
            client_idle_time: Duration::ZERO,
            header_buffer_size: DEFAULT_HEADER_BUFFER_SIZE,
            send_window: None,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address())
            .field("handlers", &self.handlers.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>())
            .field("default_handler", &self.default_handler.is_some())
            .field("client_idle_time", &self.client_idle_time)
            .field("header_buffer_size", &self.header_buffer_size)
            .field("send_window", &self.send_window)
            .finish()
    }
}

/// Estado administrativo del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Uninitialized,
    Initialized,
    Running,
}

/// Handle del servidor HTTP
///
/// Las llamadas administrativas (`init`, `start`, `stop`, `deinit`) deben
/// hacerse desde un solo thread; los handlers corren en el thread del
/// listener.
#[derive(Default)]
pub struct HttpServer {
    config: Option<ServerConfig>,
    router: Option<Arc<Router>>,
    signal: Option<Arc<Signal>>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl HttpServer {
    /// Crea un servidor ya inicializado
    pub fn new(config: ServerConfig) -> Result<Self> {
        let mut server = Self::default();
        server.init(config)?;
        Ok(server)
    }

    pub fn state(&self) -> ServerState {
        if self.thread.is_some() {
            ServerState::Running
        } else if self.router.is_some() {
            ServerState::Initialized
        } else {
            ServerState::Uninitialized
        }
    }

    /// Dirección real de escucha mientras el servidor corre
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> Option<&ServerConfig> {
        self.config.as_ref()
    }

    /// Guarda la configuración y prepara el objeto de señalización
    ///
    /// Si no hay handler por defecto se instala el 404 interno. El socket
    /// no se abre hasta `start`.
    pub fn init(&mut self, config: ServerConfig) -> Result<()> {
        if self.state() == ServerState::Running {
            return Err(Error::Sequence("cannot re-initialize a running server"));
        }
        if config.header_buffer_size <= HEADER_TERMINATOR.len() {
            return Err(Error::InvalidArgument("header buffer is too small"));
        }

        debug!(config = ?config, "Inicializando servidor");
        self.router = Some(Arc::new(config.router()));
        self.signal = Some(Arc::new(Signal::new()));
        self.config = Some(config);
        self.local_addr = None;
        Ok(())
    }

    /// Lanza el thread del listener y espera a que el socket escuche
    ///
    /// No retorna hasta que el socket está escuchando o falló de forma
    /// definitiva.
    pub fn start(&mut self) -> Result<()> {
        let (config, router, signal) = match (&self.config, &self.router, &self.signal) {
            (Some(config), Some(router), Some(signal)) => {
                (config.clone(), Arc::clone(router), Arc::clone(signal))
            }
            _ => return Err(Error::Sequence("server is not initialized")),
        };
        if self.thread.is_some() {
            return Err(Error::Sequence("server is already running"));
        }

        signal.set(ListenerState::Starting);
        let thread = thread::Builder::new()
            .name("http_server".to_string())
            .spawn({
                let signal = Arc::clone(&signal);
                move || run_listener(config, router, signal)
            })?;

        match signal.wait_started() {
            ListenerState::Listening(addr) => {
                info!(address = %addr, "Servidor escuchando");
                self.local_addr = Some(addr);
                self.thread = Some(thread);
                Ok(())
            }
            ListenerState::StartFailed(reason) => {
                let _ = thread.join();
                Err(Error::StartFailed(reason))
            }
            other => {
                let _ = thread.join();
                Err(Error::StartFailed(format!("listener ended in state {:?}", other)))
            }
        }
    }

    /// Pide detener el listener y espera a que termine
    ///
    /// Una conexión en curso se completa antes de que el listener vea el
    /// pedido.
    pub fn stop(&mut self) -> Result<()> {
        let thread = match self.thread.take() {
            Some(thread) => thread,
            None => return Err(Error::Sequence("server is not running")),
        };
        self.local_addr = None;

        if let Some(signal) = &self.signal {
            signal.request_stop();
            signal.wait_exited(None);
        }

        thread.join().map_err(|_| Error::ThreadPanicked)?;
        info!("Servidor detenido");
        Ok(())
    }

    /// Libera la configuración, las rutas y el objeto de señalización
    ///
    /// Si el servidor corre, primero se detiene. Después hace falta un
    /// nuevo `init` para volver a usarlo.
    pub fn deinit(&mut self) -> Result<()> {
        match self.state() {
            ServerState::Uninitialized => {
                return Err(Error::Sequence("server is not initialized"));
            }
            ServerState::Running => self.stop()?,
            ServerState::Initialized => {}
        }

        self.router = None;
        self.signal = None;
        self.config = None;
        debug!("Servidor desinicializado");
        Ok(())
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.stop() {
                error!(error = %e, "Error deteniendo el servidor");
            }
        }
    }
}

/// Abre el socket de escucha con backlog de uno
fn open_listener(address: SocketAddr) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - permite reiniciar el servidor con el puerto en TIME_WAIT
    socket.set_reuse_address(true)?;

    // TCP_NODELAY - se hereda en los sockets aceptados donde el SO lo soporta
    if let Err(e) = socket.set_nodelay(true) {
        debug!(error = %e, "TCP_NODELAY no disponible en el socket de escucha");
    }

    socket.bind(&address.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    // No bloqueante para poder atender el pedido de stop entre accepts
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Cuerpo del thread del listener
fn run_listener(config: ServerConfig, router: Arc<Router>, signal: Arc<Signal>) {
    let address = config.address();
    let listener = match open_listener(address) {
        Ok(listener) => listener,
        Err(e) => {
            error!(address = %address, error = %e, "No se pudo abrir el socket de escucha");
            signal.set(ListenerState::StartFailed(e.to_string()));
            return;
        }
    };
    let local_addr = listener.local_addr().unwrap_or(address);

    let _exit = ExitGuard(&signal);
    signal.set(ListenerState::Listening(local_addr));

    let mut buffer = vec![0u8; config.header_buffer_size];

    loop {
        if signal.stop_requested() {
            break;
        }

        match listener.accept() {
            Ok((stream, peer)) => handle_client(stream, peer, &config, &router, &mut buffer),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if signal.wait_for_stop(ACCEPT_POLL_INTERVAL) {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(error = %e, "Error al aceptar conexión");
                if signal.wait_for_stop(ACCEPT_POLL_INTERVAL) {
                    break;
                }
            }
        }
    }

    drop(listener);
    info!(address = %local_addr, "Listener cerrado");
}

/// Configura el socket del cliente antes de entregarlo al manejador
fn configure_client(stream: &TcpStream, idle_time: Duration) -> io::Result<()> {
    stream.set_nonblocking(false)?;

    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "TCP_NODELAY no disponible en el socket del cliente");
    }

    if !idle_time.is_zero() {
        stream.set_read_timeout(Some(idle_time))?;
    }
    Ok(())
}

/// Atiende un cliente de principio a fin y cierra su socket
fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: &ServerConfig,
    router: &Router,
    buffer: &mut [u8],
) {
    let span = info_span!("conexion", peer = %peer);
    let _enter = span.enter();

    if let Err(e) = configure_client(&stream, config.client_idle_time) {
        warn!(error = %e, "No se pudo configurar el socket del cliente");
        return;
    }

    let start = Instant::now();
    let outcome = serve_connection(&mut stream, router, buffer, config.send_window);
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    match &outcome {
        Outcome::Served { path, fallback, bytes_owed, .. } => {
            info!(path = %path, fallback, bytes_owed, latency_ms, "Request atendido");
        }
        Outcome::Aborted(e) => {
            debug!(error = %e, latency_ms, "Conexión descartada sin respuesta");
        }
    }

    close_gracefully(stream);
}

/// Cierra el socket sin perder la respuesta ya escrita
///
/// Cerrar con bytes sin leer en el buffer de recepción hace que el kernel
/// mande RST y el cliente puede perder la respuesta. Se cierra primero la
/// escritura y se drena la entrada un tiempo acotado.
fn close_gracefully(mut stream: TcpStream) {
    let _ = stream.flush();
    if stream.shutdown(Shutdown::Write).is_err() {
        return;
    }
    if stream.set_read_timeout(Some(CLOSE_LINGER)).is_err() {
        return;
    }

    let deadline = Instant::now() + CLOSE_LINGER;
    let mut sink = [0u8; 512];
    while Instant::now() < deadline {
        match stream.read(&mut sink) {
            Ok(0) | Err(_) => break,
            Ok(_) => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Response, StatusCode};
    use crate::server::Exchange;

    fn loopback() -> ServerConfig {
        ServerConfig::new(0).with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn ok_handler(exchange: &mut Exchange<'_>) -> Result<()> {
        exchange.send_response(&Response::text(StatusCode::OK, "OK"))
    }

    fn fetch(addr: SocketAddr, raw: &[u8]) -> String {
        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        client.write_all(raw).unwrap();

        let mut buf = Vec::new();
        client.read_to_end(&mut buf).unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.client_idle_time, Duration::ZERO);
        assert_eq!(config.header_buffer_size, DEFAULT_HEADER_BUFFER_SIZE);
        assert!(config.default_handler.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new(8080)
            .with_handler("/a", ok_handler)
            .with_idle_timeout(3)
            .with_send_window(64);

        assert_eq!(config.address().port(), 8080);
        assert_eq!(config.handlers.len(), 1);
        assert_eq!(config.client_idle_time, Duration::from_secs(3));
        assert_eq!(config.send_window, Some(64));
        assert!(config.router().find("/a").is_some());
    }

    #[test]
    fn test_lifecycle_states() {
        let mut server = HttpServer::default();
        assert_eq!(server.state(), ServerState::Uninitialized);
        assert!(matches!(server.start(), Err(Error::Sequence(_))));
        assert!(matches!(server.stop(), Err(Error::Sequence(_))));
        assert!(matches!(server.deinit(), Err(Error::Sequence(_))));

        server.init(loopback()).unwrap();
        assert_eq!(server.state(), ServerState::Initialized);
        assert!(server.local_addr().is_none());

        server.start().unwrap();
        assert_eq!(server.state(), ServerState::Running);
        assert!(server.local_addr().is_some());
        assert!(matches!(server.start(), Err(Error::Sequence(_))));
        assert!(matches!(server.init(loopback()), Err(Error::Sequence(_))));

        server.stop().unwrap();
        assert_eq!(server.state(), ServerState::Initialized);

        server.deinit().unwrap();
        assert_eq!(server.state(), ServerState::Uninitialized);
        assert!(server.config().is_none());
    }

    #[test]
    fn test_rejects_tiny_header_buffer() {
        let mut server = HttpServer::default();
        let result = server.init(loopback().with_header_buffer_size(4));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_start_fails_when_port_taken() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut server = HttpServer::new(ServerConfig::new(port).with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))).unwrap();
        assert!(matches!(server.start(), Err(Error::StartFailed(_))));
        assert_eq!(server.state(), ServerState::Initialized);
    }

    #[test]
    fn test_stop_is_prompt_without_clients() {
        let mut server = HttpServer::new(loopback()).unwrap();
        server.start().unwrap();

        let started = Instant::now();
        server.stop().unwrap();
        assert!(started.elapsed() < ACCEPT_POLL_INTERVAL * 20);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut server = HttpServer::new(loopback().with_handler("/ok", ok_handler)).unwrap();

        server.start().unwrap();
        let addr = server.local_addr().unwrap();
        assert!(fetch(addr, b"GET /ok HTTP/1.1\r\n\r\n").ends_with("\r\n\r\nOK"));
        server.stop().unwrap();

        server.start().unwrap();
        let addr = server.local_addr().unwrap();
        assert!(fetch(addr, b"GET /ok HTTP/1.0\r\n\r\n").starts_with("HTTP/1.0 200\r\n"));
        server.stop().unwrap();
    }

    #[test]
    fn test_independent_instances() {
        let mut first = HttpServer::new(loopback().with_handler("/ok", ok_handler)).unwrap();
        let mut second = HttpServer::new(loopback()).unwrap();
        first.start().unwrap();
        second.start().unwrap();

        assert!(fetch(first.local_addr().unwrap(), b"GET /ok HTTP/1.1\r\n\r\n").contains("200"));
        assert!(fetch(second.local_addr().unwrap(), b"GET /ok HTTP/1.1\r\n\r\n").contains("404"));

        first.stop().unwrap();
        second.stop().unwrap();
    }

    #[test]
    fn test_drop_stops_running_server() {
        let addr = {
            let mut server = HttpServer::new(loopback()).unwrap();
            server.start().unwrap();
            server.local_addr().unwrap()
        };

        thread::sleep(Duration::from_millis(50));
        assert!(TcpStream::connect(addr).is_err());
    }
}
