//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Tabla ordenada que mapea paths exactos a handlers.
//!
//! ```text
//! Request → Router → Handler → Exchange (send_response / write_data)
//! ```
//!
//! La búsqueda es lineal en orden de registro y gana el primer match. Si
//! ningún path coincide se usa el handler por defecto, que a su vez cae en
//! [`not_found_handler`] cuando el embebedor no configuró ninguno.

use crate::error::Result;
use crate::http::{content_type, Response, StatusCode};
use crate::server::Exchange;
use tracing::debug;

/// Tipo de función handler
///
/// Un handler recibe el contexto del request en curso y responde a través
/// de él. Los errores que retorne solo se registran en el log.
pub type Handler = fn(&mut Exchange<'_>) -> Result<()>;

/// Body del 404 interno
pub const NOT_FOUND_BODY: &str = "Not Found!";

/// Handler interno para rutas desconocidas: 404 con body de texto plano
pub fn not_found_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let response = Response::new(StatusCode::NOT_FOUND)
        .with_content_type(content_type::TEXT_PLAIN)
        .with_body(NOT_FOUND_BODY);
    exchange.send_response(&response)
}

/// Router que mapea paths a handlers
#[derive(Clone)]
pub struct Router {
    routes: Vec<(String, Handler)>,
    default_handler: Handler,
}

impl Router {
    /// Crea un router vacío con el 404 interno como handler por defecto
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            default_handler: not_found_handler,
        }
    }

    /// Registra una ruta con su handler
    ///
    /// Registrar el mismo path dos veces no reemplaza: el primero sigue
    /// ganando.
    pub fn register(&mut self, path: &str, handler: Handler) {
        self.routes.push((path.to_string(), handler));
    }

    /// Reemplaza el handler por defecto
    pub fn set_default(&mut self, handler: Handler) {
        self.default_handler = handler;
    }

    /// Busca el handler registrado para un path exacto
    pub fn find(&self, path: &str) -> Option<Handler> {
        self.routes
            .iter()
            .find(|(route_path, _)| route_path == path)
            .map(|(_, handler)| *handler)
    }

    /// Handler para el path, o el de por defecto si no hay match
    ///
    /// El booleano indica si hubo match.
    pub fn resolve(&self, path: &str) -> (Handler, bool) {
        match self.find(path) {
            Some(handler) => (handler, true),
            None => {
                debug!(path, "Sin ruta registrada, usando handler por defecto");
                (self.default_handler, false)
            }
        }
    }

    pub fn default_handler(&self) -> Handler {
        self.default_handler
    }

    /// Cantidad de rutas registradas
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_handler(_exchange: &mut Exchange<'_>) -> Result<()> {
        Ok(())
    }

    fn second_handler(_exchange: &mut Exchange<'_>) -> Result<()> {
        Err(crate::error::Error::Sequence("second"))
    }

    #[test]
    fn test_router_creation() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.default_handler() as usize, not_found_handler as usize);
    }

    #[test]
    fn test_register_route() {
        let mut router = Router::new();
        router.register("/test", first_handler);

        assert_eq!(router.len(), 1);
        assert!(router.find("/test").is_some());
    }

    #[test]
    fn test_exact_match_only() {
        let mut router = Router::new();
        router.register("/status", first_handler);

        assert!(router.find("/status/").is_none());
        assert!(router.find("/Status").is_none());
        assert!(router.find("/stat").is_none());
    }

    #[test]
    fn test_first_registration_wins() {
        let mut router = Router::new();
        router.register("/dup", first_handler);
        router.register("/dup", second_handler);

        let (handler, matched) = router.resolve("/dup");
        assert!(matched);
        assert_eq!(handler as usize, first_handler as usize);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let mut router = Router::new();
        router.set_default(second_handler);

        let (handler, matched) = router.resolve("/missing");
        assert!(!matched);
        assert_eq!(handler as usize, second_handler as usize);
    }
}
