//! # Configuración del Binario
//! src/config.rs
//!
//! Configuración del servidor de demostración con soporte para argumentos
//! CLI y variables de entorno. La librería no depende de este módulo: se
//! configura con [`ServerConfig`], que se obtiene con
//! [`Config::server_config`].
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./embedded_http --port 8080 \
//!   --idle-timeout 5 \
//!   --header-buffer 2048 \
//!   --log-format json
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=0.0.0.0 HTTP_IDLE_TIMEOUT=5 ./embedded_http
//! ```

use crate::http::request::HEADER_TERMINATOR;
use crate::server::tcp::DEFAULT_HEADER_BUFFER_SIZE;
use crate::server::ServerConfig;
use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::time::Duration;

/// Formato de salida de los logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Legible para humanos
    Pretty,
    /// Una línea JSON por evento
    Json,
}

/// Configuración del servidor HTTP embebido
#[derive(Debug, Clone, Parser)]
#[command(name = "embedded_http")]
#[command(about = "Servidor HTTP/1.x embebido de una sola conexión")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor (0 = puerto libre)
    #[arg(short, long, default_value = "80", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Segundos de inactividad antes de descartar un cliente (0 = sin límite)
    #[arg(long = "idle-timeout", default_value = "0", env = "HTTP_IDLE_TIMEOUT")]
    pub idle_timeout_secs: u64,

    /// Tamaño del buffer de recepción de headers en bytes
    #[arg(long = "header-buffer", default_value = "1024", env = "HTTP_HEADER_BUFFER")]
    pub header_buffer_size: usize,

    /// Formato de los logs
    #[arg(long = "log-format", value_enum, default_value = "pretty", env = "HTTP_LOG_FORMAT")]
    pub log_format: LogFormat,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use embedded_http::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:80");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.host.parse::<IpAddr>().is_err() {
            return Err(format!("Host must be an IP address, got '{}'", self.host));
        }

        // El buffer tiene que poder alojar al menos el terminador más el byte reservado
        if self.header_buffer_size <= HEADER_TERMINATOR.len() {
            return Err(format!(
                "Header buffer must be > {} bytes",
                HEADER_TERMINATOR.len()
            ));
        }

        Ok(())
    }

    /// Convierte la configuración CLI en la de la librería, sin handlers
    pub fn server_config(&self) -> Result<ServerConfig, String> {
        self.validate()?;

        let host: IpAddr = self
            .host
            .parse()
            .map_err(|_| format!("Host must be an IP address, got '{}'", self.host))?;

        Ok(ServerConfig {
            host,
            port: self.port,
            client_idle_time: Duration::from_secs(self.idle_timeout_secs),
            header_buffer_size: self.header_buffer_size,
            ..ServerConfig::default()
        })
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 80,
            host: "0.0.0.0".to_string(),
            idle_timeout_secs: 0,
            header_buffer_size: DEFAULT_HEADER_BUFFER_SIZE,
            log_format: LogFormat::Pretty,
        }
    }
}
