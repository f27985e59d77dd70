//! # Embedded HTTP - Entry Point
//! src/main.rs
//!
//! Binario de demostración: registra unos handlers de ejemplo, arranca el
//! servidor y corre hasta que stdin se cierre o se escriba `quit`.

use embedded_http::config::{Config, LogFormat};
use embedded_http::http::{content_type, Response, StatusCode};
use embedded_http::server::{Exchange, HttpServer};
use embedded_http::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::BufRead;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Valor del header `Server` en las respuestas de error
const SERVER_NAME: &str = "embedded_http/0.1.0";

/// Tamaño de los bloques en que se lee el body
const BODY_CHUNK: usize = 256;

const LOGIN_PAGE: &str = "<!DOCTYPE html>\
<html><head><title>Login</title></head><body>\
<form action=\"/connect\" method=\"post\">\
<label>SSID <input name=\"ssid\"></label>\
<label>Password <input name=\"password\" type=\"password\"></label>\
<button type=\"submit\">Connect</button>\
</form></body></html>";

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
    server: &'static str,
    uptime_secs: u64,
}

/// GET /status → estado del servidor en JSON
fn status_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let body = StatusBody {
        status: "running",
        server: SERVER_NAME,
        uptime_secs: STARTED_AT.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
    };
    let json = serde_json::to_string(&body).unwrap_or_else(|_| "{}".to_string());
    exchange.send_response(&Response::json(&json))
}

/// GET /login → página HTML estática
fn login_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let response = Response::new(StatusCode::OK)
        .with_content_type(content_type::TEXT_HTML)
        .with_body(LOGIN_PAGE);
    exchange.send_response(&response)
}

/// POST /connect → consume el formulario y confirma
fn connect_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let mut form = Vec::with_capacity(exchange.body_remaining());
    let mut chunk = [0u8; BODY_CHUNK];
    while exchange.body_remaining() > 0 {
        let n = exchange.read_request_data(&mut chunk)?;
        form.extend_from_slice(&chunk[..n]);
    }
    info!(form = %String::from_utf8_lossy(&form), "Formulario recibido");

    exchange.send_response(&Response::text(StatusCode::OK, "Done"))
}

/// POST /echo → devuelve el body recibido, escribiéndolo por partes
fn echo_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let total = exchange.request().request_data_length();
    if total == 0 {
        return exchange.send_response(&Response::text(StatusCode::BAD_REQUEST, "Empty body"));
    }

    let head = Response::new(StatusCode::OK)
        .with_content_type(content_type::APPLICATION_OCTET_STREAM)
        .with_partial_body(Vec::new(), total);
    exchange.send_response(&head)?;

    let mut chunk = [0u8; BODY_CHUNK];
    while exchange.body_remaining() > 0 {
        let n = exchange.read_request_data(&mut chunk)?;
        exchange.write_data(&chunk[..n])?;
    }
    Ok(())
}

/// POST /hash → SHA-256 del body en hexadecimal
fn hash_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; BODY_CHUNK];
    while exchange.body_remaining() > 0 {
        let n = exchange.read_request_data(&mut chunk)?;
        hasher.update(&chunk[..n]);
    }

    let hash = format!("{:x}", hasher.finalize());
    exchange.send_response(&Response::text(StatusCode::OK, &hash))
}

/// Cualquier otro path
fn invalid_request_handler(exchange: &mut Exchange<'_>) -> Result<()> {
    let response = Response::text(StatusCode::NOT_FOUND, "Invalid request!")
        .with_header("Server", SERVER_NAME);
    exchange.send_response(&response)
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_thread_names(true);

    let _ = match format {
        LogFormat::Pretty => subscriber.try_init(),
        LogFormat::Json => subscriber.json().try_init(),
    };
}

fn main() {
    let config = Config::new();
    init_logging(config.log_format);

    let server_config = match config.server_config() {
        Ok(server_config) => server_config
            .with_handler("/status", status_handler)
            .with_handler("/login", login_handler)
            .with_handler("/connect", connect_handler)
            .with_handler("/echo", echo_handler)
            .with_handler("/hash", hash_handler)
            .with_default_handler(invalid_request_handler),
        Err(e) => {
            error!(error = %e, "Configuración inválida");
            std::process::exit(2);
        }
    };

    let mut server = HttpServer::default();
    if let Err(e) = server.init(server_config).and_then(|_| server.start()) {
        error!(error = %e, address = %config.address(), "Error fatal al iniciar");
        std::process::exit(1);
    }
    STARTED_AT.get_or_init(Instant::now);

    if let Some(addr) = server.local_addr() {
        info!(address = %addr, "Listo. Escribí 'quit' o cerrá stdin para detener");
    }

    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) if line.trim() == "quit" => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }

    if let Err(e) = server.stop().and_then(|_| server.deinit()) {
        error!(error = %e, "Error al detener el servidor");
        std::process::exit(1);
    }
}
