use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use tracing::{info, warn};

pub mod api;
pub mod routes;

pub use api::ServerState;

/// Largest accepted header block.
const MAX_HEADER_BYTES: usize = 64 * 1024;
/// Largest accepted body; requests may carry a whole card dataset.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

pub fn run_server(bind_addr: &str, state: ServerState) -> io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    info!(
        cards = state.cards.len(),
        "teamcalc server listening on http://{bind_addr}"
    );
    serve(listener, &state)
}

/// Accept loop over an already bound listener.
pub fn serve(listener: TcpListener, state: &ServerState) -> io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, state) {
                    warn!("request error: {err}");
                }
            }
            Err(err) => warn!("connection failed: {err}"),
        }
    }
    Ok(())
}

fn handle_connection(stream: &mut TcpStream, state: &ServerState) -> io::Result<()> {
    let Some(request) = read_request(stream)? else {
        return Ok(());
    };
    let response = routes::route_request(&request.method, &request.path, &request.body, state);
    info!(
        method = %request.method,
        path = %request.path,
        status = response.status_code,
        "request"
    );
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Read one request: headers up to the blank line, then exactly
/// `Content-Length` body bytes however many reads they take.
/// `Ok(None)` means the peer closed before sending anything.
pub fn read_request(reader: &mut impl Read) -> io::Result<Option<HttpRequest>> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 8192];
    let header_end = loop {
        if let Some(end) = find_header_end(&buffer) {
            break end;
        }
        if buffer.len() > MAX_HEADER_BYTES {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "request headers too large"));
        }
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed inside request headers",
            ));
        }
        buffer.extend_from_slice(&chunk[..read]);
    };

    let head = String::from_utf8_lossy(&buffer[..header_end.start]).into_owned();
    let mut lines = head.lines();
    let mut request_parts = lines.next().unwrap_or_default().split_whitespace();
    let method = request_parts.next().unwrap_or("GET").to_string();
    let path = request_parts.next().unwrap_or("/").to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map(|(_, value)| value.trim().parse::<usize>())
        .transpose()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "invalid Content-Length"))?
        .unwrap_or(0);
    if content_length > MAX_BODY_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "request body too large"));
    }

    let mut body = buffer.split_off(header_end.end);
    body.truncate(content_length);
    if body.len() < content_length {
        let already = body.len();
        body.resize(content_length, 0);
        reader.read_exact(&mut body[already..])?;
    }

    Ok(Some(HttpRequest {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    }))
}

/// Span of the header terminator, accepting bare `\n\n` as well.
fn find_header_end(buffer: &[u8]) -> Option<std::ops::Range<usize>> {
    let crlf = buffer
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|start| start..start + 4);
    let lf = buffer
        .windows(2)
        .position(|window| window == b"\n\n")
        .map(|start| start..start + 2);
    match (crlf, lf) {
        (Some(crlf), Some(lf)) if lf.start < crlf.start => Some(lf),
        (Some(crlf), _) => Some(crlf),
        (None, lf) => lf,
    }
}
