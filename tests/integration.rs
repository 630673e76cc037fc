use emberhttp::{Method, Server};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::thread::{self};
use std::time::Duration;

const TEST_PORT: u16 = 32734;

#[test]
fn simple_multi_test() {
    let h = start_server();
    thread::sleep(Duration::from_millis(50));

    let response = request("GET", "/hello", "");
    assert_status_and_body(&response, 200, "Hello, World!");

    let response = request("POST", "/api/uppercase", "test123");
    assert_status_and_body(&response, 201, "TEST123");

    let response = request("POST", "/not-routed", "");
    assert_status_and_body(&response, 404, "");

    let response = request("DELETE", "/user/123", "");
    assert_status_and_body(&response, 400, "no user: 123");

    let response = request("PUT", "/hello", "");
    assert_eq!(status_code(&response), 404);

    let _ = h.join();
}

#[test]
fn keep_alive_serves_multiple_requests_on_one_connection() {
    let h = start_server_on(TEST_PORT + 1);
    thread::sleep(Duration::from_millis(50));

    let mut stream = TcpStream::connect(("127.0.0.1", TEST_PORT + 1)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    stream
        .write_all(b"GET /hello HTTP/1.1\r\nhost: test\r\n\r\n")
        .unwrap();
    let first = read_one_response(&mut stream);
    assert!(first.starts_with("HTTP/1.1 200 OK"));
    assert!(first.ends_with("Hello, World!"));

    stream
        .write_all(b"GET /hello HTTP/1.1\r\nhost: test\r\nconnection: close\r\n\r\n")
        .unwrap();
    let second = read_to_close(&mut stream);
    assert!(second.starts_with("HTTP/1.1 200 OK"));
    assert!(second.ends_with("Hello, World!"));

    let _ = h;
}

// ---------------------------------------------------------------------
// UTILS
// ---------------------------------------------------------------------

fn start_server() -> std::thread::JoinHandle<()> {
    start_server_on(TEST_PORT)
}

fn start_server_on(port: u16) -> std::thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut builder = Server::builder(("127.0.0.1", port)).unwrap();

        builder
            .route(Method::Get, "/hello", |_req, res| {
                res.ok(&b"Hello, World!"[..]).ok();
            })
            .route(Method::Post, "/api/uppercase", |req, res| {
                let mut body = req.body().buffered().unwrap_or(&[]).to_vec();
                body.make_ascii_uppercase();
                res.send(emberhttp::Status::of(201), &body[..]).ok();
            })
            .route(Method::Delete, "/user/:id", |req, res| {
                let body = format!("no user: {}", req.param("id").unwrap());
                res.send(emberhttp::Status::of(400), body.as_bytes()).ok();
            });

        builder.build().serve().ok();
    })
}

fn request(method: &str, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", TEST_PORT)).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let req = format!(
        "{method} {path} HTTP/1.1\r\nhost: test\r\nconnection: close\r\ncontent-length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(req.as_bytes()).unwrap();
    stream.shutdown(std::net::Shutdown::Write).ok();
    read_to_close(&mut stream)
}

fn read_to_close(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).ok();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Reads exactly one HTTP response off a still-open connection, relying
/// on the response's own content-length to know where it ends.
fn read_one_response(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "connection closed before a full response arrived");
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let headers = &text[..head_end];
            let cl = headers
                .lines()
                .find_map(|l| l.to_lowercase().strip_prefix("content-length: ").map(|v| v.trim().parse::<usize>().unwrap()));
            if let Some(cl) = cl {
                if buf.len() >= head_end + 4 + cl {
                    return String::from_utf8_lossy(&buf).into_owned();
                }
            }
        }
    }
}

fn status_code(response: &str) -> u16 {
    response
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("malformed status line")
}

fn assert_status_and_body(response: &str, expected_status: u16, expected_body: &str) {
    assert_eq!(status_code(response), expected_status);
    let body = response.split("\r\n\r\n").nth(1).unwrap_or("");
    assert_eq!(body, expected_body);
}
