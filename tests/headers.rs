use emberhttp::Headers;

fn tokens_as_strings(tokens: Vec<Vec<u8>>) -> Vec<String> {
    tokens
        .into_iter()
        .map(|t| String::from_utf8(t).unwrap())
        .collect()
}

#[test]
fn test_add_and_get() {
    let mut headers = Headers::new();
    headers.add("Some-Header", &b"Hello, World!"[..]);

    let value = std::str::from_utf8(headers.get("some-header").unwrap()).unwrap();
    assert_eq!(value, "Hello, World!");
}

#[test]
fn test_get_is_case_insensitive_and_last_wins() {
    let mut headers = Headers::new();
    headers.add("X-Thing", &b"first"[..]);
    headers.add("x-thing", &b"second"[..]);

    let value = std::str::from_utf8(headers.get("X-THING").unwrap()).unwrap();
    assert_eq!(value, "second");
}

#[test]
fn test_replace() {
    let mut headers = Headers::new();
    headers.add("Some-Header", &b"old value"[..]);
    headers.replace("Some-Header", &b"new value"[..]);

    let value = std::str::from_utf8(headers.get("some-header").unwrap()).unwrap();
    assert_eq!(value, "new value");
    assert_eq!(headers.get_count(), 1);
}

#[test]
fn test_remove() {
    let mut headers = Headers::new();
    headers.add("Some-Header", &b"value 1"[..]);
    headers.add("Some-Header", &b"value 2"[..]);
    assert!(headers.get("some-header").is_some());
    headers.remove("Some-Header");
    assert!(headers.get("some-header").is_none());
}

#[test]
fn test_content_length_tracked_separately() {
    let mut headers = Headers::new();
    headers.add("Content-Length", &b"123"[..]);
    assert_eq!(headers.get_content_length(), Some(123));
    headers.remove("content-length");
    assert_eq!(headers.get_content_length(), None);
}

#[test]
fn test_transfer_encoding_is_set() {
    let mut headers = Headers::new();
    headers.set_transfer_encoding_chunked();
    assert!(headers.is_transfer_encoding_chunked());
    assert_eq!(tokens_as_strings(headers.get_transfer_encoding()), vec!["chunked"]);

    let mut headers = Headers::new();
    headers.add("Transfer-Encoding", &b"chunked"[..]);
    assert!(headers.is_transfer_encoding_chunked());
    assert_eq!(tokens_as_strings(headers.get_transfer_encoding()), vec!["chunked"]);
}

#[test]
fn test_transfer_encoding_multiple_values() {
    let mut headers = Headers::new();
    headers.add("Transfer-Encoding", &b"gzip, deflate"[..]);
    headers.add("Transfer-Encoding", &b"other"[..]);

    assert!(!headers.is_transfer_encoding_chunked());
    assert_eq!(
        tokens_as_strings(headers.get_transfer_encoding()),
        vec!["gzip", "deflate", "other"]
    );
}

#[test]
fn test_connection_is_set() {
    let mut headers = Headers::new();
    headers.set_connection_close();
    assert!(headers.is_connection_close());
    assert_eq!(tokens_as_strings(headers.get_connection_values()), vec!["close"]);

    let mut headers = Headers::new();
    headers.add("Connection", &b"close"[..]);
    assert!(headers.is_connection_close());
    assert_eq!(tokens_as_strings(headers.get_connection_values()), vec!["close"]);
}

#[test]
fn test_connection_multiple_values() {
    let mut headers = Headers::new();
    headers.add("Connection", &b"keep-alive"[..]);
    headers.add("Connection", &b"upgrade"[..]);

    assert!(!headers.is_connection_close());
    assert_eq!(
        tokens_as_strings(headers.get_connection_values()),
        vec!["keep-alive", "upgrade"]
    );
}

#[test]
fn test_100_continue_detection() {
    let mut headers = Headers::new();
    assert!(!headers.is_100_continue());
    headers.add("Expect", &b"100-continue"[..]);
    assert!(headers.is_100_continue());
}
