//! Plain-text renderings of requests and responses for verbose logs.

use crate::request::CapturedRequest;
use hyper::{HeaderMap, StatusCode};
use std::fmt::Write as _;

/// Request line, headers and, when it has already been read, the body.
///
/// Never reads the body from the connection.
pub fn format_request(request: &CapturedRequest) -> String {
    let mut out = format!(
        "{} {} {:?}\n",
        request.method(),
        request.uri(),
        request.version()
    );
    write_headers(&mut out, request.headers());
    if let Some(body) = request.cached_body().filter(|b| !b.is_empty()) {
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(body));
        out.push('\n');
    }
    out
}

pub fn format_response(status: StatusCode, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut out = format!(
        "HTTP/1.1 {} {}\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );
    write_headers(&mut out, headers);
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(body));
        out.push('\n');
    }
    out
}

fn write_headers(out: &mut String, headers: &HeaderMap) {
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        let _ = writeln!(out, "{}: {}", name, values.join(","));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{Method, Uri};

    #[test]
    fn test_format_request_with_cached_body() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "text/plain".parse().unwrap());
        let request = CapturedRequest::from_parts(
            Method::POST,
            Uri::from_static("/ping?x=1"),
            headers,
            "Ping",
        );

        assert_eq!(
            format_request(&request),
            "POST /ping?x=1 HTTP/1.1\ncontent-type: text/plain\n\nPing\n"
        );
    }

    #[test]
    fn test_format_response_joins_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", "a".parse().unwrap());
        headers.append("x-tag", "b".parse().unwrap());

        let text = format_response(StatusCode::NOT_FOUND, &headers, None);
        assert_eq!(text, "HTTP/1.1 404 Not Found\nx-tag: a,b\n");
    }
}
