//! Parse HTTP response header lines into a ResponseHead.

use super::ResponseHead;

/// Parse the header lines of one response (status line first) into a ResponseHead.
///
/// A missing or unparseable status line yields status 0, which callers treat
/// as a malformed response.
pub(crate) fn parse_head(lines: &[String]) -> ResponseHead {
    let mut status = 0;
    let mut content_length = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            status = line
                .split_whitespace()
                .nth(1)
                .and_then(|code| code.parse::<u32>().ok())
                .unwrap_or(0);
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<u64>().ok();
            }
        }
    }

    ResponseHead {
        status,
        content_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_head_status_and_length() {
        let head = parse_head(&lines(&["HTTP/1.1 200 OK", "Content-Length: 12345", ""]));
        assert_eq!(head.status, 200);
        assert_eq!(head.content_length, Some(12345));
        assert!(head.is_success());
    }

    #[test]
    fn parse_head_without_length() {
        let head = parse_head(&lines(&["HTTP/1.1 200 OK", "Transfer-Encoding: chunked"]));
        assert_eq!(head.content_length, None);
    }

    #[test]
    fn parse_head_http2_status_line() {
        let head = parse_head(&lines(&["HTTP/2 404", "content-length: 9"]));
        assert_eq!(head.status, 404);
        assert_eq!(head.content_length, Some(9));
        assert!(!head.is_success());
    }

    #[test]
    fn parse_head_garbage_length_is_unknown() {
        let head = parse_head(&lines(&["HTTP/1.0 200 OK", "Content-Length: lots"]));
        assert_eq!(head.content_length, None);
    }

    #[test]
    fn parse_head_missing_status_line() {
        let head = parse_head(&lines(&["Content-Length: 1"]));
        assert_eq!(head.status, 0);
    }
}
