use url::Url;

/// Reduces a URL to its origin (`scheme://host[:port]`) for comparison.
///
/// Returns `None` for unparseable input or URLs without a host.
pub fn normalize_origin(input: &str) -> Option<String> {
    let parsed = Url::parse(input).ok()?;
    let host = parsed.host_str()?;
    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };
    Some(origin)
}

/// True when both URLs parse and share the same origin.
///
/// A stored session is only worth probing against the origin it was captured
/// from; anything else is treated as a different deployment.
pub fn same_origin(a: &str, b: &str) -> bool {
    match (normalize_origin(a), normalize_origin(b)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
