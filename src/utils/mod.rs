use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a unique request ID
pub fn generate_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let counter = COUNTER.fetch_add(1, Ordering::SeqCst);

    format!("{:x}-{:x}", timestamp, counter)
}

/// Current time as unix seconds
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Check if a request method is side-effect free and eligible for caching
pub fn is_cacheable_method(method: &hyper::Method) -> bool {
    matches!(method, &hyper::Method::GET | &hyper::Method::HEAD)
}

/// Check if a request method mutates backend state
pub fn is_mutating_method(method: &hyper::Method) -> bool {
    matches!(
        method,
        &hyper::Method::POST | &hyper::Method::PUT | &hyper::Method::PATCH | &hyper::Method::DELETE
    )
}

/// Normalize a URL path for matching and cache keys.
///
/// Lowercases, strips any query string, collapses duplicate slashes and
/// removes the trailing slash (except for the root path). Malformed input
/// (empty string, missing leading slash) is coerced rather than rejected.
pub fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or("");

    let mut result = String::with_capacity(path.len() + 1);
    if !path.starts_with('/') {
        result.push('/');
    }

    let mut last_was_slash = false;
    for c in path.chars() {
        if c == '/' {
            if !last_was_slash || result.is_empty() {
                result.push(c);
            }
            last_was_slash = true;
        } else {
            result.extend(c.to_lowercase());
            last_was_slash = false;
        }
    }

    // Remove trailing slash if not root
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }

    if result.is_empty() {
        result.push('/');
    }

    result
}

/// Normalize a query string: split into pairs, sort, rejoin.
///
/// Two requests whose parameters differ only in order produce the same
/// normalized query and therefore the same cache key.
pub fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}
