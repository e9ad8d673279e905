use url::Url;

/// Query parameters that don't change which page is served.
const SESSION_PARAMS: &[&str] = &["s", "sid", "sessionhash", "fbclid", "gclid"];

/// Normalize a forum URL for use as a visited-set or post key.
///
/// Forum software sprinkles session ids into every link, so two links to the
/// same forum or thread rarely compare equal as written. The result is only a
/// key; requests still go to the URL as the forum wrote it.
#[must_use]
pub fn normalize_url(url: &Url) -> String {
    if url.scheme() != "http" && url.scheme() != "https" {
        return url.to_string();
    }

    let mut normalized = url.clone();

    // Same page over either scheme
    if normalized.scheme() == "http" {
        let _ = normalized.set_scheme("https");
    }

    // Remove default ports
    if normalized.port() == Some(443) || normalized.port() == Some(80) {
        let _ = normalized.set_port(None);
    }

    let filtered_params: Vec<(String, String)> = normalized
        .query_pairs()
        .filter(|(key, _)| !is_session_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if filtered_params.is_empty() {
        normalized.set_query(None);
    } else {
        let new_query: String = filtered_params
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        normalized.set_query(Some(&new_query));
    }

    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.ends_with('/') && path.len() > 1 {
        normalized.set_path(path.trim_end_matches('/'));
    }

    normalized.to_string()
}

fn is_session_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    SESSION_PARAMS.contains(&lower.as_str()) || lower.starts_with("utm_")
}
