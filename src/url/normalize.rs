use url::Url;

/// Tracking query parameters removed during normalization, beyond the
/// `utm_*` prefix family.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "igshid", "mc_cid", "mc_eid", "ref", "ref_src", "source", "spm",
];

/// Normalizes a URL into the crawl engine's canonical form
///
/// # Normalization Steps
///
/// 1. Parse the URL, resolving against `base` when it is relative
/// 2. Reject anything that is not http or https
/// 3. Lowercase the host and drop default ports
/// 4. Collapse repeated `/` in the path and strip the trailing slash
///    (except for the root path)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters (`utm_*` and a fixed set)
/// 7. Sort remaining query keys lexicographically, keeping value order
///    stable for repeated keys
///
/// Returns `None` for unparseable input or unsupported schemes. The
/// function is idempotent: normalizing its own output is a no-op.
///
/// # Examples
///
/// ```
/// use webx::url::normalize;
///
/// let url = normalize("https://Example.com/docs/page/?utm_source=x&b=2&a=1#section", None);
/// assert_eq!(url.as_deref(), Some("https://example.com/docs/page?a=1&b=2"));
/// ```
pub fn normalize(input: &str, base: Option<&str>) -> Option<String> {
    let mut url = match Url::parse(input) {
        Ok(u) => u,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(base?).ok()?;
            base.join(input).ok()?
        }
        Err(_) => return None,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    // The url crate lowercases hosts and elides default ports on parse;
    // hostless forms (e.g. data URLs) never reach here past the scheme
    // check, but guard anyway.
    url.host_str()?;

    let path = normalize_path(url.path());
    url.set_path(&path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            // Re-encoding through form_urlencoded keeps separator
            // characters inside values escaped, so a second
            // normalization pass sees the same pairs.
            let query = ::url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&params)
                .finish();
            url.set_query(Some(&query));
        }
    }

    Some(url.to_string())
}

/// Collapses repeated slashes and strips the trailing slash (root stays `/`).
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Drops tracking parameters and sorts the remainder by key.
fn filter_and_sort_query(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort keeps the original value order for repeated keys.
    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}
