//! Endpoint string assembly for the REST-style API the bridge fronts.
//!
//! Endpoints are opaque to the bridge itself; these helpers only exist so
//! collaborators can build `path?key=value&...` strings without hand
//! concatenation.

/// Joins a path with query parameters: `with_query("api/rest/actions",
/// &[("sort", "-id")])` yields `api/rest/actions?sort=-id`. An empty
/// parameter list yields the bare path.
pub fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let query: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    format!("{}?{}", path, query.join("&"))
}
