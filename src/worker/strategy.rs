//! Asset classification: which caching policy a request gets.

/// Caching policy class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetClass {
    /// Markup, styles, scripts, the scope root and the manifest: network first.
    Dynamic,
    /// Everything else (images, icons): cache first.
    Static,
}

/// Normalises a scope to start and end with `/`.
#[must_use]
pub fn normalize_scope(scope: &str) -> String {
    let trimmed = scope.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Classifies a request path under `scope`.
#[must_use]
pub fn classify(path: &str, scope: &str) -> AssetClass {
    let scope = normalize_scope(scope);
    let dynamic = path.ends_with(".html")
        || path.ends_with(".css")
        || path.ends_with(".js")
        || path == scope
        || path == manifest_path(&scope);

    if dynamic {
        AssetClass::Dynamic
    } else {
        AssetClass::Static
    }
}

/// Whether a failed request for `path` may fall back to the root document.
#[must_use]
pub fn is_document(path: &str, scope: &str) -> bool {
    path.ends_with(".html") || path == normalize_scope(scope)
}

/// Path of the root document under `scope`.
#[must_use]
pub fn root_document(scope: &str) -> String {
    format!("{}index.html", normalize_scope(scope))
}

fn manifest_path(normalized_scope: &str) -> String {
    format!("{normalized_scope}manifest.json")
}
