//! Page templates and static file resolution for the HTTP server.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

const INDEX_HTML: &str = include_str!("../templates/index.html");
const MESSAGE_HTML: &str = include_str!("../templates/message.html");
const ERROR_HTML: &str = include_str!("../templates/error.html");

/// Content type used for every template page.
pub const HTML: &str = "text/html";

/// The three pages the server renders itself.
#[derive(Debug, Clone)]
pub struct Templates {
    pub index: Vec<u8>,
    pub message: Vec<u8>,
    pub error: Vec<u8>,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            index: INDEX_HTML.as_bytes().to_vec(),
            message: MESSAGE_HTML.as_bytes().to_vec(),
            error: ERROR_HTML.as_bytes().to_vec(),
        }
    }
}

impl Templates {
    /// Load templates, preferring files in `dir` over the built-in pages.
    pub fn load(dir: Option<&Path>) -> Self {
        let mut templates = Self::default();
        let Some(dir) = dir else {
            return templates;
        };

        for (name, slot) in [
            ("index.html", &mut templates.index),
            ("message.html", &mut templates.message),
            ("error.html", &mut templates.error),
        ] {
            let path = dir.join(name);
            match fs::read(&path) {
                Ok(bytes) => {
                    info!(path = %path.display(), "Loaded template override");
                    *slot = bytes;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Template unreadable, using built-in");
                }
            }
        }
        templates
    }
}

/// A resolved GET target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// No template or file matches the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFound(pub String);

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "not found: {}", self.0)
    }
}

impl std::error::Error for NotFound {}

/// Maps request paths to templates or files under the served root.
pub struct StaticFiles {
    base_dir: PathBuf,
    templates: Templates,
}

impl StaticFiles {
    pub fn new<P: Into<PathBuf>>(base: P, templates: Templates) -> Self {
        Self {
            base_dir: base.into(),
            templates,
        }
    }

    /// The 404 page body.
    pub fn error_page(&self) -> &[u8] {
        &self.templates.error
    }

    /// Resolve a request target. Any query string or fragment is ignored.
    pub fn resolve(&self, target: &str) -> Result<Resolved, NotFound> {
        let path = strip_query(target);

        match path {
            "/" => return Ok(self.page(&self.templates.index)),
            "/message" => return Ok(self.page(&self.templates.message)),
            _ => {}
        }

        let file = self
            .map_path(path)
            .ok_or_else(|| NotFound(path.to_string()))?;
        if !file.is_file() {
            return Err(NotFound(path.to_string()));
        }

        debug!(file = %file.display(), "Serving static file");
        let body = fs::read(&file).map_err(|e| {
            warn!(file = %file.display(), error = %e, "Static file unreadable");
            NotFound(path.to_string())
        })?;

        Ok(Resolved {
            body,
            content_type: content_type(&file),
        })
    }

    fn page(&self, body: &[u8]) -> Resolved {
        Resolved {
            body: body.to_vec(),
            content_type: HTML,
        }
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }
}

fn strip_query(target: &str) -> &str {
    target
        .split(['?', '#'])
        .next()
        .unwrap_or(target)
}

/// Guess a MIME type from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
        .as_str()
    {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/vnd.microsoft.icon",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        "wasm" => "application/wasm",
        _ => "text/plain",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, StaticFiles) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("style.css"), b"body { color: red; }").unwrap();
        fs::write(dir.path().join("notes.unknownext"), b"plain").unwrap();
        fs::create_dir(dir.path().join("img")).unwrap();
        fs::write(dir.path().join("img/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        let files = StaticFiles::new(dir.path(), Templates::default());
        (dir, files)
    }

    #[test]
    fn test_templates_resolved_without_files() {
        let files = StaticFiles::new("/nonexistent-root", Templates::default());
        let index = files.resolve("/").unwrap();
        assert_eq!(index.content_type, "text/html");
        assert_eq!(index.body, INDEX_HTML.as_bytes());

        let message = files.resolve("/message?from=nav").unwrap();
        assert_eq!(message.body, MESSAGE_HTML.as_bytes());
    }

    #[test]
    fn test_static_file_bytes_and_type() {
        let (_dir, files) = fixture();

        let css = files.resolve("/style.css").unwrap();
        assert_eq!(css.body, b"body { color: red; }");
        assert_eq!(css.content_type, "text/css");

        let png = files.resolve("/img/logo.png").unwrap();
        assert_eq!(png.content_type, "image/png");
        assert_eq!(png.body.len(), 4);

        let unknown = files.resolve("/notes.unknownext").unwrap();
        assert_eq!(unknown.content_type, "text/plain");
    }

    #[test]
    fn test_missing_and_directory_not_found() {
        let (_dir, files) = fixture();
        assert_eq!(
            files.resolve("/missing.js"),
            Err(NotFound("/missing.js".to_string()))
        );
        assert!(files.resolve("/img").is_err());
    }

    #[test]
    fn test_traversal_not_found() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        fs::create_dir_all(root.join("img")).unwrap();
        fs::write(outer.path().join("outside.txt"), b"secret").unwrap();
        let files = StaticFiles::new(root, Templates::default());

        assert!(files.resolve("/../outside.txt").is_err());
        assert!(files.resolve("/img/../../outside.txt").is_err());
        assert!(files.resolve("/./../outside.txt").is_err());
    }

    #[test]
    fn test_error_template_mentions_not_found() {
        let files = StaticFiles::new(".", Templates::default());
        let page = String::from_utf8_lossy(files.error_page()).to_string();
        assert!(page.contains("Not Found"));
    }

    #[test]
    fn test_template_override() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), b"<h1>custom</h1>").unwrap();

        let templates = Templates::load(Some(dir.path()));
        assert_eq!(templates.index, b"<h1>custom</h1>");
        assert_eq!(templates.message, MESSAGE_HTML.as_bytes());
    }
}
