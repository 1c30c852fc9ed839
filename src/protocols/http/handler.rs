//! Request dispatch: pages and static files for GET, message submission
//! for POST.

use tracing::{debug, error, info, warn};

use super::parser::{Method, Request};
use super::response::Response;
use crate::form;
use crate::static_files::{StaticFiles, HTML};
use crate::storage::{MessageRecord, MessageStore};

/// Produce the response for one request.
pub async fn handle<S: MessageStore>(request: &Request, files: &StaticFiles, store: &S) -> Response {
    match &request.method {
        Method::Get => handle_get(&request.target, files),
        Method::Post => handle_post(request, store).await,
        Method::Other(method) => {
            warn!(method = %method, "Unsupported method");
            Response::error_page(501, &format!("Unsupported method ('{}')", method))
        }
    }
}

fn handle_get(target: &str, files: &StaticFiles) -> Response {
    match files.resolve(target) {
        Ok(resolved) => Response::with_body(200, resolved.content_type, resolved.body),
        Err(e) => {
            info!(error = %e, "Page not found");
            Response::with_body(404, HTML, files.error_page().to_vec())
        }
    }
}

/// Store the submitted message, then send the browser home.
///
/// Parse and store failures are logged only; the client always gets the
/// same redirect.
async fn handle_post<S: MessageStore>(request: &Request, store: &S) -> Response {
    debug!(
        content_type = request.header("content-type"),
        bytes = request.body.len(),
        "Form submitted"
    );

    let parsed = form::decode(&request.body).and_then(|fields| {
        debug!(
            fields = fields.len(),
            keys = ?fields.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            "Decoded form"
        );
        form::username_message(&fields)
    });

    match parsed {
        Ok((username, message)) => {
            let record = MessageRecord::new(&username, &message);
            if let Err(e) = store.append(&record).await {
                error!(error = %e, username = %record.username, "Error saving message");
            }
        }
        Err(e) => {
            warn!(
                error = %e,
                body = %String::from_utf8_lossy(&request.body),
                "Error parsing form data"
            );
        }
    }

    Response::redirect("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::static_files::Templates;
    use crate::storage::{MemoryStore, StoreError};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::fs;

    struct FailingStore;

    impl MessageStore for FailingStore {
        async fn append(&self, _record: &MessageRecord) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    fn request(method: Method, target: &str, body: &'static [u8]) -> Request {
        Request {
            method,
            target: target.to_string(),
            version: "HTTP/1.1".to_string(),
            headers: HashMap::new(),
            body: Bytes::from_static(body),
        }
    }

    fn files() -> (tempfile::TempDir, StaticFiles) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("style.css"), b"h1 { margin: 0; }").unwrap();
        let files = StaticFiles::new(dir.path(), Templates::default());
        (dir, files)
    }

    #[tokio::test]
    async fn test_get_pages() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        for target in ["/", "/message"] {
            let response = handle(&request(Method::Get, target, b""), &files, &store).await;
            assert_eq!(response.status, 200);
            assert_eq!(response.header("Content-Type"), Some("text/html"));
            assert!(!response.body.is_empty());
        }
    }

    #[tokio::test]
    async fn test_get_static_file() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        let response = handle(&request(Method::Get, "/style.css", b""), &files, &store).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header("Content-Type"), Some("text/css"));
        assert_eq!(&response.body[..], b"h1 { margin: 0; }");
    }

    #[tokio::test]
    async fn test_get_missing_is_404_html() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        let response = handle(&request(Method::Get, "/nope.html", b""), &files, &store).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert!(String::from_utf8_lossy(&response.body).contains("Not Found"));
    }

    #[tokio::test]
    async fn test_post_stores_record_and_redirects() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        let response = handle(
            &request(Method::Post, "/message", b"username=Alice&message=Hello"),
            &files,
            &store,
        )
        .await;
        assert_eq!(response.status, 302);
        assert_eq!(response.header("Location"), Some("/"));
        assert!(response.body.is_empty());

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "Alice");
        assert_eq!(records[0].message, "Hello");
    }

    #[tokio::test]
    async fn test_post_trims_values() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        handle(
            &request(Method::Post, "/", b"username=+Bob+&message=%20hi+there%20"),
            &files,
            &store,
        )
        .await;
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].username, "Bob");
        assert_eq!(records[0].message, "hi there");
    }

    #[tokio::test]
    async fn test_malformed_post_redirects_without_storing() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        for body in [
            &b"username"[..],
            &b"username=Alice&message"[..],
            &b"username=Alice"[..],
            &b"username=A&message=x%2Cy"[..],
            &b""[..],
        ] {
            let req = Request {
                body: Bytes::copy_from_slice(body),
                ..request(Method::Post, "/", b"")
            };
            let response = handle(&req, &files, &store).await;
            assert_eq!(response.status, 302);
            assert_eq!(response.header("Location"), Some("/"));
        }
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_raw_invalid_utf8_post_not_stored() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        let response = handle(
            &request(Method::Post, "/", b"username=\xff&message=hi"),
            &files,
            &store,
        )
        .await;
        assert_eq!(response.status, 302);
        assert_eq!(response.header("Location"), Some("/"));
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_still_redirects() {
        let (_dir, files) = files();

        let response = handle(
            &request(Method::Post, "/", b"username=Alice&message=Hello"),
            &files,
            &FailingStore,
        )
        .await;
        assert_eq!(response.status, 302);
        assert_eq!(response.header("Location"), Some("/"));
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let (_dir, files) = files();
        let store = MemoryStore::new();

        let response = handle(
            &request(Method::Other("PUT".to_string()), "/", b""),
            &files,
            &store,
        )
        .await;
        assert_eq!(response.status, 501);
    }
}
