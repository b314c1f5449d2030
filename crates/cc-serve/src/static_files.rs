use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::{Component, Path, PathBuf};

const INDEX: &str = "index.html";

/// Serves a file from the UI bundle. Unknown paths fall back to `index.html`
/// so client-side routes load; paths escaping `root` are refused.
pub async fn serve(root: &Path, request_path: &str) -> Response {
    let Some(path) = resolve(root, request_path) else {
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    };

    let is_file = tokio::fs::metadata(&path)
        .await
        .is_ok_and(|meta| meta.is_file());
    if is_file {
        if let Ok(content) = tokio::fs::read(&path).await {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            return file_response(mime.as_ref(), content);
        }
    }

    match tokio::fs::read(root.join(INDEX)).await {
        Ok(content) => file_response("text/html; charset=utf-8", content),
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

fn file_response(content_type: &str, content: Vec<u8>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(content))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Lexically joins `request_path` onto `root`; `None` when it climbs out.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    let relative = if relative.is_empty() { INDEX } else { relative };
    let mut resolved = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(root.join(resolved))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(INDEX), "<html>app</html>").unwrap();
        std::fs::create_dir_all(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("app.css"), "body{}").unwrap();
        dir
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn resolve_rejects_escape() {
        let root = Path::new("/srv/ui");
        assert_eq!(resolve(root, "/"), Some(root.join(INDEX)));
        assert_eq!(resolve(root, "/a/../b.js"), Some(root.join("b.js")));
        assert_eq!(resolve(root, "/../etc/passwd"), None);
        assert_eq!(resolve(root, "/assets/../../secret"), None);
    }

    #[tokio::test]
    async fn serves_asset_with_content_type() {
        let dir = bundle();
        let response = serve(dir.path(), "/assets/app.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "text/css"
        );
        assert_eq!(body_text(response).await, "body{}");
    }

    #[tokio::test]
    async fn unknown_path_falls_back_to_index() {
        let dir = bundle();
        let response = serve(dir.path(), "/sessions/42").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert_eq!(body_text(response).await, "<html>app</html>");
    }

    #[tokio::test]
    async fn traversal_is_forbidden() {
        let dir = bundle();
        let response = serve(&dir.path().join("assets"), "/../index.html").await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_bundle_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = serve(dir.path(), "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
