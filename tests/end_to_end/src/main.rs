fn main() {
    println!("Run `cargo test -p end-to-end` to execute the gateway/service tests.");
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use filegate_gateway::{AppState, ErrorBody, FileListBody, MessageBody, router};
    use filegate_rpc::{RpcClient, RpcServer};
    use filegate_service::FileService;
    use filegate_storage::LocalStorage;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    const BOUNDARY: &str = "end-to-end-boundary";

    /// A transfer service on loopback plus a gateway router pointed at it.
    struct Stack {
        dir: TempDir,
        app: Router,
        server: Arc<RpcServer>,
    }

    impl Stack {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let storage = LocalStorage::open(dir.path(), 1024).await.unwrap();
            let server = RpcServer::new(FileService::new(storage), CancellationToken::new());
            let listener = RpcServer::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();

            let running = Arc::clone(&server);
            tokio::spawn(async move { running.run(listener).await });

            let client = RpcClient::new(addr.to_string());
            let app = router(AppState::new(Arc::new(client)));
            Self { dir, app, server }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn path(&self, name: &str) -> PathBuf {
            self.root().join(name)
        }

        async fn send(&self, req: Request<Body>) -> Response {
            self.app.clone().oneshot(req).await.unwrap()
        }
    }

    impl Drop for Stack {
        fn drop(&mut self) {
            self.server.shutdown();
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload(filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json<T: serde::de::DeserializeOwned>(resp: Response) -> T {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn lists_files_on_disk() {
        let stack = Stack::start().await;
        std::fs::write(stack.path("file1.txt"), b"one").unwrap();
        std::fs::write(stack.path("file2.png"), b"two").unwrap();

        let resp = stack.send(get("/files/")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: FileListBody = json(resp).await;
        let listed: HashSet<String> = body.filenames.into_iter().collect();
        let expected: HashSet<String> = ["file1.txt", "file2.png"].map(String::from).into();
        assert_eq!(listed, expected);
    }

    #[tokio::test]
    async fn empty_root_lists_nothing() {
        let stack = Stack::start().await;

        let body: FileListBody = json(stack.send(get("/files/")).await).await;
        assert!(body.filenames.is_empty());
    }

    #[tokio::test]
    async fn upload_writes_file_to_disk() {
        let stack = Stack::start().await;
        let content = b"Hello, this is a test file!";

        let resp = stack.send(upload("test_file.txt", content)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: MessageBody = json(resp).await;
        assert!(!body.message.is_empty());

        assert_eq!(std::fs::read(stack.path("test_file.txt")).unwrap(), content);
    }

    #[tokio::test]
    async fn upload_appends_to_existing_file() {
        let stack = Stack::start().await;

        stack.send(upload("log.txt", b"first ")).await;
        stack.send(upload("log.txt", b"second")).await;

        assert_eq!(std::fs::read(stack.path("log.txt")).unwrap(), b"first second");
    }

    #[tokio::test]
    async fn download_missing_file_is_404() {
        let stack = Stack::start().await;

        let resp = stack.send(get("/download/missing.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json(resp).await;
        assert_eq!(body.detail, "File 'missing.txt' not found.");
    }

    #[tokio::test]
    async fn download_escaping_name_is_400() {
        let stack = Stack::start().await;

        let resp = stack.send(get("/download/..%2Fsecret")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn absent_backslash_name_is_404() {
        let stack = Stack::start().await;

        let resp = stack.send(get("/download/a%5Cb.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json(resp).await;
        assert_eq!(body.detail, "File 'a\\b.txt' not found.");
    }

    #[tokio::test]
    async fn non_ascii_names_roundtrip() {
        let stack = Stack::start().await;
        std::fs::write(stack.path("résumé.txt"), b"hello").unwrap();

        let body: FileListBody = json(stack.send(get("/files/")).await).await;
        assert_eq!(body.filenames, vec!["résumé.txt"]);

        let resp = stack.send(get("/download/r%C3%A9sum%C3%A9.txt")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(content, &b"hello"[..]);

        let resp = stack.send(get("/download/m%C3%AFssing.txt")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json(resp).await;
        assert!(body.detail.contains("mïssing.txt"));
    }

    #[tokio::test]
    async fn upload_then_download_roundtrip() {
        let stack = Stack::start().await;
        for (name, len) in [("empty.bin", 0usize), ("small.bin", 100), ("exact.bin", 2048), ("large.bin", 5000)] {
            let original: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();

            let resp = stack.send(upload(name, &original)).await;
            assert_eq!(resp.status(), StatusCode::OK, "upload {name}");

            let resp = stack.send(get(&format!("/download/{name}"))).await;
            assert_eq!(resp.status(), StatusCode::OK, "download {name}");
            assert_eq!(resp.headers()[CONTENT_TYPE], "application/octet-stream");
            assert_eq!(
                resp.headers()[CONTENT_DISPOSITION],
                format!("attachment; filename={name}").as_str()
            );
            let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            assert_eq!(body, original, "content of {name}");
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_500() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let app = router(AppState::new(Arc::new(RpcClient::new(addr.to_string()))));

        let resp = app.clone().oneshot(get("/files/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let resp = app.oneshot(get("/download/a.txt")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = json(resp).await;
        assert!(!body.detail.is_empty());
    }

    #[tokio::test]
    async fn gateway_stops_on_cancel() {
        let stack = Stack::start().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(filegate_gateway::serve(
            listener,
            stack.app.clone(),
            cancel.clone(),
        ));
        cancel.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
