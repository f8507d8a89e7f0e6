//! Shared fixtures: canned CCTV pages and a tiny local HTTP server

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const VIDEO_URL: &str = "http://tv.cctv.com/2016/02/05/VIDEUS7apq3lKrHG9Dncm03B160205.shtml";
pub const VIDEO_ID: &str = "efc5d49e5b3b4ab2b445f1a7a1d0e4f6";
pub const LIST_URL: &str = "https://tv.cctv.com/2016/12/28/VIDALOmjxOZe51NjntPvOI00161228.shtml";

pub const THUMBNAIL: &str = "//p1.img.cctvpic.com/photoworkspace/thumb.jpg";

pub fn video_page(id: &str, thumbnail: &str) -> String {
    format!(
        r#"<html><head>
<title>ignored</title>
<meta name="description" content="《夕阳红》栏目">
<meta property="og:image" content="{}">
</head><body>
<script>var guid = "{}";</script>
</body></html>"#,
        thumbnail, id
    )
}

/// Metadata response with both progressive tiers and an HLS manifest
pub fn stream_record(title: &str, low: &str, standard: &str, hls: Option<&str>) -> String {
    let mut value = serde_json::json!({
        "title": title,
        "editer_name": "CCTV",
        "f_pgmtime": "2016-02-12 12:25:56",
        "video": {
            "totalLength": "1592",
            "lowChapters": [{"url": low}],
            "chapters": [{"url": standard}],
        },
    });
    if let Some(hls) = hls {
        value["hls_url"] = serde_json::Value::String(hls.to_string());
    }
    value.to_string()
}

#[derive(Clone)]
pub struct Route {
    pub body: Vec<u8>,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
}

impl Route {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            chunk_size: 16 * 1024,
            chunk_delay: Duration::ZERO,
        }
    }

    /// Trickle the body out in small chunks
    pub fn slow(body: impl Into<Vec<u8>>, chunk_size: usize, chunk_delay: Duration) -> Self {
        Self {
            body: body.into(),
            chunk_size,
            chunk_delay,
        }
    }
}

/// Serve `routes` (keyed by path) on a random local port; returns the base URL
pub async fn serve(routes: Vec<(&str, Route)>) -> String {
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, route)| (path.to_string(), route))
            .collect(),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let Ok(n) = socket.read(&mut chunk).await else {
                        return;
                    };
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buf);
                let target = request.split_whitespace().nth(1).unwrap_or("/");
                let path = target.split('?').next().unwrap_or(target);

                let Some(route) = routes.get(path) else {
                    let _ = socket
                        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                        .await;
                    return;
                };

                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    route.body.len()
                );
                if socket.write_all(header.as_bytes()).await.is_err() {
                    return;
                }
                for piece in route.body.chunks(route.chunk_size.max(1)) {
                    if socket.write_all(piece).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                    if !route.chunk_delay.is_zero() {
                        tokio::time::sleep(route.chunk_delay).await;
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}
