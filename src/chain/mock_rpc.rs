//! In-process JSON-RPC endpoint for exercising the chain client without a node

use std::sync::{Arc, Mutex};

use reqwest::Url;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

type Handler = dyn Fn(&str, &Value) -> Option<Value> + Send + Sync;

/// A local endpoint that either answers from a handler or never answers at all
pub struct MockRpc {
    url: Url,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockRpc {
    /// Accepts connections and reads requests but never replies
    pub async fn silent() -> Self {
        Self::start(None).await
    }

    /// Answers each call with the handler's result; `None` drops the connection unanswered
    pub async fn scripted<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self::start(Some(Arc::new(handler))).await
    }

    async fn start(handler: Option<Arc<Handler>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap()).parse().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let recorded = calls.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, handler.clone(), recorded.clone()));
            }
        });

        Self { url, calls }
    }

    pub fn url(&self) -> Url {
        self.url.clone()
    }

    /// Params of every call made to `method`, in arrival order
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

async fn serve(mut stream: TcpStream, handler: Option<Arc<Handler>>, calls: Arc<Mutex<Vec<(String, Value)>>>) {
    let mut buf = Vec::new();

    loop {
        let Some(body) = read_request(&mut stream, &mut buf).await else {
            return;
        };
        let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        let method = request["method"].as_str().unwrap_or_default().to_string();
        let params = request["params"].clone();
        calls.lock().unwrap().push((method.clone(), params.clone()));

        let Some(handler) = &handler else {
            // hold the connection open without replying
            std::future::pending::<()>().await;
            return;
        };
        let Some(result) = handler(&method, &params) else {
            return;
        };

        let response = json!({ "jsonrpc": "2.0", "id": request["id"].clone(), "result": result }).to_string();
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n",
            response.len()
        );
        if stream.write_all(head.as_bytes()).await.is_err() || stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Read one HTTP/1.1 request off a keep-alive stream and return its body
async fn read_request(stream: &mut TcpStream, buf: &mut Vec<u8>) -> Option<Vec<u8>> {
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = buf[header_end..header_end + content_length].to_vec();
    buf.drain(..header_end + content_length);
    Some(body)
}
