//! Throwaway HTTP server for client tests.

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A canned response, streamed body chunk by body chunk.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    status: StatusCode,
    content_type: &'static str,
    chunks: Vec<Vec<u8>>,
    /// Pause after each body chunk.
    chunk_delay: Duration,
}

impl Reply {
    pub(crate) fn ok(content_type: &'static str, body: &str) -> Self {
        Self::chunked(content_type, vec![body.as_bytes().to_vec()])
    }

    pub(crate) fn chunked(content_type: &'static str, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type,
            chunks,
            chunk_delay: Duration::from_millis(5),
        }
    }

    pub(crate) fn status(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            content_type: "text/plain",
            chunks: Vec::new(),
            chunk_delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    fn into_http(self) -> Response {
        let delay = self.chunk_delay;
        let body = futures::stream::iter(self.chunks.into_iter().enumerate()).then(
            move |(i, chunk)| async move {
                if i > 0 {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, Infallible>(chunk)
            },
        );

        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type)],
            Body::from_stream(body),
        )
            .into_response()
    }
}

/// A request as the server saw it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorded {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) body: String,
}

impl Recorded {
    pub(crate) fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub(crate) struct TestServer {
    pub(crate) base_url: String,
    requests: mpsc::UnboundedReceiver<Recorded>,
}

impl TestServer {
    /// Next request received.
    pub(crate) async fn request(&mut self) -> Recorded {
        self.requests.recv().await.unwrap_or_default()
    }
}

#[derive(Clone)]
struct Shared {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: mpsc::UnboundedSender<Recorded>,
}

pub(crate) async fn serve_once(reply: Reply) -> TestServer {
    serve(vec![reply]).await
}

/// Answer requests with `replies`, in order, whatever the path.
///
/// Requests past the last reply get `410 Gone`.
pub(crate) async fn serve(replies: Vec<Reply>) -> TestServer {
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Shared {
        replies: Arc::new(Mutex::new(replies.into())),
        requests: tx,
    };
    let router = Router::new().fallback(handle).with_state(shared);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    TestServer {
        base_url: format!("http://{}", addr),
        requests: rx,
    }
}

async fn handle(State(shared): State<Shared>, method: Method, uri: Uri, body: String) -> Response {
    let _ = shared.requests.send(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        body,
    });

    let reply = shared.replies.lock().unwrap().pop_front();
    match reply {
        Some(reply) => reply.into_http(),
        None => StatusCode::GONE.into_response(),
    }
}
