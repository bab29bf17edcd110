//! In-process fake HTTP API for client tests.

use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const FIRST_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_millis(750);

pub struct Route {
    method: &'static str,
    url: String,
    status: u16,
    body: String,
}

impl Route {
    pub fn new(method: &'static str, url: &str, status: u16, body: impl Into<String>) -> Self {
        Self {
            method,
            url: url.to_string(),
            status,
            body: body.into(),
        }
    }

    pub fn ok(method: &'static str, url: &str, body: impl Into<String>) -> Self {
        Self::new(method, url, 200, body)
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub body: String,
    headers: Vec<(String, String)>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }
}

/// Serves canned responses until no request arrives for a short while.
/// Unknown routes answer 404.
pub struct FakeApi {
    pub base_url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl FakeApi {
    pub fn start(routes: Vec<Route>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("fake api server");
        let base_url = format!("http://{}/", server.server_addr());

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            let mut wait = FIRST_REQUEST_TIMEOUT;
            while let Ok(Some(mut request)) = server.recv_timeout(wait) {
                wait = IDLE_TIMEOUT;
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let recorded = Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    body,
                    headers: request
                        .headers()
                        .iter()
                        .map(|h| (h.field.to_string(), h.value.as_str().to_string()))
                        .collect(),
                };

                let route = routes
                    .iter()
                    .find(|r| r.method == recorded.method && r.url == recorded.url);
                let (status, body) = match route {
                    Some(route) => (route.status, route.body.clone()),
                    None => (404, r#"{"message": "Not Found"}"#.to_string()),
                };

                let content_type =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("static header");
                let _ = request.respond(
                    Response::from_string(body)
                        .with_status_code(status)
                        .with_header(content_type),
                );
                seen.push(recorded);
            }
            seen
        });

        Self { base_url, handle }
    }

    /// Wait for the server to go idle and return every request it saw.
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().expect("fake api thread")
    }
}
