//! HTTP JSON транспорт (XMRig / XMRStak).

use log::debug;
use miner_core::RawFrame;
use reqwest::{Method, StatusCode};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::error::{PollError, TransportError};
use crate::transport::Deadline;

/// Блокирующий HTTP-клиент к API майнера
#[derive(Debug, Clone)]
pub struct HttpJsonClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpJsonClient {
    /// `base_url` без завершающего `/`, например `http://10.0.0.7:8080`
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, TransportError> {
        // только LAN: системный прокси не используем
        let http = Client::builder().no_proxy().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn get(&self, path: &str, deadline: &Deadline) -> Result<RawFrame, PollError> {
        let req = self.request(Method::GET, path, deadline)?;
        self.execute(req, deadline)
    }

    pub fn put_json(&self, path: &str, body: &Value, deadline: &Deadline) -> Result<RawFrame, PollError> {
        let req = self.request(Method::PUT, path, deadline)?.json(body);
        self.execute(req, deadline)
    }

    fn request(&self, method: Method, path: &str, deadline: &Deadline) -> Result<RequestBuilder, TransportError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("{method} {url}");

        let mut req = self
            .http
            .request(method, url)
            .timeout(deadline.remaining()?)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        Ok(req)
    }

    fn execute(&self, req: RequestBuilder, deadline: &Deadline) -> Result<RawFrame, PollError> {
        let response = req.send().map_err(|e| classify(e, deadline))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::HttpStatus(status.as_u16()).into());
        }

        let body = response.bytes().map_err(|e| classify(e, deadline))?;
        debug!("<- {} bytes", body.len());
        Ok(RawFrame::new(body.to_vec()))
    }
}

fn classify(e: reqwest::Error, deadline: &Deadline) -> TransportError {
    if e.is_timeout() {
        return match deadline.remaining() {
            Err(expired) => expired,
            Ok(_) => TransportError::DeadlineExceeded,
        };
    }
    TransportError::Http(e)
}
