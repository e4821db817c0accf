// Async HTTP client for the Configuration Manager Admin Service.
//
// Base path: https://<site-server>/AdminService/
// WMI classes live under `wmi/`, methods under `<entity>/AdminService.<Method>`.

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::ODataCollection;
use crate::odata::{Filter, quote};
use crate::transport::TransportConfig;

/// A WMI entity key as it appears in `Class(<key>)`.
#[derive(Debug, Clone, Copy)]
pub enum Key<'a> {
    Str(&'a str),
    Num(u64),
}

impl<'a> From<&'a str> for Key<'a> {
    fn from(value: &'a str) -> Self {
        Self::Str(value)
    }
}

impl<'a> From<&'a String> for Key<'a> {
    fn from(value: &'a String) -> Self {
        Self::Str(value)
    }
}

impl From<u32> for Key<'_> {
    fn from(value: u32) -> Self {
        Self::Num(u64::from(value))
    }
}

impl From<u64> for Key<'_> {
    fn from(value: u64) -> Self {
        Self::Num(value)
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Admin Service OData endpoint.
///
/// Requests are issued one at a time by callers; every request races the
/// client's cancellation token and fails with [`Error::Cancelled`] when it
/// fires.
#[derive(Debug, Clone)]
pub struct AdminClient {
    http: reqwest::Client,
    base_url: Url,
    cancel: CancellationToken,
}

impl AdminClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a site server address and transport config.
    ///
    /// `server` may be a bare host, `host:port`, or a full URL.
    pub fn new(server: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(server, http)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self {
            http,
            base_url,
            cancel: CancellationToken::new(),
        })
    }

    /// Replace the cancellation token. Clones of the client share it.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `https://host/AdminService/`, whatever form the caller gave.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidServer("empty server address".into()));
        }

        let with_scheme = if raw.contains("://") {
            raw.to_owned()
        } else {
            format!("https://{raw}")
        };
        let mut url = Url::parse(&with_scheme)?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::InvalidServer(raw.to_owned()));
        }

        let path = url.path().trim_end_matches('/').to_owned();
        if path.to_ascii_lowercase().ends_with("/adminservice") {
            url.set_path(&format!("{path}/"));
        } else {
            url.set_path(&format!("{path}/AdminService/"));
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(url)
    }

    // ── Path builders ────────────────────────────────────────────────

    /// `wmi/<Class>`
    pub fn wmi(class: &str) -> String {
        format!("wmi/{class}")
    }

    /// `wmi/<Class>(<key>)`, string keys quoted.
    pub fn wmi_key<'a>(class: &str, key: impl Into<Key<'a>>) -> String {
        match key.into() {
            Key::Str(s) => format!("wmi/{class}({})", quote(s)),
            Key::Num(n) => format!("wmi/{class}({n})"),
        }
    }

    /// `wmi/<Class>(<key>)/AdminService.<Method>`
    pub fn wmi_method<'a>(class: &str, key: impl Into<Key<'a>>, method: &str) -> String {
        format!("{}/AdminService.{method}", Self::wmi_key(class, key))
    }

    /// `wmi/<Class>/AdminService.<Method>` (static method).
    pub fn wmi_static_method(class: &str, method: &str) -> String {
        format!("wmi/{class}/AdminService.{method}")
    }

    /// Join a relative path onto the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    /// GET an OData collection and return its `value` array.
    pub async fn get_value<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&Filter>,
    ) -> Result<Vec<T>, Error> {
        let url = self.url(path)?;
        let mut request = self.http.get(url.clone());
        if let Some(filter) = filter {
            let rendered = filter.to_string();
            debug!("GET {url} $filter={rendered}");
            request = request.query(&[("$filter", rendered)]);
        } else {
            debug!("GET {url}");
        }

        let body = self.execute(request, path).await?;
        let envelope: ODataCollection<T> = decode(body)?;
        Ok(envelope.value)
    }

    /// GET a single entity by key.
    ///
    /// The service answers keyed fetches either with the bare entity or
    /// with a one-element `value` array; both are accepted. An empty array
    /// is [`Error::NotFound`].
    pub async fn get_entity<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let body = self.execute(self.http.get(url), path).await?;
        let raw: Value = decode(body)?;
        let entity = match raw {
            Value::Object(mut map) if map.get("value").is_some_and(Value::is_array) => {
                match map.remove("value") {
                    Some(Value::Array(items)) => items.into_iter().next(),
                    _ => None,
                }
                .ok_or_else(|| Error::NotFound {
                    path: path.to_owned(),
                })?
            }
            other => other,
        };

        serde_json::from_value(strip_annotations(entity)).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let text = self.execute(self.http.post(url).json(body), path).await?;
        decode(text)
    }

    pub async fn post_no_response<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        self.execute(self.http.post(url).json(body), path).await?;
        Ok(())
    }

    pub async fn put<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        self.execute(self.http.put(url).json(body), path).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        self.execute(self.http.delete(url), path).await?;
        Ok(())
    }

    /// Untyped pass-through: any method, any path, raw JSON back.
    ///
    /// An empty response body comes back as `Value::Null`.
    pub async fn invoke(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let url = self.url(path)?;
        debug!("{method} {url} params={query:?}");

        let mut request = self.http.request(method, url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let text = self.execute(request, path).await?;
        decode(text)
    }

    // ── Response handling ────────────────────────────────────────────

    /// Send, read the body, and classify non-success statuses.
    async fn execute(&self, request: RequestBuilder, path: &str) -> Result<String, Error> {
        let exchange = async {
            let resp = request.send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            if status.is_success() {
                Ok(body)
            } else {
                debug!(status = status.as_u16(), "request to {path} failed");
                Err(Error::from_response(status, path, &body))
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            result = exchange => result,
        }
    }
}

/// Decode a response body. Empty bodies decode as JSON `null`.
fn decode<T: DeserializeOwned>(body: String) -> Result<T, Error> {
    let text = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(text).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

/// Drop top-level OData annotations (`@odata.context`, `@odata.etag`) so
/// they don't end up in flattened pass-through maps and get written back.
fn strip_annotations(entity: Value) -> Value {
    match entity {
        Value::Object(mut map) => {
            map.retain(|key, _| !key.starts_with("@odata."));
            Value::Object(map)
        }
        other => other,
    }
}
