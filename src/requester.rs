use std::future::Future;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{instrument, trace};

use crate::error::{ConfigurationError, RequestError, RunnerError};
use crate::model::{FuzzWord, JobUnit, Payload};

// discovery fuzzing gets this timeout unless one is configured
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FuzzingType {
    Method,
    Path,
    Subdomain,
    Data,
    Unknown,
}

impl FuzzingType {
    pub fn is_discovery(&self) -> bool {
        matches!(self, FuzzingType::Path | FuzzingType::Subdomain)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FuzzingType::Method => "method",
            FuzzingType::Path => "path",
            FuzzingType::Subdomain => "subdomain",
            FuzzingType::Data => "data",
            FuzzingType::Unknown => "unknown",
        }
    }
}

// what came back for one job unit
#[derive(Clone, Debug)]
pub struct ResponseData {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub location: Option<String>,
    // lossy text, for word and line counts and the scanners
    pub body: String,
    // bytes on the wire
    pub body_size: usize,
    // until the status line and headers arrived
    pub request_time: Duration,
    // spent reading the body
    pub response_time: Duration,
    pub ip: Option<IpAddr>,
}

impl ResponseData {
    pub fn rtt(&self) -> Duration {
        self.request_time + self.response_time
    }
}

// anything able to turn a job unit into a response; the worker pool only
// depends on this seam
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(
        &self,
        unit: &JobUnit,
    ) -> impl Future<Output = Result<ResponseData, RequestError>> + Send;
}

// the url split into the parts that decide the fuzzing type
#[derive(Clone, Debug)]
struct UrlTemplate {
    full: FuzzWord,
    authority: FuzzWord,
    path: FuzzWord,
    query: FuzzWord,
}

impl UrlTemplate {
    fn new(url: &str, marks: &[String]) -> Result<Self, ConfigurationError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ConfigurationError::InvalidUrl {
                url: url.to_string(),
            })?;
        if scheme.is_empty() || rest.is_empty() {
            return Err(ConfigurationError::InvalidUrl {
                url: url.to_string(),
            });
        }
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, path_and_query) = rest.split_at(authority_end);
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, q),
            None => (path_and_query, ""),
        };
        Ok(Self {
            full: FuzzWord::new(url, marks),
            authority: FuzzWord::new(authority, marks),
            path: FuzzWord::new(path, marks),
            query: FuzzWord::new(query, marks),
        })
    }
}

// request fields after substitution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Clone, Debug, Default)]
pub struct RequesterSettings {
    pub url: String,
    pub method: String,
    pub body: String,
    // `Key: Value` lines
    pub headers: Vec<String>,
    pub marks: Vec<String>,
    pub proxies: Vec<String>,
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
}

#[derive(Clone, Debug)]
pub struct Requester {
    url: UrlTemplate,
    method: FuzzWord,
    body: FuzzWord,
    // kept in order, repeated names included
    headers: Vec<(FuzzWord, FuzzWord)>,
    marks: Vec<String>,
    clients: Vec<reqwest::Client>,
    timeout: Option<Duration>,
    fuzzing_type: FuzzingType,
}

impl Requester {
    pub fn new(settings: RequesterSettings) -> Result<Self, RunnerError> {
        let marks = settings.marks.clone();
        let url = UrlTemplate::new(settings.url.trim(), &marks)?;

        let mut headers = Vec::new();
        for line in settings.headers.iter() {
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| ConfigurationError::InvalidHeader {
                    header: line.clone(),
                })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigurationError::InvalidHeader {
                    header: line.clone(),
                }
                .into());
            }
            headers.push((
                FuzzWord::new(key, &marks),
                FuzzWord::new(value.trim(), &marks),
            ));
        }

        let method = if settings.method.trim().is_empty() {
            "GET".to_string()
        } else {
            settings.method.trim().to_string()
        };

        let mut clients = Vec::new();
        let proxies: Vec<&str> = settings
            .proxies
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if proxies.is_empty() {
            clients.push(build_client(None, settings.follow_redirects)?);
        } else {
            for proxy in proxies {
                clients.push(build_client(Some(proxy), settings.follow_redirects)?);
            }
        }

        let mut requester = Self {
            url,
            method: FuzzWord::new(method, &marks),
            body: FuzzWord::new(settings.body.as_str(), &marks),
            headers,
            marks,
            clients,
            timeout: settings.timeout,
            fuzzing_type: FuzzingType::Unknown,
        };
        requester.fuzzing_type = requester.classify();
        if requester.timeout.is_none() && requester.fuzzing_type.is_discovery() {
            requester.timeout = Some(DISCOVERY_TIMEOUT);
        }
        Ok(requester)
    }

    fn classify(&self) -> FuzzingType {
        if self.method.has_fuzzing() {
            FuzzingType::Method
        } else if self.url.path.has_fuzzing() {
            FuzzingType::Path
        } else if self.url.authority.has_fuzzing() {
            FuzzingType::Subdomain
        } else if self.url.query.has_fuzzing()
            || self.body.has_fuzzing()
            || self
                .headers
                .iter()
                .any(|(k, v)| k.has_fuzzing() || v.has_fuzzing())
        {
            FuzzingType::Data
        } else {
            FuzzingType::Unknown
        }
    }

    pub fn fuzzing_type(&self) -> FuzzingType {
        self.fuzzing_type
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn url(&self) -> &FuzzWord {
        &self.url.full
    }

    pub fn method(&self) -> &FuzzWord {
        &self.method
    }

    // marks that occur in the url path, the only ones recursion re-roots
    pub fn path_marks(&self) -> Vec<String> {
        self.url.path.fuzz_marks().iter().cloned().collect()
    }

    // every mark used anywhere in the target
    pub fn active_marks(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let words = [&self.url.full, &self.method, &self.body]
            .into_iter()
            .chain(self.headers.iter().flat_map(|(k, v)| [k, v]));
        for word in words {
            for mark in word.fuzz_marks() {
                if !out.contains(mark) {
                    out.push(mark.clone());
                }
            }
        }
        out.sort_by_key(|m| self.marks.iter().position(|known| known == m));
        out
    }

    // copy of this requester for another per-method pass
    pub fn with_method(&self, method: &str) -> Requester {
        let mut out = self.clone();
        out.method = FuzzWord::new(method, &self.marks);
        out.fuzzing_type = out.classify();
        out
    }

    // substitute every field from the same unit; pure, so concurrent
    // workers never observe each other's payloads
    pub fn render(&self, unit: &JobUnit) -> RenderedRequest {
        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.render(unit), v.render(unit)))
            .collect();
        RenderedRequest {
            url: self.url.full.render(unit),
            method: self.method.render(unit),
            headers,
            body: self.body.render(unit),
        }
    }

    fn client(&self) -> &reqwest::Client {
        if self.clients.len() == 1 {
            return &self.clients[0];
        }
        let idx = rand::thread_rng().gen_range(0..self.clients.len());
        &self.clients[idx]
    }

    #[instrument(skip(self), fields(unit = %unit), level = "trace")]
    pub async fn request(&self, unit: &JobUnit) -> Result<ResponseData, RequestError> {
        let rendered = self.render(unit);
        self.send(rendered, self.fuzzing_type == FuzzingType::Subdomain)
            .await
    }

    async fn send(
        &self,
        rendered: RenderedRequest,
        resolve_host: bool,
    ) -> Result<ResponseData, RequestError> {
        let url = reqwest::Url::parse(&rendered.url)
            .map_err(|e| RequestError::exception(&rendered.url, format!("invalid url: {e}")))?;

        let ip = if resolve_host {
            let host = url
                .host_str()
                .ok_or_else(|| RequestError::InvalidHostname {
                    host: rendered.url.clone(),
                })?;
            let port = url.port_or_known_default().unwrap_or(80);
            Some(resolve(host, port).await?)
        } else {
            None
        };

        let method = reqwest::Method::from_bytes(rendered.method.as_bytes()).map_err(|_| {
            RequestError::exception(&rendered.url, format!("invalid method `{}`", rendered.method))
        })?;

        let mut builder = self.client().request(method, url);
        for (key, value) in rendered.headers.iter() {
            let key = reqwest::header::HeaderName::from_str(key.trim()).map_err(|_| {
                RequestError::exception(&rendered.url, format!("invalid header name `{key}`"))
            })?;
            let value = reqwest::header::HeaderValue::from_str(value.trim()).map_err(|_| {
                RequestError::exception(&rendered.url, format!("invalid header value `{value}`"))
            })?;
            builder = builder.header(key, value);
        }
        if !rendered.body.is_empty() {
            builder = builder.body(rendered.body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let start = Instant::now();
        let resp = builder
            .send()
            .await
            .map_err(|e| RequestError::from_reqwest(&rendered.url, e))?;
        let request_time = start.elapsed();

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let body_start = Instant::now();
        let body = resp
            .bytes()
            .await
            .map_err(|e| RequestError::from_reqwest(&rendered.url, e))?;
        let response_time = body_start.elapsed();
        trace!(status, url = %final_url, "response received");

        Ok(ResponseData {
            url: final_url,
            method: rendered.method,
            status,
            location,
            body: String::from_utf8_lossy(&body).to_string(),
            body_size: body.len(),
            request_time,
            response_time,
            ip,
        })
    }

    // the target with every mark blanked out; subdomain targets fall back to
    // their parent domain
    fn probe_request(&self) -> RenderedRequest {
        let blank = JobUnit::new(
            self.marks
                .iter()
                .map(|m| Payload::new("", "", m.as_str()))
                .collect(),
        );
        let mut rendered = self.render(&blank);
        rendered.url = rendered.url.replacen("://.", "://", 1);
        if self.fuzzing_type == FuzzingType::Method || rendered.method.is_empty() {
            rendered.method = "GET".to_string();
        }
        rendered
    }

    // pre-flight check that the target answers at all
    pub async fn test_connection(&self) -> Result<(), RequestError> {
        let probe = self.probe_request();
        self.send(probe, false).await.map(|_| ())
    }
}

impl Dispatch for Requester {
    fn dispatch(
        &self,
        unit: &JobUnit,
    ) -> impl Future<Output = Result<ResponseData, RequestError>> + Send {
        self.request(unit)
    }
}

async fn resolve(host: &str, port: u16) -> Result<IpAddr, RequestError> {
    let invalid = || RequestError::InvalidHostname {
        host: host.to_string(),
    };
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| invalid())?;
    addrs.next().map(|addr| addr.ip()).ok_or_else(invalid)
}

fn build_client(proxy: Option<&str>, follow_redirects: bool) -> Result<reqwest::Client, RunnerError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );

    let redirect_policy = if follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(redirect_policy)
        .danger_accept_invalid_hostnames(true)
        .danger_accept_invalid_certs(true);

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| RunnerError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| RunnerError::HttpClientBuild { source: e })
}


#[cfg(test)]
mod tests {
    use super::test_support::{refused_addr, response, LocalServer};
    use super::*;
    use crate::model::FuzzResult;

    fn settings(url: &str) -> RequesterSettings {
        RequesterSettings {
            url: url.to_string(),
            method: "GET".to_string(),
            marks: vec!["FUZZ".to_string()],
            ..Default::default()
        }
    }

    fn unit(value: &str) -> JobUnit {
        JobUnit::single(Payload::new(value, value, "FUZZ"))
    }

    #[test]
    fn classifies_fuzzing_type_from_target_shape() {
        let path = Requester::new(settings("http://x/FUZZ")).unwrap();
        assert_eq!(path.fuzzing_type(), FuzzingType::Path);
        assert_eq!(path.timeout(), Some(DISCOVERY_TIMEOUT));

        let sub = Requester::new(settings("https://FUZZ.example.com/")).unwrap();
        assert_eq!(sub.fuzzing_type(), FuzzingType::Subdomain);

        let data = Requester::new(settings("http://x/search?q=FUZZ")).unwrap();
        assert_eq!(data.fuzzing_type(), FuzzingType::Data);
        assert_eq!(data.timeout(), None);

        let mut method = settings("http://x/");
        method.method = "FUZZ".to_string();
        assert_eq!(
            Requester::new(method).unwrap().fuzzing_type(),
            FuzzingType::Method
        );

        let mut header = settings("http://x/");
        header.headers = vec!["X-Forwarded-For: FUZZ".to_string()];
        assert_eq!(
            Requester::new(header).unwrap().fuzzing_type(),
            FuzzingType::Data
        );

        assert_eq!(
            Requester::new(settings("http://x/")).unwrap().fuzzing_type(),
            FuzzingType::Unknown
        );
    }

    #[test]
    fn explicit_timeout_overrides_discovery_default() {
        let mut s = settings("http://x/FUZZ");
        s.timeout = Some(Duration::from_secs(3));
        assert_eq!(
            Requester::new(s).unwrap().timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn render_substitutes_every_field_from_one_unit() {
        let mut s = settings("http://x/FUZZ");
        s.body = "user=FUZZ".to_string();
        s.headers = vec!["X-Test: FUZZ".to_string()];
        let requester = Requester::new(s).unwrap();
        let rendered = requester.render(&unit("admin"));
        assert_eq!(rendered.url, "http://x/admin");
        assert_eq!(rendered.body, "user=admin");
        assert_eq!(
            rendered.headers,
            vec![("X-Test".to_string(), "admin".to_string())]
        );
    }

    #[test]
    fn probe_blanks_marks_and_strips_subdomain() {
        let requester = Requester::new(settings("https://FUZZ.example.com/")).unwrap();
        assert_eq!(requester.probe_request().url, "https://example.com/");
        let mut method = settings("http://x/");
        method.method = "FUZZ".to_string();
        assert_eq!(Requester::new(method).unwrap().probe_request().method, "GET");
    }

    #[test]
    fn with_method_reclassifies() {
        let mut s = settings("http://x/");
        s.body = "a=FUZZ".to_string();
        let requester = Requester::new(s).unwrap();
        assert_eq!(requester.fuzzing_type(), FuzzingType::Data);
        assert_eq!(requester.with_method("POST").render(&unit("1")).method, "POST");
        assert_eq!(requester.active_marks(), vec!["FUZZ".to_string()]);
    }

    #[test]
    fn rejects_bad_urls_and_headers() {
        assert!(Requester::new(settings("x/FUZZ")).is_err());
        let mut s = settings("http://x/FUZZ");
        s.headers = vec!["no-colon".to_string()];
        assert!(Requester::new(s).is_err());
    }

    #[tokio::test]
    async fn unresolvable_subdomain_is_invalid_hostname() {
        let requester = Requester::new(settings("http://FUZZ.invalid/")).unwrap();
        let err = requester.request(&unit("fuzzmill-nohost")).await.unwrap_err();
        assert!(matches!(err, RequestError::InvalidHostname { .. }));
    }

    #[tokio::test]
    async fn malformed_rendered_url_is_request_exception() {
        let requester = Requester::new(settings("http://x:FUZZ/")).unwrap();
        let err = requester.request(&unit("notaport")).await.unwrap_err();
        assert!(matches!(err, RequestError::Exception { .. }));
    }

    #[tokio::test]
    async fn binary_body_size_counts_wire_bytes() {
        let server = LocalServer::start(|_| {
            let body: Vec<u8> = (0x80..=0xFFu8).collect();
            response(200, &[("Content-Type", "application/zip")], &body)
        })
        .await;
        let requester = Requester::new(settings(&server.url("/FUZZ"))).unwrap();
        let resp = requester.request(&unit("site.zip")).await.unwrap();
        assert_eq!(resp.body_size, 128);
        assert!(resp.body.len() > 128);

        let result = FuzzResult::new(1, unit("site.zip"), resp);
        assert_eq!(result.body_size, 128);
        assert_eq!(server.requests(), vec!["GET /site.zip HTTP/1.1".to_string()]);
    }

    #[tokio::test]
    async fn connection_check_sends_the_blanked_target() {
        let server = LocalServer::start(|_| response(404, &[], b"")).await;
        let url = format!("http://FUZZ.127.0.0.1:{}/", server.addr.port());
        let requester = Requester::new(settings(&url)).unwrap();
        assert_eq!(requester.fuzzing_type(), FuzzingType::Subdomain);
        requester.test_connection().await.unwrap();
        assert_eq!(server.requests(), vec!["GET / HTTP/1.1".to_string()]);
    }

    #[tokio::test]
    async fn connection_check_fails_on_refused_port() {
        let addr = refused_addr().await;
        let requester = Requester::new(settings(&format!("http://{addr}/FUZZ"))).unwrap();
        let err = requester.test_connection().await.unwrap_err();
        assert!(matches!(err, RequestError::Exception { .. }));
    }

    #[tokio::test]
    async fn redirects_follow_only_when_enabled() {
        let server = LocalServer::start(|line| {
            if line.contains("/old") {
                response(301, &[("Location", "/new")], b"")
            } else {
                response(200, &[], b"landed")
            }
        })
        .await;

        let plain = Requester::new(settings(&server.url("/FUZZ"))).unwrap();
        let resp = plain.request(&unit("old")).await.unwrap();
        assert_eq!(resp.status, 301);
        assert_eq!(resp.location.as_deref(), Some("/new"));

        let mut s = settings(&server.url("/FUZZ"));
        s.follow_redirects = true;
        let following = Requester::new(s).unwrap();
        let resp = following.request(&unit("old")).await.unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.url.ends_with("/new"));
        assert_eq!(resp.body, "landed");
    }

    #[tokio::test]
    async fn proxy_pool_spreads_requests() {
        let first = LocalServer::start(|_| response(200, &[], b"one")).await;
        let second = LocalServer::start(|_| response(200, &[], b"two")).await;
        let mut s = settings("http://fuzzmill.test/FUZZ");
        s.proxies = vec![first.url(""), second.url("")];
        let requester = Requester::new(s).unwrap();

        for i in 0..32 {
            requester.request(&unit(&format!("p{i}"))).await.unwrap();
        }
        let (a, b) = (first.requests(), second.requests());
        assert_eq!(a.len() + b.len(), 32);
        assert!(!a.is_empty() && !b.is_empty());
        assert!(a
            .iter()
            .chain(b.iter())
            .all(|line| line.starts_with("GET http://fuzzmill.test/p")));
    }

    #[test]
    fn repeated_header_names_are_kept() {
        let mut s = settings("http://x/FUZZ");
        s.headers = vec![
            "Cookie: session=abc".to_string(),
            "Cookie: lang=en".to_string(),
        ];
        let rendered = Requester::new(s).unwrap().render(&unit("a"));
        assert_eq!(
            rendered.headers,
            vec![
                ("Cookie".to_string(), "session=abc".to_string()),
                ("Cookie".to_string(), "lang=en".to_string()),
            ]
        );
    }
}
