use thiserror::Error;

// raised while turning operator input into a runnable configuration; always
// surfaces before the first request is sent
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value `{value}` for {name}: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("unknown {kind} `{name}`")]
    UnknownPlugin { kind: &'static str, name: String },

    #[error("{kind} `{name}` requires a parameter")]
    MissingParameter { kind: &'static str, name: String },

    #[error("wordlist `{source_name}` produced no entries")]
    EmptyWordlist { source_name: String },

    #[error("failed to read wordlist file `{path}`: {source}")]
    WordlistRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no fuzz mark found in the target (expected one of: {marks})")]
    NoFuzzMark { marks: String },

    #[error("a wordlist is bound to `{mark}` but the mark does not appear in the target")]
    UnusedFuzzMark { mark: String },

    #[error("invalid target url `{url}`")]
    InvalidUrl { url: String },

    #[error("invalid header `{header}`, expected `Key: Value`")]
    InvalidHeader { header: String },
}

impl ConfigurationError {
    pub(crate) fn invalid(name: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

// per-payload request failure; the two variants are routed to different callbacks
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid hostname `{host}`")]
    InvalidHostname { host: String },

    #[error("request to `{url}` failed: {message}")]
    Exception {
        url: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl RequestError {
    pub(crate) fn exception(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Exception {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let message = if source.is_timeout() {
            "timed out".to_string()
        } else if source.is_connect() {
            "connection failed".to_string()
        } else if source.is_redirect() {
            "redirect loop".to_string()
        } else if source.is_body() || source.is_decode() {
            "failed to read response body".to_string()
        } else {
            source.to_string()
        };
        Self::Exception {
            url: url.into(),
            message,
            source: Some(source),
        }
    }
}

// errors that end a whole target run
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    #[error("failed to connect to `{url}`: {source}")]
    Connection {
        url: String,
        #[source]
        source: RequestError,
    },

    #[error("status code {status} is blacklisted, stopping the run")]
    StopActionInterrupt { status: u16 },

    #[error("target aborted after a request error: {source}")]
    TargetAborted {
        #[source]
        source: RequestError,
    },

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },
}
