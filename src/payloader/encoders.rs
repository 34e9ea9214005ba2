use base64::{engine::general_purpose, Engine as _};
use regex::Regex;

use crate::error::ConfigurationError;

// every encoder available to the payloader
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Encoder {
    // percent encoding, applied `level` times
    Url { level: u8 },
    // html entity encoding of the markup-significant characters
    Html,
    Base64,
    Hex,
}

type EncoderCtor = fn(Option<&str>) -> Result<Encoder, ConfigurationError>;

const REGISTRY: &[(&str, EncoderCtor)] = &[
    ("url", build_url),
    ("html", build_html),
    ("base64", build_base64),
    ("hex", build_hex),
];

fn build_url(param: Option<&str>) -> Result<Encoder, ConfigurationError> {
    let level = match param {
        None => 1,
        Some(raw) => raw
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|l| *l > 0)
            .ok_or_else(|| {
                ConfigurationError::invalid("url encoder level", raw, "expected a positive integer")
            })?,
    };
    Ok(Encoder::Url { level })
}

fn build_html(_: Option<&str>) -> Result<Encoder, ConfigurationError> {
    Ok(Encoder::Html)
}

fn build_base64(_: Option<&str>) -> Result<Encoder, ConfigurationError> {
    Ok(Encoder::Base64)
}

fn build_hex(_: Option<&str>) -> Result<Encoder, ConfigurationError> {
    Ok(Encoder::Hex)
}

impl Encoder {
    // resolve `name[=param]` through the encoder registry
    pub fn from_spec(spec: &str) -> Result<Self, ConfigurationError> {
        let (name, param) = match spec.split_once('=') {
            Some((n, p)) => (n.trim(), Some(p)),
            None => (spec.trim(), None),
        };
        let key = name.to_ascii_lowercase();
        let ctor = REGISTRY
            .iter()
            .find(|(n, _)| *n == key)
            .map(|(_, ctor)| *ctor)
            .ok_or_else(|| ConfigurationError::UnknownPlugin {
                kind: "encoder",
                name: name.to_string(),
            })?;
        ctor(param)
    }

    pub fn names() -> Vec<&'static str> {
        REGISTRY.iter().map(|(n, _)| *n).collect()
    }

    pub fn encode(&self, input: &str) -> String {
        match self {
            Encoder::Url { level } => {
                let mut out = input.to_string();
                for _ in 0..*level {
                    out = percent_encode(&out);
                }
                out
            }
            Encoder::Html => html_encode(input),
            Encoder::Base64 => general_purpose::STANDARD.encode(input.as_bytes()),
            Encoder::Hex => hex::encode(input.as_bytes()),
        }
    }
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for b in input.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn html_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

// encoders applied one after another to the same value
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderChain(Vec<Encoder>);

impl EncoderChain {
    pub fn new(encoders: Vec<Encoder>) -> Self {
        Self(encoders)
    }

    pub fn encoders(&self) -> &[Encoder] {
        &self.0
    }

    pub fn apply(&self, input: &str) -> String {
        self.0
            .iter()
            .fold(input.to_string(), |acc, encoder| encoder.encode(&acc))
    }
}

// parse `Url,Html` (one chain per encoder) and `Url=2@Html` (one chain of
// several encoders); both forms may be mixed in one comma separated list
pub fn parse_encoder_chains(value: &str) -> Result<Vec<EncoderChain>, ConfigurationError> {
    let mut chains = Vec::new();
    for item in value.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let mut steps = Vec::new();
        for step in item.split('@') {
            let step = step.trim();
            if step.is_empty() {
                return Err(ConfigurationError::invalid(
                    "encoder chain",
                    item,
                    "empty encoder in chain",
                ));
            }
            steps.push(Encoder::from_spec(step)?);
        }
        chains.push(EncoderChain::new(steps));
    }
    Ok(chains)
}

// the encoding stage of the payloader
#[derive(Clone, Debug, Default)]
pub struct EncoderStage {
    chains: Vec<EncoderChain>,
    encode_only: Option<Regex>,
}

impl EncoderStage {
    pub fn new(chains: Vec<EncoderChain>) -> Self {
        Self {
            chains,
            encode_only: None,
        }
    }

    // restrict encoding to the substrings matching `pattern`
    pub fn encode_only(mut self, pattern: &str) -> Result<Self, ConfigurationError> {
        let re = Regex::new(pattern).map_err(|e| ConfigurationError::InvalidRegex {
            pattern: pattern.to_string(),
            source: e,
        })?;
        self.encode_only = Some(re);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    // one output per configured chain, or the input untouched when no
    // encoder is configured
    pub fn apply(&self, input: &str) -> Vec<String> {
        if self.chains.is_empty() {
            return vec![input.to_string()];
        }
        self.chains
            .iter()
            .map(|chain| self.apply_chain(chain, input))
            .collect()
    }

    fn apply_chain(&self, chain: &EncoderChain, input: &str) -> String {
        let Some(re) = self.encode_only.as_ref() else {
            return chain.apply(input);
        };
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for m in re.find_iter(input) {
            out.push_str(&input[last..m.start()]);
            out.push_str(&chain.apply(m.as_str()));
            last = m.end();
        }
        out.push_str(&input[last..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_applies_encoders_in_order() {
        let chains = parse_encoder_chains("Url=2@Html").unwrap();
        assert_eq!(chains.len(), 1);
        let stage = EncoderStage::new(chains);
        let url_once = Encoder::Url { level: 1 }.encode("<script>");
        let expected = Encoder::Html.encode(&Encoder::Url { level: 1 }.encode(&url_once));
        assert_eq!(stage.apply("<script>"), vec![expected.clone()]);
        assert_eq!(expected, "%253Cscript%253E");
    }

    #[test]
    fn flat_list_yields_one_output_per_encoder() {
        let stage = EncoderStage::new(parse_encoder_chains("url, html,base64,hex").unwrap());
        assert_eq!(
            stage.apply("<a>"),
            vec![
                "%3Ca%3E".to_string(),
                "&lt;a&gt;".to_string(),
                "PGE+".to_string(),
                "3c613e".to_string(),
            ]
        );
    }

    #[test]
    fn encode_only_keeps_unmatched_text_legible() {
        let stage = EncoderStage::new(parse_encoder_chains("url").unwrap())
            .encode_only("[<>]")
            .unwrap();
        assert_eq!(stage.apply("<script>alert(1)</script>"), vec![
            "%3Cscript%3Ealert(1)%3C/script%3E".to_string()
        ]);
    }

    #[test]
    fn malformed_specs_are_configuration_errors() {
        assert!(matches!(
            parse_encoder_chains("rot13"),
            Err(ConfigurationError::UnknownPlugin { .. })
        ));
        assert!(parse_encoder_chains("url=zero").is_err());
        assert!(parse_encoder_chains("url@").is_err());
        assert!(matches!(
            EncoderStage::default().encode_only("(["),
            Err(ConfigurationError::InvalidRegex { .. })
        ));
    }
}
