pub mod encoders;

use itertools::iproduct;

use crate::error::ConfigurationError;
pub use encoders::{parse_encoder_chains, Encoder, EncoderChain, EncoderStage};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaseMode {
    #[default]
    Keep,
    Lower,
    Upper,
    Capitalize,
}

impl CaseMode {
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "keep" => Ok(Self::Keep),
            "lower" | "lowercase" => Ok(Self::Lower),
            "upper" | "uppercase" => Ok(Self::Upper),
            "cap" | "capitalize" | "title" => Ok(Self::Capitalize),
            other => Err(ConfigurationError::invalid(
                "case",
                other,
                "expected lower, upper or cap",
            )),
        }
    }

    pub fn apply(&self, input: &str) -> String {
        match self {
            CaseMode::Keep => input.to_string(),
            CaseMode::Lower => input.to_lowercase(),
            CaseMode::Upper => input.to_uppercase(),
            CaseMode::Capitalize => capitalize(input),
        }
    }
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(input.len());
    out.extend(first.to_uppercase());
    out.push_str(&chars.as_str().to_lowercase());
    out
}

// prefix x suffix x case x encoder pipeline, configured once per run
#[derive(Clone, Debug, Default)]
pub struct Payloader {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    case: CaseMode,
    encoders: EncoderStage,
}

impl Payloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = prefixes;
        self
    }

    pub fn suffixes(mut self, suffixes: Vec<String>) -> Self {
        self.suffixes = suffixes;
        self
    }

    // case modes are exclusive; the last one set wins
    pub fn case(mut self, case: CaseMode) -> Self {
        self.case = case;
        self
    }

    pub fn encoders(mut self, encoders: EncoderStage) -> Self {
        self.encoders = encoders;
        self
    }

    // how many final values a single raw entry expands to
    pub fn expansion_factor(&self) -> usize {
        self.prefixes.len().max(1) * self.suffixes.len().max(1) * self.encoders.len().max(1)
    }

    pub fn expand(&self, raw: &str) -> Vec<String> {
        let empty = [String::new()];
        let prefixes: &[String] = if self.prefixes.is_empty() {
            &empty
        } else {
            &self.prefixes
        };
        let suffixes: &[String] = if self.suffixes.is_empty() {
            &empty
        } else {
            &self.suffixes
        };

        let mut out = Vec::with_capacity(self.expansion_factor());
        for (prefix, suffix) in iproduct!(prefixes.iter(), suffixes.iter()) {
            let value = self.case.apply(&format!("{prefix}{raw}{suffix}"));
            out.extend(self.encoders.apply(&value));
        }
        out
    }
}
