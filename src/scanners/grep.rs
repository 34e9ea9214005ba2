use regex::Regex;

use super::Scanner;
use crate::error::ConfigurationError;
use crate::model::FuzzResult;

const MAX_MATCHES: usize = 20;

// records regex matches found in response bodies; never rejects
pub struct GrepScanner {
    re: Regex,
}

impl GrepScanner {
    pub fn new(pattern: &str) -> Result<Self, ConfigurationError> {
        let re = Regex::new(pattern).map_err(|e| ConfigurationError::InvalidRegex {
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self { re })
    }
}

impl Scanner for GrepScanner {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn inspect(&self, result: &FuzzResult) -> Option<Vec<String>> {
        let mut found: Vec<String> = Vec::new();
        for m in self.re.find_iter(&result.body) {
            let text = m.as_str().to_string();
            if !found.contains(&text) {
                found.push(text);
            }
            if found.len() >= MAX_MATCHES {
                break;
            }
        }
        (!found.is_empty()).then_some(found)
    }

    fn scan(&self, _result: &FuzzResult) -> bool {
        true
    }
}
