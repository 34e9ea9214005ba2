use std::collections::HashSet;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::error::ConfigurationError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WordlistSource {
    FilePath(String),
    Inline(Vec<String>),
    // inclusive numeric range
    Range { start: i64, end: i64 },
}

type SourceCtor = fn(&str) -> Result<WordlistSource, ConfigurationError>;

const REGISTRY: &[(&str, SourceCtor)] = &[
    ("file", file_source),
    ("list", list_source),
    ("range", range_source),
];

fn file_source(param: &str) -> Result<WordlistSource, ConfigurationError> {
    if param.trim().is_empty() {
        return Err(ConfigurationError::MissingParameter {
            kind: "wordlist",
            name: "file".to_string(),
        });
    }
    Ok(WordlistSource::FilePath(crate::config::expand_tilde_string(
        param.trim(),
    )))
}

fn list_source(param: &str) -> Result<WordlistSource, ConfigurationError> {
    let words: Vec<String> = param
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();
    if words.is_empty() {
        return Err(ConfigurationError::MissingParameter {
            kind: "wordlist",
            name: "list".to_string(),
        });
    }
    Ok(WordlistSource::Inline(words))
}

fn range_source(param: &str) -> Result<WordlistSource, ConfigurationError> {
    let (start, end) = crate::utils::parse_i64_range(param)
        .map_err(|e| ConfigurationError::invalid("range wordlist", param, e))?;
    Ok(WordlistSource::Range { start, end })
}

impl WordlistSource {
    // `[a,b]` inline lists, `name=param` registry entries, anything else is a
    // file path
    pub fn parse(spec: &str) -> Result<Self, ConfigurationError> {
        let spec = spec.trim();
        if let Some(inner) = spec.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return list_source(inner);
        }
        if let Some((name, param)) = spec.split_once('=') {
            let key = name.trim().to_ascii_lowercase();
            if let Some((_, ctor)) = REGISTRY.iter().find(|(n, _)| *n == key) {
                return ctor(param);
            }
        }
        file_source(spec)
    }

    pub fn name(&self) -> String {
        match self {
            WordlistSource::FilePath(path) => path.clone(),
            WordlistSource::Inline(words) => format!("[{}]", words.join(",")),
            WordlistSource::Range { start, end } => format!("range={start}-{end}"),
        }
    }

    // materialize the entries, trimmed, non-empty, first occurrence kept
    pub async fn build(&self) -> Result<Vec<String>, ConfigurationError> {
        let raw = match self {
            WordlistSource::Inline(words) => words.clone(),
            WordlistSource::Range { start, end } => (*start..=*end).map(|n| n.to_string()).collect(),
            WordlistSource::FilePath(path) => {
                let handle = File::open(path)
                    .await
                    .map_err(|e| ConfigurationError::WordlistRead {
                        path: path.clone(),
                        source: e,
                    })?;
                let mut out = Vec::new();
                let mut lines = BufReader::new(handle).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => out.push(line),
                        Ok(None) => break,
                        Err(e) => {
                            return Err(ConfigurationError::WordlistRead {
                                path: path.clone(),
                                source: e,
                            })
                        }
                    }
                }
                out
            }
        };

        let mut seen: HashSet<String> = HashSet::new();
        let words: Vec<String> = raw
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .filter(|w| seen.insert(w.clone()))
            .collect();

        if words.is_empty() {
            return Err(ConfigurationError::EmptyWordlist {
                source_name: self.name(),
            });
        }
        debug!(source = %self.name(), entries = words.len(), "wordlist built");
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_and_fallback_specs() {
        assert_eq!(
            WordlistSource::parse("[admin, login]").unwrap(),
            WordlistSource::Inline(vec!["admin".to_string(), "login".to_string()])
        );
        assert_eq!(
            WordlistSource::parse("range=1-3").unwrap(),
            WordlistSource::Range { start: 1, end: 3 }
        );
        assert_eq!(
            WordlistSource::parse("./words.txt").unwrap(),
            WordlistSource::FilePath("./words.txt".to_string())
        );
        assert!(WordlistSource::parse("range=9-1").is_err());
        assert!(WordlistSource::parse("list=").is_err());
    }

    #[tokio::test]
    async fn build_trims_and_dedupes() {
        let source = WordlistSource::Inline(vec![
            " admin ".to_string(),
            "".to_string(),
            "login".to_string(),
            "admin".to_string(),
        ]);
        assert_eq!(
            source.build().await.unwrap(),
            vec!["admin".to_string(), "login".to_string()]
        );
        let range = WordlistSource::Range { start: 8, end: 10 };
        assert_eq!(range.build().await.unwrap(), vec!["8", "9", "10"]);
    }

    #[tokio::test]
    async fn missing_file_is_a_configuration_error() {
        let source = WordlistSource::FilePath("/nonexistent/fuzzmill/words.txt".to_string());
        assert!(matches!(
            source.build().await,
            Err(ConfigurationError::WordlistRead { .. })
        ));
    }
}
