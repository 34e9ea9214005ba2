use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub methods: Option<String>,
    pub data: Option<String>,
    pub headers: Option<Vec<String>>,
    pub cookie: Option<String>,
    pub proxy: Option<String>,
    pub proxies: Option<Vec<String>>,
    pub timeout: Option<f64>,
    pub follow_redirects: Option<bool>,
    #[serde(alias = "wordlist")]
    pub wordlists: Option<Vec<String>>,
    #[serde(alias = "prefixes")]
    pub prefix: Option<String>,
    #[serde(alias = "suffixes")]
    pub suffix: Option<String>,
    pub case: Option<String>,
    pub encoders: Option<String>,
    pub encode_only: Option<String>,
    pub match_status: Option<String>,
    pub match_length: Option<usize>,
    pub match_time: Option<String>,
    pub calibrate: Option<bool>,
    pub threads: Option<usize>,
    pub delay: Option<f64>,
    pub blacklist_status: Option<String>,
    pub recursive: Option<bool>,
    pub max_rlevel: Option<usize>,
    pub recursion_heuristic: Option<String>,
    pub scanners: Option<Vec<String>>,
    pub ignore_errors: Option<bool>,
    pub skip_connection_check: Option<bool>,
    pub no_color: Option<bool>,
    pub json: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".fuzzmill").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().to_string()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    // a file holding nothing but comments deserializes as null
    if contents.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    }) {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
}

fn default_config_yaml() -> String {
    r#"# fuzzmill config
#
# Location (default):
#   ~/.fuzzmill/config.yml
#
# Command line flags override every value set here.

# Target
# url: https://example.com/FUZZ
# methods: GET,POST
# data: "user=admin&pass=FUZZ"
# headers:
#   - "X-Api-Key: secret"
# cookie: "session=abc"
follow_redirects: false

# HTTP (optional)
# proxy: http://127.0.0.1:8080
# proxies:
#   - http://10.0.0.1:3128
#   - http://10.0.0.2:3128
# timeout: 10

# Wordlists, one per fuzz mark; `SOURCE:MARK`, the mark defaults to FUZZ
# wordlists:
#   - ./wordlists/common.txt
#   - "[admin,root]:USER"
#   - "range=1-100:ID"

# Payload transforms
# prefix: "old_,new_"
# suffix: ".php,.bak"
# case: lower
# encoders: "Url=2@Html,Base64"
# encode_only: "[<>]"

# Matching
# match_status: "200-399,401,403"
# match_length: 1234
# match_time: auto
calibrate: false

# Performance
threads: 10
delay: 0

# Backpressure: codes[:action[=param]], e.g. 429:wait=5 or 403:stop
# blacklist_status: "429:wait=5"

# Recursion (path fuzzing only)
recursive: false
max_rlevel: 1
recursion_heuristic: slash

# Scanners: backups, reflected, grep=REGEX
# scanners:
#   - backups

ignore_errors: false
skip_connection_check: false

# Output styling
no_color: false
json: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
