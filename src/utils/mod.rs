use std::collections::HashSet;
use std::time::Duration;

pub fn parse_http_methods_csv(value: &str) -> Result<Vec<String>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("methods list is empty".to_string());
    }

    let mut out: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        // fuzz marks are allowed verbatim, everything else must be a token
        let canonical = if item.chars().all(|c| c.is_ascii_alphabetic()) {
            item.to_ascii_uppercase()
        } else {
            item.to_string()
        };
        if !canonical
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("invalid method '{item}'"));
        }
        if seen.insert(canonical.clone()) {
            out.push(canonical);
        }
    }

    if out.is_empty() {
        return Err("methods list is empty".to_string());
    }
    Ok(out)
}

// comma separated values, trimmed, empties dropped, order kept
pub fn parse_csv_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn parse_u16_set_csv(value: &str) -> Result<HashSet<u16>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("list is empty".to_string());
    }
    let mut out = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let code: u16 = item
            .parse()
            .map_err(|_| format!("invalid status code '{item}'"))?;
        out.insert(code);
    }
    if out.is_empty() {
        return Err("list is empty".to_string());
    }
    Ok(out)
}

// `START-END`, inclusive; either bound may be negative
pub fn parse_i64_range(value: &str) -> Result<(i64, i64), String> {
    let raw = value.trim();
    // skip a leading sign so `-5-5` splits on the second dash
    let search_from = usize::from(raw.starts_with('-'));
    let split = raw[search_from..]
        .find('-')
        .map(|i| i + search_from)
        .ok_or_else(|| "expected format START-END".to_string())?;
    let start: i64 = raw[..split]
        .trim()
        .parse()
        .map_err(|_| "invalid START value".to_string())?;
    let end: i64 = raw[split + 1..]
        .trim()
        .parse()
        .map_err(|_| "invalid END value".to_string())?;
    if start > end {
        return Err("START must not be greater than END".to_string());
    }
    Ok((start, end))
}

// seconds, fractional values allowed
pub fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds '{}'", value.trim()))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err("seconds must be a non-negative number".to_string());
    }
    Ok(Duration::from_secs_f64(secs))
}
