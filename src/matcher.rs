use std::collections::BTreeSet;
use std::fmt;

use crate::error::ConfigurationError;
use crate::model::FuzzResult;
use crate::requester::FuzzingType;

pub const DISCOVERY_STATUS: &str = "200-399,401,403";
pub const DATA_STATUS: &str = "200";

// allowed status codes: an explicit list plus at most one inclusive range
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusSpec {
    codes: BTreeSet<u16>,
    range: Option<(u16, u16)>,
}

impl StatusSpec {
    // `200-399,401,403`
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        let raw = value.trim();
        if raw.is_empty() {
            return Err(ConfigurationError::invalid(
                "status",
                raw,
                "status list is empty",
            ));
        }
        let mut spec = StatusSpec::default();
        for item in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if let Some((low, high)) = item.split_once('-') {
                if spec.range.is_some() {
                    return Err(ConfigurationError::invalid(
                        "status",
                        raw,
                        "only one status range is allowed",
                    ));
                }
                let low = parse_status(low, raw)?;
                let high = parse_status(high, raw)?;
                if low > high {
                    return Err(ConfigurationError::invalid(
                        "status",
                        item,
                        "range start is greater than its end",
                    ));
                }
                spec.range = Some((low, high));
            } else {
                spec.codes.insert(parse_status(item, raw)?);
            }
        }
        Ok(spec)
    }

    pub fn contains(&self, status: u16) -> bool {
        self.codes.contains(&status)
            || self
                .range
                .map(|(low, high)| low <= status && status <= high)
                .unwrap_or(false)
    }
}

fn parse_status(value: &str, whole: &str) -> Result<u16, ConfigurationError> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigurationError::invalid("status", whole, format!("invalid status code '{}'", value.trim())))
}

impl fmt::Display for StatusSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut items: Vec<String> = Vec::new();
        if let Some((low, high)) = self.range {
            items.push(format!("{low}-{high}"));
        }
        items.extend(self.codes.iter().map(|c| c.to_string()));
        f.write_str(&items.join(","))
    }
}

// baseline thresholds; a response at or below either one is a soft miss
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Comparator {
    pub length: Option<usize>,
    // seconds
    pub time: Option<f64>,
}

impl Comparator {
    pub fn new(length: Option<usize>, time: Option<f64>) -> Self {
        Self { length, time }
    }

    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.time.is_none()
    }

    fn rejects(&self, result: &FuzzResult) -> bool {
        if let Some(length) = self.length {
            if result.body_size <= length {
                return true;
            }
        }
        if let Some(time) = self.time {
            if result.rtt <= time {
                return true;
            }
        }
        false
    }
}

#[derive(Clone, Debug)]
pub struct Matcher {
    status: StatusSpec,
    comparator: Comparator,
}

impl Matcher {
    pub fn new(status: StatusSpec, comparator: Comparator) -> Self {
        Self { status, comparator }
    }

    // an explicit status spec wins; otherwise the default for the fuzzing type
    pub fn for_fuzzing_type(
        fuzzing_type: FuzzingType,
        status: Option<StatusSpec>,
        comparator: Comparator,
    ) -> Result<Self, ConfigurationError> {
        let status = match status {
            Some(status) => status,
            None if fuzzing_type.is_discovery() => StatusSpec::parse(DISCOVERY_STATUS)?,
            None => StatusSpec::parse(DATA_STATUS)?,
        };
        Ok(Self::new(status, comparator))
    }

    pub fn status(&self) -> &StatusSpec {
        &self.status
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn set_comparator(&mut self, comparator: Comparator) {
        self.comparator = comparator;
    }

    pub fn is_match(&self, result: &FuzzResult) -> bool {
        self.status.contains(result.status) && !self.comparator.rejects(result)
    }
}
