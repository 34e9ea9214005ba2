use serde::Serialize;

// one candidate substitution value
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Payload {
    raw: String,
    #[serde(rename = "final")]
    value: String,
    fuzz_mark: String,
    rlevel: usize,
}

impl Payload {
    pub fn new(raw: impl Into<String>, value: impl Into<String>, fuzz_mark: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            value: value.into(),
            fuzz_mark: fuzz_mark.into(),
            rlevel: 0,
        }
    }

    // the untransformed wordlist entry
    pub fn raw(&self) -> &str {
        &self.raw
    }

    // the value after prefix, suffix, case and encoder transforms
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn fuzz_mark(&self) -> &str {
        &self.fuzz_mark
    }

    pub fn rlevel(&self) -> usize {
        self.rlevel
    }

    // this payload rooted below an already discovered directory
    pub fn with_recursion(&self, directory: &Payload) -> Payload {
        let mut value = directory.value.clone();
        if !value.ends_with('/') {
            value.push('/');
        }
        value.push_str(self.value.trim_start_matches('/'));
        Payload {
            raw: self.raw.clone(),
            value,
            fuzz_mark: self.fuzz_mark.clone(),
            rlevel: directory.rlevel,
        }
    }

    // the directory a matched payload points at, one recursion level deeper
    pub fn directory(&self) -> Payload {
        let mut value = self.value.clone();
        if !value.ends_with('/') {
            value.push('/');
        }
        Payload {
            raw: self.raw.clone(),
            value,
            fuzz_mark: self.fuzz_mark.clone(),
            rlevel: self.rlevel + 1,
        }
    }

    // same origin and depth, different final value
    pub fn derive(&self, value: impl Into<String>) -> Payload {
        Payload {
            raw: self.raw.clone(),
            value: value.into(),
            fuzz_mark: self.fuzz_mark.clone(),
            rlevel: self.rlevel,
        }
    }
}

// the payloads dispatched together as one request, one per active fuzz mark
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobUnit {
    payloads: Vec<Payload>,
}

impl JobUnit {
    pub fn new(payloads: Vec<Payload>) -> Self {
        Self { payloads }
    }

    pub fn single(payload: Payload) -> Self {
        Self {
            payloads: vec![payload],
        }
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn get(&self, fuzz_mark: &str) -> Option<&Payload> {
        self.payloads.iter().find(|p| p.fuzz_mark == fuzz_mark)
    }

    pub fn rlevel(&self) -> usize {
        self.payloads.iter().map(|p| p.rlevel).max().unwrap_or(0)
    }

    // re-root the payload sharing the directory's mark; the others are kept
    pub fn with_recursion(&self, directory: &Payload) -> JobUnit {
        self.map_mark(&directory.fuzz_mark, |p| p.with_recursion(directory))
    }

    pub fn map_mark<F>(&self, fuzz_mark: &str, f: F) -> JobUnit
    where
        F: Fn(&Payload) -> Payload,
    {
        JobUnit {
            payloads: self
                .payloads
                .iter()
                .map(|p| if p.fuzz_mark == fuzz_mark { f(p) } else { p.clone() })
                .collect(),
        }
    }
}

impl std::fmt::Display for JobUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<&str> = self.payloads.iter().map(|p| p.value()).collect();
        f.write_str(&values.join(","))
    }
}
