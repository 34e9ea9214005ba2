use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use super::JobUnit;

#[derive(Clone, Debug)]
enum Part {
    Text(String),
    Mark(String),
}

// one templated request field (url, method, body, header or param key/value)
//
// the word is split once into literal text and fuzz marks, so rendering is a
// single concatenation and never rescans substituted values for marks
#[derive(Clone, Debug)]
pub struct FuzzWord {
    word: String,
    fuzz_marks: BTreeSet<String>,
    parts: Vec<Part>,
}

impl FuzzWord {
    pub fn new(word: impl Into<String>, marks: &[String]) -> Self {
        let word = word.into();
        let mut ordered: Vec<&str> = marks
            .iter()
            .map(|m| m.as_str())
            .filter(|m| !m.is_empty())
            .collect();
        // longest first, so `FUZZ2` is not read as `FUZZ` followed by `2`
        ordered.sort_by_key(|m| std::cmp::Reverse(m.len()));
        ordered.dedup();

        let mut fuzz_marks = BTreeSet::new();
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = word.as_str();
        'outer: while !rest.is_empty() {
            for mark in ordered.iter() {
                if let Some(after) = rest.strip_prefix(mark) {
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Mark(mark.to_string()));
                    fuzz_marks.insert(mark.to_string());
                    rest = after;
                    continue 'outer;
                }
            }
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                text.push(ch);
            }
            rest = chars.as_str();
        }
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }

        Self {
            word,
            fuzz_marks,
            parts,
        }
    }

    // a word that is never substituted
    pub fn plain(word: impl Into<String>) -> Self {
        Self::new(word, &[])
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn fuzz_marks(&self) -> &BTreeSet<String> {
        &self.fuzz_marks
    }

    pub fn has_fuzzing(&self) -> bool {
        !self.fuzz_marks.is_empty()
    }

    // replace every mark with the final value of the unit's payload bound to
    // it; marks without a payload in the unit are left untouched
    pub fn render(&self, unit: &JobUnit) -> String {
        if !self.has_fuzzing() {
            return self.word.clone();
        }
        let mut out = String::with_capacity(self.word.len());
        for part in self.parts.iter() {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Mark(mark) => match unit.get(mark) {
                    Some(payload) => out.push_str(payload.value()),
                    None => out.push_str(mark),
                },
            }
        }
        out
    }
}

impl PartialEq for FuzzWord {
    fn eq(&self, other: &Self) -> bool {
        self.word == other.word
    }
}

impl Eq for FuzzWord {}

impl Hash for FuzzWord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.word.hash(state);
    }
}

impl std::fmt::Display for FuzzWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.word)
    }
}
