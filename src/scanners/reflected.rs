use super::Scanner;
use crate::model::FuzzResult;

// keeps results whose body echoes one of the request's payloads
pub struct ReflectedScanner;

impl ReflectedScanner {
    fn reflected<'a>(&self, result: &'a FuzzResult) -> Vec<&'a str> {
        result
            .payload
            .payloads()
            .iter()
            .map(|p| p.value())
            .filter(|v| !v.is_empty() && result.body.contains(v))
            .collect()
    }
}

impl Scanner for ReflectedScanner {
    fn name(&self) -> &'static str {
        "reflected"
    }

    fn inspect(&self, result: &FuzzResult) -> Option<Vec<String>> {
        let found = self.reflected(result);
        (!found.is_empty()).then(|| found.into_iter().map(|v| v.to_string()).collect())
    }

    fn scan(&self, result: &FuzzResult) -> bool {
        !self.reflected(result).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::result;
    use super::*;

    #[test]
    fn accepts_only_reflected_payloads() {
        let hit = result("http://x/?q=<b>", "<b>", 200, "<p><b></p>");
        assert!(ReflectedScanner.scan(&hit));
        assert_eq!(ReflectedScanner.inspect(&hit), Some(vec!["<b>".to_string()]));

        let miss = result("http://x/?q=<b>", "<b>", 200, "&lt;b&gt;");
        assert!(!ReflectedScanner.scan(&miss));
        assert_eq!(ReflectedScanner.inspect(&miss), None);
    }
}
