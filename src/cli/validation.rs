use crate::cli::args::CliArgs;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(threads) = args.threads {
        if threads == 0 {
            return Err("invalid threads, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.methods.as_deref() {
        crate::utils::parse_http_methods_csv(raw)
            .map_err(|e| format!("invalid --methods '{raw}': {e}"))?;
    }
    if let Some(raw) = args.match_status.as_deref() {
        crate::matcher::StatusSpec::parse(raw).map_err(|e| format!("invalid --mc '{raw}': {e}"))?;
    }
    if let Some(raw) = args.blacklist_status.as_deref() {
        crate::blacklist::BlacklistStatus::parse(raw)
            .map_err(|e| format!("invalid --blacklist-status '{raw}': {e}"))?;
    }
    for (name, value) in [("--delay", args.delay), ("--timeout", args.timeout)] {
        if let Some(value) = value {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("invalid {name}, expected a non-negative number"));
            }
        }
    }
    if let Some(max_rlevel) = args.max_rlevel {
        if max_rlevel == 0 {
            return Err("invalid max-rlevel, expected positive integer".to_string());
        }
    }
    for header in args.header.iter() {
        if !header.contains(':') {
            return Err(format!("invalid --header '{header}', expected 'Key: Value'"));
        }
    }
    Ok(())
}
