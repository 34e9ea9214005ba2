use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "fuzzmill",
    version,
    about = "concurrent web fuzzer",
    long_about = "fuzzmill substitutes wordlist entries into fuzz marks placed in the URL, method, body or headers of a request and reports the responses that match.\n\nExamples:\n  fuzzmill -u https://target.tld/FUZZ -w words.txt\n  fuzzmill -u https://FUZZ.target.tld/ -w subdomains.txt -t 50\n  fuzzmill -u https://target.tld/login -d 'user=USER&pass=PASS' -w users.txt:USER -w pass.txt:PASS -X POST\n  fuzzmill -u https://target.tld/FUZZ -w words.txt -R --max-rlevel 2 --blacklist-status 429:wait=5\n\nTip: Use --config to persist scan settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "color",
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        long = "no-color",
        visible_alias = "nc",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        long = "show-misses",
        help_heading = "Output",
        help = "Also print responses that did not match."
    )]
    pub show_misses: bool,

    #[arg(
        long = "json",
        help_heading = "Output",
        help = "Print every hit as one JSON line on stdout instead of the table."
    )]
    pub json: bool,

    #[arg(
        short = 'u',
        long = "url",
        value_name = "URL",
        help_heading = "Target",
        help = "Target URL containing at least one fuzz mark."
    )]
    pub url: Option<String>,

    #[arg(
        short = 'X',
        long = "methods",
        visible_alias = "method",
        value_name = "METHODS",
        help_heading = "Target",
        help = "HTTP methods, one fuzzing pass each (comma-separated, default GET)."
    )]
    pub methods: Option<String>,

    #[arg(
        short = 'd',
        long = "data",
        value_name = "BODY",
        help_heading = "Target",
        help = "Request body."
    )]
    pub data: Option<String>,

    #[arg(
        short = 'H',
        long = "header",
        value_name = "HEADER",
        action = ArgAction::Append,
        help_heading = "Target",
        help = "Request header 'Key: Value' (repeatable)."
    )]
    pub header: Vec<String>,

    #[arg(
        short = 'b',
        long = "cookie",
        value_name = "COOKIE",
        help_heading = "Target",
        help = "Cookie header value."
    )]
    pub cookie: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        visible_alias = "cfg",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.fuzzmill/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'w',
        long = "wordlist",
        value_name = "SOURCE[:MARK]",
        action = ArgAction::Append,
        help_heading = "Input",
        help = "Wordlist bound to a fuzz mark: a file, [a,b], list=a,b or range=1-100 (repeatable)."
    )]
    pub wordlist: Vec<String>,

    #[arg(
        long = "prefix",
        value_name = "LIST",
        help_heading = "Payloads",
        help = "Prefixes crossed with every entry (comma-separated)."
    )]
    pub prefix: Option<String>,

    #[arg(
        long = "suffix",
        value_name = "LIST",
        help_heading = "Payloads",
        help = "Suffixes crossed with every entry (comma-separated)."
    )]
    pub suffix: Option<String>,

    #[arg(
        long = "case",
        value_name = "MODE",
        help_heading = "Payloads",
        help = "Case transform: lower, upper or cap."
    )]
    pub case: Option<String>,

    #[arg(
        short = 'e',
        long = "encoders",
        visible_alias = "encode",
        value_name = "SPEC",
        help_heading = "Payloads",
        help = "Encoders: Url,Html for one candidate each, Url=2@Html for a chain."
    )]
    pub encoders: Option<String>,

    #[arg(
        long = "encode-only",
        value_name = "REGEX",
        help_heading = "Payloads",
        help = "Only encode the parts of a payload matching REGEX."
    )]
    pub encode_only: Option<String>,

    #[arg(
        long = "mc",
        visible_alias = "match-status",
        value_name = "CODES",
        help_heading = "Matching",
        help = "Allowed status codes, a list plus one range (e.g. 200-399,401,403)."
    )]
    pub match_status: Option<String>,

    #[arg(
        long = "ml",
        visible_alias = "match-length",
        value_name = "BYTES",
        help_heading = "Matching",
        help = "Drop matches whose body is at most BYTES long."
    )]
    pub match_length: Option<usize>,

    #[arg(
        long = "mt",
        visible_alias = "match-time",
        value_name = "SECONDS|auto",
        help_heading = "Matching",
        help = "Drop matches answered within SECONDS; auto uses the calibration probe."
    )]
    pub match_time: Option<String>,

    #[arg(
        long = "calibrate",
        visible_alias = "ac",
        help_heading = "Matching",
        help = "Send one random payload first and drop matches no longer than its body."
    )]
    pub calibrate: bool,

    #[arg(
        short = 's',
        long = "scanner",
        value_name = "NAME[=PARAM]",
        action = ArgAction::Append,
        help_heading = "Matching",
        help = "Result scanner: backups, reflected or grep=REGEX (repeatable)."
    )]
    pub scanner: Vec<String>,

    #[arg(
        short = 't',
        long = "threads",
        value_name = "N",
        help_heading = "Performance",
        help = "Concurrent workers (default 10)."
    )]
    pub threads: Option<usize>,

    #[arg(
        short = 'p',
        long = "delay",
        value_name = "SECONDS",
        help_heading = "Performance",
        help = "Delay after every request, per worker."
    )]
    pub delay: Option<f64>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Request timeout (default 10 for path and subdomain fuzzing, none otherwise)."
    )]
    pub timeout: Option<f64>,

    #[arg(
        short = 'x',
        long = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "Send every request through this proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "proxies",
        value_name = "LIST",
        help_heading = "HTTP",
        help = "Proxy pool, one picked at random per request (comma-separated)."
    )]
    pub proxies: Option<String>,

    #[arg(
        short = 'L',
        long = "follow-redirects",
        visible_alias = "fr",
        help_heading = "HTTP",
        help = "Follow redirects."
    )]
    pub follow_redirects: bool,

    #[arg(
        long = "blacklist-status",
        visible_alias = "bs",
        value_name = "CODES[:ACTION]",
        help_heading = "Scan",
        help = "Status codes that stop the run or pause it: 429:wait=5, 403:stop."
    )]
    pub blacklist_status: Option<String>,

    #[arg(
        short = 'R',
        long = "recursive",
        help_heading = "Scan",
        help = "Fuzz again below every directory found (path fuzzing only)."
    )]
    pub recursive: bool,

    #[arg(
        long = "max-rlevel",
        value_name = "N",
        help_heading = "Scan",
        help = "Maximum recursion depth (default 1)."
    )]
    pub max_rlevel: Option<usize>,

    #[arg(
        long = "recursion-heuristic",
        value_name = "slash|redirect",
        help_heading = "Scan",
        help = "What counts as a directory: a trailing slash, or also a slash redirect."
    )]
    pub recursion_heuristic: Option<String>,

    #[arg(
        long = "ignore-errors",
        help_heading = "Scan",
        help = "Log request errors and continue instead of aborting."
    )]
    pub ignore_errors: bool,

    #[arg(
        long = "skip-connection-check",
        visible_alias = "scc",
        help_heading = "Scan",
        help = "Do not probe the target before fuzzing."
    )]
    pub skip_connection_check: bool,
}
