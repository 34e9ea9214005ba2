fn main() {
    if let Err(e) = fuzzmill::app::run_cli() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
