mod fuzz_word;
mod payload;
mod result;

pub use fuzz_word::FuzzWord;
pub use payload::{JobUnit, Payload};
pub use result::{FuzzResult, RunContext, ScannerResults};
