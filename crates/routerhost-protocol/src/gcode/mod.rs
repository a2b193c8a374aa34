//! G-code translation
//!
//! Turns a textual motion program into an ordered sequence of command
//! frames. The scanner produces typed letter/value words with column
//! tracking; the translator maintains modal position state across lines
//! and accumulates diagnostics instead of failing fast. A non-zero error
//! count is the caller's signal to discard the whole batch rather than
//! transmit a partially valid program.

pub mod scanner;
pub mod translator;

pub use scanner::{LineScanner, ScanError, Word};
pub use translator::{Diagnostic, Severity, TranslateOutput, Translator};
