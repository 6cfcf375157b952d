//! Regex patterns for cleaning and checking model output.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Opening Markdown fence, optionally followed by a language tag ("```json")
    pub static ref FENCE_OPEN: Regex = Regex::new(
        r"^```[A-Za-z0-9_+\-]*[ \t]*\r?\n?"
    ).unwrap();

    // Closing Markdown fence at the very end of the text
    pub static ref FENCE_CLOSE: Regex = Regex::new(
        r"\r?\n?[ \t]*```$"
    ).unwrap();

    // ISO-8601 calendar date shape (YYYY-MM-DD)
    pub static ref ISO_DATE: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}$"
    ).unwrap();

    // Anything that is not an ASCII digit
    pub static ref NON_DIGIT: Regex = Regex::new(
        r"[^0-9]"
    ).unwrap();
}
