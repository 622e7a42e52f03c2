//! Utility modules.

pub mod retry;
pub mod text;

pub use retry::{RetryConfig, RetryResult, Retryable, with_retry};
pub use text::{collapse_blank_lines, normalize_element, strip_bold_markup};
