//! Amount and date formatting for contract text.

pub mod amount;
pub mod date;

pub use amount::{amount_in_words, format_currency, number_to_words, MAX_AMOUNT_IN_WORDS};
pub use date::{long_date, month_name};
