//! Text handling: normalization, similarity scoring and free-text parsing

pub mod brands;
pub mod normalize;
pub mod parser;
pub mod similarity;

pub use normalize::{normalize_text, title_case, tokenize};
pub use parser::{parse_text, ClarificationQuestion, ParsedText};
pub use similarity::{text_similarity, within_one_edit};
