pub mod models;
pub mod prompt;
pub mod providers;
pub mod selector;
pub mod suggester;
pub mod tokenizer;

pub use providers::openai::OpenAiProvider;
pub use selector::{select_alerts, AlertRecord, PromptOverhead, Selection};
pub use suggester::{RuleSuggester, RuleSuggestion, SuggestionReport};
pub use tokenizer::{TiktokenTokenizer, Tokenizer};
