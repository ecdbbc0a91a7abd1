pub mod path_processing;
pub mod shell_lexing;
pub mod text_processing;

pub use path_processing::{expand_tilde, is_plain_file_name};
pub use shell_lexing::{lex_shell_like, lex_shell_like_ranged, quote_for_shell, split_words, LexToken};
pub use text_processing::{floor_char_boundary, redact_sensitive, redact_sensitive_with, truncate_output};
