//! # Shell-like Lexing Utilities
//!
//! Tokenizes chat command text the way a shell would split it (quotes and
//! backslash escapes group words) and quotes arguments back for display.

/// Tokenize input using a simple, shell-like lexer.
///
/// Quoted segments keep their quotes; use [`split_words`] to obtain the
/// unquoted words.
///
/// # Example
/// ```rust
/// use chatops_util::shell_lexing::lex_shell_like;
///
/// let tokens = lex_shell_like("job select_param job--n 'two words'");
/// assert_eq!(tokens, vec!["job", "select_param", "job--n", "'two words'"]);
/// ```
pub fn lex_shell_like(input: &str) -> Vec<String> {
    lex_shell_like_ranged(input)
        .into_iter()
        .map(|token| token.text.to_string())
        .collect()
}

/// Token with original byte positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexToken<'a> {
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// Tokenize input returning borrowed slices and byte ranges.
///
/// The ranges let callers take "everything after the Nth token" verbatim,
/// which is how free-text payloads are recovered without re-joining words.
pub fn lex_shell_like_ranged(input: &str) -> Vec<LexToken<'_>> {
    let mut tokens = Vec::new();
    let mut current_index = 0usize;
    let bytes = input.as_bytes();

    while current_index < bytes.len() {
        current_index = skip_whitespace(bytes, current_index);
        if current_index >= bytes.len() {
            break;
        }

        let start = current_index;
        current_index = parse_token(bytes, current_index);

        tokens.push(LexToken {
            text: &input[start..current_index],
            start,
            end: current_index,
        });
    }

    tokens
}

/// Split input into words with quotes removed and escapes resolved.
///
/// # Example
/// ```rust
/// use chatops_util::shell_lexing::split_words;
///
/// assert_eq!(split_words(r#"run "a b" c\ d"#), vec!["run", "a b", "c d"]);
/// ```
pub fn split_words(input: &str) -> Vec<String> {
    lex_shell_like_ranged(input)
        .into_iter()
        .map(|token| unquote(token.text))
        .collect()
}

/// Quote a single argument so a POSIX shell would read it back as one word.
///
/// Arguments made only of safe characters are returned unchanged.
pub fn quote_for_shell(argument: &str) -> String {
    let is_safe = !argument.is_empty()
        && argument
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '@' | '+'));
    if is_safe {
        return argument.to_string();
    }
    format!("'{}'", argument.replace('\'', r"'\''"))
}

fn unquote(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' if !in_single_quotes => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if !in_double_quotes => in_single_quotes = !in_single_quotes,
            '"' if !in_single_quotes => in_double_quotes = !in_double_quotes,
            other => out.push(other),
        }
    }
    out
}

fn skip_whitespace(bytes: &[u8], start_index: usize) -> usize {
    let mut index = start_index;
    while index < bytes.len() && bytes[index].is_ascii_whitespace() {
        index += 1;
    }
    index
}

/// Advance past one token, honoring quotes and escapes. Stops at unquoted whitespace.
fn parse_token(bytes: &[u8], start_index: usize) -> usize {
    let mut index = start_index;
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;

    while index < bytes.len() {
        let byte = bytes[index];

        if byte == b'\\' && !in_single_quotes && index + 1 < bytes.len() {
            index += 2;
            continue;
        }
        if byte == b'\'' && !in_double_quotes {
            in_single_quotes = !in_single_quotes;
            index += 1;
            continue;
        }
        if byte == b'"' && !in_single_quotes {
            in_double_quotes = !in_double_quotes;
            index += 1;
            continue;
        }
        if !in_single_quotes && !in_double_quotes && byte.is_ascii_whitespace() {
            break;
        }

        index += 1;
    }

    // An escape may have jumped into the middle of a multi-byte character.
    while index < bytes.len() && (bytes[index] & 0xC0) == 0x80 {
        index += 1;
    }
    index.min(bytes.len())
}
