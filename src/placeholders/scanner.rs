use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_ident_byte, is_line_comment_start,
    matches_tag, try_start_dollar_quote,
};

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// A placeholder found outside literals and comments. `start..end` covers the
/// whole token including its sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Token<'a> {
    /// `$1` or `?1`
    Numbered {
        start: usize,
        end: usize,
        sigil: u8,
        digits: &'a str,
    },
    /// `$name` or `$name__type`
    Named {
        start: usize,
        end: usize,
        ident: &'a str,
    },
}

fn scan_while(bytes: &[u8], start: usize, pred: impl Fn(u8) -> bool) -> usize {
    let mut idx = start;
    while idx < bytes.len() && pred(bytes[idx]) {
        idx += 1;
    }
    idx
}

pub(super) fn scan_digits(sql: &str, start: usize) -> Option<(usize, &str)> {
    let end = scan_while(sql.as_bytes(), start, |b| b.is_ascii_digit());
    (end > start).then(|| (end, &sql[start..end]))
}

pub(super) fn scan_identifier(sql: &str, start: usize) -> Option<(usize, &str)> {
    let bytes = sql.as_bytes();
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let end = scan_while(bytes, start + 1, is_ident_byte);
    Some((end, &sql[start..end]))
}

/// Walk `sql` and collect placeholders, skipping quoted strings, quoted
/// identifiers, comments and dollar-quoted bodies.
pub(super) fn placeholders(sql: &str) -> Vec<Token<'_>> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' | b'?' => {
                    if b == b'$'
                        && let Some((tag, advance)) = try_start_dollar_quote(bytes, idx)
                    {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    } else if let Some((end, digits)) = scan_digits(sql, idx + 1) {
                        tokens.push(Token::Numbered {
                            start: idx,
                            end,
                            sigil: b,
                            digits,
                        });
                        idx = end - 1;
                    } else if b == b'$'
                        && let Some((end, ident)) = scan_identifier(sql, idx + 1)
                    {
                        tokens.push(Token::Named {
                            start: idx,
                            end,
                            ident,
                        });
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    idx += 1;
                    if depth == 1 {
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let tag_len = tag.len();
                    state = State::Normal;
                    idx += tag_len + 1;
                }
            }
        }
        idx += 1;
    }

    tokens
}
