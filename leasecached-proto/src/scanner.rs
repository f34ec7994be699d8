//! Hand-written tokenizer for the text command protocol.
//!
//! Splits one entry's ASCII payload into an ordered token stream that
//! [`crate::parser`] matches against the `LGET`/`LSET`/`DEL` grammars.

const LGET: &[u8] = b"LGET";
const LSET: &[u8] = b"LSET";
const DEL: &[u8] = b"DEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Lget,
    Lset,
    Del,
    Ident,
    Int,
    Crlf,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub token_type: TokenType,
    pub begin: usize,
    pub end: usize,
}

impl Token {
    pub fn data<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.begin..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Ident,
    Cr,
    Crlf,
    Number,
}

const SPACE: u8 = b' ';
const TAB: u8 = b'\t';
const LF: u8 = b'\n';
const CR: u8 = b'\r';
const NUL: u8 = 0;

fn is_whitespace(c: u8) -> bool {
    matches!(c, SPACE | TAB | LF | NUL)
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn classify_word(word: &[u8]) -> TokenType {
    match word.first() {
        Some(b'L') if word == LGET => TokenType::Lget,
        Some(b'L') if word == LSET => TokenType::Lset,
        Some(b'D') if word == DEL => TokenType::Del,
        _ => TokenType::Ident,
    }
}

#[derive(Debug, Default)]
pub struct Scanner {
    pub tokens: Vec<Token>,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            tokens: Vec::with_capacity(8),
        }
    }

    pub fn reset(&mut self) {
        self.tokens.clear();
    }

    /// Tokenize an entire entry body from scratch.
    pub fn scan(&mut self, data: &[u8]) {
        self.reset();
        let mut state = State::Init;
        let mut begin = 0usize;
        for (index, &c) in data.iter().enumerate() {
            self.step(data, index, c, &mut state, &mut begin);
        }
        self.step(data, data.len(), SPACE, &mut state, &mut begin);
    }

    /// Used by `LSET`: consume exactly `n` bytes as a single opaque
    /// `Binary` token, then resume normal scanning from there (to pick
    /// up the trailing `CRLF`).
    pub fn scan_binary(&mut self, n: usize, data: &[u8]) {
        self.reset();
        self.tokens.push(Token {
            token_type: TokenType::Binary,
            begin: 0,
            end: n,
        });

        let mut state = State::Init;
        let mut begin = n;
        for index in n..data.len() {
            let c = data[index];
            self.step(data, index, c, &mut state, &mut begin);
        }
        self.step(data, data.len(), SPACE, &mut state, &mut begin);
    }

    fn handle_init(index: usize, c: u8, state: &mut State, begin: &mut usize) {
        if is_whitespace(c) {
            return;
        }
        *begin = index;
        if c == CR {
            *state = State::Cr;
            return;
        }
        if is_digit(c) {
            *state = State::Number;
            return;
        }
        *state = State::Ident;
    }

    fn goto_init(index: usize, c: u8, state: &mut State, begin: &mut usize) {
        *state = State::Init;
        Self::handle_init(index, c, state, begin);
    }

    fn step(&mut self, data: &[u8], index: usize, c: u8, state: &mut State, begin: &mut usize) {
        match *state {
            State::Init => {
                Self::handle_init(index, c, state, begin);
                return;
            }
            State::Ident => {
                if !is_whitespace(c) && c != CR {
                    return;
                }
                self.tokens.push(Token {
                    token_type: classify_word(&data[*begin..index]),
                    begin: *begin,
                    end: index,
                });
            }
            State::Cr => {
                if c == LF {
                    *state = State::Crlf;
                    return;
                }
                // a lone CR not followed by LF is silently discarded
            }
            State::Crlf => {
                self.tokens.push(Token {
                    token_type: TokenType::Crlf,
                    begin: *begin,
                    end: *begin + 2,
                });
            }
            State::Number => {
                if is_digit(c) {
                    return;
                }
                if is_whitespace(c) || c == CR {
                    self.tokens.push(Token {
                        token_type: TokenType::Int,
                        begin: *begin,
                        end: index,
                    });
                } else {
                    // "1234abc" is one IDENT, not INT followed by IDENT:
                    // keep accumulating from the same start instead of
                    // emitting the digits as their own token.
                    *state = State::Ident;
                    return;
                }
            }
        }
        Self::goto_init(index, c, state, begin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(input: &[u8]) -> Vec<(TokenType, &[u8])> {
        let mut s = Scanner::new();
        s.scan(input);
        s.tokens.iter().map(|t| (t.token_type, t.data(input))).collect()
    }

    #[test]
    fn simple_lget() {
        assert_eq!(scan(b"LGET"), vec![(TokenType::Lget, &b"LGET"[..])]);
    }

    #[test]
    fn leading_whitespace_is_skipped() {
        assert_eq!(scan(b" \t\nLGET"), vec![(TokenType::Lget, &b"LGET"[..])]);
    }

    #[test]
    fn trailing_whitespace_is_skipped() {
        assert_eq!(scan(b" \t\nLGET\x00 \t"), vec![(TokenType::Lget, &b"LGET"[..])]);
    }

    #[test]
    fn full_lget_command() {
        assert_eq!(
            scan(b"LGET key01\r\n"),
            vec![
                (TokenType::Lget, &b"LGET"[..]),
                (TokenType::Ident, &b"key01"[..]),
                (TokenType::Crlf, &b"\r\n"[..]),
            ]
        );
    }

    #[test]
    fn integer_key_is_int_token() {
        assert_eq!(
            scan(b"DEL 1234\r\n"),
            vec![
                (TokenType::Del, &b"DEL"[..]),
                (TokenType::Int, &b"1234"[..]),
                (TokenType::Crlf, &b"\r\n"[..]),
            ]
        );
    }

    #[test]
    fn digits_then_letters_is_a_single_ident() {
        assert_eq!(scan(b"1234abc"), vec![(TokenType::Ident, &b"1234abc"[..])]);
    }

    #[test]
    fn lone_cr_without_lf_is_discarded() {
        assert_eq!(scan(b"LGET\rkey"), vec![
            (TokenType::Lget, &b"LGET"[..]),
            (TokenType::Ident, &b"key"[..]),
        ]);
    }

    #[test]
    fn scan_binary_then_trailing_crlf() {
        let input = b"hello\r\n";
        let mut s = Scanner::new();
        s.scan_binary(5, input);
        assert_eq!(
            s.tokens
                .iter()
                .map(|t| (t.token_type, t.data(input)))
                .collect::<Vec<_>>(),
            vec![
                (TokenType::Binary, &b"hello"[..]),
                (TokenType::Crlf, &b"\r\n"[..]),
            ]
        );
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        assert_eq!(scan(b""), vec![]);
    }
}
