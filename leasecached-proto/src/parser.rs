//! Grammar layer on top of [`crate::scanner`]: matches token sequences
//! against the `LGET`/`LSET`/`DEL` grammars and invokes a
//! [`CommandHandler`] callback on success.
use crate::scanner::{Scanner, Token, TokenType};
use crate::ParseError;

/// Receives the decoded command once a full request has been parsed.
pub trait CommandHandler {
    fn on_lget(&mut self, key: &[u8]);
    fn on_lset(&mut self, key: &[u8], lease_id: u32, value: &[u8]);
    fn on_del(&mut self, key: &[u8]);
}

fn is_key_token(t: TokenType) -> bool {
    matches!(
        t,
        TokenType::Lget | TokenType::Lset | TokenType::Del | TokenType::Ident | TokenType::Int
    )
}

fn digits_to_u32(data: &[u8]) -> u32 {
    let mut num: u32 = 0;
    for &b in data {
        num = num.wrapping_mul(10).wrapping_add((b - b'0') as u32);
    }
    num
}

pub struct Parser {
    scanner: Scanner,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            scanner: Scanner::new(),
        }
    }

    pub fn process(&mut self, data: &[u8], handler: &mut dyn CommandHandler) -> Result<(), ParseError> {
        self.scanner.scan(data);

        let tokens = &self.scanner.tokens;
        if tokens.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        match tokens[0].token_type {
            TokenType::Lget => Self::process_lget(&self.scanner.tokens, data, handler),
            TokenType::Lset => self.process_lset(data, handler),
            TokenType::Del => Self::process_del(&self.scanner.tokens, data, handler),
            TokenType::Crlf => Err(ParseError::MissingCommand),
            _ => Err(ParseError::InvalidCommand),
        }
    }

    fn process_lget(
        tokens: &[Token],
        data: &[u8],
        handler: &mut dyn CommandHandler,
    ) -> Result<(), ParseError> {
        if tokens.len() < 2 || !is_key_token(tokens[1].token_type) {
            return Err(ParseError::MissingKey);
        }
        if tokens.len() < 3 || tokens[2].token_type != TokenType::Crlf {
            return Err(ParseError::MissingCrlf);
        }
        handler.on_lget(tokens[1].data(data));
        Ok(())
    }

    fn process_del(
        tokens: &[Token],
        data: &[u8],
        handler: &mut dyn CommandHandler,
    ) -> Result<(), ParseError> {
        if tokens.len() < 2 || !is_key_token(tokens[1].token_type) {
            return Err(ParseError::MissingKey);
        }
        if tokens.len() < 3 || tokens[2].token_type != TokenType::Crlf {
            return Err(ParseError::MissingCrlf);
        }
        handler.on_del(tokens[1].data(data));
        Ok(())
    }

    fn validate_lset_control_tokens(tokens: &[Token]) -> Result<(), ParseError> {
        if tokens.len() < 2 || !is_key_token(tokens[1].token_type) {
            return Err(ParseError::MissingKey);
        }
        if tokens.len() < 3 {
            return Err(ParseError::MissingLease);
        }
        if tokens[2].token_type != TokenType::Int {
            return Err(ParseError::LeaseNotNumber);
        }
        if tokens.len() < 4 {
            return Err(ParseError::MissingSize);
        }
        if tokens[3].token_type != TokenType::Int {
            return Err(ParseError::SizeNotNumber);
        }
        if tokens.len() < 5 || tokens[4].token_type != TokenType::Crlf {
            return Err(ParseError::MissingCrlf);
        }
        Ok(())
    }

    fn process_lset(&mut self, data: &[u8], handler: &mut dyn CommandHandler) -> Result<(), ParseError> {
        Self::validate_lset_control_tokens(&self.scanner.tokens)?;

        let tokens = &self.scanner.tokens;
        let key_range = (tokens[1].begin, tokens[1].end);
        let lease_id = digits_to_u32(tokens[2].data(data));
        let size = digits_to_u32(tokens[3].data(data)) as usize;
        let value_begin = tokens[4].end;

        let rest = &data[value_begin..];
        if rest.len() < size {
            return Err(ParseError::MissingData);
        }

        self.scanner.scan_binary(size, rest);
        let tokens = &self.scanner.tokens;
        if tokens.len() < 2 || tokens[1].token_type != TokenType::Crlf {
            return Err(ParseError::MissingCrlf);
        }
        let value = tokens[0].data(rest);

        handler.on_lset(&data[key_range.0..key_range.1], lease_id, value);
        Ok(())
    }
}
