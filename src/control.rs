/// Control protocol (UTF-8 text datagrams)
///
///   subscribe:     client -> relay  "<exchange>:<symbol>"
///   unsubscribe:   client -> relay  "-<exchange>:<symbol>"
///   confirmation:  relay -> client  "<index>:<exchange>:<symbol>"

use thiserror::Error;

pub const MAX_SYMBOL_LEN: usize = 64;
pub const UNSUBSCRIBE_PREFIX: char = '-';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("confirmation is not valid UTF-8")]
    NotUtf8,

    #[error("confirmation has no ':' separator")]
    MissingSeparator,

    #[error("confirmation index is not numeric: {0:?}")]
    InvalidIndex(String),

    #[error("empty symbol")]
    EmptySymbol,

    #[error("symbol is {len} bytes, limit is {max}")]
    SymbolTooLong { len: usize, max: usize },
}

/// A decoded `"<index>:<symbol>"` confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub index: i32,
    pub symbol: String,
}

pub fn validate_symbol(symbol: &str) -> Result<(), ControlError> {
    if symbol.is_empty() {
        return Err(ControlError::EmptySymbol);
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(ControlError::SymbolTooLong {
            len: symbol.len(),
            max: MAX_SYMBOL_LEN,
        });
    }
    Ok(())
}

pub fn subscribe_payload(symbol: &str) -> Result<Vec<u8>, ControlError> {
    validate_symbol(symbol)?;
    Ok(symbol.as_bytes().to_vec())
}

pub fn unsubscribe_payload(symbol: &str) -> Result<Vec<u8>, ControlError> {
    validate_symbol(symbol)?;
    let mut payload = Vec::with_capacity(symbol.len() + 1);
    payload.push(UNSUBSCRIBE_PREFIX as u8);
    payload.extend_from_slice(symbol.as_bytes());
    Ok(payload)
}

/// Parse a relay confirmation. Splits on the first colon only, so the
/// symbol keeps its own `exchange:` prefix.
pub fn parse_confirmation(payload: &[u8]) -> Result<Confirmation, ControlError> {
    let text = std::str::from_utf8(payload).map_err(|_| ControlError::NotUtf8)?;
    let text = text.trim_end_matches(['\0', '\n', '\r']);
    let (index, symbol) = text.split_once(':').ok_or(ControlError::MissingSeparator)?;

    let index = index
        .trim()
        .parse::<i32>()
        .map_err(|_| ControlError::InvalidIndex(index.to_string()))?;
    let symbol = symbol.trim();
    validate_symbol(symbol)?;

    Ok(Confirmation {
        index,
        symbol: symbol.to_string(),
    })
}
