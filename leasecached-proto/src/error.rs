use thiserror::Error;

/// Errors produced while parsing the text command protocol.
///
/// These map 1:1 onto the `ERROR <message>\r\n` response body — the
/// `Display` text is what gets echoed back to the client.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing command")]
    MissingCommand,
    #[error("invalid command")]
    InvalidCommand,
    #[error("missing key")]
    MissingKey,
    #[error("missing CRLF")]
    MissingCrlf,
    #[error("missing lease")]
    MissingLease,
    #[error("lease is not number")]
    LeaseNotNumber,
    #[error("missing size")]
    MissingSize,
    #[error("size is not number")]
    SizeNotNumber,
    #[error("missing data")]
    MissingData,
}

/// Errors produced while decoding wire frame headers or entries.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame shorter than its declared header")]
    Truncated,
    #[error("entry declares more data than remains in the payload")]
    EntryTruncated,
}
