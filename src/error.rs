/// Problems that were recovered from while reading a document.
///
/// Parsing carries on after recording one of these; unreadable fields are
/// not reported here at all, they just come out empty.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// `X-WR-TIMEZONE` named a zone that could not be resolved. UTC was used
    /// instead.
    #[error("unknown timezone '{name}': {reason}")]
    UnknownTimezone { name: String, reason: String },
}
