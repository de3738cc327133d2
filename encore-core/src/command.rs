use crate::catalog::normalize_code;

/// Chat command literal for song requests.
pub const REQUEST_PREFIX: &str = "!osr";

/// A recognized song-request command, carrying the normalized code token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestCommand {
    pub code: String,
}

/// Recognizes exactly `!osr <code>`: the literal prefix, one space, then the
/// code token.  Everything else is not a request and comes back as `None`.
/// The token is normalized the same way catalog codes are, so resolution is
/// case-insensitive.
pub fn interpret(raw: &str) -> Option<RequestCommand> {
    let rest = raw.strip_prefix(REQUEST_PREFIX)?;
    let token = rest.strip_prefix(' ')?;
    Some(RequestCommand {
        code: normalize_code(token),
    })
}
