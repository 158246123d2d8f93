use super::error::CodecError;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// A decoded client request: the raw query text between the `'$' <len>
/// '\r\n'` header and its trailing `'\r\n'`.
#[derive(Debug, Eq, PartialEq)]
pub struct Request<'a> {
    pub query: &'a str,
}

impl<'a> Request<'a> {
    /// Parses one `'$' <decimal length> '\r\n' <query bytes> '\r\n'` frame off
    /// the front of `input`, returning the request and the remaining bytes.
    pub fn parse(input: &'a [u8]) -> Result<(Self, &'a [u8]), CodecError> {
        let first = *input.get(0).ok_or(CodecError::EmptyInput)?;
        if first != b'$' {
            return Err(CodecError::UnknownLeadingByte(first));
        }
        let (len_field, rest) = split_at_crlf(&input[1..])?;
        let len_str = std::str::from_utf8(len_field)?;
        let len: usize = len_str
            .parse()
            .map_err(|_| CodecError::InvalidLength(len_str.to_string()))?;

        if rest.len() < len + 2 {
            return Err(CodecError::Truncated {
                declared: len,
                available: rest.len(),
            });
        }
        if rest[len] != CR || rest[len + 1] != LF {
            return Err(CodecError::MissingCrlf);
        }

        let query = std::str::from_utf8(&rest[..len])?;
        Ok((Request { query }, &rest[len + 2..]))
    }
}

fn split_at_crlf(input: &[u8]) -> Result<(&[u8], &[u8]), CodecError> {
    for (index, pair) in input.windows(2).enumerate() {
        if pair[0] == CR && pair[1] == LF {
            return Ok((&input[..index], &input[index + 2..]));
        }
    }
    Err(CodecError::MissingCrlf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_request() {
        let input = b"$10\r\nselect cpu\r\n";
        let (request, rest) = Request::parse(input).unwrap();
        assert_eq!(request.query, "select cpu");
        assert!(rest.is_empty());
    }

    #[test]
    fn leaves_trailing_bytes_untouched() {
        let input = b"$4\r\nping\r\nmore";
        let (request, rest) = Request::parse(input).unwrap();
        assert_eq!(request.query, "ping");
        assert_eq!(rest, b"more");
    }

    #[test]
    fn rejects_unknown_leading_byte() {
        let err = Request::parse(b"*1\r\n").unwrap_err();
        assert!(matches!(err, CodecError::UnknownLeadingByte(b'*')));
    }

    #[test]
    fn rejects_truncated_body() {
        let err = Request::parse(b"$10\r\nshort").unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
