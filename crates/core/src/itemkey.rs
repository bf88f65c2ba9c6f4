//! Item key parsing.
//!
//! An item key names an exporter capability and optionally carries a
//! bracketed parameter list, e.g. `vfs.fs.size[/,"free space",[a,b]]`.
//! Parameters are unquoted, quoted (`\"` escapes a quote) or one-level
//! arrays, which are returned verbatim without the enclosing brackets.

use crate::error::KeyError;

fn is_key_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos) == Some(&b' ') {
        pos += 1;
    }
    pos
}

/// Split an item key into its capability name and parameters.
///
/// A key without brackets has no parameters; `key[]` has a single empty
/// parameter.
pub fn parse_key(key: &str) -> Result<(String, Vec<String>), KeyError> {
    let bytes = key.as_bytes();
    let name_end = bytes
        .iter()
        .position(|&b| !is_key_char(b))
        .unwrap_or(bytes.len());

    if name_end == 0 {
        return Err(if bytes.is_empty() {
            KeyError::Empty
        } else {
            KeyError::InvalidChar(0)
        });
    }

    let name = key[..name_end].to_string();
    if name_end == bytes.len() {
        return Ok((name, Vec::new()));
    }
    if bytes[name_end] != b'[' {
        return Err(KeyError::InvalidChar(name_end));
    }

    let (params, end) = parse_list(key, name_end + 1, false)?;
    if end != bytes.len() {
        return Err(KeyError::TrailingData(end));
    }
    Ok((name, params))
}

/// Parse a comma separated list starting right after an opening bracket.
/// Returns the parameters and the position following the closing bracket.
fn parse_list(key: &str, start: usize, nested: bool) -> Result<(Vec<String>, usize), KeyError> {
    let bytes = key.as_bytes();
    let mut params = Vec::new();
    let mut pos = start;

    loop {
        pos = skip_spaces(bytes, pos);
        let (param, next) = match bytes.get(pos) {
            None => return Err(KeyError::UnterminatedParams),
            Some(b'"') => parse_quoted(key, pos)?,
            Some(b'[') if nested => return Err(KeyError::NestedArray(pos)),
            Some(b'[') => {
                let (_, end) = parse_list(key, pos + 1, true)?;
                (key[pos + 1..end - 1].to_string(), end)
            }
            Some(_) => parse_unquoted(key, pos),
        };
        params.push(param);

        pos = skip_spaces(bytes, next);
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b']') => return Ok((params, pos + 1)),
            Some(_) => return Err(KeyError::InvalidChar(pos)),
            None => return Err(KeyError::UnterminatedParams),
        }
    }
}

fn parse_unquoted(key: &str, pos: usize) -> (String, usize) {
    let end = key[pos..]
        .find([',', ']'])
        .map_or(key.len(), |off| pos + off);
    (key[pos..end].to_string(), end)
}

fn parse_quoted(key: &str, pos: usize) -> Result<(String, usize), KeyError> {
    let mut out = String::new();
    let mut chars = key[pos + 1..].char_indices().peekable();

    while let Some((off, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '"'))) => {
                out.push('"');
                chars.next();
            }
            '"' => return Ok((out, pos + 1 + off + 1)),
            _ => out.push(c),
        }
    }
    Err(KeyError::UnterminatedQuote(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(key: &str) -> Vec<String> {
        parse_key(key).unwrap().1
    }

    #[test]
    fn bare_key_has_no_params() {
        let (name, params) = parse_key("system.uptime").unwrap();
        assert_eq!(name, "system.uptime");
        assert!(params.is_empty());
    }

    #[test]
    fn empty_brackets_yield_one_empty_param() {
        assert_eq!(params("agent.ping[]"), vec![""]);
    }

    #[test]
    fn unquoted_params_keep_trailing_spaces() {
        assert_eq!(params("key[a, b ,c]"), vec!["a", "b ", "c"]);
        assert_eq!(params("key[a,]"), vec!["a", ""]);
    }

    #[test]
    fn quoted_params_unescape_quotes_only() {
        assert_eq!(
            params(r#"key["a,b", "say \"hi\"", "c:\dir"]"#),
            vec!["a,b", r#"say "hi""#, r"c:\dir"]
        );
    }

    #[test]
    fn array_param_is_returned_verbatim() {
        assert_eq!(
            params(r#"systemd.unit.info[cron.service,[ActiveState, "a]b"],x]"#),
            vec!["cron.service", r#"ActiveState, "a]b""#, "x"]
        );
    }

    #[test]
    fn non_ascii_inside_quotes() {
        assert_eq!(params(r#"key["grüße"]"#), vec!["grüße"]);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(parse_key(""), Err(KeyError::Empty));
        assert_eq!(parse_key("[a]"), Err(KeyError::InvalidChar(0)));
        assert_eq!(parse_key("key a"), Err(KeyError::InvalidChar(3)));
        assert_eq!(parse_key("key[a"), Err(KeyError::UnterminatedParams));
        assert_eq!(parse_key(r#"key["a]"#), Err(KeyError::UnterminatedQuote(4)));
        assert_eq!(parse_key(r#"key["a" b]"#), Err(KeyError::InvalidChar(8)));
        assert_eq!(parse_key("key[[a,[b]]]"), Err(KeyError::NestedArray(7)));
        assert_eq!(parse_key("key[a]b"), Err(KeyError::TrailingData(6)));
    }
}
