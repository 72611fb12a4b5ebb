/// Split a raw logic expression into tokens.
///
/// `&&` and `||` are accepted as synonyms for `AND`/`OR` and rewritten before
/// splitting. Parentheses become standalone tokens regardless of surrounding
/// whitespace. Tokens that case-insensitively match a keyword are uppercased;
/// everything else passes through unchanged so the validator can point at the
/// offending token. An empty or whitespace-only input yields an empty list.
#[must_use]
pub fn tokenize(input: &str) -> Vec<String> {
    let spaced = input
        .replace("&&", " AND ")
        .replace("||", " OR ")
        .replace('(', " ( ")
        .replace(')', " ) ");

    spaced
        .split_whitespace()
        .map(|tok| {
            if tok.eq_ignore_ascii_case("AND") {
                "AND".to_owned()
            } else if tok.eq_ignore_ascii_case("OR") {
                "OR".to_owned()
            } else {
                tok.to_owned()
            }
        })
        .collect()
}

/// A condition id token: one or more ASCII digits.
pub(crate) fn is_condition_id(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}
