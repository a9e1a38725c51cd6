//! LaTeX escape → unicode canonicalization.
//!
//! A single left-to-right scan with a fixed table; no locale, no state between
//! calls. Every successful result is in Unicode NFC, so `o` followed by a
//! combining diaeresis and a precomposed `ö` come out identical. Text without a
//! backslash is only recomposed, which makes the transform idempotent: a
//! successful result never contains a backslash.

use std::fmt;

use unicode_normalization::UnicodeNormalization;

/// The first escape sequence the table cannot resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSequence {
    /// The offending text, starting at the backslash.
    pub sequence: String,
    /// Character offset of the backslash in the input.
    pub offset: usize,
}

impl fmt::Display for UnknownSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown escape '{}' at {}", self.sequence, self.offset)
    }
}

/// Resolve every escape in `input` and recompose to NFC, or report the first
/// escape that has no mapping.
pub fn canonicalize(input: &str) -> Result<String, UnknownSequence> {
    if !input.contains('\\') {
        return Ok(input.nfc().collect());
    }

    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            // `{\"o}`, `{\ss}`: the group exists only to hold the command.
            '{' if chars.get(i + 1) == Some(&'\\') => {
                let (resolved, next) = command(&chars, i + 1)?;
                if chars.get(next) == Some(&'}') {
                    out.push_str(&resolved);
                    i = next + 1;
                } else {
                    out.push('{');
                    i += 1;
                }
            }
            '\\' => {
                let (resolved, next) = command(&chars, i)?;
                out.push_str(&resolved);
                i = next;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out.nfc().collect())
}

/// Resolve the command whose backslash is at `start`. Returns the text and the
/// index just past the command.
fn command(chars: &[char], start: usize) -> Result<(String, usize), UnknownSequence> {
    let unknown = |end: usize| UnknownSequence {
        sequence: chars[start..end.min(chars.len())].iter().collect(),
        offset: start,
    };

    let Some(&next) = chars.get(start + 1) else {
        return Err(unknown(start + 1));
    };

    // Control symbols: a backslash and one non-letter.
    if !next.is_ascii_alphabetic() {
        if is_symbol_accent(next) {
            return accent(chars, start, next, start + 2, false);
        }
        if let Some(literal) = escaped_special(next) {
            return Ok((literal.to_string(), start + 2));
        }
        return Err(unknown(start + 2));
    }

    // Control words: a backslash and a run of letters.
    let mut end = start + 1;
    while end < chars.len() && chars[end].is_ascii_alphabetic() {
        end += 1;
    }
    let name: String = chars[start + 1..end].iter().collect();

    if let Some(accent_char) = letter_accent(&name) {
        let arg_start = skip_spaces(chars, end);
        return accent(chars, start, accent_char, arg_start, true);
    }

    if let Some(symbol) = symbol(&name) {
        // TeX drops the spaces after a control word; `\ss{}` is the explicit form.
        let mut next = skip_spaces(chars, end);
        if chars.get(next) == Some(&'{') && chars.get(next + 1) == Some(&'}') {
            next += 2;
        }
        return Ok((symbol.to_string(), next));
    }

    Err(unknown(end))
}

/// Apply `accent` to the argument at `arg`.
fn accent(
    chars: &[char],
    start: usize,
    accent: char,
    arg: usize,
    control_word: bool,
) -> Result<(String, usize), UnknownSequence> {
    let unknown = |end: usize| UnknownSequence {
        sequence: chars[start..end.min(chars.len())].iter().collect(),
        offset: start,
    };

    match chars.get(arg) {
        // Braced argument: `\"{o}`, `\'{\i}`, `\~{}`.
        Some('{') => {
            let mut k = skip_spaces(chars, arg + 1);
            let base = match dotless_base(chars, k) {
                Some((base, after)) => {
                    k = after;
                    Some(base)
                }
                None => match chars.get(k) {
                    Some(&c) if c.is_alphabetic() => {
                        k += 1;
                        Some(c)
                    }
                    _ => None,
                },
            };
            k = skip_spaces(chars, k);
            if chars.get(k) != Some(&'}') {
                return Err(unknown(k + 1));
            }
            let resolved = match base {
                Some(base) => compose(accent, base).ok_or_else(|| unknown(k + 1))?,
                None => spacing_accent(accent).ok_or_else(|| unknown(k + 1))?,
            };
            Ok((resolved.to_string(), k + 1))
        }
        // Dotless base without braces: `\'\i`.
        Some('\\') => match dotless_base(chars, arg) {
            Some((base, after)) => {
                compose(accent, base).map(|c| (c.to_string(), after)).ok_or_else(|| unknown(after))
            }
            None => Err(unknown(arg + 1)),
        },
        // Bare letter: `\"o`, `\c c`.
        Some(&c) if c.is_alphabetic() => match compose(accent, c) {
            Some(composed) => Ok((composed.to_string(), arg + 1)),
            // `\"` before a letter with no umlaut form is an escaped quote.
            None if accent == '"' && !control_word => Ok(("\"".to_string(), arg)),
            None => Err(unknown(arg + 1)),
        },
        // `\"` before a space, punctuation or the end of the value.
        _ if accent == '"' && !control_word => Ok(("\"".to_string(), arg)),
        _ => Err(unknown(arg)),
    }
}

/// `\i` or `\j` at `at`, as the base letter they stand for.
fn dotless_base(chars: &[char], at: usize) -> Option<(char, usize)> {
    if chars.get(at) != Some(&'\\') {
        return None;
    }
    let letter = match chars.get(at + 1) {
        Some('i') => 'i',
        Some('j') => 'j',
        _ => return None,
    };
    if chars.get(at + 2).is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((letter, skip_spaces(chars, at + 2)))
}

fn skip_spaces(chars: &[char], mut at: usize) -> usize {
    while chars.get(at) == Some(&' ') {
        at += 1;
    }
    at
}

fn is_symbol_accent(c: char) -> bool {
    matches!(c, '"' | '\'' | '`' | '^' | '~' | '=' | '.')
}

/// Accent control words, mapped to the key used in [`ACCENTS`].
fn letter_accent(name: &str) -> Option<char> {
    match name {
        "u" => Some('u'),
        "v" => Some('v'),
        "H" => Some('H'),
        "c" => Some('c'),
        "k" => Some('k'),
        "r" => Some('r'),
        "d" => Some('d'),
        _ => None,
    }
}

fn escaped_special(c: char) -> Option<char> {
    match c {
        '&' | '%' | '$' | '#' | '_' | '{' | '}' => Some(c),
        ' ' => Some(' '),
        _ => None,
    }
}

/// An accent with an empty argument, e.g. `\~{}`.
fn spacing_accent(accent: char) -> Option<char> {
    match accent {
        '"' => Some('"'),
        '\'' => Some('\''),
        '`' => Some('`'),
        '^' => Some('^'),
        '~' => Some('~'),
        _ => None,
    }
}

fn symbol(name: &str) -> Option<&'static str> {
    SYMBOLS.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
}

fn compose(accent: char, base: char) -> Option<char> {
    ACCENTS.iter().find(|(a, b, _)| *a == accent && *b == base).map(|(_, _, c)| *c)
}

const SYMBOLS: &[(&str, &str)] = &[
    ("ss", "ß"),
    ("ae", "æ"),
    ("AE", "Æ"),
    ("oe", "œ"),
    ("OE", "Œ"),
    ("o", "ø"),
    ("O", "Ø"),
    ("aa", "å"),
    ("AA", "Å"),
    ("l", "ł"),
    ("L", "Ł"),
    ("i", "ı"),
    ("j", "ȷ"),
    ("dh", "ð"),
    ("DH", "Ð"),
    ("th", "þ"),
    ("TH", "Þ"),
    ("ng", "ŋ"),
    ("NG", "Ŋ"),
    ("textendash", "–"),
    ("textemdash", "—"),
    ("ldots", "…"),
    ("dots", "…"),
    ("textellipsis", "…"),
    ("textquoteleft", "‘"),
    ("textquoteright", "’"),
    ("textquotedblleft", "“"),
    ("textquotedblright", "”"),
    ("guillemotleft", "«"),
    ("guillemotright", "»"),
    ("S", "§"),
    ("P", "¶"),
    ("copyright", "©"),
    ("textregistered", "®"),
    ("texttrademark", "™"),
    ("textdegree", "°"),
    ("euro", "€"),
];

/// (accent, base, precomposed)
const ACCENTS: &[(char, char, char)] = &[
    // diaeresis
    ('"', 'a', 'ä'), ('"', 'e', 'ë'), ('"', 'i', 'ï'), ('"', 'o', 'ö'), ('"', 'u', 'ü'),
    ('"', 'y', 'ÿ'), ('"', 'A', 'Ä'), ('"', 'E', 'Ë'), ('"', 'I', 'Ï'), ('"', 'O', 'Ö'),
    ('"', 'U', 'Ü'), ('"', 'Y', 'Ÿ'),
    // acute
    ('\'', 'a', 'á'), ('\'', 'e', 'é'), ('\'', 'i', 'í'), ('\'', 'o', 'ó'), ('\'', 'u', 'ú'),
    ('\'', 'y', 'ý'), ('\'', 'A', 'Á'), ('\'', 'E', 'É'), ('\'', 'I', 'Í'), ('\'', 'O', 'Ó'),
    ('\'', 'U', 'Ú'), ('\'', 'Y', 'Ý'), ('\'', 'c', 'ć'), ('\'', 'C', 'Ć'), ('\'', 'n', 'ń'),
    ('\'', 'N', 'Ń'), ('\'', 's', 'ś'), ('\'', 'S', 'Ś'), ('\'', 'z', 'ź'), ('\'', 'Z', 'Ź'),
    ('\'', 'l', 'ĺ'), ('\'', 'L', 'Ĺ'), ('\'', 'r', 'ŕ'), ('\'', 'R', 'Ŕ'), ('\'', 'g', 'ǵ'),
    // grave
    ('`', 'a', 'à'), ('`', 'e', 'è'), ('`', 'i', 'ì'), ('`', 'o', 'ò'), ('`', 'u', 'ù'),
    ('`', 'A', 'À'), ('`', 'E', 'È'), ('`', 'I', 'Ì'), ('`', 'O', 'Ò'), ('`', 'U', 'Ù'),
    // circumflex
    ('^', 'a', 'â'), ('^', 'e', 'ê'), ('^', 'i', 'î'), ('^', 'o', 'ô'), ('^', 'u', 'û'),
    ('^', 'A', 'Â'), ('^', 'E', 'Ê'), ('^', 'I', 'Î'), ('^', 'O', 'Ô'), ('^', 'U', 'Û'),
    ('^', 'c', 'ĉ'), ('^', 'C', 'Ĉ'), ('^', 'g', 'ĝ'), ('^', 'G', 'Ĝ'), ('^', 'h', 'ĥ'),
    ('^', 'H', 'Ĥ'), ('^', 'j', 'ĵ'), ('^', 'J', 'Ĵ'), ('^', 's', 'ŝ'), ('^', 'S', 'Ŝ'),
    ('^', 'w', 'ŵ'), ('^', 'W', 'Ŵ'), ('^', 'y', 'ŷ'), ('^', 'Y', 'Ŷ'),
    // tilde
    ('~', 'a', 'ã'), ('~', 'o', 'õ'), ('~', 'n', 'ñ'), ('~', 'A', 'Ã'), ('~', 'O', 'Õ'),
    ('~', 'N', 'Ñ'), ('~', 'i', 'ĩ'), ('~', 'I', 'Ĩ'), ('~', 'u', 'ũ'), ('~', 'U', 'Ũ'),
    // macron
    ('=', 'a', 'ā'), ('=', 'e', 'ē'), ('=', 'i', 'ī'), ('=', 'o', 'ō'), ('=', 'u', 'ū'),
    ('=', 'A', 'Ā'), ('=', 'E', 'Ē'), ('=', 'I', 'Ī'), ('=', 'O', 'Ō'), ('=', 'U', 'Ū'),
    // dot above
    ('.', 'c', 'ċ'), ('.', 'C', 'Ċ'), ('.', 'e', 'ė'), ('.', 'E', 'Ė'), ('.', 'g', 'ġ'),
    ('.', 'G', 'Ġ'), ('.', 'I', 'İ'), ('.', 'z', 'ż'), ('.', 'Z', 'Ż'),
    // breve
    ('u', 'a', 'ă'), ('u', 'A', 'Ă'), ('u', 'e', 'ĕ'), ('u', 'E', 'Ĕ'), ('u', 'g', 'ğ'),
    ('u', 'G', 'Ğ'), ('u', 'i', 'ĭ'), ('u', 'I', 'Ĭ'), ('u', 'o', 'ŏ'), ('u', 'O', 'Ŏ'),
    ('u', 'u', 'ŭ'), ('u', 'U', 'Ŭ'),
    // caron
    ('v', 'c', 'č'), ('v', 'C', 'Č'), ('v', 'd', 'ď'), ('v', 'D', 'Ď'), ('v', 'e', 'ě'),
    ('v', 'E', 'Ě'), ('v', 'n', 'ň'), ('v', 'N', 'Ň'), ('v', 'r', 'ř'), ('v', 'R', 'Ř'),
    ('v', 's', 'š'), ('v', 'S', 'Š'), ('v', 't', 'ť'), ('v', 'T', 'Ť'), ('v', 'z', 'ž'),
    ('v', 'Z', 'Ž'),
    // double acute
    ('H', 'o', 'ő'), ('H', 'O', 'Ő'), ('H', 'u', 'ű'), ('H', 'U', 'Ű'),
    // cedilla
    ('c', 'c', 'ç'), ('c', 'C', 'Ç'), ('c', 's', 'ş'), ('c', 'S', 'Ş'), ('c', 't', 'ţ'),
    ('c', 'T', 'Ţ'), ('c', 'g', 'ģ'), ('c', 'G', 'Ģ'), ('c', 'k', 'ķ'), ('c', 'K', 'Ķ'),
    ('c', 'l', 'ļ'), ('c', 'L', 'Ļ'), ('c', 'n', 'ņ'), ('c', 'N', 'Ņ'), ('c', 'r', 'ŗ'),
    ('c', 'R', 'Ŗ'),
    // ogonek
    ('k', 'a', 'ą'), ('k', 'A', 'Ą'), ('k', 'e', 'ę'), ('k', 'E', 'Ę'), ('k', 'i', 'į'),
    ('k', 'I', 'Į'), ('k', 'u', 'ų'), ('k', 'U', 'Ų'),
    // ring
    ('r', 'a', 'å'), ('r', 'A', 'Å'), ('r', 'u', 'ů'), ('r', 'U', 'Ů'),
    // dot below
    ('d', 'a', 'ạ'), ('d', 'A', 'Ạ'), ('d', 'e', 'ẹ'), ('d', 'E', 'Ẹ'), ('d', 'i', 'ị'),
    ('d', 'I', 'Ị'), ('d', 'o', 'ọ'), ('d', 'O', 'Ọ'), ('d', 'u', 'ụ'), ('d', 'U', 'Ụ'),
];
