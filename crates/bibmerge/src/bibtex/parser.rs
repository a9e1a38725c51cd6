//! BibTeX reader built from `nom` combinators.
//!
//! Tokens (identifiers, delimited values, `#` chains) are `nom` parsers over
//! `&str`; [`Reader`] drives them block by block and owns the state that spans
//! blocks: the macro table and the set of citation keys seen so far. Every
//! failure carries the unconsumed input at the offending position, which is
//! turned into a line and column at the boundary.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{cut, map, opt, value};
use nom::error::{ErrorKind, ParseError};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, separated_pair};
use nom::{IResult, Parser};
use regex::Regex;

use crate::error::{MalformedEntryError, ParseErrorKind};
use crate::models::Entry;

type ParseResult<T> = Result<T, MalformedEntryError>;

/// Where a combinator gave up, and why when it knows.
#[derive(Debug)]
struct Failure<'a> {
    at: &'a str,
    kind: Option<ParseErrorKind>,
}

impl<'a> Failure<'a> {
    const fn new(at: &'a str, kind: ParseErrorKind) -> Self {
        Self { at, kind: Some(kind) }
    }

    fn or_unexpected(self, expected: &'static str) -> Self {
        if self.kind.is_some() {
            return self;
        }
        let kind = match self.at.chars().next() {
            Some(found) => ParseErrorKind::Unexpected { expected, found },
            None => ParseErrorKind::UnexpectedEof,
        };
        Self::new(self.at, kind)
    }
}

impl<'a> ParseError<&'a str> for Failure<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self { at: input, kind: None }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type Res<'a, T> = IResult<&'a str, T, Failure<'a>>;

fn fail<T>(at: &str, kind: ParseErrorKind) -> Res<'_, T> {
    Err(nom::Err::Failure(Failure::new(at, kind)))
}

/// Name what was expected if `parser` fails without a specific reason.
fn expect<'a, O>(
    expected: &'static str,
    mut parser: impl Parser<&'a str, O, Failure<'a>>,
) -> impl FnMut(&'a str) -> Res<'a, O> {
    move |input| parser.parse(input).map_err(|err| err.map(|f| f.or_unexpected(expected)))
}

fn symbol<'a>(c: char) -> impl Fn(&'a str) -> Res<'a, char> {
    char(c)
}

fn ws(input: &str) -> Res<'_, &str> {
    take_while(|c: char| c.is_whitespace())(input)
}

fn identifier(input: &str) -> Res<'_, &str> {
    take_while1(is_identifier_char)(input)
}

fn is_identifier_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(c, '{' | '}' | '(' | ')' | ',' | '=' | '"' | '#' | '%' | '\'' | '@' | '\\')
}

/// `{…}` with nested braces. A backslash is ordinary text here, so
/// `{C:\}` is the value `C:\`.
fn braced(input: &str) -> Res<'_, &str> {
    let (body, _) = symbol('{')(input)?;
    let mut depth = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Ok((&body[i + 1..], &body[..i])),
            '}' => depth -= 1,
            _ => {}
        }
    }
    fail(input, ParseErrorKind::Unbalanced { open: '{' })
}

/// `"…"`. A `"` inside braces or right after a backslash does not end it.
fn quoted(input: &str) -> Res<'_, &str> {
    let (body, _) = symbol('"')(input)?;
    let mut depth = 0usize;
    let mut escaped = false;
    for (i, c) in body.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = body[i + 1..].starts_with('"'),
            '{' => depth += 1,
            '}' if depth == 0 => return fail(&body[i..], ParseErrorKind::Unbalanced { open: '}' }),
            '}' => depth -= 1,
            '"' if depth == 0 => return Ok((&body[i + 1..], &body[..i])),
            _ => {}
        }
    }
    fail(input, ParseErrorKind::Unbalanced { open: '"' })
}

/// One operand of a `#` chain.
enum Part<'a> {
    Literal(&'a str),
    Macro(&'a str),
}

/// An operand together with the input it started at.
fn part(input: &str) -> Res<'_, (&str, Part<'_>)> {
    let (rest, part) = alt((
        map(braced, Part::Literal),
        map(quoted, Part::Literal),
        map(digit1, Part::Literal),
        map(identifier, Part::Macro),
    ))(input)?;
    Ok((rest, (input, part)))
}

/// The citation key, which must be followed by `,` or the closing delimiter.
fn citation_key(input: &str, close: char) -> Res<'_, &str> {
    let key_chars: Res<'_, &str> = take_while(|c: char| {
        !(c == ',' || c == close || c == '{' || c == '}' || c.is_whitespace())
    })(input);
    let (rest, key) = key_chars?;

    if key.is_empty() {
        let kind = if input.is_empty() {
            ParseErrorKind::UnexpectedEof
        } else {
            ParseErrorKind::MissingKey
        };
        return fail(input, kind);
    }

    let (rest, _) = ws(rest)?;
    match rest.chars().next() {
        Some(c) if c == ',' || c == close => Ok((rest, key)),
        Some(found) => fail(
            rest,
            ParseErrorKind::Unexpected { expected: "',' after citation key", found },
        ),
        None => fail(rest, ParseErrorKind::UnexpectedEof),
    }
}

/// Skip a `@comment` or `@preamble` body up to its closing delimiter.
fn skip_block<'a>(open_at: &'a str, input: &'a str, close: char) -> Res<'a, ()> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            c if c == close && depth == 0 => return Ok((&input[i + c.len_utf8()..], ())),
            _ => {}
        }
    }
    let open = if close == '}' { '{' } else { '(' };
    fail(open_at, ParseErrorKind::Unbalanced { open })
}

/// Advance past the next `@`. Text before it, including `%` lines, is ignored.
fn next_block(input: &str) -> Option<&str> {
    let mut line_start = true;
    let mut in_comment = false;
    for (i, c) in input.char_indices() {
        match c {
            '\n' => {
                line_start = true;
                in_comment = false;
            }
            _ if in_comment => {}
            '@' => return Some(&input[i + 1..]),
            '%' if line_start => in_comment = true,
            c if c.is_whitespace() => {}
            _ => line_start = false,
        }
    }
    None
}

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\n\s*").expect("valid line break regex"));

/// Fold each line break, with the whitespace around it, into one space.
fn join_lines(text: &str) -> Cow<'_, str> {
    LINE_BREAK.replace_all(text, " ")
}

pub(super) struct Reader<'a> {
    src: &'a str,
    macros: HashMap<String, String>,
    keys: HashSet<String>,
}

impl<'a> Reader<'a> {
    pub(super) fn new(src: &'a str, predefined: &[(String, String)]) -> Self {
        Self { src, macros: predefined.iter().cloned().collect(), keys: HashSet::new() }
    }

    pub(super) fn run(mut self) -> ParseResult<Vec<Entry>> {
        let src = self.src;
        let mut entries = Vec::new();
        let mut input = src;

        while let Some(block) = next_block(input) {
            let (rest, entry) = self.block(block).map_err(|err| located(src, err))?;
            entries.extend(entry);
            input = rest;
        }

        Ok(entries)
    }

    /// One block; `input` starts just past its `@`.
    fn block(&mut self, input: &'a str) -> Res<'a, Option<Entry>> {
        let (input, kind) = preceded(ws, expect("entry type", identifier))(input)?;
        let (open_at, _) = ws(input)?;
        let (input, close) = expect(
            "'{' or '('",
            alt((value('}', symbol('{')), value(')', symbol('(')))),
        )(open_at)?;

        let kind = kind.to_ascii_lowercase();
        if kind == "comment" || kind == "preamble" {
            let (rest, ()) = skip_block(open_at, input, close)?;
            return Ok((rest, None));
        }
        if kind == "string" {
            let (rest, ()) = self.string_definition(input, close)?;
            return Ok((rest, None));
        }

        let (rest, entry) = self.entry(input, kind, close)?;
        Ok((rest, Some(entry)))
    }

    fn string_definition(&mut self, input: &'a str, close: char) -> Res<'a, ()> {
        let (input, (name, value)) =
            preceded(ws, |i: &'a str| self.assignment(i, "macro name"))(input)?;
        let (input, _) = preceded(ws, opt(symbol(',')))(input)?;
        let (input, _) = preceded(ws, expect("end of @string", symbol(close)))(input)?;
        self.macros.insert(name, value);
        Ok((input, ()))
    }

    fn entry(&mut self, input: &'a str, kind: String, close: char) -> Res<'a, Entry> {
        let (key_at, _) = ws(input)?;
        let (mut input, key) = citation_key(key_at, close)?;
        if !self.keys.insert(key.to_string()) {
            return fail(key_at, ParseErrorKind::DuplicateKey(key.to_string()));
        }

        let mut entry = Entry::new(key, kind);

        loop {
            let (rest, _) = ws(input)?;
            input = rest;
            match input.chars().next() {
                None => return fail(input, ParseErrorKind::UnexpectedEof),
                Some(c) if c == close => return Ok((&input[c.len_utf8()..], entry)),
                Some(',') => {
                    input = &input[1..];
                    continue;
                }
                Some(_) => {}
            }

            let name_at = input;
            let (rest, (name, value)) = self.assignment(input, "field name")?;
            if entry.fields.contains_key(&name) {
                return fail(
                    name_at,
                    ParseErrorKind::DuplicateField { key: entry.key.clone(), field: name },
                );
            }
            entry.fields.insert(name, value);

            let (rest, separator) = preceded(
                ws,
                expect("',' or end of entry", alt((symbol(','), symbol(close)))),
            )(rest)?;
            input = rest;
            if separator == close {
                return Ok((input, entry));
            }
        }
    }

    /// `name = value`, with the name lowercased.
    fn assignment(&self, input: &'a str, what: &'static str) -> Res<'a, (String, String)> {
        separated_pair(
            map(expect(what, identifier), str::to_ascii_lowercase),
            delimited(ws, expect("'='", symbol('=')), ws),
            |i: &'a str| self.field_value(i),
        )(input)
    }

    /// A `#` chain of braced, quoted, numeric and macro operands.
    fn field_value(&self, input: &'a str) -> Res<'a, String> {
        let (rest, parts) = separated_list1(
            delimited(ws, symbol('#'), ws),
            cut(expect("field value", part)),
        )(input)?;

        let mut out = String::new();
        for (at, part) in parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Macro(name) => match self.macros.get(&name.to_ascii_lowercase()) {
                    Some(expansion) => out.push_str(expansion),
                    None => return fail(at, ParseErrorKind::UndefinedMacro(name.to_string())),
                },
            }
        }

        Ok((rest, join_lines(&out).into_owned()))
    }
}

fn located(src: &str, err: nom::Err<Failure<'_>>) -> MalformedEntryError {
    let (at, kind) = match err {
        nom::Err::Error(failure) | nom::Err::Failure(failure) => {
            let failure = failure.or_unexpected("BibTeX syntax");
            (failure.at, failure.kind.unwrap_or(ParseErrorKind::UnexpectedEof))
        }
        nom::Err::Incomplete(_) => ("", ParseErrorKind::UnexpectedEof),
    };
    let (line, column) = location(src, src.len() - at.len());
    MalformedEntryError { kind, line, column }
}

/// 1-based line and character column of a byte offset.
fn location(src: &str, pos: usize) -> (usize, usize) {
    let before = &src[..pos];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParseResult<Vec<Entry>> {
        Reader::new(src, &[]).run()
    }

    fn parse_err(src: &str) -> MalformedEntryError {
        parse(src).expect_err("should fail")
    }

    #[test]
    fn test_single_entry() {
        let entries = parse("@Article{BonehG05, Title = {A Scheme}, author = \"D. Boneh\"}").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "BonehG05");
        assert_eq!(entries[0].kind, "article");
        assert_eq!(entries[0].get("title"), Some("A Scheme"));
        assert_eq!(entries[0].get("author"), Some("D. Boneh"));
    }

    #[test]
    fn test_parenthesized_entry_and_trailing_comma() {
        let entries = parse("@misc(k1, year = 2005,)").unwrap();
        assert_eq!(entries[0].get("year"), Some("2005"));
    }

    #[test]
    fn test_entry_without_fields() {
        let entries = parse("@misc{lonely}").unwrap();
        assert_eq!(entries[0].key, "lonely");
        assert!(entries[0].fields.is_empty());
    }

    #[test]
    fn test_nested_braces_are_kept() {
        let entries = parse("@misc{k, title = {The {RSA} {Cryptosystem {x}}}}").unwrap();
        assert_eq!(entries[0].get("title"), Some("The {RSA} {Cryptosystem {x}}"));
    }

    #[test]
    fn test_quoted_value_with_braced_quote() {
        let entries = parse(r#"@misc{k, title = "say {"}hi{"}"}"#).unwrap();
        assert_eq!(entries[0].get("title"), Some(r#"say {"}hi{"}"#));
    }

    #[test]
    fn test_escaped_quote_inside_quoted_value() {
        let entries = parse(r#"@misc{k, title = "A \"Secure\" Scheme"}"#).unwrap();
        assert_eq!(entries[0].get("title"), Some(r#"A \"Secure\" Scheme"#));
    }

    #[test]
    fn test_escaped_braces_still_nest() {
        let entries = parse(r"@misc{k, title = {50\% of \{x\}}}").unwrap();
        assert_eq!(entries[0].get("title"), Some(r"50\% of \{x\}"));
    }

    #[test]
    fn test_trailing_backslash_in_braces() {
        let entries = parse(r"@misc{k, title = {C:\}, year = 2005}").unwrap();
        assert_eq!(entries[0].get("title"), Some(r"C:\"));
        assert_eq!(entries[0].get("year"), Some("2005"));
    }

    #[test]
    fn test_line_breaks_fold_to_one_space() {
        let src = "@misc{k, author = {D. Boneh and\n      S. Gorbunov},\n title = \"A\r\n  B\"}";
        let entries = parse(src).unwrap();
        assert_eq!(entries[0].get("author"), Some("D. Boneh and S. Gorbunov"));
        assert_eq!(entries[0].get("title"), Some("A B"));
    }

    #[test]
    fn test_string_macros_and_concatenation() {
        let src = r#"
            @string{CRYPTO = "Advances in Cryptology -- CRYPTO"}
            @STRING(lncs = {LNCS})
            @inproceedings{k, booktitle = crypto # " 2005", series = LNCS, month = aug}
        "#;
        let entries = Reader::new(src, &[("aug".into(), "August".into())]).run().unwrap();
        assert_eq!(entries[0].get("booktitle"), Some("Advances in Cryptology -- CRYPTO 2005"));
        assert_eq!(entries[0].get("series"), Some("LNCS"));
        assert_eq!(entries[0].get("month"), Some("August"));
    }

    #[test]
    fn test_macro_used_before_definition_is_undefined() {
        let src = "@misc{k, booktitle = crypto}\n@string{crypto = \"CRYPTO\"}";
        let err = parse_err(src);
        assert_eq!(err.kind, ParseErrorKind::UndefinedMacro("crypto".into()));
        assert_eq!((err.line, err.column), (1, 22));
    }

    #[test]
    fn test_dangling_concatenation() {
        let err = parse_err("@misc{k, title = {a} # }");
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { found: '}', .. }));
        assert_eq!((err.line, err.column), (1, 24));
    }

    #[test]
    fn test_comments_preamble_and_free_text_are_skipped() {
        let src = "% header with @ sign\nfree text\n@comment{anything {nested}}\n@preamble{\"\\newcommand{\\x}{y}\"}\n@misc{k, title={T}}";
        let entries = parse(src).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "k");
    }

    #[test]
    fn test_order_of_appearance_is_preserved() {
        let entries = parse("@misc{b,}\n@misc{a,}\n@misc{c,}").unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["b", "a", "c"]);
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = parse_err("@misc{k, title = {open}\n");
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedEof));

        let err = parse_err("@misc{k, title = {never closed");
        assert_eq!(err.kind, ParseErrorKind::Unbalanced { open: '{' });
        assert_eq!((err.line, err.column), (1, 18));

        let err = parse_err("@misc{k, title = \"stray } brace\"}");
        assert_eq!(err.kind, ParseErrorKind::Unbalanced { open: '}' });
        assert_eq!((err.line, err.column), (1, 25));
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(parse_err("@misc{, title = {x}}").kind, ParseErrorKind::MissingKey);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let err = parse_err("@misc{k, title={a}}\n@misc{k, title={b}}");
        assert_eq!(err.kind, ParseErrorKind::DuplicateKey("k".into()));
        assert_eq!((err.line, err.column), (2, 7));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = parse_err("@misc{k, title={a}, TITLE={b}}");
        assert_eq!(
            err.kind,
            ParseErrorKind::DuplicateField { key: "k".into(), field: "title".into() }
        );
    }

    #[test]
    fn test_unknown_entry_syntax() {
        let err = parse_err("@misc k, title={a}}");
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { found: 'k', .. }));

        let err = parse_err("@{k}");
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { found: '{', .. }));
    }

    #[test]
    fn test_missing_separator_between_fields() {
        let err = parse_err("@misc{k, title={a} year={b}}");
        assert!(matches!(err.kind, ParseErrorKind::Unexpected { found: 'y', .. }));
    }

    #[test]
    fn test_missing_equals_sign() {
        let err = parse_err("@misc{k, title {a}}");
        assert_eq!(err.kind, ParseErrorKind::Unexpected { expected: "'='", found: '{' });
    }

    #[test]
    fn test_location_counts_characters() {
        assert_eq!(location("ab\ncdé", 7), (2, 4));
        assert_eq!(location("", 0), (1, 1));
    }
}
