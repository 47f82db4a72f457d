//! Parsing of the `road_coordinates` column.
//!
//! The column holds a bracketed list literal in one of two shapes:
//!
//! * a single segment: `[[x, y], [x, y], ...]`
//! * a list of segments: `[[[x, y], ...], [[x, y], ...]]`
//!
//! There is no tag telling the two apart, so [`normalize_segments`] decides
//! by looking at the first element. Tuples (`(x, y)`) are accepted anywhere
//! a list is.

/// The `road_coordinates` text of a record could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed road_coordinates: {message}")]
pub struct MalformedCoordinateError {
    /// Description of what went wrong.
    pub message: String,
}

impl MalformedCoordinateError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Nesting deeper than this is never a coordinate structure.
const MAX_DEPTH: usize = 32;

/// A parsed literal: a number or a (possibly nested) list.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    List(Vec<Literal>),
}

/// Segments of a record, each an ordered list of `(x, y)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCoordinates {
    pub segments: Vec<Vec<(f64, f64)>>,
    /// Coordinates skipped for having fewer than two numeric components.
    pub dropped_points: usize,
}

/// Parses a `road_coordinates` value into segments of `(x, y)` pairs.
///
/// Components past the second are ignored. Coordinates with fewer than two
/// numeric components are dropped and counted in
/// [`ParsedCoordinates::dropped_points`].
///
/// # Errors
///
/// Returns [`MalformedCoordinateError`] if the text is not a list literal
/// of numbers, or if a coordinate is a bare number instead of a pair.
pub fn parse_road_coordinates(text: &str) -> Result<ParsedCoordinates, MalformedCoordinateError> {
    let literal = parse_literal(text)?;
    let mut parsed = ParsedCoordinates::default();

    for segment in normalize_segments(literal)? {
        let mut points = Vec::with_capacity(segment.len());
        for coordinate in segment {
            match coordinate_pair(coordinate)? {
                Some(pair) => points.push(pair),
                None => parsed.dropped_points += 1,
            }
        }
        parsed.segments.push(points);
    }

    Ok(parsed)
}

/// Normalizes a parsed literal into a list of segments.
///
/// Decided on the first element of the top-level list:
///
/// * a number: the whole literal is one bare point, giving one segment
///   holding that point
/// * a list whose first element is a number: the literal is one segment
///   of points, which is wrapped in one more level
/// * anything else: the literal is already a list of segments
///
/// # Errors
///
/// Returns [`MalformedCoordinateError`] if the top level is not a list, or
/// a list of segments contains a bare number where a segment should be.
pub fn normalize_segments(literal: Literal) -> Result<Vec<Vec<Literal>>, MalformedCoordinateError> {
    let Literal::List(items) = literal else {
        return Err(MalformedCoordinateError::new("expected a list, found a number"));
    };

    match items.first() {
        None => Ok(Vec::new()),
        Some(Literal::Number(_)) => Ok(vec![vec![Literal::List(items)]]),
        Some(Literal::List(first)) if matches!(first.first(), Some(Literal::Number(_))) => {
            Ok(vec![items])
        }
        Some(Literal::List(_)) => items
            .into_iter()
            .enumerate()
            .map(|(index, segment)| match segment {
                Literal::List(coordinates) => Ok(coordinates),
                Literal::Number(n) => Err(MalformedCoordinateError::new(format!(
                    "segment {} is a bare number ({n})",
                    index + 1
                ))),
            })
            .collect(),
    }
}

fn coordinate_pair(coordinate: Literal) -> Result<Option<(f64, f64)>, MalformedCoordinateError> {
    match coordinate {
        Literal::Number(n) => Err(MalformedCoordinateError::new(format!(
            "expected an [x, y] pair, found bare number {n}"
        ))),
        Literal::List(components) => match components.as_slice() {
            [Literal::Number(x), Literal::Number(y), ..] => Ok(Some((*x, *y))),
            _ => Ok(None),
        },
    }
}

/// Parses bracketed list literal text into a [`Literal`] tree.
///
/// # Errors
///
/// Returns [`MalformedCoordinateError`] on any syntax error, unknown token,
/// or trailing input.
pub fn parse_literal(text: &str) -> Result<Literal, MalformedCoordinateError> {
    let mut parser = LiteralParser {
        bytes: text.as_bytes(),
        pos: 0,
    };
    let literal = parser.value(0)?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(literal)
}

struct LiteralParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl LiteralParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> MalformedCoordinateError {
        MalformedCoordinateError::new(format!("{message} at offset {}", self.pos))
    }

    fn value(&mut self, depth: usize) -> Result<Literal, MalformedCoordinateError> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'[') => self.list(b']', depth),
            Some(b'(') => self.list(b')', depth),
            Some(b) if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() => self.number(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn list(&mut self, close: u8, depth: usize) -> Result<Literal, MalformedCoordinateError> {
        if depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Literal::List(items));
            }

            items.push(self.value(depth + 1)?);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b) if b == close => {
                    self.pos += 1;
                    return Ok(Literal::List(items));
                }
                Some(_) => return Err(self.error("expected ',' or closing bracket")),
                None => return Err(self.error("unclosed list")),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, MalformedCoordinateError> {
        let start = self.pos;
        let mut previous = 0u8;
        while let Some(b) = self.peek() {
            let signed_exponent = (b == b'-' || b == b'+')
                && (self.pos == start || previous == b'e' || previous == b'E');
            if !(b.is_ascii_digit() || b == b'.' || b == b'e' || b == b'E' || signed_exponent) {
                break;
            }
            previous = b;
            self.pos += 1;
        }

        let token = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.error("invalid number"))?;
        token
            .parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| MalformedCoordinateError::new(format!("invalid number {token:?}")))
    }
}
