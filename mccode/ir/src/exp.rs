//! Expressions whose value is only known when the generated program runs.
use itertools::Itertools;

/// An expression kept as C text.
///
/// Values (literals, identifiers, instrument parameters) can be substituted
/// into macro bodies as-is. Anything else is a non-value: substituting it
/// could duplicate a side effect, so some contexts only accept values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Exp {
    pub text: String,
    pub is_value: bool,
    /// Source line the expression starts on, 0 when synthesized.
    pub line: usize,
}

impl Exp {
    fn new(text: String, is_value: bool) -> Self {
        Self {
            text,
            is_value,
            line: 0,
        }
    }

    /// An identifier or literal.
    pub fn value<S: ToString>(text: S) -> Self {
        Self::new(text.to_string(), true)
    }

    pub fn number<S: ToString>(text: S) -> Self {
        Self::value(text)
    }

    /// A string literal. `s` is stored with its quotes.
    pub fn string<S: AsRef<str>>(s: S) -> Self {
        Self::value(format!("\"{}\"", s.as_ref()))
    }

    /// A bare C token such as an operator.
    pub fn ctoken<S: ToString>(text: S) -> Self {
        Self::new(text.to_string(), false)
    }

    /// A reference to the instrument parameter `name`.
    pub fn instr_param<S: AsRef<str>>(name: S) -> Self {
        Self::value(format!("_instrument_var._parameters.{}", name.as_ref()))
    }

    /// The concatenation of `parts`, separated by single spaces. A compound
    /// of a single part keeps the kind of that part.
    pub fn compound(parts: Vec<Exp>) -> Self {
        match parts.len() {
            1 => parts.into_iter().next().unwrap_or_default(),
            _ => {
                let line = parts.first().map(|p| p.line).unwrap_or(0);
                let text = parts.iter().map(|p| p.text.as_str()).join(" ");
                Self {
                    text,
                    is_value: false,
                    line,
                }
            }
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// `NULL` and `0` both mean "no value" for pointer-like parameters.
    pub fn is_null(&self) -> bool {
        matches!(self.text.as_str(), "NULL" | "0")
    }

    /// A brace initializer `{a, b, ..}` given to a vector parameter.
    pub fn is_brace_list(&self) -> bool {
        self.text.trim_start().starts_with('{')
    }

    /// Elements of a brace initializer.
    pub fn brace_elements(&self) -> Vec<String> {
        let inner = self
            .text
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}');
        inner
            .split(',')
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// The text with C string quoting applied, for tables in the generated
    /// program.
    pub fn quoted(&self) -> String {
        let mut out = String::with_capacity(self.text.len() + 2);
        out.push('"');
        for c in self.text.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    }
}

impl Default for Exp {
    fn default() -> Self {
        Exp::number("0")
    }
}

impl std::fmt::Display for Exp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// A point or an angle triple.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Coords {
    pub x: Exp,
    pub y: Exp,
    pub z: Exp,
}

impl Coords {
    pub fn new(x: Exp, y: Exp, z: Exp) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::new(Exp::number("0"), Exp::number("0"), Exp::number("0"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_of_one_keeps_kind() {
        let e = Exp::compound(vec![Exp::value("x").with_line(3)]);
        assert!(e.is_value);
        assert_eq!(e.line, 3);
        let e = Exp::compound(vec![
            Exp::value("a").with_line(4),
            Exp::ctoken("+"),
            Exp::number("1"),
        ]);
        assert!(!e.is_value);
        assert_eq!(e.text, "a + 1");
        assert_eq!(e.line, 4);
    }

    #[test]
    fn brace_list() {
        let e = Exp::ctoken("{ 1 , 2.5 , 3 }");
        assert!(e.is_brace_list());
        assert_eq!(e.brace_elements(), vec!["1", "2.5", "3"]);
    }

    #[test]
    fn quoting() {
        assert_eq!(Exp::string("a").quoted(), "\"\\\"a\\\"\"");
    }
}
