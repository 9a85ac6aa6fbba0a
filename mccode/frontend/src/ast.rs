//! Abstract Syntax Tree for instrument and component files
use mccode_utils::{GPosIdx, Id, PosString, WithPos};
use std::path::PathBuf;

/// A parsed source file: a sequence of component definitions and at most
/// a few instrument definitions (one, or more when `%include`d).
#[derive(Debug, Default)]
pub struct File {
    pub path: PathBuf,
    pub items: Vec<Item>,
}

impl File {
    pub fn components(&self) -> impl Iterator<Item = &ComponentDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Component(def) => Some(def),
            Item::Instrument(_) => None,
        })
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Instrument(def) => Some(def),
            Item::Component(_) => None,
        })
    }
}

#[derive(Debug)]
pub enum Item {
    Component(ComponentDef),
    Instrument(InstrumentDef),
}

/// A block of embedded C code between `%{` and `%}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct CodeBlock {
    /// File the code comes from.
    pub file: String,
    /// Line of the first code line.
    pub line: usize,
    pub lines: Vec<String>,
}

impl CodeBlock {
    pub fn new(file: String, line: usize, lines: Vec<String>) -> Self {
        Self { file, line, lines }
    }

    /// Split the text of a code block into lines. A blank first line (the
    /// remainder of the `%{` line) and a blank last line are dropped.
    pub fn from_text(file: String, line: usize, text: &str) -> Self {
        let mut lines: Vec<String> =
            text.split('\n').map(|l| l.trim_end_matches('\r').to_string()).collect();
        let mut line = line;
        if lines.first().is_some_and(|l| l.trim().is_empty()) {
            lines.remove(0);
            line += 1;
        }
        if lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }
        Self { file, line, lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The block made of the lines of `self` followed by those of `other`.
    /// Attribution stays with `self` when it has any line.
    pub fn concat(&self, other: &CodeBlock) -> CodeBlock {
        if self.is_empty() {
            return other.clone();
        }
        let mut out = self.clone();
        out.lines.extend(other.lines.iter().cloned());
        out
    }
}

/// Body of a code section of a definition.
#[derive(Debug, Clone)]
pub enum Section {
    Code(CodeBlock),
    /// `SECTION COPY Name [EXTEND %{ .. %}]`
    Copy {
        from: Id,
        extend: Option<CodeBlock>,
        span: GPosIdx,
    },
}

/// The type written in front of a formal parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalType {
    pub name: Id,
    pub pointer: bool,
}

/// A formal parameter of a component or of the instrument.
#[derive(Debug, Clone)]
pub struct Formal {
    pub ty: Option<FormalType>,
    pub name: Id,
    pub default: Option<Expr>,
    /// Only instrument parameters carry units.
    pub unit: Option<PosString>,
    pub span: GPosIdx,
}

impl WithPos for Formal {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// A single token of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Previous,
    Myself,
    Ident(Id),
    Number(String),
    /// A string literal, without the quotes.
    Str(String),
    /// Any other C token.
    CTok(String),
    Comma,
    /// A bracketed sequence, opened and closed by the given characters.
    Group {
        open: char,
        close: char,
        atoms: Vec<Atom>,
    },
}

/// An expression as written in the source. Interpreted in the generated
/// program.
#[derive(Debug, Clone)]
pub struct Expr {
    pub atoms: Vec<Atom>,
    pub line: usize,
    pub span: GPosIdx,
}

impl WithPos for Expr {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// A `METADATA name type %{ .. %}` entry.
#[derive(Debug, Clone)]
pub struct Metadatum {
    pub name: String,
    pub mime: String,
    pub body: CodeBlock,
    pub span: GPosIdx,
}

/// The formal parameter lists of a component definition.
#[derive(Debug, Clone, Default)]
pub struct ParamLists {
    pub definition: Vec<Formal>,
    pub setting: Vec<Formal>,
    pub output: Vec<Formal>,
    /// Deprecated STATE PARAMETERS, kept only for their position.
    pub state: Option<GPosIdx>,
    /// Deprecated POLARISATION PARAMETERS, kept only for their position.
    pub polarisation: Option<GPosIdx>,
}

/// `DEFINE COMPONENT Name [COPY Parent] ... END`
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub name: Id,
    pub copy_from: Option<(Id, GPosIdx)>,
    pub params: ParamLists,
    pub metadata: Vec<Metadatum>,
    pub shell: Option<PosString>,
    pub dependency: Option<PosString>,
    pub noacc: bool,
    pub share: Option<Section>,
    pub uservars: Option<CodeBlock>,
    pub declare: Option<Section>,
    pub initialize: Option<Section>,
    pub trace: Option<Section>,
    pub save: Option<Section>,
    pub finally: Option<Section>,
    pub display: Option<Section>,
    pub span: GPosIdx,
}

impl WithPos for ComponentDef {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// Name given to an instance.
#[derive(Debug, Clone)]
pub enum InstName {
    Named(Id),
    /// `COPY(ref)`: the name of `ref` with the index appended.
    CopyOf(Id),
    /// Bare `COPY`: the type name of the previous instance with the index
    /// appended.
    Copy,
    /// `MYSELF`: the type name with the index appended.
    Myself,
}

/// A reference to another instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompRef {
    /// `PREVIOUS` or `PREVIOUS(n)`
    Previous(u32),
    Named(Id),
}

/// Actual parameter `name = expr`.
#[derive(Debug, Clone)]
pub struct Actual {
    pub name: Id,
    pub value: Expr,
    pub span: GPosIdx,
}

/// Right-hand side of an instance statement.
#[derive(Debug, Clone)]
pub enum InstRef {
    /// `Type(actuals)`
    Type {
        name: Id,
        actuals: Vec<Actual>,
        span: GPosIdx,
    },
    /// `COPY(ref)[(actuals)]`
    Copy {
        source: CompRef,
        actuals: Vec<Actual>,
        span: GPosIdx,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Absolute,
    /// `RELATIVE ABSOLUTE`
    RelativeAbsolute,
    Relative(CompRef),
}

#[derive(Debug, Clone)]
pub struct Coords {
    pub x: Expr,
    pub y: Expr,
    pub z: Expr,
}

/// `AT (..) reference` or `ROTATED (..) reference`
#[derive(Debug, Clone)]
pub struct Placement {
    pub coords: Coords,
    pub reference: Reference,
    pub span: GPosIdx,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpName {
    Previous(u32),
    Next(u32),
    Myself,
    Named(Id),
}

#[derive(Debug, Clone)]
pub struct Jump {
    pub target: JumpName,
    pub condition: Expr,
    pub iterate: bool,
    pub span: GPosIdx,
}

/// `COMPONENT name = Type(..) ...`
#[derive(Debug, Clone)]
pub struct ComponentStmt {
    pub removable: bool,
    pub cpu: bool,
    /// `Some(None)` is a SPLIT without multiplicity.
    pub split: Option<Option<Expr>>,
    pub name: InstName,
    pub inst_ref: InstRef,
    pub when: Option<Expr>,
    pub place: Placement,
    pub orientation: Option<Placement>,
    pub group: Option<(Id, GPosIdx)>,
    pub extend: Option<CodeBlock>,
    pub jumps: Vec<Jump>,
    pub metadata: Vec<Metadatum>,
    pub span: GPosIdx,
}

impl WithPos for ComponentStmt {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// An entry of the instrument TRACE list.
#[derive(Debug, Clone)]
pub enum TraceItem {
    Component(Box<ComponentStmt>),
    /// `SEARCH [SHELL] "path"`
    Search { shell: bool, path: PosString },
    /// `%include "file"` of another instrument.
    Include(PosString),
}

/// `DEFINE INSTRUMENT Name(params) ... END`
#[derive(Debug, Clone)]
pub struct InstrumentDef {
    pub name: Id,
    pub formals: Vec<Formal>,
    pub metadata: Vec<Metadatum>,
    pub shell: Option<PosString>,
    pub dependency: Option<PosString>,
    pub declare: Option<Section>,
    pub uservars: Option<CodeBlock>,
    pub initialize: Option<Section>,
    pub trace: Vec<TraceItem>,
    pub save: Option<Section>,
    pub finally: Option<Section>,
    pub span: GPosIdx,
}

impl WithPos for InstrumentDef {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::CodeBlock;

    #[test]
    fn codeblock_drops_blank_edges() {
        let cb = CodeBlock::from_text(
            "a.comp".into(),
            10,
            "\n  x = 1;\n  y = 2;\n",
        );
        assert_eq!(cb.line, 11);
        assert_eq!(cb.lines, vec!["  x = 1;", "  y = 2;"]);
    }

    #[test]
    fn concat_keeps_first_attribution() {
        let a = CodeBlock::new("a.comp".into(), 5, vec!["a;".into()]);
        let b = CodeBlock::new("b.comp".into(), 9, vec!["b;".into()]);
        let c = a.concat(&b);
        assert_eq!(c.file, "a.comp");
        assert_eq!(c.line, 5);
        assert_eq!(c.lines, vec!["a;", "b;"]);
        assert_eq!(CodeBlock::default().concat(&b), b);
    }
}
