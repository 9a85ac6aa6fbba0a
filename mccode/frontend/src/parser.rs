#![allow(clippy::upper_case_acronyms)]

//! Parser for instrument and component files.
use super::ast::{
    self, Actual, Atom, CodeBlock, CompRef, ComponentDef, ComponentStmt,
    Coords, Expr, Formal, FormalType, InstName, InstRef, InstrumentDef, Jump,
    JumpName, Metadatum, ParamLists, Placement, Reference, Section, TraceItem,
};
use mccode_utils::{self, FileIdx, GPosIdx, GlobalPositionTable, Id, McResult, PosString};
use pest_consume::{Error, Parser, match_nodes};
use std::fs;
use std::io::Read;
use std::path::Path;

type ParseResult<T> = Result<T, Error<Rule>>;

/// Data associated with parsing the file.
#[derive(Clone)]
struct UserData {
    /// Index to the current file
    pub file: FileIdx,
    /// Name of the current file, used to attribute code blocks.
    pub name: std::rc::Rc<str>,
}

type Node<'i> = pest_consume::Node<'i, Rule, UserData>;

// include the grammar file so that Cargo knows to rebuild this file on grammar changes
const _GRAMMAR: &str = include_str!("syntax.pest");

#[derive(Parser)]
#[grammar = "syntax.pest"]
pub struct McParser;

impl McParser {
    /// Parse an instrument or component file into an AST representation.
    pub fn parse_file(path: &Path) -> McResult<ast::File> {
        let time = std::time::Instant::now();
        let content = fs::read(path).map_err(|err| {
            mccode_utils::Error::invalid_file(format!(
                "Failed to read {}: {err}",
                path.to_string_lossy(),
            ))
        })?;
        let content = std::str::from_utf8(&content)?;
        let mut out =
            Self::parse_str(&path.to_string_lossy(), content)?;
        out.path = path.to_path_buf();
        log::info!(
            "Parsed `{}` in {}ms",
            path.to_string_lossy(),
            time.elapsed().as_millis()
        );
        Ok(out)
    }

    /// Parse the whole of a reader, such as stdin.
    pub fn parse<R: Read>(mut r: R) -> McResult<ast::File> {
        let mut buf = String::new();
        r.read_to_string(&mut buf).map_err(|err| {
            mccode_utils::Error::invalid_file(format!(
                "Failed to parse buffer: {err}",
            ))
        })?;
        Self::parse_str("<stdin>", &buf)
    }

    /// Parse `content` as the contents of a file called `name`.
    pub fn parse_str(name: &str, content: &str) -> McResult<ast::File> {
        // Save the input string to the position table
        let file =
            GlobalPositionTable::add_file(name.to_string(), content.to_string());
        let user_data = UserData {
            file,
            name: name.into(),
        };
        let fail = |e: Error<Rule>| {
            mccode_utils::Error::parse_error(format!(
                "Failed to parse `{name}`: {}",
                e.with_path(name)
            ))
        };
        let inputs =
            McParser::parse_with_userdata(Rule::file, content, user_data)
                .map_err(fail)?;
        let input = inputs.single().map_err(fail)?;
        let items = McParser::file(input).map_err(fail)?;
        Ok(ast::File {
            path: name.into(),
            items,
        })
    }

    fn get_span(node: &Node) -> GPosIdx {
        let ud = node.user_data();
        let sp = node.as_span();
        GlobalPositionTable::add_pos(ud.file, sp.start(), sp.end())
    }

    fn get_line(node: &Node) -> usize {
        node.as_span().start_pos().line_col().0
    }

    fn section_opt(node: Node) -> ParseResult<Section> {
        Ok(match_nodes!(
            node.into_children();
            [section_body(body)] => body,
        ))
    }

    fn group_atoms(input: Node) -> ParseResult<Vec<Atom>> {
        input
            .into_children()
            .map(|child| match child.as_rule() {
                Rule::comma => Self::comma(child),
                _ => Self::atom(child),
            })
            .collect()
    }

    fn formal(input: Node) -> ParseResult<Formal> {
        let span = Self::get_span(&input);
        let mut formal = Formal {
            ty: None,
            name: Id::new(""),
            default: None,
            unit: None,
            span,
        };
        for child in input.into_children() {
            match child.as_rule() {
                Rule::formal_type => formal.ty = Some(Self::formal_type(child)?),
                Rule::identifier => formal.name = Self::identifier(child)?,
                Rule::unit => formal.unit = Some(Self::unit(child)?),
                Rule::default_value => {
                    formal.default = Some(Self::default_value(child)?)
                }
                _ => unreachable!("unexpected node in formal parameter"),
            }
        }
        Ok(formal)
    }

    fn param_list(input: Node) -> ParseResult<Vec<Formal>> {
        Ok(match_nodes!(
            input.into_children();
            [comp_formals(fs)] => fs,
        ))
    }
}

#[pest_consume::parser]
impl McParser {
    fn EOI(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    // ================ Literals =====================
    fn identifier(input: Node) -> ParseResult<Id> {
        Ok(Id::new(input.as_str()))
    }

    fn number(input: Node) -> ParseResult<String> {
        Ok(input.as_str().to_string())
    }

    fn unsigned(input: Node) -> ParseResult<u32> {
        input
            .as_str()
            .parse::<u32>()
            .map_err(|_| input.error("Expected a small non-negative integer"))
    }

    /// The text between the quotes, escapes untouched.
    fn string_lit(input: Node) -> ParseResult<String> {
        let s = input.as_str();
        Ok(s[1..s.len() - 1].to_string())
    }

    fn code_body(input: Node) -> ParseResult<&'_ str> {
        Ok(input.as_str())
    }

    fn codeblock(input: Node) -> ParseResult<CodeBlock> {
        let line = Self::get_line(&input);
        let file = input.user_data().name.to_string();
        Ok(match_nodes!(
            input.into_children();
            [code_body(text)] => CodeBlock::from_text(file, line, text),
        ))
    }

    // ================ Expressions =====================
    fn ctok(input: Node) -> ParseResult<String> {
        Ok(input.as_str().to_string())
    }

    fn comma(_input: Node) -> ParseResult<Atom> {
        Ok(Atom::Comma)
    }

    fn previous_atom(_input: Node) -> ParseResult<Atom> {
        Ok(Atom::Previous)
    }

    fn myself_atom(_input: Node) -> ParseResult<Atom> {
        Ok(Atom::Myself)
    }

    fn paren_group(input: Node) -> ParseResult<Atom> {
        Ok(Atom::Group {
            open: '(',
            close: ')',
            atoms: Self::group_atoms(input)?,
        })
    }

    fn bracket_group(input: Node) -> ParseResult<Atom> {
        Ok(Atom::Group {
            open: '[',
            close: ']',
            atoms: Self::group_atoms(input)?,
        })
    }

    fn brace_group(input: Node) -> ParseResult<Atom> {
        Ok(Atom::Group {
            open: '{',
            close: '}',
            atoms: Self::group_atoms(input)?,
        })
    }

    fn atom(input: Node) -> ParseResult<Atom> {
        Ok(match_nodes!(
            input.into_children();
            [previous_atom(a)] => a,
            [myself_atom(a)] => a,
            [identifier(id)] => Atom::Ident(id),
            [number(n)] => Atom::Number(n),
            [string_lit(s)] => Atom::Str(s),
            [paren_group(g)] => g,
            [bracket_group(g)] => g,
            [brace_group(g)] => g,
            [ctok(t)] => Atom::CTok(t),
        ))
    }

    fn exp(input: Node) -> ParseResult<Expr> {
        let span = Self::get_span(&input);
        let line = Self::get_line(&input);
        Ok(match_nodes!(
            input.into_children();
            [atom(atoms)..] => Expr { atoms: atoms.collect(), line, span },
        ))
    }

    // ================ Parameters =====================
    fn pointer(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn formal_type(input: Node) -> ParseResult<FormalType> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), pointer(_)] => FormalType { name, pointer: true },
            [identifier(name)] => FormalType { name, pointer: false },
        ))
    }

    fn default_value(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [exp(e)] => e,
        ))
    }

    fn unit(input: Node) -> ParseResult<PosString> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [string_lit(s)] => PosString::new(s, span),
        ))
    }

    fn comp_formal(input: Node) -> ParseResult<Formal> {
        Self::formal(input)
    }

    fn instr_formal(input: Node) -> ParseResult<Formal> {
        Self::formal(input)
    }

    fn comp_formals(input: Node) -> ParseResult<Vec<Formal>> {
        Ok(match_nodes!(
            input.into_children();
            [comp_formal(fs)..] => fs.collect(),
        ))
    }

    fn instr_formals(input: Node) -> ParseResult<Vec<Formal>> {
        Ok(match_nodes!(
            input.into_children();
            [instr_formal(fs)..] => fs.collect(),
        ))
    }

    fn parameters(input: Node) -> ParseResult<ParamLists> {
        let mut params = ParamLists::default();
        for child in input.into_children() {
            match child.as_rule() {
                Rule::def_params => {
                    params.definition = Self::param_list(child)?
                }
                Rule::set_params => params.setting = Self::param_list(child)?,
                Rule::out_params => params.output = Self::param_list(child)?,
                Rule::state_params => {
                    params.state = Some(Self::get_span(&child))
                }
                Rule::pol_params => {
                    params.polarisation = Some(Self::get_span(&child))
                }
                _ => unreachable!("unexpected node in parameter lists"),
            }
        }
        Ok(params)
    }

    // ================ Directives =====================
    fn pos_string(input: Node) -> ParseResult<PosString> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [string_lit(s)] => PosString::new(s, span),
        ))
    }

    fn shell(input: Node) -> ParseResult<PosString> {
        Ok(match_nodes!(
            input.into_children();
            [pos_string(s)] => s,
        ))
    }

    fn dependency(input: Node) -> ParseResult<PosString> {
        Ok(match_nodes!(
            input.into_children();
            [pos_string(s)] => s,
        ))
    }

    fn search_shell(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn search(input: Node) -> ParseResult<TraceItem> {
        Ok(match_nodes!(
            input.into_children();
            [search_shell(_), pos_string(path)] => TraceItem::Search { shell: true, path },
            [pos_string(path)] => TraceItem::Search { shell: false, path },
        ))
    }

    fn include(input: Node) -> ParseResult<TraceItem> {
        Ok(match_nodes!(
            input.into_children();
            [pos_string(path)] => TraceItem::Include(path),
        ))
    }

    fn meta_token(input: Node) -> ParseResult<String> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(id)] => id.to_string(),
            [string_lit(s)] => s,
        ))
    }

    fn metadata(input: Node) -> ParseResult<Metadatum> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [meta_token(mime), meta_token(name), codeblock(body)] =>
                Metadatum { name, mime, body, span },
        ))
    }

    // ================ Sections =====================
    fn copy_section(input: Node) -> ParseResult<Section> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(from), codeblock(code)] =>
                Section::Copy { from, extend: Some(code), span },
            [identifier(from)] => Section::Copy { from, extend: None, span },
        ))
    }

    fn section_body(input: Node) -> ParseResult<Section> {
        Ok(match_nodes!(
            input.into_children();
            [copy_section(s)] => s,
            [codeblock(code)] => Section::Code(code),
        ))
    }

    fn uservars(input: Node) -> ParseResult<CodeBlock> {
        Ok(match_nodes!(
            input.into_children();
            [codeblock(code)] => code,
        ))
    }

    // ================ Component definitions =====================
    fn comp_copy(input: Node) -> ParseResult<(Id, GPosIdx)> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name)] => (name, span),
        ))
    }

    fn component_def(input: Node) -> ParseResult<ComponentDef> {
        let span = Self::get_span(&input);
        let mut def = ComponentDef {
            name: Id::new(""),
            copy_from: None,
            params: ParamLists::default(),
            metadata: Vec::new(),
            shell: None,
            dependency: None,
            noacc: false,
            share: None,
            uservars: None,
            declare: None,
            initialize: None,
            trace: None,
            save: None,
            finally: None,
            display: None,
            span,
        };
        for child in input.into_children() {
            match child.as_rule() {
                Rule::identifier => def.name = Self::identifier(child)?,
                Rule::comp_copy => def.copy_from = Some(Self::comp_copy(child)?),
                Rule::parameters => def.params = Self::parameters(child)?,
                Rule::metadata => def.metadata.push(Self::metadata(child)?),
                Rule::shell => def.shell = Some(Self::shell(child)?),
                Rule::dependency => {
                    def.dependency = Some(Self::dependency(child)?)
                }
                Rule::noacc => def.noacc = true,
                Rule::share => def.share = Some(Self::section_opt(child)?),
                Rule::uservars => def.uservars = Some(Self::uservars(child)?),
                Rule::declare => def.declare = Some(Self::section_opt(child)?),
                Rule::initialize => {
                    def.initialize = Some(Self::section_opt(child)?)
                }
                Rule::trace => def.trace = Some(Self::section_opt(child)?),
                Rule::save => def.save = Some(Self::section_opt(child)?),
                Rule::finally => def.finally = Some(Self::section_opt(child)?),
                Rule::display => def.display = Some(Self::section_opt(child)?),
                _ => unreachable!("unexpected node in component definition"),
            }
        }
        Ok(def)
    }

    // ================ Component instances =====================
    fn inst_name(input: Node) -> ParseResult<InstName> {
        Ok(match_nodes!(
            input.into_children();
            [copy_named(id)] => InstName::CopyOf(id),
            [copy_bare(_)] => InstName::Copy,
            [myself_name(_)] => InstName::Myself,
            [identifier(id)] => InstName::Named(id),
        ))
    }

    fn copy_named(input: Node) -> ParseResult<Id> {
        Ok(match_nodes!(
            input.into_children();
            [identifier(id)] => id,
        ))
    }

    fn copy_bare(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn myself_name(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn previous_ref(input: Node) -> ParseResult<u32> {
        Ok(input
            .into_children()
            .next()
            .map(Self::unsigned)
            .transpose()?
            .unwrap_or(1))
    }

    fn comp_ref(input: Node) -> ParseResult<CompRef> {
        Ok(match_nodes!(
            input.into_children();
            [previous_ref(n)] => CompRef::Previous(n),
            [identifier(id)] => CompRef::Named(id),
        ))
    }

    fn actual(input: Node) -> ParseResult<Actual> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), exp(value)] => Actual { name, value, span },
        ))
    }

    fn actuals(input: Node) -> ParseResult<Vec<Actual>> {
        Ok(match_nodes!(
            input.into_children();
            [actual(a)..] => a.collect(),
        ))
    }

    fn copy_ref(input: Node) -> ParseResult<InstRef> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [comp_ref(source), actuals(actuals)] =>
                InstRef::Copy { source, actuals, span },
            [comp_ref(source)] =>
                InstRef::Copy { source, actuals: Vec::new(), span },
        ))
    }

    fn type_ref(input: Node) -> ParseResult<InstRef> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(name), actuals(actuals)] =>
                InstRef::Type { name, actuals, span },
        ))
    }

    fn inst_ref(input: Node) -> ParseResult<InstRef> {
        Ok(match_nodes!(
            input.into_children();
            [copy_ref(r)] => r,
            [type_ref(r)] => r,
        ))
    }

    fn coords(input: Node) -> ParseResult<Coords> {
        Ok(match_nodes!(
            input.into_children();
            [exp(x), exp(y), exp(z)] => Coords { x, y, z },
        ))
    }

    fn relative_absolute(_input: Node) -> ParseResult<Reference> {
        Ok(Reference::RelativeAbsolute)
    }

    fn absolute(_input: Node) -> ParseResult<Reference> {
        Ok(Reference::Absolute)
    }

    fn relative_to(input: Node) -> ParseResult<Reference> {
        Ok(match_nodes!(
            input.into_children();
            [comp_ref(r)] => Reference::Relative(r),
        ))
    }

    fn reference(input: Node) -> ParseResult<Reference> {
        Ok(match_nodes!(
            input.into_children();
            [relative_absolute(r)] => r,
            [relative_to(r)] => r,
            [absolute(r)] => r,
        ))
    }

    fn place(input: Node) -> ParseResult<Placement> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [coords(coords), reference(reference)] =>
                Placement { coords, reference, span },
        ))
    }

    fn orientation(input: Node) -> ParseResult<Placement> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [coords(coords), reference(reference)] =>
                Placement { coords, reference, span },
        ))
    }

    /// `None` when no multiplicity is given.
    fn split(input: Node) -> ParseResult<Option<Expr>> {
        input.into_children().next().map(Self::exp).transpose()
    }

    fn when(input: Node) -> ParseResult<Expr> {
        Ok(match_nodes!(
            input.into_children();
            [exp(e)] => e,
        ))
    }

    fn group(input: Node) -> ParseResult<(Id, GPosIdx)> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [identifier(id)] => (id, span),
        ))
    }

    fn extend(input: Node) -> ParseResult<CodeBlock> {
        Ok(match_nodes!(
            input.into_children();
            [codeblock(code)] => code,
        ))
    }

    /// `NEXT` or `NEXT(n)`, counting 1 when no count is given.
    fn next_target(input: Node) -> ParseResult<u32> {
        Ok(input
            .into_children()
            .next()
            .map(Self::unsigned)
            .transpose()?
            .unwrap_or(1))
    }

    fn myself_target(_input: Node) -> ParseResult<()> {
        Ok(())
    }

    fn jump_target(input: Node) -> ParseResult<JumpName> {
        Ok(match_nodes!(
            input.into_children();
            [previous_ref(n)] => JumpName::Previous(n),
            [next_target(n)] => JumpName::Next(n),
            [myself_target(_)] => JumpName::Myself,
            [identifier(id)] => JumpName::Named(id),
        ))
    }

    fn jump_when(input: Node) -> ParseResult<(Expr, bool)> {
        Ok(match_nodes!(
            input.into_children();
            [exp(e)] => (e, false),
        ))
    }

    fn jump_iterate(input: Node) -> ParseResult<(Expr, bool)> {
        Ok(match_nodes!(
            input.into_children();
            [exp(e)] => (e, true),
        ))
    }

    fn jump(input: Node) -> ParseResult<Jump> {
        let span = Self::get_span(&input);
        Ok(match_nodes!(
            input.into_children();
            [jump_target(target), jump_when((condition, iterate))] =>
                Jump { target, condition, iterate, span },
            [jump_target(target), jump_iterate((condition, iterate))] =>
                Jump { target, condition, iterate, span },
        ))
    }

    fn component(input: Node) -> ParseResult<ComponentStmt> {
        let span = Self::get_span(&input);
        let mut removable = false;
        let mut cpu = false;
        let mut split = None;
        let mut name = None;
        let mut inst_ref = None;
        let mut when = None;
        let mut place = None;
        let mut orientation = None;
        let mut group = None;
        let mut extend = None;
        let mut jumps = Vec::new();
        let mut metadata = Vec::new();
        for child in input.clone().into_children() {
            match child.as_rule() {
                Rule::removable => removable = true,
                Rule::cpu => cpu = true,
                Rule::split => split = Some(Self::split(child)?),
                Rule::inst_name => name = Some(Self::inst_name(child)?),
                Rule::inst_ref => inst_ref = Some(Self::inst_ref(child)?),
                Rule::when => when = Some(Self::when(child)?),
                Rule::place => place = Some(Self::place(child)?),
                Rule::orientation => {
                    orientation = Some(Self::orientation(child)?)
                }
                Rule::group => group = Some(Self::group(child)?),
                Rule::extend => extend = Some(Self::extend(child)?),
                Rule::jump => jumps.push(Self::jump(child)?),
                Rule::metadata => metadata.push(Self::metadata(child)?),
                _ => unreachable!("unexpected node in component instance"),
            }
        }
        match (name, inst_ref, place) {
            (Some(name), Some(inst_ref), Some(place)) => Ok(ComponentStmt {
                removable,
                cpu,
                split,
                name,
                inst_ref,
                when,
                place,
                orientation,
                group,
                extend,
                jumps,
                metadata,
                span,
            }),
            _ => Err(input.error("Malformed COMPONENT statement")),
        }
    }

    // ================ Instruments =====================
    fn trace_item(input: Node) -> ParseResult<TraceItem> {
        Ok(match_nodes!(
            input.into_children();
            [component(c)] => TraceItem::Component(Box::new(c)),
            [search(s)] => s,
            [include(i)] => i,
        ))
    }

    fn instr_trace(input: Node) -> ParseResult<Vec<TraceItem>> {
        Ok(match_nodes!(
            input.into_children();
            [trace_item(items)..] => items.collect(),
        ))
    }

    fn instrument_def(input: Node) -> ParseResult<InstrumentDef> {
        let span = Self::get_span(&input);
        let mut def = InstrumentDef {
            name: Id::new(""),
            formals: Vec::new(),
            metadata: Vec::new(),
            shell: None,
            dependency: None,
            declare: None,
            uservars: None,
            initialize: None,
            trace: Vec::new(),
            save: None,
            finally: None,
            span,
        };
        for child in input.into_children() {
            match child.as_rule() {
                Rule::identifier => def.name = Self::identifier(child)?,
                Rule::instr_formals => def.formals = Self::instr_formals(child)?,
                Rule::metadata => def.metadata.push(Self::metadata(child)?),
                Rule::shell => def.shell = Some(Self::shell(child)?),
                Rule::dependency => {
                    def.dependency = Some(Self::dependency(child)?)
                }
                Rule::declare => def.declare = Some(Self::section_opt(child)?),
                Rule::uservars => def.uservars = Some(Self::uservars(child)?),
                Rule::initialize => {
                    def.initialize = Some(Self::section_opt(child)?)
                }
                Rule::instr_trace => def.trace = Self::instr_trace(child)?,
                Rule::save => def.save = Some(Self::section_opt(child)?),
                Rule::finally => def.finally = Some(Self::section_opt(child)?),
                _ => unreachable!("unexpected node in instrument definition"),
            }
        }
        Ok(def)
    }

    fn item(input: Node) -> ParseResult<ast::Item> {
        Ok(match_nodes!(
            input.into_children();
            [component_def(def)] => ast::Item::Component(def),
            [instrument_def(def)] => ast::Item::Instrument(def),
        ))
    }

    fn file(input: Node) -> ParseResult<Vec<ast::Item>> {
        Ok(match_nodes!(
            input.into_children();
            [item(items).., EOI(_)] => items.collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTR: &str = r#"
/* A small test instrument */
DEFINE INSTRUMENT Test(double L1 = 10, string file = "data.dat", int n / "counts" = 2)
DECLARE
%{
  double x;
%}
TRACE
COMPONENT a = Progress_bar() AT (0, 0, 0) ABSOLUTE
SPLIT 4 COMPONENT b = Arm() WHEN (L1 > 0) AT (0, 0, L1) RELATIVE PREVIOUS
  ROTATED (0, 90, 0) RELATIVE a
  GROUP g EXTEND %{
  x = 1;
%}
  JUMP PREVIOUS(2) ITERATE 3
COMPONENT COPY(b) = COPY(b)(xwidth = 0.1) AT (0, 0, 1) RELATIVE ABSOLUTE
END
"#;

    #[test]
    fn parse_instrument() {
        let file = McParser::parse_str("test.instr", INSTR).unwrap();
        let instr = file.instruments().next().unwrap();
        assert_eq!(instr.name, "Test");
        assert_eq!(instr.formals.len(), 3);
        assert_eq!(instr.formals[2].unit.as_ref().unwrap().as_str(), "counts");
        assert_eq!(instr.trace.len(), 3);
        let TraceItem::Component(b) = &instr.trace[1] else {
            panic!("expected a component")
        };
        assert!(matches!(b.split, Some(Some(_))));
        assert_eq!(b.place.reference, Reference::Relative(CompRef::Previous(1)));
        assert_eq!(b.jumps[0].target, JumpName::Previous(2));
        assert!(b.jumps[0].iterate);
        assert_eq!(b.extend.as_ref().unwrap().lines, vec!["  x = 1;"]);
        let TraceItem::Component(c) = &instr.trace[2] else {
            panic!("expected a component")
        };
        assert!(matches!(c.name, InstName::CopyOf(id) if id == "b"));
        assert_eq!(c.place.reference, Reference::RelativeAbsolute);
    }

    #[test]
    fn parse_component_definition() {
        let src = r#"
DEFINE COMPONENT Slit
SETTING PARAMETERS (xwidth = 0, string filename = 0, vector v = NULL, ymax)
OUTPUT PARAMETERS (tmp)
SHARE %{ %include "read_table-lib" %}
TRACE
%{
  PROP_Z0;
%}
END
"#;
        let file = McParser::parse_str("Slit.comp", src).unwrap();
        let def = file.components().next().unwrap();
        assert_eq!(def.name, "Slit");
        assert_eq!(def.params.setting.len(), 4);
        assert_eq!(def.params.setting[1].ty.as_ref().unwrap().name, "string");
        assert!(def.params.setting[3].default.is_none());
        let Some(Section::Code(trace)) = &def.trace else {
            panic!("expected a trace block")
        };
        assert_eq!(trace.lines, vec!["  PROP_Z0;"]);
        assert_eq!(trace.line, 8);
    }

    #[test]
    fn expression_atoms() {
        let src = r#"DEFINE INSTRUMENT T() TRACE
COMPONENT a = Arm() WHEN (x->y[2] >= 1e-3 && s == "a") AT (0,0,0) ABSOLUTE
END"#;
        let file = McParser::parse_str("t.instr", src).unwrap();
        let instr = file.instruments().next().unwrap();
        let TraceItem::Component(a) = &instr.trace[0] else {
            panic!("expected a component")
        };
        let when = a.when.as_ref().unwrap();
        assert_eq!(when.line, 2);
        let Atom::Group { atoms, .. } = &when.atoms[0] else {
            panic!("expected a group")
        };
        assert_eq!(atoms[1], Atom::CTok("->".into()));
        assert!(matches!(atoms[3], Atom::Group { open: '[', .. }));
        assert_eq!(atoms[4], Atom::CTok(">=".into()));
        assert_eq!(atoms[5], Atom::Number("1e-3".into()));
        assert_eq!(atoms[8], Atom::CTok("==".into()));
        assert_eq!(atoms[9], Atom::Str("a".into()));
    }

    #[test]
    fn rotated_references() {
        let src = r#"DEFINE INSTRUMENT T() TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE ROTATED (0, 45, 0) ABSOLUTE
COMPONENT b = Arm() AT (0,0,1) RELATIVE a ROTATED (1, 2, 3) RELATIVE PREVIOUS
END"#;
        let file = McParser::parse_str("t.instr", src).unwrap();
        let instr = file.instruments().next().unwrap();
        let TraceItem::Component(a) = &instr.trace[0] else {
            panic!("expected a component")
        };
        let rot = a.orientation.as_ref().unwrap();
        assert_eq!(rot.reference, Reference::Absolute);
        assert_eq!(rot.coords.y.atoms, vec![Atom::Number("45".into())]);
        let TraceItem::Component(b) = &instr.trace[1] else {
            panic!("expected a component")
        };
        let rot = b.orientation.as_ref().unwrap();
        assert_eq!(rot.reference, Reference::Relative(CompRef::Previous(1)));
        assert_eq!(rot.coords.z.atoms, vec![Atom::Number("3".into())]);
        assert_eq!(b.place.reference, Reference::Relative(CompRef::Named("a".into())));
    }

    #[test]
    fn next_jumps() {
        let src = r#"DEFINE INSTRUMENT T() TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE
  JUMP NEXT WHEN (1)
  JUMP NEXT(2) ITERATE 4
COMPONENT b = Arm() AT (0,0,1) RELATIVE a
COMPONENT c = Arm() AT (0,0,1) RELATIVE a
END"#;
        let file = McParser::parse_str("t.instr", src).unwrap();
        let instr = file.instruments().next().unwrap();
        let TraceItem::Component(a) = &instr.trace[0] else {
            panic!("expected a component")
        };
        assert_eq!(a.jumps.len(), 2);
        assert_eq!(a.jumps[0].target, JumpName::Next(1));
        assert!(!a.jumps[0].iterate);
        assert_eq!(a.jumps[1].target, JumpName::Next(2));
        assert!(a.jumps[1].iterate);
    }

    #[test]
    fn syntax_error_is_reported() {
        let err = McParser::parse_str("bad.instr", "DEFINE INSTRUMENT T(")
            .unwrap_err();
        assert!(err.to_string().contains("bad.instr"));
    }
}
