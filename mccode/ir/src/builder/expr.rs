use crate::{Exp, InstrumentDefinition};
use mccode_frontend::ast::{Atom, Expr};
use mccode_utils::{DiagnosticContext, Error, GPosIdx, Id};

/// Names an expression can refer to.
#[derive(Default)]
pub(super) struct ExpScope<'a> {
    /// Identifiers naming an instrument parameter are rewritten.
    pub instr: Option<&'a InstrumentDefinition>,
    /// Name rendered for `PREVIOUS`.
    pub previous: Option<Id>,
    /// Name rendered for `MYSELF`.
    pub myself: Option<Id>,
}

impl ExpScope<'_> {
    pub fn convert(&self, expr: &Expr, diag: &mut DiagnosticContext) -> Exp {
        let parts = expr
            .atoms
            .iter()
            .map(|atom| self.atom(atom, expr.span, diag))
            .collect();
        Exp::compound(parts).with_line(expr.line)
    }

    fn atom(
        &self,
        atom: &Atom,
        span: GPosIdx,
        diag: &mut DiagnosticContext,
    ) -> Exp {
        match atom {
            Atom::Previous => match self.previous {
                Some(prev) => Exp::ctoken(prev),
                None => {
                    diag.err(
                        Error::misc(
                            "Found invalid PREVIOUS reference: there is no component instance before this one",
                        )
                        .with_pos(&span),
                    );
                    Exp::ctoken("PREVIOUS")
                }
            },
            Atom::Myself => match self.myself {
                Some(me) => Exp::ctoken(me),
                None => {
                    diag.err(
                        Error::misc(
                            "MYSELF can only be used in the parameters of a component instance",
                        )
                        .with_pos(&span),
                    );
                    Exp::ctoken("MYSELF")
                }
            },
            Atom::Ident(id) => match self.instr {
                Some(instr) if instr.has_param(id.as_str()) => {
                    Exp::instr_param(id)
                }
                _ => Exp::value(id),
            },
            Atom::Number(n) => Exp::number(n),
            Atom::Str(s) => Exp::string(s),
            Atom::CTok(tok) => Exp::ctoken(tok),
            Atom::Comma => Exp::ctoken(","),
            Atom::Group { open, close, atoms } => {
                let mut parts = vec![Exp::ctoken(open)];
                parts.extend(atoms.iter().map(|a| self.atom(a, span, diag)));
                parts.push(Exp::ctoken(close));
                Exp::compound(parts)
            }
        }
    }
}
