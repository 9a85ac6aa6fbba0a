//! Variables declared in DECLARE and USERVARS blocks.
use mccode_ir::{CodeBlock, Context};
use regex::Regex;

lazy_static::lazy_static! {
    static ref DECLARATION: Regex =
        Regex::new(r"\w[\s\w\*]+\s+\**\w+\[?\w*\]?\[?\w*\]?;").unwrap();
    static ref DECLARED_NAME: Regex =
        Regex::new(r"(\w+)(\[?\w*\]?\[?\w*\]?);").unwrap();
}

/// A variable declaration found in a code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeVar {
    /// Everything in front of the name, `*`s included.
    pub ty: String,
    pub name: String,
    /// Array dimensions, such as `[3][3]`.
    pub dims: String,
}

impl CodeVar {
    /// The declaration of this variable as a struct member.
    pub fn member(&self) -> String {
        format!("{} {}{};", self.ty, self.name, self.dims)
    }

    /// Is this a plain scalar that can be zeroed and copied by value?
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty() && !self.ty.contains('*')
    }

    /// The same variable renamed for the instance `index`.
    pub fn numbered(&self, index: usize) -> CodeVar {
        CodeVar {
            name: format!("{}_{index}", self.name),
            ..self.clone()
        }
    }
}

/// Blank out the comments of `lines`. Positions are kept.
fn strip_comments(lines: &[String]) -> Vec<String> {
    let mut in_block = false;
    lines
        .iter()
        .map(|line| {
            let mut out = String::with_capacity(line.len());
            let mut chars = line.chars().peekable();
            while let Some(c) = chars.next() {
                if in_block {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        in_block = false;
                        out.push_str("  ");
                    } else {
                        out.push(' ');
                    }
                } else if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    in_block = true;
                    out.push_str("  ");
                } else if c == '/' && chars.peek() == Some(&'/') {
                    break;
                } else {
                    out.push(c);
                }
            }
            out
        })
        .collect()
}

/// Variables declared in `code`, in order.
pub fn codeblock_vars(code: &CodeBlock) -> Vec<CodeVar> {
    let mut vars = Vec::new();
    for line in strip_comments(&code.lines) {
        for decl in DECLARATION.find_iter(&line) {
            let text = decl.as_str();
            let Some(cap) = DECLARED_NAME.captures(text) else {
                continue;
            };
            let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let dims = cap.get(2).map(|m| m.as_str()).unwrap_or_default();
            vars.push(CodeVar {
                ty: text[..whole.start()].trim().to_string(),
                name: name.as_str().to_string(),
                dims: dims.to_string(),
            });
        }
    }
    vars
}

/// Log a warning when a declaration block holds assignments: they belong in
/// an initialisation section.
pub fn warn_assignments(code: &CodeBlock, block: &str, owner: &str, move_to: &str) {
    let count = strip_comments(&code.lines)
        .iter()
        .filter(|line| line.contains('='))
        .count();
    if count > 0 {
        log::warn!(
            "{block} block of {owner} contains {count} assignments (= sign). Move them into an {move_to} section. May fail at compile."
        );
    }
}

/// Fields added to the particle structure: the USERVARS of the instrument,
/// then for every instance those of its type, suffixed with the instance
/// index.
pub fn user_vars(ctx: &Context) -> Vec<CodeVar> {
    let mut vars = codeblock_vars(&ctx.instrument.uservars);
    for (inst, def) in ctx.instances() {
        for var in codeblock_vars(&def.uservars) {
            let var = var.numbered(inst.index.get());
            log::info!(
                "Added component {} USERVAR {} with type {}",
                inst.name,
                var.name,
                var.ty
            );
            vars.push(var);
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(lines: &[&str]) -> CodeBlock {
        CodeBlock::new(
            "t.comp".into(),
            1,
            lines.iter().map(|l| l.to_string()).collect(),
        )
    }

    #[test]
    fn declarations() {
        let vars = codeblock_vars(&block(&[
            "  double flux;",
            "  int *hits;  double table[3][4];",
            "  /* double hidden; */",
            "  // int gone;",
            "  struct sample_struct sample;",
        ]));
        let found: Vec<(String, String, String)> = vars
            .into_iter()
            .map(|v| (v.ty, v.name, v.dims))
            .collect();
        assert_eq!(
            found,
            vec![
                ("double".into(), "flux".into(), "".into()),
                ("int *".into(), "hits".into(), "".into()),
                ("double".into(), "table".into(), "[3][4]".into()),
                ("struct sample_struct".into(), "sample".into(), "".into()),
            ]
        );
    }

    #[test]
    fn multiline_comments_are_skipped() {
        let vars = codeblock_vars(&block(&[
            "  /* start",
            "  double hidden;",
            "  end */ double seen;",
        ]));
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "seen");
    }

    #[test]
    fn members() {
        let v = CodeVar {
            ty: "double".into(),
            name: "t".into(),
            dims: "[2]".into(),
        };
        assert_eq!(v.member(), "double t[2];");
        assert!(!v.is_scalar());
        assert_eq!(v.numbered(3).member(), "double t_3[2];");
    }
}
