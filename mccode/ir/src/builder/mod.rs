//! Construction of the semantic model from the syntax tree.
mod definitions;
mod expr;
mod instances;

use crate::{
    BackendConf, CodeBlock, ComponentDefinition, Context, DefinitionTable,
    Exp, GroupIdx, InstIdx, InstrFormal, InstrumentDefinition, Metadatum,
    ParamType,
};
use definitions::Loader;
use expr::ExpScope;
use mccode_frontend::{ast, McParser, Workspace};
use mccode_utils::{
    DiagnosticContext, Error, GPosIdx, Id, McResult, MultiError, PosString,
};
use std::collections::HashMap;

/// Construct the instrument of `file` and every component it uses.
pub fn ast_to_ir(
    file: &ast::File,
    workspace: Workspace,
) -> Result<Context, MultiError> {
    Builder::new(workspace).build(file)
}

/// State of the construction of one instrument.
///
/// Problems are recorded and the construction continues so that one run
/// reports as much as possible. Only fatal errors stop it.
pub struct Builder {
    workspace: Workspace,
    definitions: DefinitionTable,
    diag: DiagnosticContext,
    instr: InstrumentDefinition,
    /// Instance names seen so far. With duplicates, the first instance.
    names: HashMap<Id, InstIdx>,
    groups: HashMap<Id, GroupIdx>,
    /// Last instance kept, the target of `PREVIOUS`.
    previous: Option<InstIdx>,
    /// Number of `%include`d instruments being built.
    include_depth: u32,
}

impl Builder {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            definitions: DefinitionTable::default(),
            diag: DiagnosticContext::default(),
            instr: InstrumentDefinition::default(),
            names: HashMap::new(),
            groups: HashMap::new(),
            previous: None,
            include_depth: 0,
        }
    }

    /// Build the instrument defined in `file`. Fails with every error
    /// recorded, fatal or not.
    pub fn build(mut self, file: &ast::File) -> Result<Context, MultiError> {
        let built = self.construct(file);
        let (ctx, mut diag) = self.finish();
        if let Err(err) = built {
            diag.err(err);
        }
        diag.report("builder")?;
        Ok(ctx)
    }

    /// Build the instrument defined in `file`. Only fatal errors are
    /// returned; the others are kept until [Builder::finish].
    pub fn construct(&mut self, file: &ast::File) -> McResult<()> {
        let source = file.path.to_string_lossy().to_string();
        for def in file.components() {
            self.loader(|l| l.define(def, &source))?;
        }
        let mut instruments = file.instruments();
        let top = instruments.next().ok_or_else(|| {
            Error::misc(format!("No instrument definition found in {source}"))
        })?;
        for extra in instruments {
            self.diag.err(
                Error::misc(format!(
                    "Instrument {} is defined after instrument {}; only one instrument may be defined per file",
                    extra.name, top.name
                ))
                .with_pos(extra),
            );
        }
        self.instrument(top, &source)?;
        self.check_instrument_formals();
        Ok(())
    }

    /// The session built so far and what was recorded while building it.
    pub fn finish(self) -> (Context, DiagnosticContext) {
        let ctx = Context {
            instrument: self.instr,
            definitions: self.definitions,
            workspace: self.workspace,
            bc: BackendConf::default(),
            extra_opts: vec![],
        };
        (ctx, self.diag)
    }

    /// Run `f` with a definition loader, then apply the build flags the
    /// definitions it read asked for.
    fn loader<T>(
        &mut self,
        f: impl FnOnce(&mut Loader) -> McResult<T>,
    ) -> McResult<T> {
        let mut loader = Loader::new(
            &mut self.workspace,
            &mut self.definitions,
            &mut self.diag,
        );
        let out = f(&mut loader);
        let flags = std::mem::take(&mut loader.flags);
        for flag in flags {
            self.instr.add_dependency(&flag);
        }
        out
    }

    /// Convert `expr` in the scope of the instrument, with `myself` naming
    /// the instance being built.
    fn exp(&mut self, expr: &ast::Expr, myself: Option<Id>) -> Exp {
        let previous = self.previous.map(|p| self.instr.get(p).name);
        let scope = ExpScope {
            instr: Some(&self.instr),
            previous,
            myself,
        };
        scope.convert(expr, &mut self.diag)
    }

    fn instrument(
        &mut self,
        def: &ast::InstrumentDef,
        source: &str,
    ) -> McResult<()> {
        if self.include_depth == 0 {
            self.instr.name = def.name;
            self.instr.source = source.to_string();
            self.instr.span = def.span;
        } else {
            log::info!("Including instrument `{}' from {source}", def.name);
            self.instr.included += 1;
        }

        for formal in &def.formals {
            let formal = self.instr_formal(formal);
            self.instr.formals.push(formal);
        }
        self.instr
            .metadata
            .extend(def.metadata.iter().map(|m| Metadatum {
                source: def.name,
                name: m.name.clone(),
                mime: m.mime.clone(),
                body: m.body.clone(),
            }));
        if let Some(cmd) = &def.shell {
            self.workspace.run_shell(cmd)?;
        }
        if let Some(dep) = &def.dependency {
            self.instr.add_dependency(dep.as_str());
        }

        for item in &def.trace {
            match item {
                ast::TraceItem::Component(stmt) => self.instance(stmt)?,
                ast::TraceItem::Search { shell, path } => {
                    self.workspace.search(*shell, path)?
                }
                ast::TraceItem::Include(path) => self.include(path)?,
            }
        }

        // Sections of included instruments were added while building the
        // TRACE list, so these lines come after theirs.
        let decls = self.instr_section(&def.declare, |d| &d.declare)?;
        let inits = self.instr_section(&def.initialize, |d| &d.initialize)?;
        let saves = self.instr_section(&def.save, |d| &d.save)?;
        let finals = self.instr_section(&def.finally, |d| &d.finally)?;
        let instr = &mut self.instr;
        instr.decls = instr.decls.concat(&decls);
        instr.inits = instr.inits.concat(&inits);
        instr.saves = instr.saves.concat(&saves);
        instr.finals = instr.finals.concat(&finals);
        if let Some(uservars) = &def.uservars {
            instr.uservars = instr.uservars.concat(uservars);
        }
        Ok(())
    }

    fn instr_section(
        &mut self,
        section: &Option<ast::Section>,
        select: fn(&ComponentDefinition) -> &CodeBlock,
    ) -> McResult<CodeBlock> {
        match section {
            None => Ok(CodeBlock::default()),
            Some(section) => {
                self.loader(|l| l.resolve_section(section, select))
            }
        }
    }

    fn instr_formal(&mut self, f: &ast::Formal) -> InstrFormal {
        let ty = match &f.ty {
            None => ParamType::Double,
            Some(ty) => ParamType::resolve(ty.name.as_str(), ty.pointer, false)
                .unwrap_or_else(|| {
                    self.diag.err(
                        Error::misc(format!(
                            "Illegal type `{}{}' for instrument parameter `{}' (legal types are: double, int, string, char*, double*)",
                            ty.name,
                            if ty.pointer { "*" } else { "" },
                            f.name
                        ))
                        .with_pos(f),
                    );
                    ParamType::Double
                }),
        };
        InstrFormal {
            name: f.name,
            ty,
            default: f
                .default
                .as_ref()
                .map(|e| ExpScope::default().convert(e, &mut self.diag)),
            unit: f.unit.as_ref().map(|u| u.to_string()),
            span: f.span,
        }
    }

    /// A parameter declared twice: the later declaration wins and the
    /// earlier one is cleared.
    fn check_instrument_formals(&mut self) {
        let formals = &mut self.instr.formals;
        for i in 0..formals.len() {
            let name = formals[i].name;
            if name.as_str().is_empty() {
                continue;
            }
            if formals[i + 1..].iter().any(|f| f.name == name) {
                self.diag.warning(
                    Error::misc(format!(
                        "Instrument parameter name {name} is used multiple times in instrument {}. Using the last definition.",
                        self.instr.name
                    ))
                    .with_pos(&formals[i]),
                );
                formals[i].name = Id::default();
            }
        }
    }

    /// Splice the instrument defined in `path` at this point of the TRACE
    /// list.
    fn include(&mut self, path: &PosString) -> McResult<()> {
        let file_path = self.workspace.resolve_include(path)?;
        let file = McParser::parse_file(&file_path).map_err(|err| {
            Error::fatal(format!(
                "Errors encountered while including instrument {}",
                file_path.to_string_lossy()
            ))
            .with_pos(path)
            .with_post_msg(Some(format!("{err:?}")))
        })?;
        let source = file_path.to_string_lossy().to_string();
        for def in file.components() {
            self.loader(|l| l.define(def, &source))?;
        }
        let Some(inner) = file.instruments().next() else {
            self.diag.err(
                Error::misc(format!("No instrument definition found in {source}"))
                    .with_pos(path),
            );
            return Ok(());
        };
        self.include_depth += 1;
        let built = self.instrument(inner, &source);
        self.include_depth -= 1;
        built
    }
}

/// Position of `span` formatted as a note, for "previous definition"
/// messages.
fn previous_definition(span: GPosIdx) -> Option<String> {
    span.into_option().map(|s| s.format("Previous definition"))
}
