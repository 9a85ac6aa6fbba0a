//! Component definitions: COPY inheritance, sections and autoloading.
use super::expr::ExpScope;
use crate::{
    CodeBlock, CompFormal, ComponentDefinition, DefId, DefinitionTable,
    Metadatum, ParamType,
};
use itertools::Itertools;
use mccode_frontend::{ast, McParser, Workspace};
use mccode_utils::{DiagnosticContext, Error, GPosIdx, Id, McResult};
use strum::IntoEnumIterator;

/// Reads component definitions into the definition table.
///
/// A loader only reaches the definition table, the workspace and the
/// diagnostics: files it autoloads cannot observe or change the instances
/// of the instrument being built.
pub(super) struct Loader<'b> {
    pub ws: &'b mut Workspace,
    pub defs: &'b mut DefinitionTable,
    pub diag: &'b mut DiagnosticContext,
    /// Build flags requested by the definitions read.
    pub flags: Vec<String>,
    /// Definitions being read, innermost last.
    loading: Vec<Id>,
}

impl<'b> Loader<'b> {
    pub fn new(
        ws: &'b mut Workspace,
        defs: &'b mut DefinitionTable,
        diag: &'b mut DiagnosticContext,
    ) -> Self {
        Self {
            ws,
            defs,
            diag,
            flags: Vec::new(),
            loading: Vec::new(),
        }
    }

    /// Definition of the component `name`, autoloaded if needed. `None`
    /// when the component file exists but does not define `name`; that
    /// error has been recorded.
    pub fn lookup(&mut self, name: Id, span: GPosIdx) -> McResult<Option<DefId>> {
        if let Some(id) = self.defs.find(name) {
            return Ok(Some(id));
        }
        if self.loading.contains(&name) {
            self.diag.err(
                Error::misc(format!(
                    "Component `{name}' is defined as a copy of itself"
                ))
                .with_pos(&span),
            );
            return Ok(None);
        }
        self.autoload(name, span)
    }

    fn autoload(&mut self, name: Id, span: GPosIdx) -> McResult<Option<DefId>> {
        let path = self.ws.find_component(name.as_str()).ok_or_else(|| {
            Error::fatal(format!(
                "Cannot find file containing definition of component `{name}'"
            ))
            .with_pos(&span)
        })?;
        let source = path.to_string_lossy().to_string();
        log::info!("Autoloading component `{name}' from {source}");
        let file = McParser::parse_file(&path).map_err(|err| {
            Error::fatal(format!(
                "Errors encountered during autoload of component {name}. The component definition has syntax errors."
            ))
            .with_pos(&span)
            .with_post_msg(Some(format!("{err:?}")))
        })?;

        self.loading.push(name);
        let defined = file
            .components()
            .try_for_each(|def| self.define(def, &source).map(|_| ()));
        self.loading.pop();
        defined?;

        if file.instruments().next().is_some() {
            log::warn!(
                target: "builder",
                "Ignoring the instrument definition in component file {source}"
            );
        }

        let found = self.defs.find(name);
        if found.is_none() {
            self.diag.err(
                Error::misc(format!(
                    "Definition of component {name} not found (file {source} was found but does not contain the component definition)"
                ))
                .with_pos(&span),
            );
        }
        Ok(found)
    }

    /// Build `def` and register it. A definition with the same name read
    /// earlier takes precedence.
    pub fn define(
        &mut self,
        def: &ast::ComponentDef,
        source: &str,
    ) -> McResult<DefId> {
        if let Some(id) = self.defs.find(def.name) {
            log::debug!("Component `{}' is already defined", def.name);
            return Ok(id);
        }
        self.loading.push(def.name);
        let built = self.build(def, source);
        self.loading.pop();
        Ok(self.defs.add(built?))
    }

    fn build(
        &mut self,
        def: &ast::ComponentDef,
        source: &str,
    ) -> McResult<ComponentDefinition> {
        let parent = match &def.copy_from {
            Some((from, span)) => self
                .lookup(*from, *span)?
                .map(|id| self.defs[id].clone())
                .unwrap_or_else(|| ComponentDefinition::stand_in(*from, *span)),
            None => ComponentDefinition::default(),
        };

        if let Some(cmd) = &def.shell {
            self.ws.run_shell(cmd)?;
        }
        for (kind, span) in [
            ("STATE", def.params.state),
            ("POLARISATION", def.params.polarisation),
        ] {
            if let Some(span) = span {
                self.diag.warning(
                    Error::misc(format!(
                        "{kind} PARAMETERS are obsolete and ignored (component {})",
                        def.name
                    ))
                    .with_pos(&span),
                );
            }
        }

        let formals = |list: &[ast::Formal], this: &mut Self| {
            list.iter().map(|f| this.formal(f, def.name)).collect::<Vec<_>>()
        };
        let def_par = formals(&def.params.definition, self);
        let set_par = formals(&def.params.setting, self);
        let out_par = formals(&def.params.output, self);

        let metadata = def.metadata.iter().map(|m| Metadatum {
            source: def.name,
            name: m.name.clone(),
            mime: m.mime.clone(),
            body: m.body.clone(),
        });

        let mut dependency = parent.dependency.clone();
        if let Some(dep) = &def.dependency {
            self.flags.push(dep.to_string());
            dependency = Some(match dependency {
                Some(prev) => format!("{prev} {dep}"),
                None => dep.to_string(),
            });
        }
        let noacc = def.noacc || parent.noacc;
        if noacc {
            self.flags.push("-DFUNNEL".to_string());
        }

        let share = self.section(&def.share, &parent.share, |d| &d.share)?;
        let declare =
            self.section(&def.declare, &parent.declare, |d| &d.declare)?;
        let initialize = self.section(
            &def.initialize,
            &parent.initialize,
            |d| &d.initialize,
        )?;
        let trace = self.section(&def.trace, &parent.trace, |d| &d.trace)?;
        let save = self.section(&def.save, &parent.save, |d| &d.save)?;
        let finally =
            self.section(&def.finally, &parent.finally, |d| &d.finally)?;
        let display =
            self.section(&def.display, &parent.display, |d| &d.display)?;
        let uservars = match &def.uservars {
            Some(cb) if !cb.is_empty() => cb.clone(),
            _ => parent.uservars.clone(),
        };

        Ok(ComponentDefinition {
            name: def.name,
            source: source.to_string(),
            def_par: parent.def_par.iter().cloned().chain(def_par).collect(),
            set_par: parent.set_par.iter().cloned().chain(set_par).collect(),
            out_par: parent.out_par.iter().cloned().chain(out_par).collect(),
            metadata: parent.metadata.iter().cloned().chain(metadata).collect(),
            share,
            uservars,
            declare,
            initialize,
            trace,
            save,
            finally,
            display,
            noacc,
            dependency,
            span: def.span,
        })
    }

    fn formal(&mut self, f: &ast::Formal, comp: Id) -> CompFormal {
        let ty = match &f.ty {
            None => ParamType::Double,
            Some(ty) => ParamType::resolve(ty.name.as_str(), ty.pointer, true)
                .unwrap_or_else(|| {
                    self.diag.err(
                        Error::misc(format!(
                            "Illegal type `{}{}' for parameter `{}' of component {comp} (legal types are: {})",
                            ty.name,
                            if ty.pointer { "*" } else { "" },
                            f.name,
                            ParamType::iter().join(", ")
                        ))
                        .with_pos(f),
                    );
                    ParamType::Double
                }),
        };
        let default = f
            .default
            .as_ref()
            .map(|e| ExpScope::default().convert(e, self.diag))
            .or_else(|| (ty == ParamType::Vector).then(|| crate::Exp::value("NULL")));
        CompFormal {
            name: f.name,
            ty,
            default,
            span: f.span,
        }
    }

    /// Code of a section given `written`, falling back to `inherited` when
    /// nothing was written.
    fn section(
        &mut self,
        written: &Option<ast::Section>,
        inherited: &CodeBlock,
        select: fn(&ComponentDefinition) -> &CodeBlock,
    ) -> McResult<CodeBlock> {
        let code = match written {
            None => CodeBlock::default(),
            Some(section) => self.resolve_section(section, select)?,
        };
        Ok(if code.is_empty() {
            inherited.clone()
        } else {
            code
        })
    }

    /// Code of `section`. `COPY Name` takes the same section of `Name`;
    /// `EXTEND` lines are added after the copied ones.
    pub fn resolve_section(
        &mut self,
        section: &ast::Section,
        select: fn(&ComponentDefinition) -> &CodeBlock,
    ) -> McResult<CodeBlock> {
        Ok(match section {
            ast::Section::Code(cb) => cb.clone(),
            ast::Section::Copy { from, extend, span } => {
                let copied = self
                    .lookup(*from, *span)?
                    .map(|id| select(&self.defs[id]).clone())
                    .unwrap_or_default();
                match extend {
                    Some(ext) => copied.concat(ext),
                    None => copied,
                }
            }
        })
    }
}
