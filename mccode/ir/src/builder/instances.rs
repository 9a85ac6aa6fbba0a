//! Component instances of the TRACE list.
use super::{previous_definition, Builder};
use crate::{
    Bindings, CodeBlock, CompFormal, ComponentInstance, Coords, DefId, Exp,
    GroupIdx, GroupInstance, InstIdx, JumpSpec, JumpTarget, Metadatum,
    Position,
};
use itertools::Itertools;
use mccode_frontend::ast;
use mccode_utils::{DiagnosticContext, Error, GPosIdx, Id, McResult};
use smallvec::SmallVec;

/// What an instance takes from its type, or from the instance it copies.
struct Template {
    def: DefId,
    actuals: Bindings,
    when: Option<Exp>,
    group: Option<GroupIdx>,
    extend: CodeBlock,
    jumps: SmallVec<[JumpSpec; 2]>,
}

#[derive(Clone, Copy)]
enum GroupRef {
    Name(Id),
    Handle(GroupIdx),
}

impl Builder {
    /// Build and append the instance declared by `stmt`.
    pub(super) fn instance(&mut self, stmt: &ast::ComponentStmt) -> McResult<()> {
        let index = InstIdx::from_slot(self.instr.instances.len());
        let Some(template) = self.template(&stmt.inst_ref, index)? else {
            return Ok(());
        };
        let type_name = self.definitions[template.def].name;

        if stmt.removable && self.include_depth > 0 {
            log::info!(
                "Dropping REMOVABLE component of type {type_name} from included instrument"
            );
            return Ok(());
        }

        let name: Id = match &stmt.name {
            ast::InstName::Named(id) => *id,
            ast::InstName::CopyOf(id) => format!("{id}_{index}").into(),
            ast::InstName::Copy | ast::InstName::Myself => {
                format!("Comp_{index}").into()
            }
        };

        // Actuals: the copied ones, overridden by those written here.
        let mut actuals = template.actuals;
        let given = match &stmt.inst_ref {
            ast::InstRef::Type { actuals, .. }
            | ast::InstRef::Copy { actuals, .. } => actuals,
        };
        for actual in given {
            let value = self.exp(&actual.value, Some(name));
            actuals.insert(actual.name, value);
        }
        self.check_orphans(name, template.def, given);
        let (defpar, setpar) = self.bind(name, template.def, &actuals, given, stmt.span);

        let position = self.position(stmt, name);
        let when = match &stmt.when {
            Some(e) => Some(self.exp(e, Some(name))),
            None => template.when,
        };
        let split = stmt.split.as_ref().map(|split| match split {
            Some(e) => self.exp(e, Some(name)),
            None => Exp::number("10"),
        });

        let extend = match &stmt.extend {
            Some(code) => {
                if !template.extend.is_empty() {
                    self.diag.warning(
                        Error::misc(format!(
                            "Existing (COPY) EXTEND block in COMPONENT {name} is overwritten"
                        ))
                        .with_pos(stmt),
                    );
                }
                code.clone()
            }
            None => template.extend,
        };

        let jumps = if stmt.jumps.is_empty() {
            template.jumps
        } else {
            stmt.jumps
                .iter()
                .map(|jump| {
                    let target = match &jump.target {
                        ast::JumpName::Previous(n) => JumpTarget::Previous(*n),
                        ast::JumpName::Next(n) => JumpTarget::Next(*n),
                        ast::JumpName::Myself => JumpTarget::Myself,
                        ast::JumpName::Named(id) => JumpTarget::Named(*id),
                    };
                    let condition = self.exp(&jump.condition, Some(name));
                    JumpSpec::new(target, condition, jump.iterate, index, jump.span)
                })
                .collect()
        };

        if stmt.cpu {
            self.instr.require_funnel();
        }

        self.check_name(name, template.def, stmt);

        let group = match (&stmt.group, template.group) {
            (Some((group, span)), _) => Some(self.join_group(
                GroupRef::Name(*group),
                (name, index),
                *span,
            )),
            (None, Some(idx)) => Some(self.join_group(
                GroupRef::Handle(idx),
                (name, index),
                stmt.span,
            )),
            (None, None) => None,
        };
        if let (Some(group), Some(_)) = (group, &split) {
            self.check_split(group, name, type_name, index, stmt)?;
        }

        let metadata = stmt
            .metadata
            .iter()
            .map(|m| Metadatum {
                source: name,
                name: m.name.clone(),
                mime: m.mime.clone(),
                body: m.body.clone(),
            })
            .collect();

        log::debug!("Component {name}={type_name}() has index {index}");
        self.instr.instances.push(ComponentInstance {
            name,
            index,
            def: template.def,
            type_name,
            defpar,
            setpar,
            actuals,
            position,
            extend,
            group,
            jumps,
            when,
            split,
            removable: stmt.removable,
            cpuonly: stmt.cpu,
            skip_transform: false,
            metadata,
            span: stmt.span,
        });
        self.previous = Some(index);
        Ok(())
    }

    /// The type of the instance and what it inherits. `None` if the type or
    /// the copied instance is unknown; the error has been recorded.
    fn template(
        &mut self,
        inst_ref: &ast::InstRef,
        index: InstIdx,
    ) -> McResult<Option<Template>> {
        Ok(match inst_ref {
            ast::InstRef::Type { name, span, .. } => {
                self.loader(|l| l.lookup(*name, *span))?.map(|def| Template {
                    def,
                    actuals: Bindings::new(),
                    when: None,
                    group: None,
                    extend: CodeBlock::default(),
                    jumps: SmallVec::new(),
                })
            }
            ast::InstRef::Copy { source, span, .. } => {
                let idx = match source {
                    ast::CompRef::Previous(n) => {
                        let found = self.previous_n(*n);
                        if found.is_none() {
                            self.diag.err(
                                Error::misc(format!(
                                    "COPY(PREVIOUS({n})) does not refer to a component instance"
                                ))
                                .with_pos(span),
                            );
                        }
                        found
                    }
                    ast::CompRef::Named(id) => self.named(*id, *span),
                };
                idx.map(|idx| {
                    let src = self.instr.get(idx);
                    Template {
                        def: src.def,
                        actuals: src.actuals.clone(),
                        when: src.when.clone(),
                        group: src.group,
                        extend: src.extend.clone(),
                        jumps: src.jumps.iter().map(|j| j.rebased(index)).collect(),
                    }
                })
            }
        })
    }

    /// The `n`-th instance counting back from the last one kept.
    fn previous_n(&self, n: u32) -> Option<InstIdx> {
        let len = self.instr.instances.len();
        match n as usize {
            0 => None,
            n if n <= len => Some(InstIdx::from_slot(len - n)),
            _ => None,
        }
    }

    fn named(&mut self, name: Id, span: GPosIdx) -> Option<InstIdx> {
        let found = self.names.get(&name).copied();
        if found.is_none() {
            self.diag.err(
                Error::undefined(name, "component instance").with_pos(&span),
            );
        }
        found
    }

    /// Resolve a placement reference. Failures make the reference ABSOLUTE.
    fn reference(
        &mut self,
        reference: &ast::Reference,
        span: GPosIdx,
        inst: Id,
    ) -> Option<InstIdx> {
        match reference {
            ast::Reference::Absolute | ast::Reference::RelativeAbsolute => None,
            ast::Reference::Relative(ast::CompRef::Named(id)) => {
                self.named(*id, span)
            }
            ast::Reference::Relative(ast::CompRef::Previous(n)) => {
                let found = self.previous_n(*n);
                if found.is_none() {
                    self.diag.warning(
                        Error::misc(format!(
                            "Component {inst}: RELATIVE PREVIOUS({n}) does not refer to a component instance. Using ABSOLUTE."
                        ))
                        .with_pos(&span),
                    );
                }
                found
            }
        }
    }

    fn coords(&mut self, coords: &ast::Coords, inst: Id) -> Coords {
        Coords::new(
            self.exp(&coords.x, Some(inst)),
            self.exp(&coords.y, Some(inst)),
            self.exp(&coords.z, Some(inst)),
        )
    }

    fn position(&mut self, stmt: &ast::ComponentStmt, inst: Id) -> Position {
        let place = self.coords(&stmt.place.coords, inst);
        let place_rel =
            self.reference(&stmt.place.reference, stmt.place.span, inst);
        let (orientation, orientation_rel) = match &stmt.orientation {
            Some(rot) => (
                self.coords(&rot.coords, inst),
                self.reference(&rot.reference, rot.span, inst),
            ),
            None => (Coords::origin(), place_rel),
        };
        Position {
            place,
            place_rel,
            orientation,
            orientation_rel,
        }
    }

    /// Actuals written for `inst` that match no DEFINITION or SETTING
    /// parameter of its type.
    fn check_orphans(&mut self, inst: Id, def: DefId, given: &[ast::Actual]) {
        let cdef = &self.definitions[def];
        for actual in given {
            if cdef.bound_params().any(|f| f.name == actual.name) {
                continue;
            }
            let available = cdef.bound_params().map(|f| f.name).join(", ");
            let mut notes = vec![format!("Available parameters: {available}")];
            if let Some(close) = closest_spelling(actual.name, cdef.bound_params()) {
                notes.push(format!(
                    "Info: `{}' may be a misspelling of `{close}'",
                    actual.name
                ));
            }
            self.diag.err(
                Error::misc(format!(
                    "Unmatched actual parameter {} for component {inst}={}()",
                    actual.name, cdef.name
                ))
                .with_pos(&actual.span)
                .with_post_msg(Some(notes.join("\n"))),
            );
        }
    }

    /// Values of the DEFINITION and SETTING parameters of `inst`.
    fn bind(
        &mut self,
        inst: Id,
        def: DefId,
        actuals: &Bindings,
        given: &[ast::Actual],
        span: GPosIdx,
    ) -> (Bindings, Bindings) {
        let cdef = &self.definitions[def];
        let defpar =
            bind_formals(&cdef.def_par, actuals, inst, span, &mut self.diag);
        let setpar =
            bind_formals(&cdef.set_par, actuals, inst, span, &mut self.diag);
        for (name, value) in defpar.iter() {
            let written = given.iter().find(|a| a.name == *name);
            if let (Some(actual), false) = (written, value.is_value) {
                self.diag.warning(
                    Error::misc(format!(
                        "DEFINITION parameter {name} of component {inst}={}() is set to the expression `{value}' (potential syntax error)",
                        cdef.name
                    ))
                    .with_pos(&actual.span),
                );
            }
        }
        (defpar, setpar)
    }

    /// Instance names are unique and differ from the parameter names of
    /// their type.
    fn check_name(&mut self, name: Id, def: DefId, stmt: &ast::ComponentStmt) {
        let index = InstIdx::from_slot(self.instr.instances.len());
        if let Some(prev) = self.names.get(&name) {
            let prev_span = self.instr.get(*prev).span;
            self.diag.err(
                Error::already_bound(name, "Component instance")
                    .with_pos(stmt)
                    .with_post_msg(previous_definition(prev_span)),
            );
            return;
        }
        let cdef = &self.definitions[def];
        if cdef.has_param(name) {
            self.diag.err(
                Error::misc(format!(
                    "Component instance name {name} matches a parameter of its type {}. Use another name.",
                    cdef.name
                ))
                .with_pos(stmt),
            );
        }
        self.names.insert(name, index);
    }

    /// Add a member to a group, by name (created on first use) or by handle.
    fn join_group(
        &mut self,
        group: GroupRef,
        member: (Id, InstIdx),
        span: GPosIdx,
    ) -> GroupIdx {
        let existing = match group {
            GroupRef::Handle(idx) => Some(idx),
            GroupRef::Name(name) => self.groups.get(&name).copied(),
        };
        if let Some(idx) = existing {
            self.instr.groups[idx.index()].add(member);
            return idx;
        }
        let name = match group {
            GroupRef::Name(name) => name,
            GroupRef::Handle(idx) => self.instr.group(idx).name,
        };
        let idx = GroupIdx::new(self.instr.groups.len());
        self.instr.groups.push(GroupInstance::new(name, member, span));
        self.groups.insert(name, idx);
        idx
    }

    /// Only the first member of a group may SPLIT.
    fn check_split(
        &mut self,
        group: GroupIdx,
        name: Id,
        type_name: Id,
        index: InstIdx,
        stmt: &ast::ComponentStmt,
    ) -> McResult<()> {
        let g = self.instr.group(group);
        if !g.is_first(index) {
            return Err(Error::fatal(format!(
                "Component {name}={type_name}() is in GROUP {} and has a SPLIT. Only the first component of a GROUP may impose SPLIT. Move the SPLIT to {} (first in GROUP).",
                g.name, g.first.0
            ))
            .with_pos(stmt));
        }
        self.diag.warning(
            Error::misc(format!(
                "Component {name}={type_name}() is first in GROUP {} and has a SPLIT. Better practice is to move the SPLIT to a component before the GROUP.",
                g.name
            ))
            .with_pos(stmt),
        );
        Ok(())
    }
}

fn bind_formals(
    formals: &[CompFormal],
    actuals: &Bindings,
    inst: Id,
    span: GPosIdx,
    diag: &mut DiagnosticContext,
) -> Bindings {
    formals
        .iter()
        .map(|formal| {
            let value = actuals
                .get(&formal.name)
                .or(formal.default.as_ref())
                .cloned()
                .unwrap_or_else(|| {
                    diag.err(
                        Error::unassigned(formal.name, inst).with_pos(&span),
                    );
                    Exp::number("0.0")
                });
            (formal.name, value)
        })
        .collect()
}

/// A parameter whose name looks like `name`: equal ignoring case, or one
/// contained in the other.
fn closest_spelling<'a>(
    name: Id,
    formals: impl Iterator<Item = &'a CompFormal>,
) -> Option<Id> {
    let lower = name.as_str().to_lowercase();
    formals
        .map(|f| f.name)
        .find(|candidate| {
            let cand = candidate.as_str().to_lowercase();
            cand == lower || cand.contains(&lower) || lower.contains(&cand)
        })
}

#[cfg(test)]
mod tests {
    use super::closest_spelling;
    use crate::{CompFormal, ParamType};
    use mccode_utils::GPosIdx;

    fn formal(name: &str) -> CompFormal {
        CompFormal {
            name: name.into(),
            ty: ParamType::Double,
            default: None,
            span: GPosIdx::UNKNOWN,
        }
    }

    #[test]
    fn misspelling_suggestions() {
        let formals = [formal("xwidth"), formal("yheight")];
        assert_eq!(
            closest_spelling("XWidth".into(), formals.iter()),
            Some("xwidth".into())
        );
        assert_eq!(
            closest_spelling("height".into(), formals.iter()),
            Some("yheight".into())
        );
        assert_eq!(closest_spelling("radius".into(), formals.iter()), None);
    }
}
