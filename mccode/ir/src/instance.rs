use crate::{CodeBlock, Coords, DefId, Exp, Metadatum};
use linked_hash_map::LinkedHashMap;
use mccode_utils::{GPosIdx, GetName, Id, WithPos};
use smallvec::SmallVec;

/// Permanent 1-based index of an instance in the TRACE list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct InstIdx(u32);

impl InstIdx {
    /// Index of the instance stored in slot `slot` of the instance list.
    pub fn from_slot(slot: usize) -> Self {
        InstIdx(slot as u32 + 1)
    }

    pub fn new(index: usize) -> Self {
        InstIdx(index as u32)
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }

    pub fn slot(&self) -> usize {
        self.0 as usize - 1
    }
}

impl std::fmt::Display for InstIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a group in the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GroupIdx(u32);

impl GroupIdx {
    pub fn new(index: usize) -> Self {
        GroupIdx(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Where an instance is placed. A `None` reference is ABSOLUTE.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Position {
    pub place: Coords,
    pub place_rel: Option<InstIdx>,
    pub orientation: Coords,
    pub orientation_rel: Option<InstIdx>,
}

/// Target of a JUMP as written.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum JumpTarget {
    Previous(u32),
    Next(u32),
    Myself,
    Named(Id),
}

impl JumpTarget {
    /// Offset from the jumping instance, for relative targets.
    pub fn offset(&self) -> Option<i64> {
        match self {
            JumpTarget::Previous(n) => Some(-(*n as i64)),
            JumpTarget::Next(n) => Some(*n as i64),
            JumpTarget::Myself => Some(0),
            JumpTarget::Named(_) => None,
        }
    }

    /// Label used to name the iteration counter of the jump.
    pub fn label(&self) -> String {
        match self {
            JumpTarget::Previous(1) => "PREVIOUS".to_string(),
            JumpTarget::Previous(n) => format!("PREVIOUS_{n}"),
            JumpTarget::Next(1) => "NEXT".to_string(),
            JumpTarget::Next(n) => format!("NEXT_{n}"),
            JumpTarget::Myself => "MYSELF".to_string(),
            JumpTarget::Named(name) => name.to_string(),
        }
    }
}

/// A `JUMP target WHEN cond` or `JUMP target ITERATE count`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct JumpSpec {
    pub target: JumpTarget,
    /// Condition, or the iteration count when `iterate` is set.
    pub condition: Exp,
    pub iterate: bool,
    /// Absolute index of the target once resolved.
    pub target_index: Option<InstIdx>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl JumpSpec {
    /// A jump owned by the instance `owner`. Relative targets are resolved
    /// right away; the result may be out of range and is checked later.
    pub fn new(
        target: JumpTarget,
        condition: Exp,
        iterate: bool,
        owner: InstIdx,
        span: GPosIdx,
    ) -> Self {
        let target_index = target
            .offset()
            .map(|off| owner.get() as i64 + off)
            .filter(|idx| *idx > 0)
            .map(|idx| InstIdx::new(idx as usize));
        Self {
            target,
            condition,
            iterate,
            target_index,
            span,
        }
    }

    /// The same jump attached to another instance.
    pub fn rebased(&self, owner: InstIdx) -> Self {
        Self::new(
            self.target.clone(),
            self.condition.clone(),
            self.iterate,
            owner,
            self.span,
        )
    }

    /// Name of the per-particle iteration counter in the generated program.
    pub fn counter_name(&self, owner: Id) -> String {
        format!("Jump_{}_{}", owner, self.target.label())
    }
}

impl WithPos for JumpSpec {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

pub type Bindings = LinkedHashMap<Id, Exp>;

/// One placed, parameter-bound use of a component type.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ComponentInstance {
    pub name: Id,
    pub index: InstIdx,
    pub def: DefId,
    pub type_name: Id,
    /// Values of the DEFINITION parameters, in formal order.
    #[cfg_attr(feature = "serialize", serde(serialize_with = "ser_bindings"))]
    pub defpar: Bindings,
    /// Values of the SETTING parameters, in formal order.
    #[cfg_attr(feature = "serialize", serde(serialize_with = "ser_bindings"))]
    pub setpar: Bindings,
    /// Actuals as written, kept for `COPY(name)`.
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub actuals: Bindings,
    pub position: Position,
    pub extend: CodeBlock,
    pub group: Option<GroupIdx>,
    pub jumps: SmallVec<[JumpSpec; 2]>,
    pub when: Option<Exp>,
    pub split: Option<Exp>,
    pub removable: bool,
    pub cpuonly: bool,
    pub skip_transform: bool,
    pub metadata: Vec<Metadatum>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl ComponentInstance {
    /// Value bound to the DEFINITION or SETTING parameter `name`.
    pub fn binding(&self, name: Id) -> Option<&Exp> {
        self.defpar.get(&name).or_else(|| self.setpar.get(&name))
    }
}

#[cfg(feature = "serialize")]
fn ser_bindings<S: serde::Serializer>(
    bindings: &Bindings,
    ser: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = ser.serialize_map(Some(bindings.len()))?;
    for (name, value) in bindings {
        map.serialize_entry(name, &value.text)?;
    }
    map.end()
}

impl GetName for ComponentInstance {
    fn name(&self) -> Id {
        self.name
    }
}

impl WithPos for ComponentInstance {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

/// A GROUP: a contiguous run of instances of which at most one scatters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GroupInstance {
    pub name: Id,
    pub first: (Id, InstIdx),
    pub last: (Id, InstIdx),
    /// Members in declaration order.
    pub members: Vec<InstIdx>,
    #[cfg_attr(feature = "serialize", serde(skip))]
    pub span: GPosIdx,
}

impl GroupInstance {
    pub fn new(name: Id, first: (Id, InstIdx), span: GPosIdx) -> Self {
        Self {
            name,
            first,
            last: first,
            members: vec![first.1],
            span,
        }
    }

    pub fn add(&mut self, member: (Id, InstIdx)) {
        self.last = member;
        self.members.push(member.1);
    }

    pub fn is_first(&self, idx: InstIdx) -> bool {
        self.first.1 == idx
    }

    pub fn is_last(&self, idx: InstIdx) -> bool {
        self.last.1 == idx
    }
}

impl WithPos for GroupInstance {
    fn copy_span(&self) -> GPosIdx {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_jumps_resolve_on_creation() {
        let owner = InstIdx::new(4);
        let j = JumpSpec::new(
            JumpTarget::Previous(2),
            Exp::value("1"),
            false,
            owner,
            GPosIdx::UNKNOWN,
        );
        assert_eq!(j.target_index, Some(InstIdx::new(2)));
        assert_eq!(j.rebased(InstIdx::new(7)).target_index, Some(InstIdx::new(5)));
        let j = JumpSpec::new(
            JumpTarget::Previous(4),
            Exp::value("1"),
            false,
            owner,
            GPosIdx::UNKNOWN,
        );
        assert_eq!(j.target_index, None);
    }

    #[test]
    fn counter_names() {
        let j = JumpSpec::new(
            JumpTarget::Next(3),
            Exp::number("3"),
            true,
            InstIdx::new(1),
            GPosIdx::UNKNOWN,
        );
        assert_eq!(j.counter_name("mono".into()), "Jump_mono_NEXT_3");
        assert_eq!(JumpTarget::Previous(1).label(), "PREVIOUS");
        assert_eq!(JumpTarget::Named("a".into()).label(), "a");
    }
}
