//! Write-once, type-valued field slots.
//!
//! A [`FieldSlot`] is one type parameter of a template (e.g. a mapping's
//! `key_type`). It is either fixed at declaration time, or bound once per owner
//! through the owner's own [`SlotBindings`] record. Once a type is bound it never
//! changes and is never removed.

use std::collections::BTreeMap;

use crate::identifiers::SlotName;
use crate::types::TypeRef;
use crate::value::Value;
use crate::{ParameterizationError, TypeError};

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// An argument supplied where a type is expected.
///
/// Bindings often come from dynamic sources, so a caller may hand over a value
/// where a type was required; binding such an argument fails with
/// [`TypeError::NotAType`].
#[derive(Debug, Clone)]
pub enum TypeArg {
    Type(TypeRef),
    Value(Value),
}

impl From<TypeRef> for TypeArg {
    fn from(ty: TypeRef) -> Self {
        TypeArg::Type(ty)
    }
}

impl From<Value> for TypeArg {
    fn from(value: Value) -> Self {
        TypeArg::Value(value)
    }
}

impl TypeArg {
    /// The type carried by this argument, or [`TypeError::NotAType`] naming `slot`.
    pub fn into_type(self, slot: &SlotName) -> Result<TypeRef, TypeError> {
        match self {
            TypeArg::Type(ty) => Ok(ty),
            TypeArg::Value(value) => Err(TypeError::NotAType {
                slot: slot.to_string(),
                found: value.type_name(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// A suitability requirement on the types a slot may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotConstraint {
    /// Any type.
    #[default]
    Unconstrained,
    /// Types whose values can be used as mapping keys.
    Hashable,
}

impl SlotConstraint {
    /// Returns `true` if `ty` satisfies this constraint.
    pub fn is_satisfied_by(self, ty: &TypeRef) -> bool {
        match self {
            SlotConstraint::Unconstrained => true,
            SlotConstraint::Hashable => ty.is_hashable(),
        }
    }

    pub(crate) fn check(
        self,
        template: &str,
        slot: &SlotName,
        ty: &TypeRef,
    ) -> Result<(), ParameterizationError> {
        if self.is_satisfied_by(ty) {
            return Ok(());
        }
        Err(ParameterizationError::Unsuitable {
            template: template.to_string(),
            slot: slot.to_string(),
            ty: ty.name().to_string(),
            constraint: self.to_string(),
        })
    }
}

impl std::fmt::Display for SlotConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotConstraint::Unconstrained => write!(f, "unconstrained"),
            SlotConstraint::Hashable => write!(f, "must be hashable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-owner bindings
// ---------------------------------------------------------------------------

/// Types bound to slots for one owner.
///
/// Owned by the instance it describes; entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct SlotBindings {
    bound: BTreeMap<SlotName, TypeRef>,
}

impl SlotBindings {
    /// Creates an empty binding record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots bound in this record.
    pub fn len(&self) -> usize {
        self.bound.len()
    }

    /// Returns `true` if nothing has been bound.
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One named type parameter of a template.
#[derive(Debug, Clone)]
pub struct FieldSlot {
    name: SlotName,
    fixed: Option<TypeRef>,
    constraint: SlotConstraint,
}

impl FieldSlot {
    /// Declares an unbound slot.
    pub fn new(name: SlotName) -> Self {
        Self {
            name,
            fixed: None,
            constraint: SlotConstraint::Unconstrained,
        }
    }

    /// Declares an unbound slot by name; `None` if `name` is empty.
    pub fn named(name: &str) -> Option<Self> {
        SlotName::new(name).map(Self::new)
    }

    /// Declares a slot fixed to `ty` for every owner.
    pub fn fixed(name: SlotName, ty: TypeRef) -> Self {
        Self {
            name,
            fixed: Some(ty),
            constraint: SlotConstraint::Unconstrained,
        }
    }

    /// Adds a suitability constraint to this slot.
    pub fn with_constraint(mut self, constraint: SlotConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn name(&self) -> &SlotName {
        &self.name
    }

    /// The type this slot is fixed to, if any.
    pub fn fixed_type(&self) -> Option<&TypeRef> {
        self.fixed.as_ref()
    }

    pub fn constraint(&self) -> SlotConstraint {
        self.constraint
    }

    /// Binds `arg` to this slot for `owner`.
    ///
    /// Fails with [`TypeError::SlotAlreadyBound`] if the slot is fixed or the
    /// owner already bound it, and with [`TypeError::NotAType`] if `arg` is a
    /// value rather than a type.
    pub fn bind(&self, owner: &mut SlotBindings, arg: impl Into<TypeArg>) -> Result<(), TypeError> {
        if self.fixed.is_some() || owner.bound.contains_key(&self.name) {
            return Err(TypeError::SlotAlreadyBound {
                slot: self.name.to_string(),
            });
        }
        let ty = arg.into().into_type(&self.name)?;
        owner.bound.insert(self.name.clone(), ty);
        Ok(())
    }

    /// Reads the type of this slot for `owner`: the fixed type if there is
    /// one, otherwise the owner's binding.
    pub fn read<'a>(&'a self, owner: &'a SlotBindings) -> Result<&'a TypeRef, TypeError> {
        self.fixed
            .as_ref()
            .or_else(|| owner.bound.get(&self.name))
            .ok_or_else(|| TypeError::SlotUnbound {
                slot: self.name.to_string(),
            })
    }

    /// Removing a binding is not supported.
    ///
    /// Always fails: [`TypeError::SlotRemoval`] if a type is bound or fixed,
    /// [`TypeError::SlotUnbound`] otherwise.
    pub fn unbind(&self, owner: &mut SlotBindings) -> Result<(), TypeError> {
        let slot = self.name.to_string();
        if self.read(owner).is_ok() {
            Err(TypeError::SlotRemoval { slot })
        } else {
            Err(TypeError::SlotUnbound { slot })
        }
    }

    /// This slot with its type fixed to `ty`.
    pub(crate) fn fixed_to(&self, ty: TypeRef) -> Self {
        Self {
            name: self.name.clone(),
            fixed: Some(ty),
            constraint: self.constraint,
        }
    }
}
