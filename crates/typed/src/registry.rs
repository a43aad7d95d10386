//! Templates, parameterizations and the compatibility relation between them.
//!
//! A [`Template`] declares type-parameter [`FieldSlot`]s. [`parameterize`]
//! binds concrete types to every unfixed slot and returns a new
//! [`Parameterization`]: a first-class record of the template, the bound slot
//! table and a synthesized display name. Parameterizations are never cached;
//! identical bindings always produce a distinct, but mutually compatible, type.
//!
//! [`is_compatible`] is the structural "is an instance of" relation. It walks
//! the candidate's template ancestry to the reference's template, then checks
//! every slot the reference binds covariantly: a container over a narrower
//! item type is an instance of one over a broader item type, never the
//! reverse.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::container::{Container, ContainerArgs};
use crate::identifiers::{capitalize, DeclaredTypeId, SlotName, TypeName};
use crate::slot::{FieldSlot, TypeArg};
use crate::types::{DeclaredType, TypeRef};
use crate::value::Value;
use crate::{array, map, ParameterizationError, TypeError};

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// The internal store a template's instances hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// No store: instances only carry their type parameters.
    Opaque,
    /// An ordered sequence of items.
    Sequence,
    /// A keyed mapping of items.
    Mapping,
}

/// A generic type definition declaring type-parameter slots.
///
/// Templates form a single-inheritance hierarchy: a derived template inherits
/// its parent's slots, may fix some of them at declaration time and may add
/// new ones.
#[derive(Debug)]
pub struct Template {
    id: DeclaredTypeId,
    name: TypeName,
    store: StoreKind,
    slots: Vec<FieldSlot>,
    parent: Option<Arc<Template>>,
    noneable: bool,
}

impl Template {
    /// Starts declaring a root template.
    pub fn declare(name: TypeName, store: StoreKind) -> TemplateBuilder {
        TemplateBuilder {
            name,
            store,
            parent: None,
            slots: Vec::new(),
            fixes: Vec::new(),
            noneable: true,
        }
    }

    /// Starts declaring a template derived from `parent`.
    ///
    /// The derived template inherits the parent's store kind and absent-value
    /// policy unless overridden.
    pub fn derive(parent: &Arc<Template>, name: TypeName) -> TemplateBuilder {
        TemplateBuilder {
            name,
            store: parent.store,
            parent: Some(Arc::clone(parent)),
            slots: Vec::new(),
            fixes: Vec::new(),
            noneable: parent.noneable,
        }
    }

    pub(crate) fn builtin(
        name: &'static str,
        store: StoreKind,
        parent: Option<Arc<Template>>,
        slots: Vec<FieldSlot>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: DeclaredTypeId::new_random(),
            name: TypeName::from_trusted(name),
            store,
            slots,
            parent,
            noneable: true,
        })
    }

    pub fn id(&self) -> DeclaredTypeId {
        self.id
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    pub fn store(&self) -> StoreKind {
        self.store
    }

    /// Every slot of this template, inherited ones first.
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|s| s.name().as_str() == name)
    }

    pub fn parent(&self) -> Option<&Arc<Template>> {
        self.parent.as_ref()
    }

    /// Whether instances accept absent values as items.
    pub fn noneable(&self) -> bool {
        self.noneable
    }

    /// This template followed by each of its ancestors.
    pub fn ancestors(self: &Arc<Self>) -> impl Iterator<Item = &Arc<Template>> {
        std::iter::successors(Some(self), |t| t.parent.as_ref())
    }
}

/// Builder returned by [`Template::declare`] and [`Template::derive`].
#[derive(Debug)]
pub struct TemplateBuilder {
    name: TypeName,
    store: StoreKind,
    parent: Option<Arc<Template>>,
    slots: Vec<FieldSlot>,
    fixes: Vec<(String, TypeRef)>,
    noneable: bool,
}

impl TemplateBuilder {
    /// Declares a new slot.
    pub fn slot(mut self, slot: FieldSlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Fixes an inherited (or newly declared) slot to `ty`.
    pub fn fix(mut self, slot: &str, ty: TypeRef) -> Self {
        self.fixes.push((slot.to_string(), ty));
        self
    }

    pub fn store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    pub fn noneable(mut self, noneable: bool) -> Self {
        self.noneable = noneable;
        self
    }

    /// Validates the declaration and produces the template.
    pub fn build(self) -> Result<Arc<Template>, ParameterizationError> {
        let template = self.name.to_string();
        let mut slots: Vec<FieldSlot> = self
            .parent
            .as_ref()
            .map(|p| p.slots.clone())
            .unwrap_or_default();

        for slot in self.slots {
            if slots.iter().any(|s| s.name() == slot.name()) {
                return Err(ParameterizationError::Duplicate {
                    template,
                    slot: slot.name().to_string(),
                });
            }
            slots.push(slot);
        }

        let mut unknown = BTreeSet::new();
        for (name, ty) in self.fixes {
            let Some(slot) = slots.iter_mut().find(|s| s.name().as_str() == name) else {
                unknown.insert(name);
                continue;
            };
            if let Some(fixed) = slot.fixed_type() {
                return Err(ParameterizationError::Conflict {
                    template,
                    slot: name,
                    fixed: fixed.name().to_string(),
                });
            }
            slot.constraint().check(&template, slot.name(), &ty)?;
            *slot = slot.fixed_to(ty);
        }
        if !unknown.is_empty() {
            return Err(ParameterizationError::Unknown {
                template,
                slots: unknown,
            });
        }

        Ok(Arc::new(Template {
            id: DeclaredTypeId::new_random(),
            name: self.name,
            store: self.store,
            slots,
            parent: self.parent,
            noneable: self.noneable,
        }))
    }
}

// ---------------------------------------------------------------------------
// Parameterizations
// ---------------------------------------------------------------------------

/// A concrete type derived from a template by binding all of its slots.
#[derive(Debug)]
pub struct Parameterization {
    id: DeclaredTypeId,
    name: TypeName,
    template: Arc<Template>,
    slots: Vec<FieldSlot>,
}

impl Parameterization {
    pub fn id(&self) -> DeclaredTypeId {
        self.id
    }

    pub fn name(&self) -> &TypeName {
        &self.name
    }

    /// The template this type was derived from.
    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// The slot table; every slot is bound at type level.
    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|s| s.name().as_str() == name)
    }
}

// ---------------------------------------------------------------------------
// Generic types
// ---------------------------------------------------------------------------

/// A template or one of its parameterizations.
#[derive(Debug, Clone)]
pub enum GenericType {
    Template(Arc<Template>),
    Parameterized(Arc<Parameterization>),
}

impl GenericType {
    pub fn id(&self) -> DeclaredTypeId {
        match self {
            GenericType::Template(t) => t.id,
            GenericType::Parameterized(p) => p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            GenericType::Template(t) => t.name.as_str(),
            GenericType::Parameterized(p) => p.name.as_str(),
        }
    }

    /// The nearest template: the type itself, or the template it was
    /// parameterized from.
    pub fn template(&self) -> &Arc<Template> {
        match self {
            GenericType::Template(t) => t,
            GenericType::Parameterized(p) => &p.template,
        }
    }

    pub fn slots(&self) -> &[FieldSlot] {
        match self {
            GenericType::Template(t) => &t.slots,
            GenericType::Parameterized(p) => &p.slots,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&FieldSlot> {
        self.slots().iter().find(|s| s.name().as_str() == name)
    }

    /// The type bound to `slot` at type level, if any.
    pub fn bound(&self, slot: &str) -> Option<&TypeRef> {
        self.slot(slot).and_then(FieldSlot::fixed_type)
    }

    pub fn store(&self) -> StoreKind {
        self.template().store
    }

    pub fn noneable(&self) -> bool {
        self.template().noneable
    }

    /// Returns `true` if every slot is bound at type level.
    pub fn is_concrete(&self) -> bool {
        self.slots().iter().all(|s| s.fixed_type().is_some())
    }

    /// Returns `true` if `raw` could be used as the content of an instance of
    /// this type. Never fails; an unbound slot makes every value unacceptable.
    pub fn is_acceptable(&self, raw: &Value) -> bool {
        match self.store() {
            StoreKind::Mapping => map::is_acceptable(self, raw),
            StoreKind::Sequence => array::is_acceptable(self, raw),
            StoreKind::Opaque => false,
        }
    }

    /// Constructs an instance of this type holding `content`.
    pub fn instantiate(&self, content: impl Into<Value>) -> Result<Container, TypeError> {
        Container::construct(self, ContainerArgs::new().content(content))
    }

    /// Parameterizes this type; see [`parameterize`].
    pub fn parameterize<S: Into<String>, A: Into<TypeArg>>(
        &self,
        bindings: impl IntoIterator<Item = (S, A)>,
    ) -> Result<GenericType, TypeError> {
        parameterize(self, bindings)
    }
}

impl DeclaredType for GenericType {
    fn id(&self) -> DeclaredTypeId {
        GenericType::id(self)
    }

    fn name(&self) -> &str {
        GenericType::name(self)
    }

    fn accepts(&self, raw: &Value) -> bool {
        self.is_acceptable(raw)
    }

    fn construct(&self, raw: &Value) -> Result<Value, TypeError> {
        self.instantiate(raw.clone()).map(Value::Typed)
    }
}

impl From<Arc<Template>> for GenericType {
    fn from(t: Arc<Template>) -> Self {
        GenericType::Template(t)
    }
}

impl From<Arc<Parameterization>> for GenericType {
    fn from(p: Arc<Parameterization>) -> Self {
        GenericType::Parameterized(p)
    }
}

impl From<Arc<Template>> for TypeRef {
    fn from(t: Arc<Template>) -> Self {
        TypeRef::Generic(GenericType::Template(t))
    }
}

// ---------------------------------------------------------------------------
// Parameterization
// ---------------------------------------------------------------------------

/// Binds concrete types to every unfixed slot of `generic`.
///
/// The result is named after the template with the capitalized names of the
/// bound types appended (`Map` bound to `int`, `int` is `MapIntInt`).
///
/// Fails if a binding targets a fixed slot, names an unknown slot, repeats a
/// slot, is a value rather than a type, or violates the slot's constraint, and
/// if any unfixed slot is left without a binding.
pub fn parameterize<S: Into<String>, A: Into<TypeArg>>(
    generic: &GenericType,
    bindings: impl IntoIterator<Item = (S, A)>,
) -> Result<GenericType, TypeError> {
    parameterize_named(generic, bindings, None).map(GenericType::Parameterized)
}

/// Binds `ty` to the only slot of `generic`.
pub fn parameterize_one(generic: &GenericType, ty: TypeRef) -> Result<GenericType, TypeError> {
    let [slot] = generic.slots() else {
        return Err(ParameterizationError::AmbiguousPositional {
            template: generic.name().to_string(),
            slots: generic.slots().len(),
        }
        .into());
    };
    parameterize(generic, [(slot.name().to_string(), ty)])
}

/// [`parameterize`] with an explicit display name instead of a synthesized one.
pub fn parameterize_named<S: Into<String>, A: Into<TypeArg>>(
    generic: &GenericType,
    bindings: impl IntoIterator<Item = (S, A)>,
    name: Option<TypeName>,
) -> Result<Arc<Parameterization>, TypeError> {
    let template = generic.name().to_string();
    let mut supplied: Vec<(SlotName, TypeRef)> = Vec::new();
    let mut unknown = BTreeSet::new();

    for (key, arg) in bindings {
        let key = key.into();
        let Some(slot) = generic.slot(&key) else {
            unknown.insert(key);
            continue;
        };
        if supplied.iter().any(|(n, _)| n == slot.name()) {
            return Err(ParameterizationError::Duplicate { template, slot: key }.into());
        }
        if let Some(fixed) = slot.fixed_type() {
            return Err(ParameterizationError::Conflict {
                template,
                slot: key,
                fixed: fixed.name().to_string(),
            }
            .into());
        }
        let ty = arg.into().into_type(slot.name())?;
        slot.constraint().check(&template, slot.name(), &ty)?;
        supplied.push((slot.name().clone(), ty));
    }
    if !unknown.is_empty() {
        return Err(ParameterizationError::Unknown {
            template,
            slots: unknown,
        }
        .into());
    }

    let slots = generic
        .slots()
        .iter()
        .map(|slot| match slot.fixed_type() {
            Some(_) => Ok(slot.clone()),
            None => supplied
                .iter()
                .find(|(n, _)| n == slot.name())
                .map(|(_, ty)| slot.fixed_to(ty.clone()))
                .ok_or_else(|| ParameterizationError::Missing {
                    template: template.clone(),
                    slot: slot.name().to_string(),
                }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let name = name.unwrap_or_else(|| {
        let suffix: String = supplied.iter().map(|(_, ty)| capitalize(ty.name())).collect();
        TypeName::from_trusted(format!("{template}{suffix}"))
    });

    tracing::debug!(template = %template, derived = %name, "created parameterization");

    Ok(Arc::new(Parameterization {
        id: DeclaredTypeId::new_random(),
        name,
        template: Arc::clone(generic.template()),
        slots,
    }))
}

// ---------------------------------------------------------------------------
// Compatibility
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
enum Incompatibility {
    #[error("{candidate} does not derive from template {family}")]
    Family { candidate: String, family: String },
    #[error("slot '{slot}' is not declared by the candidate")]
    MissingSlot { slot: String },
    #[error("slot '{slot}' is not bound on the candidate")]
    UnboundSlot { slot: String },
    #[error("slot '{slot}': {actual} is not a subtype of {expected}")]
    Narrower {
        slot: String,
        actual: String,
        expected: String,
    },
}

/// Returns `true` if instances of `candidate` are instances of `reference`.
///
/// Never fails: any resolution fault is reported as `false`.
pub fn is_compatible(candidate: &GenericType, reference: &GenericType) -> bool {
    match check_compatible(candidate, reference) {
        Ok(()) => true,
        Err(reason) => {
            tracing::trace!(
                candidate = candidate.name(),
                reference = reference.name(),
                %reason,
                "types are not compatible"
            );
            false
        }
    }
}

fn check_compatible(candidate: &GenericType, reference: &GenericType) -> Result<(), Incompatibility> {
    let family = reference.template();
    if !candidate.template().ancestors().any(|t| t.id == family.id) {
        return Err(Incompatibility::Family {
            candidate: candidate.name().to_string(),
            family: family.name.to_string(),
        });
    }

    for slot in reference.slots() {
        let theirs = candidate
            .slot(slot.name().as_str())
            .ok_or_else(|| Incompatibility::MissingSlot {
                slot: slot.name().to_string(),
            })?;
        let Some(expected) = slot.fixed_type() else {
            continue;
        };
        let actual = theirs.fixed_type().ok_or_else(|| Incompatibility::UnboundSlot {
            slot: slot.name().to_string(),
        })?;
        if !is_subtype(actual, expected) {
            return Err(Incompatibility::Narrower {
                slot: slot.name().to_string(),
                actual: actual.name().to_string(),
                expected: expected.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Returns `true` if every instance of `narrow` is an instance of `broad`.
///
/// `Any` is the supertype of everything, generic types relate through
/// [`is_compatible`], and every other type is a subtype only of itself.
pub fn is_subtype(narrow: &TypeRef, broad: &TypeRef) -> bool {
    match (narrow, broad) {
        (_, TypeRef::Any) => true,
        (TypeRef::Generic(a), TypeRef::Generic(b)) => is_compatible(a, b),
        _ => narrow == broad,
    }
}

/// Returns `true` if `value` is an instance of `reference`, or if `reference`
/// independently accepts it (an enumeration label, a well-formed timestamp
/// string, acceptable raw container content).
pub fn is_value_compatible(value: &Value, reference: &TypeRef) -> bool {
    reference.is_instance(value) || reference.declared().is_some_and(|d| d.accepts(value))
}

// ---------------------------------------------------------------------------
// Built-in shorthands
// ---------------------------------------------------------------------------

/// The built-in mapping template parameterized with `key` and `item`.
pub fn dict(key: TypeRef, item: TypeRef) -> Result<GenericType, TypeError> {
    parameterize(
        &GenericType::Template(map::template()),
        [(map::KEY_TYPE, key), (crate::container::ITEM_TYPE, item)],
    )
}

/// The built-in sequence template parameterized with `item`.
pub fn list(item: TypeRef) -> Result<GenericType, TypeError> {
    parameterize_one(&GenericType::Template(array::template()), item)
}
