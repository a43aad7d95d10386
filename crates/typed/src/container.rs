//! The generic container base shared by typed mappings and typed sequences.
//!
//! A [`Container`] is an instance of a parameterized type. Construction
//! resolves every slot of the template (from the type itself, a positional
//! shorthand or keyword bindings), derives the container's own
//! [`Parameterization`] and fills the store from optional raw content. The
//! parameterization never changes afterwards; the store mutates under
//! elementwise validation.
//!
//! Store-specific operations live in [`crate::map`] and [`crate::array`].

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{btree_map, BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

use crate::registry::{self, parameterize_named, GenericType, Parameterization, StoreKind, Template};
use crate::slot::{SlotBindings, TypeArg};
use crate::types::TypeRef;
use crate::value::{cmp_sequences, fmt_map, fmt_seq, Key, Value};
use crate::{ParameterizationError, TypeError};

/// Slot holding the element type of every built-in container.
pub const ITEM_TYPE: &str = "item_type";

static ANY_TYPE: TypeRef = TypeRef::Any;

/// Root of the built-in template hierarchy. It has no slots and no store.
pub fn base_template() -> Arc<Template> {
    static BASE: OnceLock<Arc<Template>> = OnceLock::new();
    Arc::clone(BASE.get_or_init(|| Template::builtin("Typed", StoreKind::Opaque, None, Vec::new())))
}

// ---------------------------------------------------------------------------
// Construction arguments
// ---------------------------------------------------------------------------

/// Arguments to [`Container::construct`]: one optional positional argument and
/// any number of keyword slot bindings.
#[derive(Debug, Default)]
pub struct ContainerArgs {
    positional: Option<TypeArg>,
    keywords: Vec<(String, TypeArg)>,
}

impl ContainerArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the positional argument. A type binds the template's only slot;
    /// a value is raw content.
    pub fn positional(mut self, arg: impl Into<TypeArg>) -> Self {
        self.positional = Some(arg.into());
        self
    }

    /// Sets raw content as the positional argument.
    pub fn content(self, content: impl Into<Value>) -> Self {
        self.positional(TypeArg::Value(content.into()))
    }

    /// Adds a keyword binding for `slot`.
    pub fn bind(mut self, slot: impl Into<String>, arg: impl Into<TypeArg>) -> Self {
        self.keywords.push((slot.into(), arg.into()));
        self
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Store {
    Opaque,
    Sequence(Vec<Value>),
    Mapping(BTreeMap<Key, Value>),
}

/// An instance of a parameterized generic type.
#[derive(Debug, Clone)]
pub struct Container {
    ty: Arc<Parameterization>,
    bindings: SlotBindings,
    pub(crate) store: Store,
}

impl Container {
    /// Constructs an instance of `generic`.
    ///
    /// Every unfixed slot must be resolved by the arguments; the container
    /// then carries a fresh parameterization of the template for life. Raw
    /// content is coerced element by element and rejected as a whole if any
    /// element fails.
    pub fn construct(generic: &GenericType, args: ContainerArgs) -> Result<Self, TypeError> {
        let type_name = generic.name().to_string();
        let mut bindings = SlotBindings::new();
        let mut content = None;

        match args.positional {
            Some(TypeArg::Type(ty)) => {
                let [slot] = generic.slots() else {
                    return Err(ParameterizationError::AmbiguousPositional {
                        template: type_name,
                        slots: generic.slots().len(),
                    }
                    .into());
                };
                slot.bind(&mut bindings, ty)?;
            }
            Some(TypeArg::Value(Value::Null)) | None => {}
            Some(TypeArg::Value(raw)) => content = Some(raw),
        }

        let mut unknown = BTreeSet::new();
        for (name, arg) in args.keywords {
            match generic.slot(&name) {
                Some(slot) => slot.bind(&mut bindings, arg)?,
                None => {
                    unknown.insert(name);
                }
            }
        }
        if !unknown.is_empty() {
            return Err(ParameterizationError::Unknown {
                template: type_name,
                slots: unknown,
            }
            .into());
        }

        let mut resolved = Vec::new();
        for slot in generic.slots().iter().filter(|s| s.fixed_type().is_none()) {
            let ty = slot.read(&bindings).map_err(|_| ParameterizationError::Missing {
                template: type_name.clone(),
                slot: slot.name().to_string(),
            })?;
            resolved.push((slot.name().to_string(), ty.clone()));
        }

        let ty = match generic {
            GenericType::Parameterized(p) => Arc::clone(p),
            GenericType::Template(_) => parameterize_named(generic, resolved, None)?,
        };

        // Record the parameterization's types against the template's open
        // slots so every slot reads back through this instance.
        for slot in ty.template().slots() {
            if slot.read(&bindings).is_ok() {
                continue;
            }
            if let Some(bound) = ty.slot(slot.name().as_str()).and_then(|s| s.fixed_type()) {
                slot.bind(&mut bindings, bound.clone())?;
            }
        }

        let store = match ty.template().store() {
            StoreKind::Opaque => Store::Opaque,
            StoreKind::Sequence => Store::Sequence(Vec::new()),
            StoreKind::Mapping => Store::Mapping(BTreeMap::new()),
        };
        let mut container = Container {
            ty,
            bindings,
            store,
        };

        if let Some(raw) = content {
            match container.store {
                Store::Opaque => return Err(TypeError::unsupported("content", type_name)),
                Store::Sequence(_) => container.extend(&raw)?,
                Store::Mapping(_) => container.update(&raw)?,
            }
        }
        Ok(container)
    }

    /// An empty instance of `generic` whose slots are all bound at type level.
    pub fn empty(generic: &GenericType) -> Result<Self, TypeError> {
        Self::construct(generic, ContainerArgs::new())
    }

    /// The parameterization this container was created with.
    pub fn parameterization(&self) -> &Arc<Parameterization> {
        &self.ty
    }

    pub fn generic_type(&self) -> GenericType {
        GenericType::Parameterized(Arc::clone(&self.ty))
    }

    pub fn type_name(&self) -> &str {
        self.ty.name().as_str()
    }

    /// The type bound to `slot` for this container.
    pub fn slot_type(&self, slot: &str) -> Result<&TypeRef, TypeError> {
        let declared = self.ty.template().slot(slot).ok_or_else(|| TypeError::NotFound {
            what: format!("slot '{slot}' of {}", self.type_name()),
        })?;
        declared.read(&self.bindings)
    }

    pub fn noneable(&self) -> bool {
        self.ty.template().noneable()
    }

    /// Declared type of the elements held under `slot`; templates that do not
    /// declare the slot leave their elements unconstrained.
    pub(crate) fn element_type(&self, slot: &str) -> &TypeRef {
        self.slot_type(slot).unwrap_or(&ANY_TYPE)
    }

    // -----------------------------------------------------------------------
    // Store access
    // -----------------------------------------------------------------------

    pub(crate) fn sequence(&self, operation: &str) -> Result<&Vec<Value>, TypeError> {
        match &self.store {
            Store::Sequence(items) => Ok(items),
            _ => Err(TypeError::unsupported(operation, self.type_name())),
        }
    }

    pub(crate) fn sequence_mut(&mut self, operation: &str) -> Result<&mut Vec<Value>, TypeError> {
        match &mut self.store {
            Store::Sequence(items) => Ok(items),
            _ => Err(TypeError::unsupported(operation, self.ty.name().as_str())),
        }
    }

    pub(crate) fn mapping(&self, operation: &str) -> Result<&BTreeMap<Key, Value>, TypeError> {
        match &self.store {
            Store::Mapping(entries) => Ok(entries),
            _ => Err(TypeError::unsupported(operation, self.type_name())),
        }
    }

    pub(crate) fn mapping_mut(
        &mut self,
        operation: &str,
    ) -> Result<&mut BTreeMap<Key, Value>, TypeError> {
        match &mut self.store {
            Store::Mapping(entries) => Ok(entries),
            _ => Err(TypeError::unsupported(operation, self.ty.name().as_str())),
        }
    }

    // -----------------------------------------------------------------------
    // Common operations
    // -----------------------------------------------------------------------

    pub fn len(&self) -> Result<usize, TypeError> {
        match &self.store {
            Store::Sequence(items) => Ok(items.len()),
            Store::Mapping(entries) => Ok(entries.len()),
            Store::Opaque => Err(TypeError::unsupported("len", self.type_name())),
        }
    }

    pub fn is_empty(&self) -> Result<bool, TypeError> {
        self.len().map(|n| n == 0)
    }

    /// Membership: an element of a sequence, a key of a mapping.
    pub fn contains(&self, value: &Value) -> Result<bool, TypeError> {
        match &self.store {
            Store::Sequence(items) => Ok(items.contains(value)),
            Store::Mapping(entries) => {
                Ok(Key::from_value(value).is_some_and(|k| entries.contains_key(&k)))
            }
            Store::Opaque => Err(TypeError::unsupported("contains", self.type_name())),
        }
    }

    /// Iterates the elements of a sequence or the keys of a mapping.
    pub fn iter(&self) -> Result<Iter<'_>, TypeError> {
        let inner = match &self.store {
            Store::Sequence(items) => IterInner::Sequence(items.iter()),
            Store::Mapping(entries) => IterInner::Mapping(entries.keys()),
            Store::Opaque => return Err(TypeError::unsupported("iterate", self.type_name())),
        };
        Ok(Iter { inner })
    }

    /// Reads an element by sequence index (negative counts from the end) or
    /// by mapping key.
    pub fn get_item(&self, key: &Value) -> Result<&Value, TypeError> {
        match &self.store {
            Store::Sequence(items) => {
                let index = resolve_index(items.len(), as_index(key)?)
                    .ok_or_else(|| not_found_index(key))?;
                Ok(&items[index])
            }
            Store::Mapping(entries) => Key::from_value(key)
                .and_then(|k| entries.get(&k))
                .ok_or_else(|| not_found_key(key)),
            Store::Opaque => Err(TypeError::unsupported("get_item", self.type_name())),
        }
    }

    /// Replaces a sequence element or inserts a mapping entry.
    ///
    /// The value (and, for mappings, the key) must already be an instance of
    /// the declared type; absent values are allowed when the template accepts
    /// them.
    pub fn set_item(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<(), TypeError> {
        let (key, value) = (key.into(), value.into());
        check_element(self.element_type(ITEM_TYPE), self.noneable(), &value)?;
        match self.store {
            Store::Sequence(_) => {
                let index = as_index(&key)?;
                let items = self.sequence_mut("set_item")?;
                let index = resolve_index(items.len(), index).ok_or_else(|| not_found_index(&key))?;
                items[index] = value;
                Ok(())
            }
            Store::Mapping(_) => {
                let key = self.checked_key(&key)?;
                self.mapping_mut("set_item")?.insert(key, value);
                Ok(())
            }
            Store::Opaque => Err(TypeError::unsupported("set_item", self.type_name())),
        }
    }

    /// Removes and returns a sequence element or mapping entry value.
    pub fn del_item(&mut self, key: &Value) -> Result<Value, TypeError> {
        match &mut self.store {
            Store::Sequence(items) => {
                let index = resolve_index(items.len(), as_index(key)?)
                    .ok_or_else(|| not_found_index(key))?;
                Ok(items.remove(index))
            }
            Store::Mapping(entries) => Key::from_value(key)
                .and_then(|k| entries.remove(&k))
                .ok_or_else(|| not_found_key(key)),
            Store::Opaque => Err(TypeError::unsupported("del_item", self.ty.name().as_str())),
        }
    }

    pub fn clear(&mut self) -> Result<(), TypeError> {
        match &mut self.store {
            Store::Sequence(items) => items.clear(),
            Store::Mapping(entries) => entries.clear(),
            Store::Opaque => return Err(TypeError::unsupported("clear", self.ty.name().as_str())),
        }
        Ok(())
    }

    /// Orders this container against a container or raw value.
    ///
    /// Only sequences have a natural order (lexicographic by element); every
    /// other store, and sequences holding incomparable elements, fail with
    /// [`TypeError::UnsupportedOperation`].
    pub fn compare(&self, other: &Value) -> Result<Ordering, TypeError> {
        let unordered = || TypeError::unsupported("ordering", self.type_name());
        let Store::Sequence(mine) = &self.store else {
            return Err(unordered());
        };
        let theirs = match other {
            Value::Seq(items) => items.as_slice(),
            Value::Typed(c) => match &c.store {
                Store::Sequence(items) => items.as_slice(),
                _ => return Err(unordered()),
            },
            _ => return Err(unordered()),
        };
        cmp_sequences(mine, theirs).ok_or_else(unordered)
    }

    /// Recursively converts the contents to bare primitives. Opaque
    /// containers have no contents and convert to null.
    pub fn to_plain(&self) -> Value {
        match &self.store {
            Store::Sequence(items) => Value::Seq(items.iter().map(Value::to_plain).collect()),
            Store::Mapping(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.to_plain(), v.to_plain()))
                    .collect(),
            ),
            Store::Opaque => Value::Null,
        }
    }

    fn checked_key(&self, key: &Value) -> Result<Key, TypeError> {
        let key_type = self.element_type(crate::map::KEY_TYPE);
        check_element(key_type, false, key)?;
        Key::from_value(key).ok_or_else(|| TypeError::mismatch(key_type.name(), key.type_name()))
    }
}

impl PartialEq for Container {
    /// Equal when each parameterization is compatible with the other and the
    /// stores hold equal data.
    fn eq(&self, other: &Self) -> bool {
        let (mine, theirs) = (self.generic_type(), other.generic_type());
        registry::is_compatible(&mine, &theirs)
            && registry::is_compatible(&theirs, &mine)
            && self.store == other.store
    }
}

impl PartialOrd for Container {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (&self.store, &other.store) {
            (Store::Sequence(a), Store::Sequence(b)) => cmp_sequences(a, b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(")?;
        for (i, slot) in self.ty.slots().iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            let bound = slot.fixed_type().map_or("?", TypeRef::name);
            write!(f, "{}:{bound}", slot.name())?;
        }
        write!(f, ")")?;
        match &self.store {
            Store::Sequence(items) => fmt_seq(f, items),
            Store::Mapping(entries) => fmt_map(f, entries),
            Store::Opaque => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Iteration
// ---------------------------------------------------------------------------

/// Single-pass iterator over a container's elements or keys.
#[derive(Debug)]
pub struct Iter<'a> {
    inner: IterInner<'a>,
}

#[derive(Debug)]
enum IterInner<'a> {
    Sequence(std::slice::Iter<'a, Value>),
    Mapping(btree_map::Keys<'a, Key, Value>),
}

impl<'a> Iterator for Iter<'a> {
    type Item = Cow<'a, Value>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Sequence(items) => items.next().map(Cow::Borrowed),
            IterInner::Mapping(keys) => keys.next().map(|k| Cow::Owned(k.to_value())),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            IterInner::Sequence(items) => items.size_hint(),
            IterInner::Mapping(keys) => keys.size_hint(),
        }
    }
}

// ---------------------------------------------------------------------------
// Element validation
// ---------------------------------------------------------------------------

/// The type bound to `slot` on `generic`: `Any` when the slot is not
/// declared, `None` when it is declared but still open.
pub(crate) fn declared_element_type<'a>(generic: &'a GenericType, slot: &str) -> Option<&'a TypeRef> {
    match generic.slot(slot) {
        None => Some(&ANY_TYPE),
        Some(s) => s.fixed_type(),
    }
}

/// Acceptance of one element of raw content.
pub(crate) fn admits_element(declared: &TypeRef, noneable: bool, value: &Value) -> bool {
    (noneable && value.is_null()) || declared.admits(value)
}

/// Strict check used by single-element mutators: the value must already be
/// an instance of `declared`.
pub(crate) fn check_element(declared: &TypeRef, noneable: bool, value: &Value) -> Result<(), TypeError> {
    if (noneable && value.is_null()) || declared.is_instance(value) {
        Ok(())
    } else {
        Err(TypeError::mismatch(declared.name(), value.type_name()))
    }
}

/// Coercion used by bulk operations: instances are kept, acceptable raw
/// values are constructed into the declared type, anything else is rejected.
pub(crate) fn coerce_element(declared: &TypeRef, noneable: bool, value: &Value) -> Result<Value, TypeError> {
    if (noneable && value.is_null()) || declared.is_instance(value) {
        return Ok(value.clone());
    }
    match declared.declared() {
        Some(ty) if declared.admits(value) => ty.construct(value),
        _ => Err(TypeError::mismatch(declared.name(), value.type_name())),
    }
}

pub(crate) fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

fn as_index(key: &Value) -> Result<i64, TypeError> {
    match key {
        Value::Int(i) => Ok(*i),
        other => Err(TypeError::mismatch("int", other.type_name())),
    }
}

fn not_found_index(key: &Value) -> TypeError {
    TypeError::NotFound {
        what: format!("index {key}"),
    }
}

pub(crate) fn not_found_key(key: &Value) -> TypeError {
    TypeError::NotFound {
        what: format!("key {key}"),
    }
}
