//! Error types for the typed value domain.
//!
//! [`TypeError`] covers every failure a caller can observe: schema and type
//! mismatches, write-once slot violations, unsupported container operations,
//! malformed parameterizations and failed coercions. All of them are local,
//! synchronous errors returned directly to the caller.
//!
//! Compatibility queries ([`crate::registry::is_compatible`]) and acceptance
//! checks (`is_acceptable`, [`crate::DeclaredType::accepts`]) never produce a
//! [`TypeError`]; they degrade any internal fault to `false`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Field mismatch table
// ---------------------------------------------------------------------------

/// One row of the (actual type, expected type) table carried by
/// [`TypeError::SchemaMismatch`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// Name of the field whose value failed its type check.
    pub field: String,
    /// Type name of the value that was supplied.
    pub actual: String,
    /// Type name the field is declared with.
    pub expected: String,
}

impl std::fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ({}, {})", self.field, self.actual, self.expected)
    }
}

// ---------------------------------------------------------------------------
// Parameterization errors
// ---------------------------------------------------------------------------

/// Malformed, over-specified or under-specified type-parameter bindings.
///
/// Produced when a parameterized type is created from a template, and when a
/// container is constructed with bindings that cannot resolve every slot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParameterizationError {
    /// A slot declared by the template received no binding.
    #[error("missing type binding for slot '{slot}' of {template}")]
    Missing {
        /// Template being parameterized.
        template: String,
        /// Slot left unbound.
        slot: String,
    },

    /// Bindings named slots the template does not declare.
    #[error("unknown slots for {template}: {}", join(.slots))]
    Unknown {
        /// Template being parameterized.
        template: String,
        /// Every binding key that matched no declared slot.
        slots: BTreeSet<String>,
    },

    /// A binding targets a slot that already holds a fixed type.
    #[error("slot '{slot}' of {template} is already fixed to {fixed}")]
    Conflict {
        /// Template being parameterized.
        template: String,
        /// Slot that was already fixed.
        slot: String,
        /// Name of the type the slot is fixed to.
        fixed: String,
    },

    /// The same slot was bound twice in one set of bindings.
    #[error("slot '{slot}' of {template} is bound more than once")]
    Duplicate {
        /// Template being parameterized.
        template: String,
        /// Slot named more than once.
        slot: String,
    },

    /// A bound type failed the suitability constraint of its slot.
    #[error("type {ty} is not suitable for slot '{slot}' of {template}: {constraint}")]
    Unsuitable {
        /// Template being parameterized.
        template: String,
        /// Slot whose constraint failed.
        slot: String,
        /// Name of the rejected type.
        ty: String,
        /// Description of the constraint.
        constraint: String,
    },

    /// A positional type argument was given to a template that does not have
    /// exactly one slot.
    #[error("{template} declares {slots} slots; a positional type binding needs exactly one")]
    AmbiguousPositional {
        /// Template being instantiated.
        template: String,
        /// Number of slots the template declares.
        slots: usize,
    },
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Errors produced by the typed value domain.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum TypeError {
    /// A raw record failed schema validation.
    ///
    /// All three categories are collected before the error is produced; none
    /// of them short-circuits the others.
    #[error(
        "schema mismatch; missing: {}, additional: {}, types (got, expected): {}",
        join(.missing),
        join(.additional),
        join(.mismatches)
    )]
    SchemaMismatch {
        /// Required fields absent from the input.
        missing: BTreeSet<String>,
        /// Unrecognised fields present in the input (empty unless rejected).
        additional: BTreeSet<String>,
        /// Fields whose value did not satisfy the declared type.
        mismatches: Vec<FieldMismatch>,
    },

    /// A type-constrained mutation received a value of the wrong type.
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the declared type.
        expected: String,
        /// Name of the supplied value's type.
        actual: String,
    },

    /// A field slot already holds a type for this owner, or is fixed.
    #[error("slot '{slot}' is already bound")]
    SlotAlreadyBound {
        /// Name of the slot.
        slot: String,
    },

    /// A field slot was read before any type was bound to it.
    #[error("slot '{slot}' is not bound yet")]
    SlotUnbound {
        /// Name of the slot.
        slot: String,
    },

    /// An attempt was made to remove a bound slot.
    #[error("slot '{slot}' cannot be removed")]
    SlotRemoval {
        /// Name of the slot.
        slot: String,
    },

    /// A value was supplied where a type was required.
    #[error("slot '{slot}' must be bound to a type, got a value of type {found}")]
    NotAType {
        /// Name of the slot being bound.
        slot: String,
        /// Type name of the value that was supplied.
        found: String,
    },

    /// The container's store does not support the requested operation.
    #[error("{type_name} does not support {operation}")]
    UnsupportedOperation {
        /// Operation that was attempted (e.g. `"len"`, `"iterate"`).
        operation: String,
        /// Name of the type the operation was attempted on.
        type_name: String,
    },

    /// A key, index or element was not present.
    #[error("{what} not found")]
    NotFound {
        /// Description of what was looked up.
        what: String,
    },

    /// Type-parameter bindings were malformed.
    #[error(transparent)]
    Parameterization(#[from] ParameterizationError),

    /// A raw value could not be converted into the declared type.
    #[error("cannot construct type {type_name} from data {value}")]
    Coercion {
        /// Name of the declared type.
        type_name: String,
        /// Rendering of the value that failed to convert.
        value: String,
    },
}

impl TypeError {
    pub(crate) fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub(crate) fn unsupported(operation: &str, type_name: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            operation: operation.to_string(),
            type_name: type_name.into(),
        }
    }
}

fn join<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let parts: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    format!("{{{}}}", parts.join(", "))
}
