use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::object::ObjectRef;
use crate::temporal::ClaimTime;

/// How a claim mutates its attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimKind {
    /// Replace every value of the attribute with the claim's value.
    SetAttribute,
    /// Append the claim's value if it is not already present.
    AddAttribute,
    /// Remove the claim's value, or the whole attribute when the value is empty.
    DelAttribute,
}

/// An immutable, timestamped mutation record against a permanode.
///
/// The ordered sequence of claims on one attribute is that attribute's
/// history. `claim_ref` is the ref of the claim blob itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub claim_ref: ObjectRef,
    pub permanode: ObjectRef,
    pub kind: ClaimKind,
    pub attr: String,
    pub value: String,
    pub date: ClaimTime,
}

impl Claim {
    /// Interpret the claim's value as a blob ref (e.g. a `camliContent` claim).
    pub fn value_ref(&self) -> Result<ObjectRef, TypeError> {
        ObjectRef::parse(&self.value)
    }

    /// Returns `true` if this claim introduces a value rather than removing one.
    pub fn asserts_value(&self) -> bool {
        !matches!(self.kind, ClaimKind::DelAttribute)
    }
}
