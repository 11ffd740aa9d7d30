// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier and hashing utilities.
use blake3::Hasher;

/// Canonical 256-bit hash used for addressing component types.
pub type Hash = [u8; 32];

/// Interned state-variable name.
///
/// Variable names are `&'static str` supplied at component-type registration
/// time; the engine compares them by value, never by pointer.
pub type VarName = &'static str;

/// Strongly typed index of a component instance in the document tree.
///
/// `ComponentIdx` is a dense, host-assigned index. The engine never invents
/// component indices; the (external) tree-construction and composite-expansion
/// layers own the numbering.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentIdx(pub u32);

impl ComponentIdx {
    /// Returns the raw index value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl core::fmt::Display for ComponentIdx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed identifier for a component type.
///
/// `TypeId` values are produced by [`make_ctype_id`] which hashes a label;
/// using a dedicated wrapper prevents accidental mixing with other hashes.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeId(pub Hash);

impl TypeId {
    /// Returns the canonical byte representation of this id.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

/// Produces a stable, domain-separated component-type identifier
/// (prefix `b"ctype:"`) using BLAKE3.
pub fn make_ctype_id(label: &str) -> TypeId {
    let mut hasher = Hasher::new();
    hasher.update(b"ctype:");
    hasher.update(label.as_bytes());
    TypeId(hasher.finalize().into())
}

/// Address of one variable slot: `(component, variable[, array key])`.
///
/// Scalar variables use `array_key == None`. Array-valued variables have one
/// umbrella slot (`array_key == None`, caching the assembled list and the
/// resolved size) plus one slot per key. The same key shape addresses
/// essential cells.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotKey {
    /// Owning component instance.
    pub component: ComponentIdx,
    /// Registered variable name.
    pub variable: VarName,
    /// Array key for per-key slots; `None` for scalars and array umbrellas.
    pub array_key: Option<usize>,
}

impl SlotKey {
    /// Key for a scalar variable (or an array umbrella).
    #[must_use]
    pub const fn scalar(component: ComponentIdx, variable: VarName) -> Self {
        Self {
            component,
            variable,
            array_key: None,
        }
    }

    /// Key for one array element.
    #[must_use]
    pub const fn entry(component: ComponentIdx, variable: VarName, key: usize) -> Self {
        Self {
            component,
            variable,
            array_key: Some(key),
        }
    }
}

impl core::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.array_key {
            Some(k) => write!(f, "{}.{}[{k}]", self.component, self.variable),
            None => write!(f, "{}.{}", self.component, self.variable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctype_ids_are_stable_and_distinct() {
        let a = make_ctype_id("answer");
        let b = make_ctype_id("award");
        assert_eq!(a, make_ctype_id("answer"));
        assert_ne!(a, b);
    }

    #[test]
    fn slot_keys_order_entries_after_umbrella() {
        let c = ComponentIdx(3);
        let umbrella = SlotKey::scalar(c, "submittedResponses");
        let entry = SlotKey::entry(c, "submittedResponses", 0);
        assert!(umbrella < entry);
        assert_eq!(format!("{entry}"), "3.submittedResponses[0]");
    }
}
