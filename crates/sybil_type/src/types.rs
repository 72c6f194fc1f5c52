//! Type descriptors.

use sybil_base::Atom;

/// Handle to a canonical type held by the [`crate::TypeMgr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Structural description of a type.
///
/// `Enum` literals are kept sorted; the position of a literal in the list
/// is its integer code, so descriptor equality gives code stability for
/// free.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Boolean,
    /// The type of bare integer constants before width promotion.
    IntConst,
    SignedAlgebraic(u32),
    UnsignedAlgebraic(u32),
    Enum(Vec<Atom>),
    Array {
        elem: TypeId,
        nelems: u32,
    },
    /// A module instance; the atom names the instantiated module.
    Instance(Atom),
}

impl TypeDesc {
    pub fn is_boolean(&self) -> bool {
        matches!(self, TypeDesc::Boolean)
    }

    pub fn is_int_const(&self) -> bool {
        matches!(self, TypeDesc::IntConst)
    }

    pub fn is_algebraic(&self) -> bool {
        matches!(
            self,
            TypeDesc::SignedAlgebraic(_) | TypeDesc::UnsignedAlgebraic(_) | TypeDesc::IntConst
        )
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, TypeDesc::SignedAlgebraic(_))
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, TypeDesc::Enum(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDesc::Array { .. })
    }

    pub fn is_instance(&self) -> bool {
        matches!(self, TypeDesc::Instance(_))
    }

    /// Booleans and enums: encoded as a single decision diagram.
    pub fn is_monolithic(&self) -> bool {
        matches!(self, TypeDesc::Boolean | TypeDesc::Enum(_))
    }
}
