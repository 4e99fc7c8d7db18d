//! The abstract value lattice used by the optimizer. Every node carries one
//! of these as a summary of what is statically known about it.

/// An element of the type lattice.
///
/// `Any` sits at the top and is the identity of [`Type::meet`], `All` sits at
/// the bottom and absorbs everything. Only `Integer` refines further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Conflicting facts were merged, nothing is known
    All,
    /// Nothing has been merged yet
    Any,
    /// A control flow edge
    Control,
    Simple,
    Integer(IntegerType),
    /// A multi-output producer such as `Start` or `If`
    Tuple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerType {
    /// Some integer, not narrowed yet
    Top,
    /// An integer that can take more than one value
    Bottom,
    Constant(i32),
}

impl Type {
    pub const INTEGER_TOP: Self = Self::Integer(IntegerType::Top);
    pub const INTEGER_BOTTOM: Self = Self::Integer(IntegerType::Bottom);

    pub const fn integer(value: i32) -> Self {
        Self::Integer(IntegerType::Constant(value))
    }

    pub const fn boolean(value: bool) -> Self {
        Self::integer(value as i32)
    }

    pub fn is_constant(self) -> bool {
        matches!(self, Self::Integer(IntegerType::Constant(_)))
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Integer(_))
    }

    pub fn as_constant(self) -> Option<i32> {
        match self {
            Self::Integer(IntegerType::Constant(value)) => Some(value),
            _ => None,
        }
    }

    /// Both `self` and `other` are known to hold at once: returns the most
    /// specific type consistent with both
    pub fn meet(self, other: Type) -> Type {
        match (self, other) {
            (Self::Any, other) | (other, Self::Any) => other,
            (Self::All, _) | (_, Self::All) => Self::All,
            (Self::Integer(a), Self::Integer(b)) => Self::Integer(a.meet(b)),
            (a, b) if a == b => a,
            _ => Self::All,
        }
    }
}

impl IntegerType {
    pub fn meet(self, other: IntegerType) -> IntegerType {
        match (self, other) {
            (Self::Top, other) | (other, Self::Top) => other,
            (Self::Bottom, _) | (_, Self::Bottom) => Self::Bottom,
            (Self::Constant(a), Self::Constant(b)) if a == b => Self::Constant(a),
            (Self::Constant(_), Self::Constant(_)) => Self::Bottom,
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Any => write!(f, "any"),
            Self::Control => write!(f, "ctrl"),
            Self::Simple => write!(f, "simple"),
            Self::Integer(IntegerType::Top) => write!(f, "int:top"),
            Self::Integer(IntegerType::Bottom) => write!(f, "int:bot"),
            Self::Integer(IntegerType::Constant(value)) => write!(f, "{value}"),
            Self::Tuple => write!(f, "tuple"),
        }
    }
}
