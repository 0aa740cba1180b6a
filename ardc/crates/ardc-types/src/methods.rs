//! Built-in method kinds.
//!
//! Every built-in receiver kind (str, int, float, bool, list, map, maybe,
//! result) carries a fixed method table. The checker selects a kind from a
//! method name and types the call from [`MethodSig`]; the emitter encodes
//! the kind as an instruction operand; the VM routes it to a native
//! handler. Keeping the enums here gives all three phases one source of
//! truth.
//!
//! Kinds whose name starts with `__` are internal: the checker and emitter
//! synthesize them (constructors, match unwrapping, loop desugaring) and
//! no surface method name maps to them.

use crate::ty::Type;

/// Typed signature of a built-in method, instantiated for a concrete
/// receiver type.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSig {
    pub params: Vec<Type>,
    pub ret: Type,
    /// Requires a mutable receiver
    pub mutates: bool,
}

impl MethodSig {
    fn pure(params: Vec<Type>, ret: Type) -> Self {
        Self {
            params,
            ret,
            mutates: false,
        }
    }

    fn mutating(params: Vec<Type>, ret: Type) -> Self {
        Self {
            params,
            ret,
            mutates: true,
        }
    }
}

macro_rules! method_kind {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $num:literal => $src:literal,)* }) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $num,)*
        }

        impl $name {
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($src => Some(Self::$variant),)*
                    _ => None,
                }
                .filter(|k| !k.name().starts_with("__"))
            }

            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $($num => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn as_u32(self) -> u32 {
                self as u32
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $src,)*
                }
            }
        }
    };
}

method_kind!(
    /// Methods on `Str` receivers.
    StrMethodKind {
        Size = 0 => "size",
        IsEmpty = 1 => "is_empty",
        Contains = 2 => "contains",
        StartsWith = 3 => "starts_with",
        EndsWith = 4 => "ends_with",
        Trim = 5 => "trim",
        ToUpper = 6 => "to_upper",
        ToLower = 7 => "to_lower",
        Split = 8 => "split",
        Replace = 9 => "replace",
        ToInt = 10 => "to_int",
        Chars = 11 => "__chars",
    }
);

impl StrMethodKind {
    pub fn signature(self) -> MethodSig {
        match self {
            Self::Size => MethodSig::pure(vec![], Type::Int),
            Self::IsEmpty => MethodSig::pure(vec![], Type::Bool),
            Self::Contains | Self::StartsWith | Self::EndsWith => {
                MethodSig::pure(vec![Type::Str], Type::Bool)
            }
            Self::Trim | Self::ToUpper | Self::ToLower => MethodSig::pure(vec![], Type::Str),
            Self::Split => MethodSig::pure(vec![Type::Str], Type::List(Box::new(Type::Str))),
            Self::Replace => MethodSig::pure(vec![Type::Str, Type::Str], Type::Str),
            Self::ToInt => MethodSig::pure(vec![], Type::Maybe(Box::new(Type::Int))),
            Self::Chars => MethodSig::pure(vec![], Type::List(Box::new(Type::Str))),
        }
    }
}

method_kind!(
    /// Methods on `Int` receivers.
    IntMethodKind {
        ToStr = 0 => "to_str",
        ToFloat = 1 => "to_float",
        Abs = 2 => "abs",
    }
);

impl IntMethodKind {
    pub fn signature(self) -> MethodSig {
        match self {
            Self::ToStr => MethodSig::pure(vec![], Type::Str),
            Self::ToFloat => MethodSig::pure(vec![], Type::Float),
            Self::Abs => MethodSig::pure(vec![], Type::Int),
        }
    }
}

method_kind!(
    /// Methods on `Float` receivers.
    FloatMethodKind {
        ToStr = 0 => "to_str",
        ToInt = 1 => "to_int",
        Floor = 2 => "floor",
        Ceil = 3 => "ceil",
        Round = 4 => "round",
        Abs = 5 => "abs",
    }
);

impl FloatMethodKind {
    pub fn signature(self) -> MethodSig {
        match self {
            Self::ToStr => MethodSig::pure(vec![], Type::Str),
            Self::ToInt => MethodSig::pure(vec![], Type::Int),
            Self::Floor | Self::Ceil | Self::Round | Self::Abs => {
                MethodSig::pure(vec![], Type::Float)
            }
        }
    }
}

method_kind!(
    /// Methods on `Bool` receivers.
    BoolMethodKind {
        ToStr = 0 => "to_str",
    }
);

impl BoolMethodKind {
    pub fn signature(self) -> MethodSig {
        match self {
            Self::ToStr => MethodSig::pure(vec![], Type::Str),
        }
    }
}

method_kind!(
    /// Methods on `List` receivers.
    ListMethodKind {
        Size = 0 => "size",
        IsEmpty = 1 => "is_empty",
        Push = 2 => "push",
        Prepend = 3 => "prepend",
        Pop = 4 => "pop",
        Get = 5 => "get",
        Set = 6 => "set",
        First = 7 => "first",
        Last = 8 => "last",
        Contains = 9 => "contains",
        Clear = 10 => "clear",
    }
);

impl ListMethodKind {
    /// Signature for a `[elem]` receiver.
    pub fn signature(self, elem: &Type) -> MethodSig {
        let elem = elem.clone();
        let maybe_elem = Type::Maybe(Box::new(elem.clone()));
        match self {
            Self::Size => MethodSig::pure(vec![], Type::Int),
            Self::IsEmpty => MethodSig::pure(vec![], Type::Bool),
            Self::Push | Self::Prepend => MethodSig::mutating(vec![elem], Type::Void),
            Self::Pop => MethodSig::mutating(vec![], maybe_elem),
            Self::Get => MethodSig::pure(vec![Type::Int], maybe_elem),
            Self::Set => MethodSig::mutating(vec![Type::Int, elem], Type::Void),
            Self::First | Self::Last => MethodSig::pure(vec![], maybe_elem),
            Self::Contains => MethodSig::pure(vec![elem], Type::Bool),
            Self::Clear => MethodSig::mutating(vec![], Type::Void),
        }
    }
}

method_kind!(
    /// Methods on `Map` receivers.
    MapMethodKind {
        Size = 0 => "size",
        Has = 1 => "has",
        Get = 2 => "get",
        Set = 3 => "set",
        Drop = 4 => "drop",
        Keys = 5 => "keys",
        Values = 6 => "values",
        Clear = 7 => "clear",
    }
);

impl MapMethodKind {
    /// Signature for a `[key:value]` receiver.
    pub fn signature(self, key: &Type, value: &Type) -> MethodSig {
        let key = key.clone();
        let value = value.clone();
        match self {
            Self::Size => MethodSig::pure(vec![], Type::Int),
            Self::Has => MethodSig::pure(vec![key], Type::Bool),
            Self::Get => MethodSig::pure(vec![key], Type::Maybe(Box::new(value))),
            Self::Set => MethodSig::mutating(vec![key, value], Type::Void),
            Self::Drop => MethodSig::mutating(vec![key], Type::Void),
            Self::Keys => MethodSig::pure(vec![], Type::List(Box::new(key))),
            Self::Values => MethodSig::pure(vec![], Type::List(Box::new(value))),
            Self::Clear => MethodSig::mutating(vec![], Type::Void),
        }
    }
}

method_kind!(
    /// Methods on `Maybe` receivers, plus the internal constructors.
    MaybeMethodKind {
        Expect = 0 => "expect",
        Or = 1 => "or",
        IsSome = 2 => "is_some",
        IsNone = 3 => "is_none",
        Some = 4 => "__some",
    }
);

impl MaybeMethodKind {
    /// Signature for a `inner?` receiver.
    pub fn signature(self, inner: &Type) -> MethodSig {
        let inner = inner.clone();
        match self {
            Self::Expect => MethodSig::pure(vec![Type::Str], inner),
            Self::Or => MethodSig::pure(vec![inner.clone()], inner),
            Self::IsSome | Self::IsNone => MethodSig::pure(vec![], Type::Bool),
            Self::Some => MethodSig::pure(vec![], Type::Maybe(Box::new(inner))),
        }
    }
}

method_kind!(
    /// Methods on `Result` receivers, plus the internal constructors and
    /// the match-lowering error unwrapper.
    ResultMethodKind {
        Expect = 0 => "expect",
        Or = 1 => "or",
        IsOk = 2 => "is_ok",
        IsErr = 3 => "is_err",
        Err = 4 => "err",
        MakeOk = 5 => "__ok",
        MakeErr = 6 => "__err",
        UnwrapErr = 7 => "__unwrap_err",
    }
);

impl ResultMethodKind {
    /// Signature for an `ok!err` receiver.
    pub fn signature(self, ok: &Type, err: &Type) -> MethodSig {
        let ok = ok.clone();
        let err = err.clone();
        match self {
            Self::Expect => MethodSig::pure(vec![Type::Str], ok),
            Self::Or => MethodSig::pure(vec![ok.clone()], ok),
            Self::IsOk | Self::IsErr => MethodSig::pure(vec![], Type::Bool),
            Self::Err => MethodSig::pure(vec![], Type::Maybe(Box::new(err))),
            Self::MakeOk | Self::MakeErr => MethodSig::pure(
                vec![],
                Type::Result {
                    ok: Box::new(ok),
                    err: Box::new(err),
                },
            ),
            Self::UnwrapErr => MethodSig::pure(vec![], err),
        }
    }
}
