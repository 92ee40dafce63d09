//! Fundamental C types as spelled by the declaration extractor.
//!
//! The extractor uses GCC spellings (`long unsigned int`, `short int`,
//! `complex double`); the same type may also arrive in the shorter source
//! spelling (`unsigned long`). Both are accepted.

use std::fmt;

/// Numeric class of a fundamental type, used to pick a managed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumClass {
    Signed,
    Unsigned,
    Float,
    Complex,
}

/// A fundamental (built-in) C type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fundamental {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Int128,
    UnsignedInt128,
    Float,
    Double,
    LongDouble,
    ComplexFloat,
    ComplexDouble,
    ComplexLongDouble,
}

impl Fundamental {
    /// Parse a fundamental type name.
    ///
    /// Word order is irrelevant (`unsigned long` and `long unsigned int` are
    /// the same type); `int` is implied by any width or sign modifier.
    pub fn parse(name: &str) -> Option<Self> {
        let mut unsigned = false;
        let mut signed = false;
        let mut longs = 0;
        let mut short = false;
        let mut complex = false;
        let mut base: Option<&str> = None;

        for word in name.split_whitespace() {
            match word {
                "unsigned" => unsigned = true,
                "signed" => signed = true,
                "long" => longs += 1,
                "short" => short = true,
                "complex" | "_Complex" => complex = true,
                "int" | "char" | "float" | "double" | "void" | "_Bool" | "bool" | "__int128" => {
                    if base.is_some() {
                        return None;
                    }
                    base = Some(word);
                }
                _ => return None,
            }
        }

        let ty = match base.unwrap_or("int") {
            "void" => Fundamental::Void,
            "_Bool" | "bool" => Fundamental::Bool,
            "char" if unsigned => Fundamental::UnsignedChar,
            "char" if signed => Fundamental::SignedChar,
            "char" => Fundamental::Char,
            "__int128" if unsigned => Fundamental::UnsignedInt128,
            "__int128" => Fundamental::Int128,
            "float" if complex => Fundamental::ComplexFloat,
            "float" => Fundamental::Float,
            "double" if complex && longs > 0 => Fundamental::ComplexLongDouble,
            "double" if complex => Fundamental::ComplexDouble,
            "double" if longs > 0 => Fundamental::LongDouble,
            "double" => Fundamental::Double,
            "int" => match (short, longs, unsigned) {
                (true, _, false) => Fundamental::Short,
                (true, _, true) => Fundamental::UnsignedShort,
                (false, 0, false) => Fundamental::Int,
                (false, 0, true) => Fundamental::UnsignedInt,
                (false, 1, false) => Fundamental::Long,
                (false, 1, true) => Fundamental::UnsignedLong,
                (false, _, false) => Fundamental::LongLong,
                (false, _, true) => Fundamental::UnsignedLongLong,
            },
            _ => return None,
        };
        Some(ty)
    }

    /// Whether this type is void.
    pub fn is_void(&self) -> bool {
        matches!(self, Fundamental::Void)
    }

    /// Numeric class, or `None` for void.
    pub fn num_class(&self) -> Option<NumClass> {
        match self {
            Fundamental::Void => None,
            Fundamental::Char
            | Fundamental::SignedChar
            | Fundamental::Short
            | Fundamental::Int
            | Fundamental::Long
            | Fundamental::LongLong
            | Fundamental::Int128 => Some(NumClass::Signed),
            Fundamental::Bool
            | Fundamental::UnsignedChar
            | Fundamental::UnsignedShort
            | Fundamental::UnsignedInt
            | Fundamental::UnsignedLong
            | Fundamental::UnsignedLongLong
            | Fundamental::UnsignedInt128 => Some(NumClass::Unsigned),
            Fundamental::Float | Fundamental::Double | Fundamental::LongDouble => {
                Some(NumClass::Float)
            }
            Fundamental::ComplexFloat
            | Fundamental::ComplexDouble
            | Fundamental::ComplexLongDouble => Some(NumClass::Complex),
        }
    }

    /// The cgo spelling of this type (`C.int`, `C.ulonglong`, ...).
    pub fn cgo_name(&self) -> &'static str {
        match self {
            Fundamental::Void => "unsafe.Pointer",
            Fundamental::Bool => "C._Bool",
            Fundamental::Char => "C.char",
            Fundamental::SignedChar => "C.schar",
            Fundamental::UnsignedChar => "C.uchar",
            Fundamental::Short => "C.short",
            Fundamental::UnsignedShort => "C.ushort",
            Fundamental::Int => "C.int",
            Fundamental::UnsignedInt => "C.uint",
            Fundamental::Long => "C.long",
            Fundamental::UnsignedLong => "C.ulong",
            Fundamental::LongLong => "C.longlong",
            Fundamental::UnsignedLongLong => "C.ulonglong",
            Fundamental::Int128 => "C.__int128",
            Fundamental::UnsignedInt128 => "C.__uint128",
            Fundamental::Float => "C.float",
            Fundamental::Double => "C.double",
            Fundamental::LongDouble => "C.longdouble",
            Fundamental::ComplexFloat => "C.complexfloat",
            Fundamental::ComplexDouble => "C.complexdouble",
            Fundamental::ComplexLongDouble => "C.complexlongdouble",
        }
    }
}

impl fmt::Display for Fundamental {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Fundamental::Void => "void",
            Fundamental::Bool => "_Bool",
            Fundamental::Char => "char",
            Fundamental::SignedChar => "signed char",
            Fundamental::UnsignedChar => "unsigned char",
            Fundamental::Short => "short",
            Fundamental::UnsignedShort => "unsigned short",
            Fundamental::Int => "int",
            Fundamental::UnsignedInt => "unsigned int",
            Fundamental::Long => "long",
            Fundamental::UnsignedLong => "unsigned long",
            Fundamental::LongLong => "long long",
            Fundamental::UnsignedLongLong => "unsigned long long",
            Fundamental::Int128 => "__int128",
            Fundamental::UnsignedInt128 => "unsigned __int128",
            Fundamental::Float => "float",
            Fundamental::Double => "double",
            Fundamental::LongDouble => "long double",
            Fundamental::ComplexFloat => "float _Complex",
            Fundamental::ComplexDouble => "double _Complex",
            Fundamental::ComplexLongDouble => "long double _Complex",
        };
        write!(f, "{s}")
    }
}
