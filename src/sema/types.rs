//! C type model shared by the front-end and the execution engine
//!
//! This module defines [`CType`] and the helpers every later stage relies on:
//!
//! - Layout: sizes and alignments on an LP64 model, struct/union field offsets
//!   with natural alignment padding
//! - Conversions: integer promotion and the usual arithmetic conversions
//! - Spelling: rendering a type (optionally around a declarator name) back into
//!   C source text, including pointer-to-function and array declarators
//!
//! # Type Sizes
//!
//! | type                 | size |
//! |----------------------|------|
//! | `char`               | 1    |
//! | `short`              | 2    |
//! | `int`, `float`       | 4    |
//! | `long`, `long long`  | 8    |
//! | `double`, pointers   | 8    |
//!
//! Struct and union types are referenced by key (`"struct Point"`,
//! `"union <anonymous#..>"`) and resolved through a [`TypeTable`].

use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};

/// Integer kinds, ordered by conversion rank within each signedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
}

impl IntKind {
    pub fn size(self) -> usize {
        match self {
            IntKind::Char | IntKind::SChar | IntKind::UChar => 1,
            IntKind::Short | IntKind::UShort => 2,
            IntKind::Int | IntKind::UInt => 4,
            IntKind::Long | IntKind::ULong | IntKind::LongLong | IntKind::ULongLong => 8,
        }
    }

    /// Plain `char` is signed on the hosts we model.
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntKind::Char | IntKind::SChar | IntKind::Short | IntKind::Int | IntKind::Long | IntKind::LongLong
        )
    }

    pub fn rank(self) -> u8 {
        match self {
            IntKind::Char | IntKind::SChar | IntKind::UChar => 1,
            IntKind::Short | IntKind::UShort => 2,
            IntKind::Int | IntKind::UInt => 3,
            IntKind::Long | IntKind::ULong => 4,
            IntKind::LongLong | IntKind::ULongLong => 5,
        }
    }

    pub fn to_unsigned(self) -> IntKind {
        match self {
            IntKind::Char | IntKind::SChar | IntKind::UChar => IntKind::UChar,
            IntKind::Short | IntKind::UShort => IntKind::UShort,
            IntKind::Int | IntKind::UInt => IntKind::UInt,
            IntKind::Long | IntKind::ULong => IntKind::ULong,
            IntKind::LongLong | IntKind::ULongLong => IntKind::ULongLong,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IntKind::Char => "char",
            IntKind::SChar => "signed char",
            IntKind::UChar => "unsigned char",
            IntKind::Short => "short",
            IntKind::UShort => "unsigned short",
            IntKind::Int => "int",
            IntKind::UInt => "unsigned int",
            IntKind::Long => "long",
            IntKind::ULong => "unsigned long",
            IntKind::LongLong => "long long",
            IntKind::ULongLong => "unsigned long long",
        }
    }

    /// Truncate a raw 64-bit pattern to this kind, sign- or zero-extending the
    /// result back to 64 bits.
    pub fn wrap(self, raw: i64) -> i64 {
        let bits = self.size() * 8;
        if bits == 64 {
            return raw;
        }
        let mask = (1i64 << bits) - 1;
        let truncated = raw & mask;
        if self.is_signed() && (truncated >> (bits - 1)) & 1 == 1 {
            truncated - (1i64 << bits)
        } else {
            truncated
        }
    }
}

/// A function signature
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub ret: CType,
    pub params: Vec<CType>,
    pub variadic: bool,
}

/// C types after declarator resolution (typedefs already substituted)
#[derive(Debug, Clone, PartialEq)]
pub enum CType {
    Void,
    Int(IntKind),
    Float,
    Double,
    Pointer(Box<CType>),
    /// `None` for arrays of unknown size (`int a[]`)
    Array(Box<CType>, Option<usize>),
    Function(Box<FunctionType>),
    /// Key into the [`TypeTable`], e.g. `"struct Point"`
    Struct(String),
}

impl CType {
    pub fn int() -> Self {
        CType::Int(IntKind::Int)
    }

    pub fn pointer_to(self) -> Self {
        CType::Pointer(Box::new(self))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, CType::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, CType::Int(_))
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, CType::Float | CType::Double)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_))
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_array(&self) -> bool {
        matches!(self, CType::Array(..))
    }

    pub fn is_function(&self) -> bool {
        matches!(self, CType::Function(_))
    }

    pub fn int_kind(&self) -> Option<IntKind> {
        match self {
            CType::Int(kind) => Some(*kind),
            _ => None,
        }
    }

    /// The pointed-to (or element) type for pointers and arrays
    pub fn pointee(&self) -> Option<&CType> {
        match self {
            CType::Pointer(inner) | CType::Array(inner, _) => Some(inner),
            _ => None,
        }
    }

    pub fn function_type(&self) -> Option<&FunctionType> {
        match self {
            CType::Function(f) => Some(f),
            CType::Pointer(inner) => match inner.as_ref() {
                CType::Function(f) => Some(f),
                _ => None,
            },
            _ => None,
        }
    }

    /// Array-to-pointer and function-to-pointer decay
    pub fn decay(&self) -> CType {
        match self {
            CType::Array(elem, _) => CType::Pointer(elem.clone()),
            CType::Function(_) => CType::Pointer(Box::new(self.clone())),
            other => other.clone(),
        }
    }

    /// `char`, `signed char` or `unsigned char`
    pub fn is_char_like(&self) -> bool {
        matches!(
            self,
            CType::Int(IntKind::Char) | CType::Int(IntKind::SChar) | CType::Int(IntKind::UChar)
        )
    }

    /// Whether this type mentions an anonymous struct or union anywhere in
    /// its spelling
    pub fn mentions_anonymous_aggregate(&self) -> bool {
        match self {
            CType::Struct(key) => is_anonymous_key(key),
            CType::Pointer(inner) | CType::Array(inner, _) => inner.mentions_anonymous_aggregate(),
            CType::Function(f) => {
                f.ret.mentions_anonymous_aggregate()
                    || f.params.iter().any(|p| p.mentions_anonymous_aggregate())
            }
            _ => false,
        }
    }
}

/// A struct or union member with its computed byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: CType,
    pub offset: usize,
}

/// Laid-out struct or union definition
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub key: String,
    pub is_union: bool,
    pub fields: Vec<Field>,
    pub size: usize,
    pub align: usize,
}

impl StructDef {
    /// Lay out members with natural alignment. Union members all start at 0.
    pub fn layout(
        key: String,
        is_union: bool,
        members: Vec<(String, CType)>,
        types: &TypeTable,
    ) -> Result<Self, String> {
        let mut fields = Vec::with_capacity(members.len());
        let mut offset = 0usize;
        let mut size = 0usize;
        let mut align = 1usize;

        for (name, ty) in members {
            let member_size = types
                .size_of(&ty)
                .ok_or_else(|| format!("field '{}' has incomplete type", name))?;
            let member_align = types.align_of(&ty);
            align = align.max(member_align);

            if is_union {
                fields.push(Field { name, ty, offset: 0 });
                size = size.max(member_size);
            } else {
                offset = align_up(offset, member_align);
                fields.push(Field { name, ty, offset });
                offset += member_size;
                size = offset;
            }
        }

        Ok(StructDef {
            key,
            is_union,
            fields,
            size: align_up(size, align),
            align,
        })
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

fn align_up(value: usize, align: usize) -> usize {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

/// Key for a named aggregate: `struct Point`, `union Word`
pub fn named_aggregate_key(is_union: bool, tag: &str) -> String {
    format!("{} {}", if is_union { "union" } else { "struct" }, tag)
}

/// Key for an anonymous aggregate. Anonymous aggregates with identical
/// members share a key, so re-parsing the same session text yields the same
/// type in every translation unit.
pub fn anonymous_aggregate_key(is_union: bool, members: &[(String, CType)]) -> String {
    let mut hasher = FxHasher::default();
    for (name, ty) in members {
        name.hash(&mut hasher);
        spell(ty, "").hash(&mut hasher);
    }
    format!(
        "{} <anonymous#{:x}>",
        if is_union { "union" } else { "struct" },
        hasher.finish()
    )
}

pub fn is_anonymous_key(key: &str) -> bool {
    key.contains("<anonymous")
}

/// Struct/union definitions visible to one translation unit (or the image)
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    structs: FxHashMap<String, StructDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StructDef> {
        self.structs.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.structs.contains_key(key)
    }

    pub fn insert(&mut self, def: StructDef) {
        self.structs.insert(def.key.clone(), def);
    }

    pub fn iter(&self) -> impl Iterator<Item = &StructDef> {
        self.structs.values()
    }

    /// Size in bytes, or `None` for void, functions and incomplete types
    pub fn size_of(&self, ty: &CType) -> Option<usize> {
        match ty {
            CType::Void | CType::Function(_) => None,
            CType::Int(kind) => Some(kind.size()),
            CType::Float => Some(4),
            CType::Double => Some(8),
            CType::Pointer(_) => Some(8),
            CType::Array(elem, Some(n)) => self.size_of(elem).map(|s| s * n),
            CType::Array(_, None) => None,
            CType::Struct(key) => self.structs.get(key).map(|d| d.size),
        }
    }

    pub fn align_of(&self, ty: &CType) -> usize {
        match ty {
            CType::Array(elem, _) => self.align_of(elem),
            CType::Struct(key) => self.structs.get(key).map(|d| d.align).unwrap_or(1),
            other => self.size_of(other).unwrap_or(1).max(1),
        }
    }
}

/// Integer promotion: anything ranked below `int` becomes `int`
pub fn promote(ty: &CType) -> CType {
    match ty {
        CType::Int(kind) if kind.rank() < IntKind::Int.rank() => CType::int(),
        other => other.clone(),
    }
}

/// Usual arithmetic conversions on two arithmetic operand types
pub fn usual_arithmetic(lhs: &CType, rhs: &CType) -> CType {
    if matches!(lhs, CType::Double) || matches!(rhs, CType::Double) {
        return CType::Double;
    }
    if matches!(lhs, CType::Float) || matches!(rhs, CType::Float) {
        return CType::Float;
    }

    let (a, b) = match (promote(lhs), promote(rhs)) {
        (CType::Int(a), CType::Int(b)) => (a, b),
        _ => return CType::int(),
    };

    if a == b {
        return CType::Int(a);
    }
    if a.is_signed() == b.is_signed() {
        return CType::Int(if a.rank() >= b.rank() { a } else { b });
    }

    let (signed, unsigned) = if a.is_signed() { (a, b) } else { (b, a) };
    if unsigned.rank() >= signed.rank() {
        CType::Int(unsigned)
    } else if signed.size() > unsigned.size() {
        CType::Int(signed)
    } else {
        CType::Int(signed.to_unsigned())
    }
}

fn base_spelling(ty: &CType) -> String {
    match ty {
        CType::Void => "void".to_string(),
        CType::Int(kind) => kind.name().to_string(),
        CType::Float => "float".to_string(),
        CType::Double => "double".to_string(),
        CType::Struct(key) => {
            if is_anonymous_key(key) {
                let keyword = key.split(' ').next().unwrap_or("struct");
                format!("{} <anonymous>", keyword)
            } else {
                key.clone()
            }
        }
        // Derived types never reach here; `spell` unwraps them first.
        CType::Pointer(_) | CType::Array(..) | CType::Function(_) => String::new(),
    }
}

fn params_spelling(f: &FunctionType) -> String {
    if f.params.is_empty() {
        return if f.variadic { "...".to_string() } else { "void".to_string() };
    }
    let mut parts: Vec<String> = f.params.iter().map(|p| spell(p, "")).collect();
    if f.variadic {
        parts.push("...".to_string());
    }
    parts.join(", ")
}

/// Render `ty` as C source around the declarator text `inner`.
///
/// `spell(int*, "p")` is `int *p`, `spell(int (*)(int), "")` is
/// `int (*)(int)`, and `spell(char[6], "")` is `char [6]`.
pub fn spell(ty: &CType, inner: &str) -> String {
    match ty {
        CType::Pointer(pointee) => {
            let inner = format!("*{}", inner);
            match pointee.as_ref() {
                CType::Array(..) | CType::Function(_) => spell(pointee, &format!("({})", inner)),
                _ => spell(pointee, &inner),
            }
        }
        CType::Array(elem, size) => {
            let dim = size.map(|n| n.to_string()).unwrap_or_default();
            spell(elem, &format!("{}[{}]", inner, dim))
        }
        CType::Function(f) => spell(&f.ret, &format!("{}({})", inner, params_spelling(f))),
        base => {
            let name = base_spelling(base);
            if inner.is_empty() {
                name
            } else {
                format!("{} {}", name, inner)
            }
        }
    }
}

/// Spell a type on its own, e.g. for result tags
pub fn type_name(ty: &CType) -> String {
    spell(ty, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fn_ptr(ret: CType, params: Vec<CType>) -> CType {
        CType::Function(Box::new(FunctionType {
            ret,
            params,
            variadic: false,
        }))
        .pointer_to()
    }

    #[test]
    fn test_spell_basic_declarators() {
        assert_eq!(spell(&CType::int(), "x"), "int x");
        assert_eq!(spell(&CType::int().pointer_to(), "p"), "int *p");
        assert_eq!(
            spell(&CType::Array(Box::new(CType::Int(IntKind::Char)), Some(6)), ""),
            "char [6]"
        );
        assert_eq!(type_name(&CType::Int(IntKind::ULong)), "unsigned long");
    }

    #[test]
    fn test_spell_function_pointers() {
        let fp = fn_ptr(CType::int(), vec![CType::int()]);
        assert_eq!(type_name(&fp), "int (*)(int)");
        assert_eq!(spell(&fp, "__anon0(void)"), "int (*__anon0(void))(int)");

        let array_ptr = CType::Array(Box::new(CType::int()), Some(3)).pointer_to();
        assert_eq!(spell(&array_ptr, "q"), "int (*q)[3]");
    }

    #[test]
    fn test_usual_arithmetic_conversions() {
        let int = CType::int();
        let uint = CType::Int(IntKind::UInt);
        let long = CType::Int(IntKind::Long);
        let chr = CType::Int(IntKind::Char);

        assert_eq!(usual_arithmetic(&chr, &chr), int);
        assert_eq!(usual_arithmetic(&int, &uint), uint);
        assert_eq!(usual_arithmetic(&uint, &long), long);
        assert_eq!(usual_arithmetic(&int, &CType::Float), CType::Float);
        assert_eq!(usual_arithmetic(&CType::Float, &CType::Double), CType::Double);
    }

    #[test]
    fn test_struct_layout_padding() {
        let types = TypeTable::new();
        let def = StructDef::layout(
            named_aggregate_key(false, "S"),
            false,
            vec![
                ("c".to_string(), CType::Int(IntKind::Char)),
                ("n".to_string(), CType::int()),
                ("d".to_string(), CType::Double),
            ],
            &types,
        )
        .unwrap();

        assert_eq!(def.field("n").unwrap().offset, 4);
        assert_eq!(def.field("d").unwrap().offset, 8);
        assert_eq!(def.size, 16);
        assert_eq!(def.align, 8);
    }

    #[test]
    fn test_int_wrap() {
        assert_eq!(IntKind::Char.wrap(200), -56);
        assert_eq!(IntKind::UChar.wrap(-1), 255);
        assert_eq!(IntKind::Int.wrap(1 << 32), 0);
    }

    #[test]
    fn test_anonymous_spelling() {
        let members = vec![("a".to_string(), CType::int())];
        let key = anonymous_aggregate_key(false, &members);
        let ty = CType::Struct(key);
        assert_eq!(type_name(&ty), "struct <anonymous>");
        assert!(ty.pointer_to().mentions_anonymous_aggregate());
    }
}
