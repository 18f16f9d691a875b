//! Java type names, in both of the notations this crate has to read.
//!
//! `TypeAdapter` lookup is keyed by a JNI-style type name, while reflective
//! member resolution obtains parameter/return type names from
//! `Class.getTypeName()`, which reports Java *source* syntax (`int`,
//! `java.lang.String`, `java.lang.String[]`) rather than JNI descriptors
//! (`I`, `Ljava/lang/String;`, `[Ljava/lang/String;`). [`TypeName`] is the
//! one parsed representation both notations normalize to, so
//! [`crate::adapter::Registry`] only ever keys off one shape. The descriptor
//! grammar is parsed with `combine`, a parser-combinator crate.

use combine::{between, many, many1, parser, satisfy, token, ParseResult, Parser, Stream};

use crate::error::{Error, Result};

/// The nine JNI primitive wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveName {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveName {
    pub fn descriptor(self) -> char {
        match self {
            PrimitiveName::Boolean => 'Z',
            PrimitiveName::Byte => 'B',
            PrimitiveName::Char => 'C',
            PrimitiveName::Short => 'S',
            PrimitiveName::Int => 'I',
            PrimitiveName::Long => 'J',
            PrimitiveName::Float => 'F',
            PrimitiveName::Double => 'D',
            PrimitiveName::Void => 'V',
        }
    }

    pub fn source_name(self) -> &'static str {
        match self {
            PrimitiveName::Boolean => "boolean",
            PrimitiveName::Byte => "byte",
            PrimitiveName::Char => "char",
            PrimitiveName::Short => "short",
            PrimitiveName::Int => "int",
            PrimitiveName::Long => "long",
            PrimitiveName::Float => "float",
            PrimitiveName::Double => "double",
            PrimitiveName::Void => "void",
        }
    }

    fn from_source_name(s: &str) -> Option<Self> {
        Some(match s {
            "boolean" => PrimitiveName::Boolean,
            "byte" => PrimitiveName::Byte,
            "char" => PrimitiveName::Char,
            "short" => PrimitiveName::Short,
            "int" => PrimitiveName::Int,
            "long" => PrimitiveName::Long,
            "float" => PrimitiveName::Float,
            "double" => PrimitiveName::Double,
            "void" => PrimitiveName::Void,
            _ => return None,
        })
    }

    fn from_descriptor(c: char) -> Option<Self> {
        Some(match c {
            'Z' => PrimitiveName::Boolean,
            'B' => PrimitiveName::Byte,
            'C' => PrimitiveName::Char,
            'S' => PrimitiveName::Short,
            'I' => PrimitiveName::Int,
            'J' => PrimitiveName::Long,
            'F' => PrimitiveName::Float,
            'D' => PrimitiveName::Double,
            'V' => PrimitiveName::Void,
            _ => return None,
        })
    }
}

/// A fully resolved Java type name: a primitive, an object type (dotted
/// fully-qualified name), or an array of one of those.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeName {
    Primitive(PrimitiveName),
    /// Dotted form, e.g. `java.lang.String`.
    Object(String),
    Array(Box<TypeName>),
}

impl TypeName {
    pub fn object(dotted: impl Into<String>) -> Self {
        TypeName::Object(dotted.into())
    }

    pub fn array_of(self) -> Self {
        TypeName::Array(Box::new(self))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeName::Array(_))
    }

    pub fn element_type(&self) -> Option<&TypeName> {
        match self {
            TypeName::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Parses a `Class.getTypeName()`-style source name: `int`,
    /// `java.lang.String`, `java.lang.String[]`, `int[][]`. Pure suffix
    /// stripping; no grammar needed for this direction.
    pub fn from_source_name(s: &str) -> Result<TypeName> {
        let mut depth = 0usize;
        let mut base = s;
        while let Some(stripped) = base.strip_suffix("[]") {
            depth += 1;
            base = stripped;
        }
        let mut ty = match PrimitiveName::from_source_name(base) {
            Some(p) => TypeName::Primitive(p),
            None => {
                if base.is_empty() || base.contains(['/', ';']) {
                    return Err(Error::UnsupportedType(s.to_string()));
                }
                TypeName::Object(base.to_string())
            }
        };
        for _ in 0..depth {
            ty = ty.array_of();
        }
        Ok(ty)
    }

    /// Parses a JNI descriptor: `I`, `Ljava/lang/String;`, `[I`,
    /// `[Ljava/lang/String;`, `[[I`.
    pub fn from_descriptor(s: &str) -> Result<TypeName> {
        match parser(parse_type).parse(s) {
            Ok((ty, "")) => Ok(ty),
            _ => Err(Error::UnsupportedType(s.to_string())),
        }
    }

    /// Renders the JNI descriptor form (`I`, `Ljava/lang/String;`, `[I`, ...).
    pub fn to_descriptor(&self) -> String {
        match self {
            TypeName::Primitive(p) => p.descriptor().to_string(),
            TypeName::Object(name) => format!("L{};", name.replace('.', "/")),
            TypeName::Array(elem) => format!("[{}", elem.to_descriptor()),
        }
    }

    /// Renders the `getTypeName()` source form.
    pub fn to_source_name(&self) -> String {
        match self {
            TypeName::Primitive(p) => p.source_name().to_string(),
            TypeName::Object(name) => name.clone(),
            TypeName::Array(elem) => format!("{}[]", elem.to_source_name()),
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_source_name())
    }
}

fn parse_primitive<S: Stream<Item = char>>(input: S) -> ParseResult<TypeName, S> {
    satisfy(|c| PrimitiveName::from_descriptor(c).is_some())
        .map(|c| TypeName::Primitive(PrimitiveName::from_descriptor(c).expect("checked above")))
        .parse_stream(input)
}

fn parse_array<S: Stream<Item = char>>(input: S) -> ParseResult<TypeName, S> {
    (token('['), parser(parse_type))
        .map(|(_, elem)| TypeName::Array(Box::new(elem)))
        .parse_stream(input)
}

fn parse_object<S: Stream<Item = char>>(input: S) -> ParseResult<TypeName, S> {
    let marker = token('L');
    let end = token(';');
    let name = between(marker, end, many1(satisfy(|c| c != ';')));
    name.map(|slashed: String| TypeName::Object(slashed.replace('/', "."))).parse_stream(input)
}

fn parse_type<S: Stream<Item = char>>(input: S) -> ParseResult<TypeName, S> {
    parser(parse_array)
        .or(parser(parse_object))
        .or(parser(parse_primitive))
        .parse_stream(input)
}

/// A parsed `(args)ret` method descriptor, used when an embedder supplies a
/// raw JNI signature rather than going through `reflect_class`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub args: Vec<TypeName>,
    pub ret: TypeName,
}

fn parse_args<S: Stream<Item = char>>(input: S) -> ParseResult<Vec<TypeName>, S> {
    between(token('('), token(')'), many(parser(parse_type))).parse_stream(input)
}

impl MethodSignature {
    pub fn from_descriptor(s: &str) -> Result<MethodSignature> {
        match parser(|input| {
            (parser(parse_args), parser(parse_type))
                .map(|(args, ret)| MethodSignature { args, ret })
                .parse_stream(input)
        })
        .parse(s)
        {
            Ok((sig, "")) => Ok(sig),
            _ => Err(Error::UnsupportedType(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_names() {
        assert_eq!(TypeName::from_source_name("int").unwrap(), TypeName::Primitive(PrimitiveName::Int));
        assert_eq!(
            TypeName::from_source_name("java.lang.String").unwrap(),
            TypeName::object("java.lang.String")
        );
        assert_eq!(
            TypeName::from_source_name("java.lang.String[]").unwrap(),
            TypeName::object("java.lang.String").array_of()
        );
        assert_eq!(
            TypeName::from_source_name("int[][]").unwrap(),
            TypeName::Primitive(PrimitiveName::Int).array_of().array_of()
        );
    }

    #[test]
    fn parses_descriptors() {
        assert_eq!(TypeName::from_descriptor("I").unwrap(), TypeName::Primitive(PrimitiveName::Int));
        assert_eq!(
            TypeName::from_descriptor("Ljava/lang/String;").unwrap(),
            TypeName::object("java.lang.String")
        );
        assert_eq!(
            TypeName::from_descriptor("[I").unwrap(),
            TypeName::Primitive(PrimitiveName::Int).array_of()
        );
        assert_eq!(
            TypeName::from_descriptor("[[Ljava/lang/String;").unwrap(),
            TypeName::object("java.lang.String").array_of().array_of()
        );
    }

    #[test]
    fn descriptor_round_trips() {
        let ty = TypeName::object("java.lang.String").array_of();
        assert_eq!(TypeName::from_descriptor(&ty.to_descriptor()).unwrap(), ty);
    }

    #[test]
    fn method_signature_parses() {
        let sig = MethodSignature::from_descriptor("(ILjava/lang/String;)V").unwrap();
        assert_eq!(sig.args.len(), 2);
        assert_eq!(sig.ret, TypeName::Primitive(PrimitiveName::Void));
    }

    #[test]
    fn rejects_malformed() {
        assert!(TypeName::from_descriptor("Q").is_err());
        assert!(TypeName::from_descriptor("Ljava/lang/String").is_err());
    }
}
