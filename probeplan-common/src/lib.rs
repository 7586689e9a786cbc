//! # Shared Code Catalog Model (Agent ↔ Collaborators)
//!
//! Defines the data structures exchanged between the planning engine and the
//! collaborators that sit around it: the catalog provider that enumerates the
//! loadable types of the monitored process, and the code transformer that
//! installs probes into them.
//!
//! ## Key Types
//!
//! - [`CodeEntity`] - A loadable type with its methods and constructors
//! - [`MethodInfo`] / [`ConstructorInfo`] - Members visible on an entity
//! - [`KindFlags`] - Type kind flags (interface, enum, synthetic, ...)
//! - [`LoaderId`] - Identity of the defining loader
//!
//! Modifier bits follow the class-file access flag layout so that catalogs
//! produced by a bytecode reader can be passed through unchanged.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Modifier Bits
// ============================================================================

pub const ACC_PUBLIC: u32 = 0x0001;
pub const ACC_PRIVATE: u32 = 0x0002;
pub const ACC_PROTECTED: u32 = 0x0004;
pub const ACC_STATIC: u32 = 0x0008;
pub const ACC_FINAL: u32 = 0x0010;
pub const ACC_SYNCHRONIZED: u32 = 0x0020;
/// Field-only flag, never legal on a method
pub const ACC_VOLATILE: u32 = 0x0040;
/// Field-only flag, never legal on a method
pub const ACC_TRANSIENT: u32 = 0x0080;
pub const ACC_NATIVE: u32 = 0x0100;
/// Type-only flag, never legal on a method
pub const ACC_INTERFACE: u32 = 0x0200;
pub const ACC_ABSTRACT: u32 = 0x0400;
pub const ACC_STRICT: u32 = 0x0800;

/// Every flag that may legally appear on a method.
///
/// Modifier restrictions are filtered through this mask; any other bit is
/// silently dropped when a restriction is configured.
pub const METHOD_MODIFIERS: u32 = ACC_PUBLIC
    | ACC_PRIVATE
    | ACC_PROTECTED
    | ACC_STATIC
    | ACC_FINAL
    | ACC_SYNCHRONIZED
    | ACC_NATIVE
    | ACC_ABSTRACT
    | ACC_STRICT;

/// Name used for constructors in member signatures
pub const CONSTRUCTOR_NAME: &str = "<init>";

const MODIFIER_NAMES: &[(u32, &str)] = &[
    (ACC_PUBLIC, "public"),
    (ACC_PROTECTED, "protected"),
    (ACC_PRIVATE, "private"),
    (ACC_ABSTRACT, "abstract"),
    (ACC_STATIC, "static"),
    (ACC_FINAL, "final"),
    (ACC_TRANSIENT, "transient"),
    (ACC_VOLATILE, "volatile"),
    (ACC_SYNCHRONIZED, "synchronized"),
    (ACC_NATIVE, "native"),
    (ACC_STRICT, "strictfp"),
    (ACC_INTERFACE, "interface"),
];

/// Render modifier bits in source order, e.g. `public static`.
#[must_use]
pub fn modifiers_to_string(bits: u32) -> String {
    MODIFIER_NAMES
        .iter()
        .filter(|(flag, _)| bits & flag != 0)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a member signature: `<type>.<name>(<param>,<param>)`.
///
/// Parameter types are the erased, fully qualified type names. No spaces are
/// inserted so that signatures can be matched against patterns verbatim.
#[must_use]
pub fn member_signature(declaring_type: &str, name: &str, parameter_types: &[String]) -> String {
    format!("{declaring_type}.{name}({})", parameter_types.join(","))
}

// ============================================================================
// Loader Identity
// ============================================================================

/// Identity of the loader that defined a type.
///
/// The bootstrap loader has no identity and is represented by `None` on
/// [`CodeEntity::loader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LoaderId(pub u64);

impl fmt::Display for LoaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loader#{}", self.0)
    }
}

// ============================================================================
// Type Kind Flags
// ============================================================================

/// Kind flags of a type as reported by the catalog.
///
/// Only types with every flag cleared are "ordinary" and may be woven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[allow(clippy::struct_excessive_bools)]
pub struct KindFlags {
    pub interface: bool,
    pub annotation: bool,
    #[cfg_attr(feature = "serde", serde(rename = "enum"))]
    pub enumeration: bool,
    pub array: bool,
    pub primitive: bool,
    pub synthetic: bool,
    pub anonymous: bool,
    pub local: bool,
}

impl KindFlags {
    /// Returns true if none of the special kind flags is set.
    #[must_use]
    pub fn is_ordinary(&self) -> bool {
        !(self.interface
            || self.annotation
            || self.enumeration
            || self.array
            || self.primitive
            || self.synthetic
            || self.anonymous
            || self.local)
    }
}

// ============================================================================
// Members
// ============================================================================

/// A method as visible on a catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MethodInfo {
    pub name: String,

    /// Erased, fully qualified parameter type names
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameter_types: Vec<String>,

    /// Access flags (`ACC_*`)
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: u32,

    /// Fully qualified names of the annotations carried by the method
    #[cfg_attr(feature = "serde", serde(default))]
    pub annotations: Vec<String>,

    /// Declaring type when the method is inherited.
    ///
    /// `None` means the method is declared by the entity that lists it.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub declared_in: Option<String>,
}

impl MethodInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, modifiers: u32) -> Self {
        Self {
            name: name.into(),
            parameter_types: Vec::new(),
            modifiers,
            annotations: Vec::new(),
            declared_in: None,
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, type_name: impl Into<String>) -> Self {
        self.parameter_types.push(type_name.into());
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    #[must_use]
    pub fn inherited_from(mut self, declaring_type: impl Into<String>) -> Self {
        self.declared_in = Some(declaring_type.into());
        self
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers & ACC_ABSTRACT != 0
    }

    #[must_use]
    pub fn is_native(&self) -> bool {
        self.modifiers & ACC_NATIVE != 0
    }

    /// Declaring type of this method, given the entity it was listed on.
    #[must_use]
    pub fn declaring_type<'a>(&'a self, owner: &'a str) -> &'a str {
        self.declared_in.as_deref().unwrap_or(owner)
    }

    /// Full signature, qualified with the declaring type.
    #[must_use]
    pub fn signature(&self, owner: &str) -> String {
        member_signature(self.declaring_type(owner), &self.name, &self.parameter_types)
    }
}

/// A constructor declared by a catalog entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstructorInfo {
    #[cfg_attr(feature = "serde", serde(default))]
    pub parameter_types: Vec<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub modifiers: u32,
}

impl ConstructorInfo {
    #[must_use]
    pub fn new(modifiers: u32) -> Self {
        Self { parameter_types: Vec::new(), modifiers }
    }

    #[must_use]
    pub fn with_parameter(mut self, type_name: impl Into<String>) -> Self {
        self.parameter_types.push(type_name.into());
        self
    }

    #[must_use]
    pub fn signature(&self, owner: &str) -> String {
        member_signature(owner, CONSTRUCTOR_NAME, &self.parameter_types)
    }
}

// ============================================================================
// Code Entity
// ============================================================================

/// A loadable type of the monitored process.
///
/// **Methods**: `methods` holds the declared methods, `visible_methods` the
/// externally visible ones including inherited members. A method may appear
/// in both lists; consumers deduplicate by signature.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CodeEntity {
    /// Fully qualified type name, e.g. `com.acme.Service`
    pub name: String,

    /// Defining loader (`None` = bootstrap loader, written as `null`)
    #[cfg_attr(feature = "serde", serde(default = "default_loader"))]
    pub loader: Option<LoaderId>,

    /// Whether the defining loader can see the agent's own classes
    #[cfg_attr(feature = "serde", serde(default = "default_true"))]
    pub loader_sees_agent: bool,

    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: KindFlags,

    /// Fully qualified names of the annotations carried by the type
    #[cfg_attr(feature = "serde", serde(default))]
    pub annotations: Vec<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub methods: Vec<MethodInfo>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub visible_methods: Vec<MethodInfo>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub constructors: Vec<ConstructorInfo>,
}

/// Loader assumed for entities that do not name one
pub const APPLICATION_LOADER: LoaderId = LoaderId(1);

#[cfg(feature = "serde")]
fn default_true() -> bool {
    true
}

#[cfg(feature = "serde")]
#[allow(clippy::unnecessary_wraps)]
fn default_loader() -> Option<LoaderId> {
    Some(APPLICATION_LOADER)
}

impl CodeEntity {
    /// Create an ordinary type defined by an application loader.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: Some(APPLICATION_LOADER),
            loader_sees_agent: true,
            kind: KindFlags::default(),
            annotations: Vec::new(),
            methods: Vec::new(),
            visible_methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    #[must_use]
    pub fn with_visible_method(mut self, method: MethodInfo) -> Self {
        self.visible_methods.push(method);
        self
    }

    #[must_use]
    pub fn with_constructor(mut self, constructor: ConstructorInfo) -> Self {
        self.constructors.push(constructor);
        self
    }

    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: KindFlags) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: Option<LoaderId>, sees_agent: bool) -> Self {
        self.loader = loader;
        self.loader_sees_agent = sees_agent;
        self
    }

    /// Visible methods followed by declared methods.
    pub fn all_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.visible_methods.iter().chain(self.methods.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_signature_format() {
        let params = vec!["java.lang.String".to_string(), "int".to_string()];
        assert_eq!(
            member_signature("com.acme.Service", "doWork", &params),
            "com.acme.Service.doWork(java.lang.String,int)"
        );
        assert_eq!(member_signature("com.acme.Service", "run", &[]), "com.acme.Service.run()");
    }

    #[test]
    fn test_inherited_method_signature_uses_declaring_type() {
        let method = MethodInfo::new("close", ACC_PUBLIC).inherited_from("com.acme.Base");
        assert_eq!(method.signature("com.acme.Derived"), "com.acme.Base.close()");
    }

    #[test]
    fn test_constructor_signature() {
        let ctor = ConstructorInfo::new(ACC_PUBLIC).with_parameter("java.lang.String");
        assert_eq!(ctor.signature("com.acme.Repo"), "com.acme.Repo.<init>(java.lang.String)");
    }

    #[test]
    fn test_kind_flags_ordinary() {
        assert!(KindFlags::default().is_ordinary());
        let iface = KindFlags { interface: true, ..KindFlags::default() };
        assert!(!iface.is_ordinary());
    }

    #[test]
    fn test_method_modifiers_excludes_field_flags() {
        assert_eq!(METHOD_MODIFIERS & ACC_VOLATILE, 0);
        assert_eq!(METHOD_MODIFIERS & ACC_TRANSIENT, 0);
        assert_ne!(METHOD_MODIFIERS & ACC_PUBLIC, 0);
    }

    #[test]
    fn test_modifiers_to_string() {
        assert_eq!(modifiers_to_string(ACC_PUBLIC | ACC_STATIC), "public static");
        assert_eq!(modifiers_to_string(0), "");
    }
}
