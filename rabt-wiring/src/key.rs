//! Type identities used throughout the registration plan.
//!
//! [`TypeRef`] names a service or implementation type. It is either a
//! concrete Rust type (identified by [`TypeId`]) or an open generic
//! [`GenericTemplate`] such as `Repository<_>`, which Rust cannot name
//! at runtime and therefore gets an explicit identity.
//!
//! [`ServiceKey`] distinguishes keyed registrations of the same service.

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use rabt_support::rendering::shorten_type_name;
use serde::{Deserialize, Serialize};

/// Identity of an open generic definition, e.g. `Repository<_>`.
///
/// Two templates are the same when name and arity match.
///
/// # Examples
/// ```
/// use rabt_wiring::key::GenericTemplate;
///
/// const REPOSITORY: GenericTemplate = GenericTemplate::new("Repository", 1);
/// assert_eq!(REPOSITORY.to_string(), "Repository<_>");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenericTemplate {
    name: &'static str,
    arity: usize,
}

impl GenericTemplate {
    /// Creates a template identity with the given generic arity.
    pub const fn new(name: &'static str, arity: usize) -> Self {
        Self { name, arity }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for GenericTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let holes = vec!["_"; self.arity].join(", ");
        write!(f, "{}<{holes}>", self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Concrete(TypeId),
    Open(GenericTemplate),
}

/// Identifies a service or implementation type in the registration plan.
///
/// Equality and hashing consider identity only: the recorded generic
/// template of a closed type is metadata.
///
/// # Examples
/// ```
/// use rabt_wiring::key::{GenericTemplate, TypeRef};
///
/// trait Repository<T>: Send + Sync {}
/// struct Customer;
///
/// const REPOSITORY: GenericTemplate = GenericTemplate::new("Repository", 1);
///
/// let closed = TypeRef::closing::<dyn Repository<Customer>>(REPOSITORY);
/// assert!(!closed.is_open_generic());
/// assert_eq!(closed.definition(), Some(TypeRef::open(REPOSITORY)));
///
/// // identity ignores the template record
/// assert_eq!(closed, TypeRef::of::<dyn Repository<Customer>>());
/// ```
#[derive(Clone, Copy)]
pub struct TypeRef {
    identity: Identity,
    type_name: &'static str,
    template: Option<GenericTemplate>,
}

impl TypeRef {
    /// Creates a reference to the concrete type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            identity: Identity::Concrete(TypeId::of::<T>()),
            type_name: type_name::<T>(),
            template: None,
        }
    }

    /// Creates a reference to `T`, recording that it closes `template`.
    #[inline]
    pub fn closing<T: ?Sized + 'static>(template: GenericTemplate) -> Self {
        Self {
            template: Some(template),
            ..Self::of::<T>()
        }
    }

    /// Creates a reference to an open generic definition.
    #[inline]
    pub fn open(template: GenericTemplate) -> Self {
        Self {
            identity: Identity::Open(template),
            type_name: template.name,
            template: Some(template),
        }
    }

    /// Returns `true` for open generic definitions.
    #[inline]
    pub fn is_open_generic(&self) -> bool {
        matches!(self.identity, Identity::Open(_))
    }

    /// Returns the generic template this type is, or closes.
    #[inline]
    pub fn template(&self) -> Option<GenericTemplate> {
        self.template
    }

    /// Returns the open definition of a generic type, or `None` for
    /// non-generic types.
    #[inline]
    pub fn definition(&self) -> Option<TypeRef> {
        self.template.map(TypeRef::open)
    }

    /// Returns the full type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the type name without module paths.
    pub fn short_name(&self) -> String {
        match self.identity {
            Identity::Concrete(_) => shorten_type_name(self.type_name),
            Identity::Open(template) => template.to_string(),
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.identity, self.template) {
            (Identity::Open(template), _) => write!(f, "TypeRef({template})"),
            (Identity::Concrete(_), Some(template)) => {
                write!(f, "TypeRef({}, closes={template})", self.type_name)
            }
            (Identity::Concrete(_), None) => write!(f, "TypeRef({})", self.type_name),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Lookup key of a keyed registration.
///
/// ```
/// use rabt_wiring::key::ServiceKey;
///
/// assert_eq!(ServiceKey::from("primary"), ServiceKey::name("primary"));
/// assert_ne!(ServiceKey::from(1i64), ServiceKey::from("1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceKey {
    Index(i64),
    Name(Cow<'static, str>),
}

impl ServiceKey {
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        ServiceKey::Name(name.into())
    }
}

impl From<&'static str> for ServiceKey {
    fn from(name: &'static str) -> Self {
        ServiceKey::Name(Cow::Borrowed(name))
    }
}

impl From<String> for ServiceKey {
    fn from(name: String) -> Self {
        ServiceKey::Name(Cow::Owned(name))
    }
}

impl From<i64> for ServiceKey {
    fn from(index: i64) -> Self {
        ServiceKey::Index(index)
    }
}

impl From<i32> for ServiceKey {
    fn from(index: i32) -> Self {
        ServiceKey::Index(index.into())
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKey::Name(name) => write!(f, "{name:?}"),
            ServiceKey::Index(index) => write!(f, "{index}"),
        }
    }
}
