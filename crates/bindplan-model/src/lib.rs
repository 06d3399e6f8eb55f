//! Declaration model and binding kinds for the bindplan planner.
//!
//! - Keys (`TypeRef`, `TypeKey`, `ContextualTypeKey`, `Scope`, `Qualifier`)
//! - The declaration model produced by an extraction front end
//! - The closed `Binding` sum type produced by resolution

pub mod binding;
pub mod declarations;
pub mod keys;

pub use binding::{
    AbsentBinding, AliasBinding, Binding, ConstructorBinding, Contributor, GraphDependencyBinding,
    Multibinding, MultibindingKind, ObjectBinding, ProvidedBinding, StorageSlot,
};
pub use declarations::{
    Accessor, BindingDeclaration, ClassDeclaration, ClassKind, DeclarationKind, DeclarationModel,
    GraphDeclaration, MapKey,
};
pub use keys::{ContextualTypeKey, Qualifier, Scope, TypeKey, TypeRef, TypeRefParseError, WrappingKind};
