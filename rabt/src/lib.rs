//! # Rabt: attribute-style service registration for Rust
//!
//! Declare what each component provides, let Rabt derive a deduplicated,
//! ordered registration plan (lifetimes, open generics, keyed services,
//! decorator chains) and hand it to a container.
//!
//! ```rust
//! use rabt::prelude::*;
//! use std::sync::Arc;
//!
//! trait Operation: Send + Sync {
//!     fn perform(&self, a: i32, b: i32) -> i32;
//! }
//!
//! struct Addition;
//! impl Operation for Addition {
//!     fn perform(&self, a: i32, b: i32) -> i32 { a + b }
//! }
//!
//! let index = MetadataIndex::builder()
//!     .component(
//!         Component::new(|_| Ok(Addition))
//!             .implements::<dyn Operation>(|it| it as Arc<dyn Operation>)
//!             .service::<dyn Operation>(LifetimeKind::Transient),
//!     )
//!     .build();
//!
//! let container = Container::builder().autowire(index).build().unwrap();
//! let operation: Arc<dyn Operation> = container.resolve().unwrap();
//! assert_eq!(operation.perform(5, 7), 12);
//! ```

pub use rabt_container::*;
pub use rabt_support::*;
pub use rabt_wiring::*;

pub mod prelude {
    pub use rabt_container::prelude::*;
    pub use rabt_wiring::discovery::{ComponentProvider, ComponentRegistration};
    pub use rabt_wiring::metadata::MetadataIndexBuilder;
}
