//! Bridge Runtime - Host side of the controller bridge
//!
//! Host types become controllers by implementing [`ControllerType`], usually
//! through the [`controller`] attribute. The runtime then:
//!
//! - builds and caches per-type metadata ([`TypeRegistry`])
//! - resolves and invokes methods by wire name ([`dispatcher`])
//! - reads and writes properties with type checking ([`accessor`])
//! - owns live instances and the outbound change queue ([`ControllerHost`])
//!
//! ## Example
//!
//! ```ignore
//! use bridge_runtime::{ControllerHost, controller};
//!
//! #[derive(Default)]
//! struct Counter { count: i64 }
//!
//! #[controller(properties(count))]
//! impl Counter {
//!     pub fn increment(&mut self) { self.count += 1; }
//! }
//!
//! let host = ControllerHost::new(Default::default());
//! host.register_default::<Counter>();
//! let description = host.create_controller("Counter")?;
//! ```

extern crate self as bridge_runtime;

pub mod accessor;
pub mod decode;
pub mod dispatcher;
mod error;
mod host;
pub mod internal;
mod method;
mod property;
mod registry;

pub use bridge_macros::controller;
pub use bridge_types as types;
pub use bridge_types::naming;

pub use decode::{DecodeError, FromWire, Json, WireKind};
pub use error::{DispatchError, HostError};
pub use host::{Controller, ControllerHost};
pub use method::{BoxedArg, IntoMethod, InvokeError, Invoker, Method, ParameterType};
pub use property::{PropertyMeta, PropertyType, PropertyValue};
pub use registry::{ControllerType, Exclusion, TypeBuilder, TypeInfo, TypeRegistry};
