//! # Property Graph Model
//!
//! Local stand-ins for remote graph entities. These types cross every
//! boundary: resource binding ↔ identity cache ↔ coalescing ↔ user.
//!
//! Design rule: no transport types here. Entities know *that* they are
//! bound and to which URI; how the URI is fetched lives in `resource`.

pub mod entity;
pub mod node;
pub mod relationship;
pub mod path;
pub mod pointer;
pub mod value;
pub mod property_map;

pub use entity::{Entity, EntityKind};
pub use node::Node;
pub use relationship::Relationship;
pub use path::Path;
pub use pointer::NodePointer;
pub use value::Value;
pub use property_map::PropertyMap;
