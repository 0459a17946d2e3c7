//! Single-allocation binary `ObjectPack`/`LightObjectPack` serialization,
//! a standalone JSON mirror codec, and the lazy `TemporaryNode`
//! optimization used by the migration pipeline.
//!
//! Every message that crosses the MPI boundary in `distgraph-mpi` and
//! `distgraph-sync` is an `ObjectPack`. The `json` module's
//! `to_json_bytes`/`from_json_bytes` are not part of that transport; they
//! are a separate textual codec callers can use directly outside of MPI.

pub mod error;
pub mod id_pack;
pub mod json;
pub mod pack;
pub mod temporary_node;

pub use error::{PackError, PackResult};
pub use json::{from_json_bytes, to_json_bytes};
pub use pack::{LightPackSerialize, ObjectPack, PackSerialize};
pub use temporary_node::TemporaryNode;
