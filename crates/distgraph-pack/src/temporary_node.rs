//! Lazy deserialization of an imported edge's endpoints.
//!
//! An imported edge carries, for each endpoint, an embedded serialized
//! payload plus `(id, location)`. Observing `id()`/`location()` never
//! deserializes the payload; `build()` does, once. This lets the migration
//! pipeline skip materializing endpoints that turn out to already be known
//! on the receiver.

use distgraph_core::DistributedId;

use crate::error::{PackError, PackResult};
use crate::pack::{ObjectPack, PackSerialize};

/// A handle to a not-yet-deserialized node payload attached to an
/// imported edge.
#[derive(Debug)]
pub struct TemporaryNode<T> {
    id: DistributedId,
    location: i32,
    payload: Option<ObjectPack>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: PackSerialize> TemporaryNode<T> {
    pub fn new(id: DistributedId, location: i32, payload: ObjectPack) -> Self {
        Self {
            id,
            location,
            payload: Some(payload),
            _marker: std::marker::PhantomData,
        }
    }

    /// The endpoint's id. Does not deserialize the payload.
    pub fn id(&self) -> DistributedId {
        self.id
    }

    /// The rank currently hosting the endpoint's LOCAL copy, as known at
    /// the time the edge was sent. Does not deserialize the payload.
    pub fn location(&self) -> i32 {
        self.location
    }

    /// True if `build()` has not yet been called.
    pub fn is_pending(&self) -> bool {
        self.payload.is_some()
    }

    /// Deserializes and returns the endpoint's data. May be called at most
    /// once; a second call returns `DoubleMaterialization`.
    pub fn build(&mut self) -> PackResult<T> {
        let mut payload = self
            .payload
            .take()
            .ok_or_else(|| PackError::DoubleMaterialization(self.id.to_string()))?;
        payload.get::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pack(value: u32) -> ObjectPack {
        let mut pack = ObjectPack::new();
        pack.allocate(value.packed_size());
        pack.put(&value);
        pack
    }

    #[test]
    fn id_and_location_do_not_require_build() {
        let id = DistributedId::new(1, 2);
        let tmp: TemporaryNode<u32> = TemporaryNode::new(id, 1, sample_pack(7));
        assert_eq!(tmp.id(), id);
        assert_eq!(tmp.location(), 1);
        assert!(tmp.is_pending());
    }

    #[test]
    fn build_deserializes_once_and_then_errors() {
        let id = DistributedId::new(1, 2);
        let mut tmp: TemporaryNode<u32> = TemporaryNode::new(id, 1, sample_pack(7));
        assert_eq!(tmp.build().unwrap(), 7);
        assert!(!tmp.is_pending());
        let err = tmp.build().unwrap_err();
        assert!(matches!(err, PackError::DoubleMaterialization(_)));
    }
}
