//! `PackSerialize`/`LightPackSerialize` impls for `DistributedId`.
//!
//! Binary wire form: 4-byte rank (`i32`), 8-byte counter (`u64`), native
//! endianness — cross-architecture portability of the byte layout is not
//! required within a single MPI job.

use distgraph_core::DistributedId;

use crate::error::PackResult;
use crate::pack::{LightPackSerialize, ObjectPack, PackSerialize};

impl PackSerialize for DistributedId {
    fn packed_size(&self) -> usize {
        4 + 8
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        self.rank().write_into(pack);
        self.counter().write_into(pack);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let rank = i32::read_from(pack)?;
        let counter = u64::read_from(pack)?;
        Ok(DistributedId::new(rank, counter))
    }
}

impl LightPackSerialize for DistributedId {
    fn light_packed_size(&self) -> usize {
        self.packed_size()
    }

    fn light_write_into(&self, pack: &mut ObjectPack) {
        self.write_into(pack)
    }

    fn light_read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        Self::read_from(pack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distributed_id_round_trips_through_object_pack() {
        let id = DistributedId::new(3, 12345);
        let mut pack = ObjectPack::new();
        pack.allocate(id.packed_size());
        pack.put(&id);
        let back: DistributedId = pack.get().unwrap();
        assert_eq!(id, back);
    }
}
