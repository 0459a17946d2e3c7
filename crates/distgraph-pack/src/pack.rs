//! `ObjectPack`: a single-allocation binary buffer used for every MPI
//! message body.
//!
//! Callers precompute the exact size of what they are about to write
//! (`packed_size`), allocate the buffer once, then `put` each field in
//! turn; on the receiving side they `get` the same fields back in order.
//! This mirrors the "single malloc" technique used throughout the
//! reference implementation's datapack design: compute the total size up
//! front so the whole message is one allocation.

use std::collections::BTreeMap;

use crate::error::{PackError, PackResult};

/// Types that know how to serialize themselves into (and out of) an
/// `ObjectPack`.
///
/// `packed_size` must return the *exact* number of bytes `write_into` will
/// write, so that composite writers can allocate once up front.
pub trait PackSerialize: Sized {
    fn packed_size(&self) -> usize;
    fn write_into(&self, pack: &mut ObjectPack);
    fn read_from(pack: &mut ObjectPack) -> PackResult<Self>;
}

/// Reduced-fidelity serialization used for ghost-data refresh, where
/// fields not needed to keep a ghost's link structure consistent (e.g.
/// large payload bodies) may be dropped. Types for which "light" and
/// "full" coincide can implement both identically; `distgraph`'s node
/// envelope types implement them differently.
pub trait LightPackSerialize: Sized {
    fn light_packed_size(&self) -> usize;
    fn light_write_into(&self, pack: &mut ObjectPack);
    fn light_read_from(pack: &mut ObjectPack) -> PackResult<Self>;
}

/// A single-allocation binary buffer with independent read and write
/// cursors.
#[derive(Debug, Default, Clone)]
pub struct ObjectPack {
    buffer: Vec<u8>,
    read_cursor: usize,
    write_cursor: usize,
}

impl ObjectPack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves exactly `n` bytes up front. Call this once with the total
    /// `packed_size` of everything you are about to `put`, to get the
    /// single-allocation behavior the format is named for.
    pub fn allocate(&mut self, n: usize) {
        if self.buffer.capacity() < n {
            self.buffer.reserve_exact(n - self.buffer.capacity());
        }
    }

    pub fn expand(&mut self, delta: usize) {
        self.buffer.reserve(delta);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.read_cursor)
    }

    /// Moves the read cursor to `pos`. Errors with `Protocol` if `pos`
    /// falls outside the buffer rather than silently clamping.
    pub fn seek_read(&mut self, pos: usize) -> PackResult<()> {
        if pos > self.buffer.len() {
            return Err(PackError::Protocol(format!(
                "seek_read({pos}) is past the end of a {}-byte buffer",
                self.buffer.len()
            )));
        }
        self.read_cursor = pos;
        Ok(())
    }

    pub fn read_offset(&self) -> usize {
        self.read_cursor
    }

    /// Moves the write cursor to `pos`, for patching a value (e.g. a
    /// length prefix) written earlier than the buffer's current end.
    /// Errors with `Protocol` if `pos` falls outside the buffer.
    pub fn seek_write(&mut self, pos: usize) -> PackResult<()> {
        if pos > self.buffer.len() {
            return Err(PackError::Protocol(format!(
                "seek_write({pos}) is past the end of a {}-byte buffer",
                self.buffer.len()
            )));
        }
        self.write_cursor = pos;
        Ok(())
    }

    pub fn write_offset(&self) -> usize {
        self.write_cursor
    }

    /// Writes raw bytes at the write cursor (a "write" shortcut for
    /// plain-old-data payloads that don't need a length-prefixed `put`).
    /// At the buffer's end this appends, as every `PackSerialize` impl
    /// relies on; after `seek_write` it overwrites in place, truncating
    /// and re-extending if the patch runs past the previous end.
    pub fn write(&mut self, bytes: &[u8]) {
        if self.write_cursor >= self.buffer.len() {
            self.buffer.extend_from_slice(bytes);
        } else {
            let end = self.write_cursor + bytes.len();
            if end <= self.buffer.len() {
                self.buffer[self.write_cursor..end].copy_from_slice(bytes);
            } else {
                self.buffer.truncate(self.write_cursor);
                self.buffer.extend_from_slice(bytes);
            }
        }
        self.write_cursor += bytes.len();
    }

    /// Reads exactly `n` raw bytes, advancing the read cursor.
    pub fn read(&mut self, n: usize) -> PackResult<&[u8]> {
        if self.remaining() < n {
            return Err(PackError::Truncated {
                expected: n,
                available: self.remaining(),
            });
        }
        let start = self.read_cursor;
        self.read_cursor += n;
        Ok(&self.buffer[start..self.read_cursor])
    }

    pub fn put<T: PackSerialize>(&mut self, value: &T) {
        value.write_into(self);
    }

    pub fn get<T: PackSerialize>(&mut self) -> PackResult<T> {
        T::read_from(self)
    }

    pub fn put_light<T: LightPackSerialize>(&mut self, value: &T) {
        value.light_write_into(self);
    }

    pub fn get_light<T: LightPackSerialize>(&mut self) -> PackResult<T> {
        T::light_read_from(self)
    }

    /// Copies `n` bytes from the read cursor into a new, independent
    /// `ObjectPack` (read cursor at zero), advancing this pack's cursor
    /// past them. Used to carry a nested payload opaquely, e.g. an
    /// embedded node body inside an edge migration record, without
    /// eagerly deserializing it.
    pub fn extract(&mut self, n: usize) -> PackResult<ObjectPack> {
        let bytes = self.read(n)?.to_vec();
        let write_cursor = bytes.len();
        Ok(ObjectPack {
            buffer: bytes,
            read_cursor: 0,
            write_cursor,
        })
    }

    /// Moves the buffer out, consuming the pack. Used when handing the
    /// payload to the MPI layer for sending.
    pub fn dump(self) -> Vec<u8> {
        self.buffer
    }

    /// Builds a pack from a received buffer, read cursor at zero and
    /// write cursor at the end (any further `write` appends, matching a
    /// freshly-built pack's behavior).
    pub fn parse(buffer: Vec<u8>) -> Self {
        let write_cursor = buffer.len();
        Self {
            buffer,
            read_cursor: 0,
            write_cursor,
        }
    }
}

// --- blanket impls for primitive and composite types -----------------

macro_rules! impl_pack_scalar {
    ($t:ty, $size:expr) => {
        impl PackSerialize for $t {
            fn packed_size(&self) -> usize {
                $size
            }

            fn write_into(&self, pack: &mut ObjectPack) {
                pack.write(&self.to_le_bytes());
            }

            fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
                let bytes = pack.read($size)?;
                let mut arr = [0u8; $size];
                arr.copy_from_slice(bytes);
                Ok(<$t>::from_le_bytes(arr))
            }
        }
    };
}

impl_pack_scalar!(u8, 1);
impl_pack_scalar!(u16, 2);
impl_pack_scalar!(u32, 4);
impl_pack_scalar!(u64, 8);
impl_pack_scalar!(i32, 4);
impl_pack_scalar!(i64, 8);
impl_pack_scalar!(f32, 4);
impl_pack_scalar!(f64, 8);

macro_rules! impl_light_pack_via_full {
    ($t:ty) => {
        impl LightPackSerialize for $t {
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
    };
}

impl_light_pack_via_full!(u8);
impl_light_pack_via_full!(u16);
impl_light_pack_via_full!(u32);
impl_light_pack_via_full!(u64);
impl_light_pack_via_full!(i32);
impl_light_pack_via_full!(i64);
impl_light_pack_via_full!(f32);
impl_light_pack_via_full!(f64);
impl_light_pack_via_full!(bool);
impl_light_pack_via_full!(String);

impl PackSerialize for bool {
    fn packed_size(&self) -> usize {
        1
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        pack.write(&[*self as u8]);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        Ok(pack.read(1)?[0] != 0)
    }
}

impl PackSerialize for String {
    fn packed_size(&self) -> usize {
        8 + self.len()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        (self.len() as u64).write_into(pack);
        pack.write(self.as_bytes());
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let len = u64::read_from(pack)? as usize;
        let bytes = pack.read(len)?.to_vec();
        String::from_utf8(bytes).map_err(|e| PackError::Deserialization(e.to_string()))
    }
}

impl<T: PackSerialize> PackSerialize for Vec<T> {
    fn packed_size(&self) -> usize {
        8 + self.iter().map(PackSerialize::packed_size).sum::<usize>()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        (self.len() as u64).write_into(pack);
        for item in self {
            item.write_into(pack);
        }
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let len = u64::read_from(pack)? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(T::read_from(pack)?);
        }
        Ok(out)
    }
}

impl<T: PackSerialize> PackSerialize for Option<T> {
    fn packed_size(&self) -> usize {
        1 + self.as_ref().map(PackSerialize::packed_size).unwrap_or(0)
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        match self {
            Some(v) => {
                pack.write(&[1]);
                v.write_into(pack);
            }
            None => pack.write(&[0]),
        }
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let tag = pack.read(1)?[0];
        if tag == 0 {
            Ok(None)
        } else {
            Ok(Some(T::read_from(pack)?))
        }
    }
}

impl<K: PackSerialize + Ord, V: PackSerialize> PackSerialize for BTreeMap<K, V> {
    fn packed_size(&self) -> usize {
        8 + self
            .iter()
            .map(|(k, v)| k.packed_size() + v.packed_size())
            .sum::<usize>()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        (self.len() as u64).write_into(pack);
        for (k, v) in self {
            k.write_into(pack);
            v.write_into(pack);
        }
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let len = u64::read_from(pack)? as usize;
        let mut out = BTreeMap::new();
        for _ in 0..len {
            let k = K::read_from(pack)?;
            let v = V::read_from(pack)?;
            out.insert(k, v);
        }
        Ok(out)
    }
}

impl<A: PackSerialize, B: PackSerialize> PackSerialize for (A, B) {
    fn packed_size(&self) -> usize {
        self.0.packed_size() + self.1.packed_size()
    }

    fn write_into(&self, pack: &mut ObjectPack) {
        self.0.write_into(pack);
        self.1.write_into(pack);
    }

    fn read_from(pack: &mut ObjectPack) -> PackResult<Self> {
        let a = A::read_from(pack)?;
        let b = B::read_from(pack)?;
        Ok((a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: PackSerialize + PartialEq + std::fmt::Debug>(value: T) {
        let mut pack = ObjectPack::new();
        pack.allocate(value.packed_size());
        pack.put(&value);
        let recovered: T = pack.get().unwrap();
        assert_eq!(value, recovered);
    }

    #[test]
    fn scalars_round_trip() {
        round_trip(42u64);
        round_trip(-17i64);
        round_trip(3.5f64);
        round_trip(true);
    }

    #[test]
    fn string_round_trips() {
        round_trip("hello distgraph".to_string());
    }

    #[test]
    fn vec_of_strings_round_trips() {
        round_trip(vec!["a".to_string(), "zzzzz".to_string(), "678908".to_string()]);
    }

    #[test]
    fn option_round_trips_both_variants() {
        round_trip(Some(10u32));
        round_trip(None::<u32>);
    }

    #[test]
    fn map_round_trips() {
        let mut m = BTreeMap::new();
        m.insert(1u32, "one".to_string());
        m.insert(2u32, "two".to_string());
        round_trip(m);
    }

    #[test]
    fn extract_copies_opaque_nested_payload() {
        let mut inner = ObjectPack::new();
        inner.allocate(8);
        inner.put(&99u64);

        let mut outer = ObjectPack::new();
        let inner_bytes = inner.clone().dump();
        outer.put(&(inner_bytes.len() as u64));
        outer.write(&inner_bytes);

        let n = outer.get::<u64>().unwrap() as usize;
        let mut extracted = outer.extract(n).unwrap();
        assert_eq!(extracted.get::<u64>().unwrap(), 99);
    }

    #[test]
    fn truncated_buffer_errors_instead_of_panicking() {
        let mut pack = ObjectPack::new();
        pack.put(&1u8);
        let result: PackResult<u64> = pack.get();
        assert!(matches!(result, Err(PackError::Truncated { .. })));
    }

    #[test]
    fn seek_write_patches_an_earlier_value_in_place() {
        let mut pack = ObjectPack::new();
        pack.put(&0u32);
        pack.put(&99u64);
        let patch_at = pack.write_offset() - 8 - 4;
        pack.seek_write(patch_at).unwrap();
        pack.put(&7u32);
        pack.seek_read(0).unwrap();
        assert_eq!(pack.get::<u32>().unwrap(), 7);
        assert_eq!(pack.get::<u64>().unwrap(), 99);
    }

    #[test]
    fn seek_past_the_end_is_a_protocol_error() {
        let mut pack = ObjectPack::new();
        pack.put(&1u32);
        assert!(matches!(
            pack.seek_write(100),
            Err(PackError::Protocol(_))
        ));
        assert!(matches!(pack.seek_read(100), Err(PackError::Protocol(_))));
    }

    #[test]
    fn dump_and_parse_move_the_buffer() {
        let mut pack = ObjectPack::new();
        pack.put(&7u32);
        let bytes = pack.dump();
        let mut reparsed = ObjectPack::parse(bytes);
        assert_eq!(reparsed.get::<u32>().unwrap(), 7);
    }
}
