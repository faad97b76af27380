use core::fmt;
use core::ops::BitXorAssign;

use byteorder::{ByteOrder, LittleEndian};

pub const NODE_BYTES: usize = 64;
pub const NODE_WORDS: usize = NODE_BYTES / 4;
pub const NODE_DWORDS: usize = NODE_WORDS / 2;

/// The unit of both the cache and the dataset: 64 bytes, read as 16
/// little-endian 32-bit words or 8 little-endian 64-bit words.
///
/// Word views are explicit conversions, so byte offsets mean the same thing
/// on every platform.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Node([u8; NODE_BYTES]);

impl Node {
    pub const fn zero() -> Self {
        Self([0u8; NODE_BYTES])
    }

    pub fn as_bytes(&self) -> &[u8; NODE_BYTES] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; NODE_BYTES] {
        &mut self.0
    }

    /// Little-endian 32-bit word `i`.
    ///
    /// # Panics
    ///
    /// If `i >= NODE_WORDS`.
    #[inline]
    pub fn word(&self, i: usize) -> u32 {
        LittleEndian::read_u32(&self.0[i * 4..(i + 1) * 4])
    }

    #[inline]
    pub fn set_word(&mut self, i: usize, value: u32) {
        LittleEndian::write_u32(&mut self.0[i * 4..(i + 1) * 4], value);
    }

    /// Little-endian 64-bit word `i`.
    ///
    /// # Panics
    ///
    /// If `i >= NODE_DWORDS`.
    #[inline]
    pub fn dword(&self, i: usize) -> u64 {
        LittleEndian::read_u64(&self.0[i * 8..(i + 1) * 8])
    }

    #[inline]
    pub fn set_dword(&mut self, i: usize, value: u64) {
        LittleEndian::write_u64(&mut self.0[i * 8..(i + 1) * 8], value);
    }

    pub fn words(&self) -> [u32; NODE_WORDS] {
        let mut words = [0u32; NODE_WORDS];
        LittleEndian::read_u32_into(&self.0, &mut words);
        words
    }

    pub fn from_words(words: &[u32; NODE_WORDS]) -> Self {
        let mut node = Self::zero();
        LittleEndian::write_u32_into(words, &mut node.0);
        node
    }

    /// Keccak-512 of `data`.
    pub fn hash(data: &[u8]) -> Self {
        Self(crate::keccak_512(data))
    }

    /// Keccak-512 of this node's bytes.
    pub fn rehash(&self) -> Self {
        Self::hash(&self.0)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<[u8; NODE_BYTES]> for Node {
    fn from(b: [u8; NODE_BYTES]) -> Self {
        Self(b)
    }
}

impl From<Node> for [u8; NODE_BYTES] {
    fn from(node: Node) -> Self {
        node.0
    }
}

impl<'a> TryFrom<&'a [u8]> for Node {
    type Error = crate::Error;

    fn try_from(b: &'a [u8]) -> Result<Self, Self::Error> {
        let inner: [u8; NODE_BYTES] = b.try_into().map_err(|_| {
            crate::Error::InvalidInput(format!(
                "node must be {} bytes, got {}",
                NODE_BYTES,
                b.len()
            ))
        })?;
        Ok(Self(inner))
    }
}

impl AsRef<[u8]> for Node {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<'a> BitXorAssign<&'a Node> for Node {
    fn bitxor_assign(&mut self, rhs: &'a Node) {
        for (a, b) in self.0.iter_mut().zip(rhs.0.iter()) {
            *a ^= b;
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Node(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        f.write_str(")")
    }
}
