use std::fmt;
use std::ops::BitXor;

use ethereum_types::H160;
use sha1::{Digest, Sha1};

/// Number of bits in an identifier, and therefore the number of k-buckets.
pub const ID_BITS: usize = 160;

/// A 160-bit identifier. Nodes, keys and request tokens all live in the
/// same address space.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(pub H160);

impl Id {
    /// Generate a uniformly random identifier.
    pub fn random() -> Self {
        Id(H160::random())
    }

    pub fn zero() -> Self {
        Id(H160::zero())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Id(H160::from_slice(bytes))
    }

    /// Map an arbitrary byte key into the identifier space via SHA-1.
    pub fn from_hashed<S: AsRef<[u8]>>(input: &S) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(input.as_ref());
        Id(H160::from_slice(&hasher.finalize()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn distance(&self, other: &Id) -> Distance {
        Distance(self.0 ^ other.0)
    }

    /// Short, human-friendly hex for logging, like ab12cd34…ef90a1b2.
    pub fn short_hex(&self) -> String {
        let b = self.0.to_fixed_bytes();
        format!(
            "{:02x}{:02x}{:02x}{:02x}…{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[16], b[17], b[18], b[19]
        )
    }
}

impl BitXor for Id {
    type Output = Id;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Id(self.0 ^ rhs.0)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.short_hex())
    }
}

/// Keys are plain identifiers.
pub type Key = Id;

/// Request tokens are random identifiers correlating a request with its
/// response.
pub type Token = Id;

/// XOR distance between two identifiers, ordered as an unsigned 160-bit
/// integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Distance(pub(crate) H160);

impl Distance {
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Position of the highest set bit, counting bit 0 as the least
    /// significant. This is the bucket index for the distance. `None` for
    /// the zero distance.
    pub fn highest_set_bit(&self) -> Option<usize> {
        let bytes = self.0.as_bytes();
        for (byte_index, byte) in bytes.iter().enumerate() {
            if *byte != 0 {
                let bit_in_byte = 7 - byte.leading_zeros() as usize;
                return Some((bytes.len() - 1 - byte_index) * 8 + bit_in_byte);
            }
        }
        None
    }
}
