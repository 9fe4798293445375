//! Dense node identifiers assigned by a topology in registration order.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

node_id!(
    /// Index of an endorsing peer. Lower ids were registered earlier and win
    /// consistency tie-breaks.
    PeerId,
    "peer"
);
node_id!(OrdererId, "orderer");
node_id!(EventSourceId, "source");
