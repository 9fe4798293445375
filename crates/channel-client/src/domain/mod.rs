//! Domain layer: value types, the transaction lifecycle and errors.

pub mod channel;
pub mod commit;
pub mod consistency;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod lifecycle;
pub mod policy;
pub mod proposal;

pub use channel::*;
pub use commit::*;
pub use consistency::*;
pub use envelope::*;
pub use errors::*;
pub use ids::*;
pub use lifecycle::*;
pub use policy::*;
pub use proposal::*;
