//! ROP chain synthesis engine.
//!
//! Given a database of gadgets found in a target binary and an assignment
//! query over machine state (`reg <- cst`, `mem[reg + cst] <- reg op cst`,
//! ...), the [`engine::ChainingEngine`] searches for a sequence of gadget
//! addresses and padding words that realizes the assignment while honoring
//! byte-level and register-level constraints.
//!
//! The crate contains the search core and its seams: the gadget database is
//! consumed as a query oracle ([`database::GadgetDatabase`]), the target
//! architecture as a small read-only descriptor ([`arch::Arch`]), and the
//! result as an append-only chain ([`chain::RopChain`]).

#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod arch;
pub mod assertion;
pub mod chain;
pub mod consts;
pub mod constraint;
pub mod database;
pub mod engine;
pub mod error;
pub mod gadget;
pub mod query;

pub mod prelude {
    //! Everything needed to build an engine and run queries.

    pub use crate::arch::{Addr, Arch, Cst, RegId, Word};
    pub use crate::assertion::{AssertClause, Assertion};
    pub use crate::chain::{ChainItem, RopChain};
    pub use crate::constraint::{Constraint, ConstraintClause, CstrSig};
    pub use crate::database::{GadgetDatabase, MemoryDatabase};
    pub use crate::engine::{ChainingEngine, RegTransitivityRecord, SearchParams};
    pub use crate::error::{FailRecord, FailType, SearchError};
    pub use crate::gadget::{Gadget, GadgetId, RetType};
    pub use crate::query::{AssignArg, Binop, DestArg};
}
