//! Search engine parameters

/* LENGTH AND DEPTH BUDGETS */

/// Default maximum chain length, in words.
pub const DEFAULT_LMAX: usize = 100;

/// Hard upper bound on the chain length budget. Anything at or above this is
/// a caller mistake.
pub const LMAX_HARD_LIMIT: usize = 40_000;

/// Default maximum recursion depth of the search.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/* END */

/* STRATEGY CANDIDATE CAPS */

/// How many jmp/call-terminated candidates the adjust-ret strategy examines.
pub const ADJUST_RET_MAX_POSSIBLE_GADGETS: usize = 3;

/// How many return-like adjustment gadgets are tried per candidate.
pub const ADJUST_RET_MAX_ADJUST_GADGETS: usize = 3;

/// How many addresses of one adjustment gadget are tried.
pub const ADJUST_RET_MAX_ADDRESS_TRY: usize = 3;

/* END */

/* LEARNED-FAILURE RECORD */

/// Upper bound on the stored constraint signatures per transitivity query.
pub const MAX_SIGNATURES_PER_QUERY: usize = 8;

/* END */
