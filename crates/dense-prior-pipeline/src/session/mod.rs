//! Session framework shared by pipeline problems.
//!
//! A [`PriorSession`] stores config, input, intermediate state, and a single
//! output. Step functions take `&mut PriorSession<P>` and advance it:
//!
//! ```no_run
//! use dense_prior_pipeline::dense_init::{DenseInitProblem, step_preprocess};
//! use dense_prior_pipeline::session::PriorSession;
//! # fn main() -> anyhow::Result<()> {
//! # let input = unimplemented!();
//! let mut session = PriorSession::<DenseInitProblem>::new();
//! session.set_input(input)?;
//! step_preprocess(&mut session)?;
//! # Ok(())
//! # }
//! ```

pub mod prior_session;
pub mod problem_type;
pub mod types;

pub use prior_session::PriorSession;
pub use problem_type::{InvalidationPolicy, ProblemType};
pub use types::{ExportRecord, LogEntry, SessionMetadata, current_timestamp};
