//! Interface collection, structural matching and declaration lookup.

mod interfaces;
mod locate;
mod matcher;

pub use interfaces::{collect_interfaces, Interface};
pub use locate::{locate, DeclarationRef};
pub use matcher::{match_implementations, CandidateType, MatchedMethod};
