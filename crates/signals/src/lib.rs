//! # Fieldmatch Signals
//!
//! Everything the matcher can learn about a form field without leaving the
//! process.
//!
//! ## Pipeline
//!
//! ```text
//! DetectedField + DomContext
//!     │
//!     ├──> SignalExtractor
//!     │      └─> FieldSignals
//!     │
//!     ├──> HeuristicScorer
//!     │      └─> ranked PurposeScore[]
//!     │              └─> PurposeResolver ──> profile key
//!     │
//!     └──> signature
//!            └─> field / form / profile cache keys
//! ```
//!
//! ## Example
//!
//! ```
//! use fieldmatch_signals::{HeuristicScorer, Purpose};
//! use fieldmatch_protocol::FieldSignals;
//!
//! let scorer = HeuristicScorer::default();
//! let ranked = scorer.score(&FieldSignals::labelled("Email Address"));
//! assert_eq!(ranked[0].purpose, Purpose::Email);
//! assert!(ranked[0].score > 0.7);
//! ```

mod extract;
mod heuristics;
mod patterns;
mod resolve;
pub mod signature;
mod text;

pub use extract::{infer_form_purpose, DetectedField, DomContext, FormContext, SignalExtractor};
pub use heuristics::{ChannelWeights, HeuristicScorer, PurposeScore};
pub use patterns::Purpose;
pub use resolve::PurposeResolver;
pub use signature::{field_signature, form_signature, profile_signature, DAY_MS};
pub use text::{clean_text, split_tokens, truncate_graphemes};
