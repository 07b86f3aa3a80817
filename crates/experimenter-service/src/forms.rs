//! Form validation.
//!
//! Each form is a deserializable input struct whose `clean` method either
//! produces a typed change set or the [`FormErrors`] explaining what was
//! rejected. Checks that need storage (name uniqueness, known locales)
//! receive what they need as arguments so cleaning stays synchronous.
//!
//! [`FormErrors`]: experimenter_core::error::FormErrors

pub mod comment;
pub mod fields;
pub mod normandy;
pub mod objectives;
pub mod overview;
pub mod review;
pub mod risks;
pub mod status;
pub mod variants;

pub use comment::CommentForm;
pub use normandy::NormandyIdForm;
pub use objectives::ObjectivesForm;
pub use overview::{CleanOverview, OverviewChecks, OverviewForm};
pub use review::{ReviewChanges, ReviewForm};
pub use risks::RisksForm;
pub use status::{StatusChange, StatusForm, check_transition};
pub use variants::{CleanVariant, CleanVariants, VariantInput, VariantsContext, VariantsForm};
