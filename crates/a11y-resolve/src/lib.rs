//! Accessibility-node resolution: snapshot indexing, hint matching, and
//! adoption of snapshot nodes into verified live locators.

mod adopt;
mod errors;
mod hint;
mod index;
mod types;

pub use adopt::{adopt, locator_spec_for, Adoption, AMBIGUITY_CANDIDATE_LIMIT};
pub use errors::ResolveError;
pub use hint::{find_by_hint, normalize, resolve_hint};
pub use index::index_tree;
pub use types::{A11yHint, AxNodeInfo, NodeIndex};
