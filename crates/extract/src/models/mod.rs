mod detail;
mod entry;
mod follow_up;
mod relation;
mod section;

pub use self::detail::DetailValue;
pub use self::entry::{Entry, EntryDraft};
pub use self::follow_up::FollowUp;
pub use self::relation::{Relation, RelationKind, RelationStatus};
pub use self::section::{Link, Section};
