//! Change Notifications
//!
//! Nodes publish two kinds of notification:
//!
//! - `ValueChanged` when a scalar output is replaced
//! - `CollectionChanged` when a collection gains, loses or replaces elements
//!
//! Collection changes only ever describe the delta. A consumer reconciles
//! its own state from the event alone, except on `Reset`, where it must
//! re-enumerate the collection.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A structural change to a collection.
///
/// `index` is the starting position for ordered collections and `None` for
/// unordered ones (a distinct set has no meaningful positions).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Change {
    /// The collection changed wholesale. Re-enumerate.
    Reset,
    Add {
        index: Option<usize>,
        items: Vec<Value>,
    },
    Remove {
        index: Option<usize>,
        items: Vec<Value>,
    },
    Replace {
        index: Option<usize>,
        old: Vec<Value>,
        new: Vec<Value>,
    },
}

impl Change {
    /// Build the single event describing a set of additions and removals.
    ///
    /// Both present gives `Replace`, one side gives `Add` or `Remove`, and
    /// neither gives `None` so that nothing is emitted.
    pub fn from_delta(added: Vec<Value>, removed: Vec<Value>) -> Option<Self> {
        match (added.is_empty(), removed.is_empty()) {
            (false, false) => Some(Change::Replace {
                index: None,
                old: removed,
                new: added,
            }),
            (false, true) => Some(Change::Add {
                index: None,
                items: added,
            }),
            (true, false) => Some(Change::Remove {
                index: None,
                items: removed,
            }),
            (true, true) => None,
        }
    }
}

/// A notification raised by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Notification {
    ValueChanged { old: Value, new: Value },
    CollectionChanged(Change),
}

impl Notification {
    /// The collection change carried by this notification, if any.
    pub fn as_change(&self) -> Option<&Change> {
        match self {
            Notification::CollectionChanged(change) => Some(change),
            Notification::ValueChanged { .. } => None,
        }
    }
}
