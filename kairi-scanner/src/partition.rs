//! Split matched symbols into the detailed head group and the overflow list.

use serde::Serialize;

/// Default number of symbols sent for enrichment and commentary.
pub const DEFAULT_HEAD_SIZE: usize = 5;

/// Head and overflow groups, both in match order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub head: Vec<String>,
    pub overflow: Vec<String>,
}

impl Partition {
    /// Take the first `head_size` symbols as head, the rest as overflow.
    pub fn split(mut matched: Vec<String>, head_size: usize) -> Self {
        let overflow = if matched.len() > head_size {
            matched.split_off(head_size)
        } else {
            Vec::new()
        };

        Self {
            head: matched,
            overflow,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.overflow.is_empty()
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.overflow.len()
    }
}
