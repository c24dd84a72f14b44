//! ROP chain container.
//!
//! A chain is an ordered sequence of stack words: gadget addresses and
//! padding/constant values. The engine only appends; rendering resolves
//! gadget identifiers through the database that produced them.

use crate::arch::{Arch, Word};
use crate::constraint::Constraint;
use crate::database::GadgetDatabase;
use crate::gadget::GadgetId;

use itertools::Itertools;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// One stack word of a chain.
pub enum ChainItem {
    /// The address of a gadget, referenced by database identifier.
    Gadget(GadgetId),
    /// A literal word: padding or an immediate constant.
    Padding {
        /// The word value.
        value: Word,
        /// Optional annotation shown when rendering.
        comment: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Append-only sequence of stack words forming a ROP chain.
pub struct RopChain {
    items: Vec<ChainItem>,
}

impl RopChain {
    /// An empty chain.
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Append a gadget address slot.
    pub fn add_gadget(&mut self, id: GadgetId) {
        self.items.push(ChainItem::Gadget(id));
    }

    /// Append `count` copies of a literal word.
    pub fn add_padding(&mut self, value: Word, count: usize) {
        for _ in 0..count {
            self.items.push(ChainItem::Padding {
                value,
                comment: None,
            });
        }
    }

    /// Append one literal word with an annotation.
    pub fn add_padding_with_comment<S: Into<String>>(&mut self, value: Word, comment: S) {
        self.items.push(ChainItem::Padding {
            value,
            comment: Some(comment.into()),
        });
    }

    /// Append every word of `other` after the current words.
    pub fn append(&mut self, mut other: RopChain) {
        self.items.append(&mut other.items);
    }

    /// Chain length in stack words.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the chain holds no words.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The stack words, first executed first.
    pub fn items(&self) -> &[ChainItem] {
        &self.items
    }

    /// Identifiers of the gadget slots, in execution order.
    pub fn gadgets(&self) -> impl Iterator<Item = GadgetId> + '_ {
        self.items.iter().filter_map(|item| match item {
            ChainItem::Gadget(id) => Some(*id),
            ChainItem::Padding { .. } => None,
        })
    }

    /// Render the chain as one hex word per line, resolving gadgets through
    /// `db`. Gadgets are shown at their first address whose encoding clears
    /// `constraint`'s byte filter; a gadget can be accepted into a chain
    /// through any of its clean addresses, so the dirty ones must never reach
    /// the listing.
    pub fn render<D: GadgetDatabase>(&self, db: &D, arch: &Arch, constraint: &Constraint) -> String {
        let width = arch.octets() * 2;
        self.items
            .iter()
            .map(|item| match item {
                ChainItem::Gadget(id) => match db.get(*id) {
                    Some(g) => {
                        let addr = g
                            .addresses()
                            .iter()
                            .copied()
                            .find(|a| constraint.verify_address(*a, arch))
                            .or_else(|| g.addresses().first().copied())
                            .unwrap_or_default();
                        format!("0x{addr:0width$x} ({})", g.asm())
                    }
                    None => format!("<unknown gadget {id}>"),
                },
                ChainItem::Padding { value, comment } => match comment {
                    Some(text) => format!("0x{value:0width$x} ({text})"),
                    None => format!("0x{value:0width$x} (padding)"),
                },
            })
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut first = RopChain::new();
        first.add_gadget(0);
        first.add_padding(0xff, 1);

        let mut second = RopChain::new();
        second.add_gadget(1);

        first.append(second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.gadgets().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn padding_counts_as_words() {
        let mut chain = RopChain::new();
        chain.add_gadget(7);
        chain.add_padding(0xffff, 3);
        chain.add_padding_with_comment(0x41, "Constant: 0x41");
        assert_eq!(chain.len(), 5);
    }
}
