//! Provider whitelist / channel blacklist.
//!
//! Shared by all connections; TV and radio keep separate lists.
//!
//! - A blacklisted channel uid never passes.
//! - An empty whitelist passes everything else.
//! - A non-empty whitelist passes channels whose provider matches an entry
//!   whose caid is `0` (any) or one of the channel's caids.

use std::collections::BTreeSet;

use crate::channel::Channel;
use crate::types::ChannelUid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProviderEntry {
    pub name: String,
    /// `0` matches any caid.
    pub caid: u32,
}

#[derive(Debug, Clone, Default)]
struct FilterLists {
    whitelist: Vec<ProviderEntry>,
    blacklist: BTreeSet<ChannelUid>,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    tv: FilterLists,
    radio: FilterLists,
}

impl ChannelFilter {
    pub fn new() -> Self {
        ChannelFilter::default()
    }

    pub fn passes(&self, channel: &Channel) -> bool {
        let lists = self.lists(channel.is_radio());

        if lists.blacklist.contains(&channel.uid) {
            return false;
        }

        if lists.whitelist.is_empty() {
            return true;
        }

        lists.whitelist.iter().any(|entry| {
            entry.name == channel.provider
                && (entry.caid == 0 || channel.caids.contains(&entry.caid))
        })
    }

    pub fn whitelist(&self, radio: bool) -> &[ProviderEntry] {
        &self.lists(radio).whitelist
    }

    pub fn blacklist(&self, radio: bool) -> impl Iterator<Item = ChannelUid> + '_ {
        self.lists(radio).blacklist.iter().copied()
    }

    pub fn set_whitelist(&mut self, radio: bool, entries: Vec<ProviderEntry>) {
        self.lists_mut(radio).whitelist = entries;
    }

    pub fn set_blacklist(&mut self, radio: bool, uids: impl IntoIterator<Item = ChannelUid>) {
        self.lists_mut(radio).blacklist = uids.into_iter().collect();
    }

    fn lists(&self, radio: bool) -> &FilterLists {
        if radio {
            &self.radio
        } else {
            &self.tv
        }
    }

    fn lists_mut(&mut self, radio: bool) -> &mut FilterLists {
        if radio {
            &mut self.radio
        } else {
            &mut self.tv
        }
    }
}
