//! Channel groups derived from the backend channel list.
//!
//! Groups are never stored on their own: `rebuild` recomputes both maps
//! from the current channel list, and membership is always looked up
//! against a channel list passed in by the caller.
//!
//! - manual groups: the channel list's group separators
//! - automatic groups: one group per provider

use std::collections::BTreeMap;

use crate::channel::Channel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelGroup {
    pub name: String,
    pub automatic: bool,
    pub radio: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelGroups {
    tv: BTreeMap<String, ChannelGroup>,
    radio: BTreeMap<String, ChannelGroup>,
    automatic: bool,
}

impl ChannelGroups {
    pub fn new() -> Self {
        ChannelGroups::default()
    }

    /// Recompute both maps from `channels`.
    pub fn rebuild<'a>(&mut self, channels: impl IntoIterator<Item = &'a Channel>, automatic: bool) {
        self.tv.clear();
        self.radio.clear();
        self.automatic = automatic;

        for channel in channels {
            let Some(name) = group_name(channel, automatic) else {
                continue;
            };

            let radio = channel.is_radio();
            let map = if radio { &mut self.radio } else { &mut self.tv };
            map.entry(name.to_string()).or_insert_with(|| ChannelGroup {
                name: name.to_string(),
                automatic,
                radio,
            });
        }
    }

    /// Number of TV plus radio groups.
    pub fn count(&self) -> usize {
        self.tv.len() + self.radio.len()
    }

    pub fn list(&self, radio: bool) -> impl Iterator<Item = &ChannelGroup> {
        self.map(radio).values()
    }

    /// Channels of `channels` belonging to group `name`, in list order.
    ///
    /// Returns `None` when the group is unknown.
    pub fn members<'a>(
        &self,
        name: &str,
        radio: bool,
        channels: &'a [Channel],
    ) -> Option<Vec<&'a Channel>> {
        let group = self.map(radio).get(name)?;

        Some(
            channels
                .iter()
                .filter(|c| c.is_radio() == radio)
                .filter(|c| group_name(c, group.automatic) == Some(name))
                .collect(),
        )
    }

    fn map(&self, radio: bool) -> &BTreeMap<String, ChannelGroup> {
        if radio {
            &self.radio
        } else {
            &self.tv
        }
    }
}

fn group_name(channel: &Channel, automatic: bool) -> Option<&str> {
    let name = if automatic {
        Some(channel.provider.as_str())
    } else {
        channel.group.as_deref()
    };
    name.filter(|n| !n.is_empty())
}
