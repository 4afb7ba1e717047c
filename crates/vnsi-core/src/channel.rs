//! Channel model as exposed by the backend channel list.

use crate::types::ChannelUid;

/// Video stream type of an H.264 service.
pub const VIDEO_TYPE_H264: u32 = 0x1B;

/// Delivery system a channel is received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Orbital position in tenths of a degree.
    Satellite { position: u16, east: bool },
    Cable,
    Terrestrial,
    Atsc,
    Other,
}

/// One entry of the backend channel list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub uid: ChannelUid,
    /// Position in the channel list as shown to the user.
    pub number: u32,
    pub name: String,
    pub provider: String,
    /// Group separator this channel is listed under, if any.
    pub group: Option<String>,
    /// Conditional-access ids; empty for free-to-air.
    pub caids: Vec<u32>,
    /// `0` means no video (radio).
    pub video_type: u32,
    pub source: Source,
    pub sid: u32,
    pub tid: u32,
    pub nid: u32,
}

impl Channel {
    pub fn is_radio(&self) -> bool {
        self.video_type == 0
    }

    /// Entries below 0x100 are not real CA systems.
    pub fn is_encrypted(&self) -> bool {
        self.caids.iter().any(|&caid| caid >= 0x100)
    }

    pub fn first_caid(&self) -> u32 {
        self.caids.first().copied().unwrap_or(0)
    }

    /// Comma separated hex caids, e.g. `"0x0500,0x1702"`.
    pub fn caids_csv(&self) -> String {
        self.caids
            .iter()
            .map(|caid| format!("0x{:04X}", caid))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Service reference used by clients to look up channel logos.
    ///
    /// Format: `1_0_{type}_{sid}_{tid}_{nid}_{namespace}_0_0_0`, hex fields.
    pub fn picon_ref(&self) -> String {
        let service_type = match self.video_type {
            0 => 2,
            VIDEO_TYPE_H264 => 19,
            _ => 1,
        };

        format!(
            "1_0_{}_{:X}_{:X}_{:X}_{:X}_0_0_0",
            service_type,
            self.sid,
            self.tid,
            self.nid,
            self.namespace()
        )
    }

    fn namespace(&self) -> u32 {
        match self.source {
            Source::Satellite { position, east } => {
                let pos = u32::from(position);
                let pos = if east { pos } else { 3600u32.saturating_sub(pos) };
                pos << 16
            }
            Source::Cable => 0xFFFF_0000,
            Source::Terrestrial => 0xEEEE_0000,
            Source::Atsc => 0xDDDD_0000,
            Source::Other => 0,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_channel(uid: ChannelUid, name: &str, provider: &str) -> Channel {
    Channel {
        uid,
        number: uid,
        name: name.to_string(),
        provider: provider.to_string(),
        group: None,
        caids: Vec::new(),
        video_type: 2,
        source: Source::Satellite {
            position: 192,
            east: true,
        },
        sid: 0x6D66,
        tid: 0x0437,
        nid: 0x0001,
    }
}
