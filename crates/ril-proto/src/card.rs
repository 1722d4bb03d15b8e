//! Card status response (`GET_SIM_STATUS`).
//!
//! ```text
//! int32 card_state
//! int32 universal_pin_state
//! int32 gsm_umts_subscription_app_index
//! int32 cdma_subscription_app_index
//! int32 ims_subscription_app_index
//! int32 num_applications            (≤ 8)
//! num_applications × {
//!     int32 app_type, int32 app_state, int32 perso_substate,
//!     string aid, string app_label,
//!     int32 pin1_replaced, int32 pin1, int32 pin2
//! }
//! ```

use bytes::Bytes;
use serde::Serialize;

use crate::parcel::{Parcel, ParcelError, ParcelReader};

/// Maximum number of application records in a card status response.
pub const MAX_CARD_APPS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CardState {
    Absent,
    Present,
    Error,
    Unknown(i32),
}

impl CardState {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => CardState::Absent,
            1 => CardState::Present,
            2 => CardState::Error,
            other => CardState::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CardState::Absent => 0,
            CardState::Present => 1,
            CardState::Error => 2,
            CardState::Unknown(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinState {
    Unknown,
    EnabledNotVerified,
    EnabledVerified,
    Disabled,
    EnabledBlocked,
    EnabledPermBlocked,
    Other(i32),
}

impl PinState {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => PinState::Unknown,
            1 => PinState::EnabledNotVerified,
            2 => PinState::EnabledVerified,
            3 => PinState::Disabled,
            4 => PinState::EnabledBlocked,
            5 => PinState::EnabledPermBlocked,
            other => PinState::Other(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            PinState::Unknown => 0,
            PinState::EnabledNotVerified => 1,
            PinState::EnabledVerified => 2,
            PinState::Disabled => 3,
            PinState::EnabledBlocked => 4,
            PinState::EnabledPermBlocked => 5,
            PinState::Other(code) => code,
        }
    }
}

/// One application record on the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppStatus {
    pub app_type: i32,
    pub app_state: i32,
    pub perso_substate: i32,
    pub aid: Option<String>,
    pub label: Option<String>,
    pub pin1_replaced: i32,
    pub pin1: PinState,
    pub pin2: PinState,
}

/// Parsed card status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardStatus {
    pub card_state: CardState,
    pub universal_pin_state: PinState,
    pub gsm_umts_index: i32,
    pub cdma_index: i32,
    pub ims_index: i32,
    pub apps: Vec<AppStatus>,
}

impl CardStatus {
    /// A card with no application records.
    pub fn with_state(card_state: CardState) -> Self {
        CardStatus {
            card_state,
            universal_pin_state: PinState::Unknown,
            gsm_umts_index: -1,
            cdma_index: -1,
            ims_index: -1,
            apps: Vec::new(),
        }
    }

    /// Presence only looks at the card state; PIN and lock state are ignored.
    pub fn is_present(&self) -> bool {
        self.card_state == CardState::Present
    }

    pub fn parse(payload: Bytes) -> Result<Self, ParcelError> {
        let mut r = ParcelReader::new(payload);
        let card_state = CardState::from_code(r.read_i32()?);
        let universal_pin_state = PinState::from_code(r.read_i32()?);
        let gsm_umts_index = r.read_i32()?;
        let cdma_index = r.read_i32()?;
        let ims_index = r.read_i32()?;

        let count = r.read_i32()?;
        if count < 0 {
            return Err(ParcelError::InvalidLength(count));
        }
        if count as usize > MAX_CARD_APPS {
            return Err(ParcelError::TooManyApps {
                count,
                max: MAX_CARD_APPS,
            });
        }

        let mut apps = Vec::with_capacity(count as usize);
        for _ in 0..count {
            apps.push(AppStatus {
                app_type: r.read_i32()?,
                app_state: r.read_i32()?,
                perso_substate: r.read_i32()?,
                aid: r.read_string()?,
                label: r.read_string()?,
                pin1_replaced: r.read_i32()?,
                pin1: PinState::from_code(r.read_i32()?),
                pin2: PinState::from_code(r.read_i32()?),
            });
        }

        Ok(CardStatus {
            card_state,
            universal_pin_state,
            gsm_umts_index,
            cdma_index,
            ims_index,
            apps,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut p = Parcel::new();
        p.write_i32(self.card_state.code())
            .write_i32(self.universal_pin_state.code())
            .write_i32(self.gsm_umts_index)
            .write_i32(self.cdma_index)
            .write_i32(self.ims_index)
            .write_i32(self.apps.len() as i32);
        for app in &self.apps {
            p.write_i32(app.app_type)
                .write_i32(app.app_state)
                .write_i32(app.perso_substate)
                .write_string(app.aid.as_deref())
                .write_string(app.label.as_deref())
                .write_i32(app.pin1_replaced)
                .write_i32(app.pin1.code())
                .write_i32(app.pin2.code());
        }
        p.freeze()
    }
}
