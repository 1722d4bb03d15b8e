//! Request types and result codes.
//!
//! Numeric values are fixed by the radio side and must not be renumbered.

use std::fmt;

use serde::{Deserialize, Serialize};

// ─── Request Type ────────────────────────────────────────────────────────────

/// Requests the modem core and its subsystem drivers issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum RequestType {
    GetSimStatus = 1,
    EnterSimPin = 2,
    GetCurrentCalls = 9,
    Dial = 10,
    GetImsi = 11,
    Hangup = 12,
    SignalStrength = 19,
    VoiceRegistrationState = 20,
    DataRegistrationState = 21,
    Operator = 22,
    RadioPower = 23,
    SendSms = 25,
    SetupDataCall = 27,
    SimIo = 28,
    SendUssd = 29,
    GetImei = 38,
    BasebandVersion = 51,
}

impl RequestType {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        use RequestType::*;
        Some(match code {
            1 => GetSimStatus,
            2 => EnterSimPin,
            9 => GetCurrentCalls,
            10 => Dial,
            11 => GetImsi,
            12 => Hangup,
            19 => SignalStrength,
            20 => VoiceRegistrationState,
            21 => DataRegistrationState,
            22 => Operator,
            23 => RadioPower,
            25 => SendSms,
            27 => SetupDataCall,
            28 => SimIo,
            29 => SendUssd,
            38 => GetImei,
            51 => BasebandVersion,
            _ => return None,
        })
    }

    /// Wire name used in request traces.
    pub fn name(self) -> &'static str {
        use RequestType::*;
        match self {
            GetSimStatus => "GET_SIM_STATUS",
            EnterSimPin => "ENTER_SIM_PIN",
            GetCurrentCalls => "GET_CURRENT_CALLS",
            Dial => "DIAL",
            GetImsi => "GET_IMSI",
            Hangup => "HANGUP",
            SignalStrength => "SIGNAL_STRENGTH",
            VoiceRegistrationState => "VOICE_REGISTRATION_STATE",
            DataRegistrationState => "DATA_REGISTRATION_STATE",
            Operator => "OPERATOR",
            RadioPower => "RADIO_POWER",
            SendSms => "SEND_SMS",
            SetupDataCall => "SETUP_DATA_CALL",
            SimIo => "SIM_IO",
            SendUssd => "SEND_USSD",
            GetImei => "GET_IMEI",
            BasebandVersion => "BASEBAND_VERSION",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Result Code ─────────────────────────────────────────────────────────────

/// Result code carried by every completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RilErrno {
    Success,
    RadioNotAvailable,
    GenericFailure,
    PasswordIncorrect,
    SimPin2,
    SimPuk2,
    RequestNotSupported,
    Cancelled,
    OpNotAllowedDuringVoiceCall,
    OpNotAllowedBeforeRegToNw,
    SmsSendFailRetry,
    SimAbsent,
    /// A code this crate has no name for; preserved verbatim.
    Other(i32),
}

impl RilErrno {
    pub fn from_code(code: i32) -> Self {
        use RilErrno::*;
        match code {
            0 => Success,
            1 => RadioNotAvailable,
            2 => GenericFailure,
            3 => PasswordIncorrect,
            4 => SimPin2,
            5 => SimPuk2,
            6 => RequestNotSupported,
            7 => Cancelled,
            8 => OpNotAllowedDuringVoiceCall,
            9 => OpNotAllowedBeforeRegToNw,
            10 => SmsSendFailRetry,
            11 => SimAbsent,
            other => Other(other),
        }
    }

    pub fn code(self) -> i32 {
        use RilErrno::*;
        match self {
            Success => 0,
            RadioNotAvailable => 1,
            GenericFailure => 2,
            PasswordIncorrect => 3,
            SimPin2 => 4,
            SimPuk2 => 5,
            RequestNotSupported => 6,
            Cancelled => 7,
            OpNotAllowedDuringVoiceCall => 8,
            OpNotAllowedBeforeRegToNw => 9,
            SmsSendFailRetry => 10,
            SimAbsent => 11,
            Other(code) => code,
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == RilErrno::Success
    }
}

impl fmt::Display for RilErrno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RilErrno::Other(code) => write!(f, "Unknown({code})"),
            known => write!(f, "{known:?}({})", known.code()),
        }
    }
}
