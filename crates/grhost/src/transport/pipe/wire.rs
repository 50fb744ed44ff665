//! Opcodes, byte codes and payload layout of the stub protocol

use grhost_core::{
    ButtonMask, ButtonState, MappingError, OutcomeType, PresentationOverrideKind, ReelState,
    RuntimeCondition, RuntimeState,
};
use tokio_util::bytes::{BufMut, Bytes, BytesMut};

/// Set on the opcode of every response
pub const RESPONSE_BIT: u16 = 0x8000;

/// Status byte leading every response payload
pub const STATUS_OK: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    UpdateState = 1,
    GetState = 2,
    UpdateFlag = 3,
    GetFlag = 4,
    UpdateButtonState = 5,
    UpdateVolume = 6,
    UpdateBalance = 7,
    UpdatePlatformMessage = 8,
    UpdateParameters = 9,
    UpdateOutcomes = 10,
    JackpotNotification = 11,
    UpdateJackpotValues = 12,
    UpdateReelState = 13,
    ReelsStopped = 14,
    PresentOverridden = 15,
    Shutdown = 16,
}

impl Opcode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn response_code(self) -> u16 {
        self.code() | RESPONSE_BIT
    }
}

pub fn state_to_wire(state: RuntimeState) -> u8 {
    match state {
        RuntimeState::Initialization => 1,
        RuntimeState::Configuration => 2,
        RuntimeState::Configured => 3,
        RuntimeState::Loading => 4,
        RuntimeState::Recovery => 5,
        RuntimeState::Replay => 6,
        RuntimeState::Pause => 7,
        RuntimeState::RenderOnly => 8,
        RuntimeState::Running => 9,
        RuntimeState::Reconfigure => 10,
        RuntimeState::Shutdown => 11,
        RuntimeState::Restart => 12,
        RuntimeState::Abort => 13,
        RuntimeState::Error => 14,
    }
}

pub fn state_from_wire(value: u8) -> Result<RuntimeState, MappingError> {
    match value {
        1 => Ok(RuntimeState::Initialization),
        2 => Ok(RuntimeState::Configuration),
        3 => Ok(RuntimeState::Configured),
        4 => Ok(RuntimeState::Loading),
        5 => Ok(RuntimeState::Recovery),
        6 => Ok(RuntimeState::Replay),
        7 => Ok(RuntimeState::Pause),
        8 => Ok(RuntimeState::RenderOnly),
        9 => Ok(RuntimeState::Running),
        10 => Ok(RuntimeState::Reconfigure),
        11 => Ok(RuntimeState::Shutdown),
        12 => Ok(RuntimeState::Restart),
        13 => Ok(RuntimeState::Abort),
        14 => Ok(RuntimeState::Error),
        other => Err(MappingError::new("RuntimeState", other)),
    }
}

pub fn condition_to_wire(condition: RuntimeCondition) -> u8 {
    match condition {
        RuntimeCondition::AllowGameRound => 1,
        RuntimeCondition::AllowSubGameRound => 2,
        RuntimeCondition::AllowReplayResume => 3,
        RuntimeCondition::InLockup => 4,
        RuntimeCondition::InOverlayLockup => 5,
        RuntimeCondition::ServiceRequested => 6,
        RuntimeCondition::ValidatingBillNote => 7,
        RuntimeCondition::AwaitingPlayerSelection => 8,
        RuntimeCondition::PlayTimeExpired => 9,
        RuntimeCondition::CashingOut => 10,
        RuntimeCondition::InPlayerMenu => 11,
        RuntimeCondition::FundsTransferring => 12,
        RuntimeCondition::StartGameRound => 13,
        RuntimeCondition::TimeRemaining => 14,
        RuntimeCondition::DisplayingTimeRemaining => 15,
        RuntimeCondition::Demonstration => 16,
        RuntimeCondition::GamePlaySuspended => 17,
    }
}

pub fn button_mask_to_wire(mask: ButtonMask) -> u8 {
    match mask {
        ButtonMask::Enabled => 1,
        ButtonMask::Lamps => 2,
    }
}

pub fn button_state_to_wire(state: ButtonState) -> u8 {
    match state {
        ButtonState::Off => 0,
        ButtonState::On => 1,
        ButtonState::Blinking => 2,
    }
}

pub fn outcome_type_to_wire(kind: OutcomeType) -> u8 {
    match kind {
        OutcomeType::Standard => 1,
        OutcomeType::Progressive => 2,
        OutcomeType::Bonus => 3,
        OutcomeType::LinkedProgressive => 4,
    }
}

pub fn reel_state_to_wire(state: ReelState) -> u8 {
    match state {
        ReelState::Idle => 1,
        ReelState::Spinning => 2,
        ReelState::Stopping => 3,
        ReelState::Faulted => 4,
    }
}

pub fn override_kind_to_wire(kind: PresentationOverrideKind) -> u8 {
    match kind {
        PresentationOverrideKind::PrintingCashoutTicket => 1,
        PresentationOverrideKind::PrintingCashwinTicket => 2,
        PresentationOverrideKind::TransferingInCredits => 3,
        PresentationOverrideKind::TransferingOutCredits => 4,
        PresentationOverrideKind::JackpotHandpay => 5,
        PresentationOverrideKind::BonusJackpot => 6,
        PresentationOverrideKind::CancelledCreditsHandpay => 7,
    }
}

/// Little-endian payload builder. Strings and collections carry a u32 prefix.
#[derive(Default)]
pub struct Payload(BytesMut);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.0.put_u8(value);
        self
    }

    pub fn bool(self, value: bool) -> Self {
        self.u8(u8::from(value))
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.0.put_u32_le(value);
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.0.put_u64_le(value);
        self
    }

    pub fn f32(mut self, value: f32) -> Self {
        self.0.put_f32_le(value);
        self
    }

    pub fn str(mut self, value: &str) -> Self {
        self.0.put_u32_le(value.len() as u32);
        self.0.put_slice(value.as_bytes());
        self
    }

    pub fn count(self, len: usize) -> Self {
        self.u32(len as u32)
    }

    pub fn finish(self) -> Bytes {
        self.0.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_state_codes_round_trip() {
        let codes: HashSet<u8> = RuntimeState::ALL.iter().map(|s| state_to_wire(*s)).collect();
        assert_eq!(codes.len(), RuntimeState::ALL.len());
        for state in RuntimeState::ALL {
            assert_eq!(state_from_wire(state_to_wire(state)), Ok(state));
        }
        assert!(state_from_wire(0).is_err());
        assert!(state_from_wire(200).is_err());
    }

    #[test]
    fn test_condition_codes_are_unique() {
        let codes: HashSet<u8> = RuntimeCondition::ALL
            .iter()
            .map(|c| condition_to_wire(*c))
            .collect();
        assert_eq!(codes.len(), RuntimeCondition::ALL.len());
    }

    #[test]
    fn test_payload_layout() {
        let bytes = Payload::new().u8(9).str("hi").bool(true).finish();
        assert_eq!(&bytes[..], &[9, 2, 0, 0, 0, b'h', b'i', 1]);
        assert_eq!(Opcode::GetFlag.response_code(), 0x8004);
    }
}
