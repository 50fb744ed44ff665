//! Ordinals used on the rpc channel. Zero is reserved for "unspecified".

use grhost_core::{
    ButtonMask, ButtonState, MappingError, OutcomeType, ReelState, RuntimeCondition, RuntimeState,
};

pub fn state_to_wire(state: RuntimeState) -> u32 {
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

pub fn state_from_wire(value: u32) -> Result<RuntimeState, MappingError> {
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

pub fn condition_to_wire(condition: RuntimeCondition) -> u32 {
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

pub fn condition_from_wire(value: u32) -> Result<RuntimeCondition, MappingError> {
    match value {
        1 => Ok(RuntimeCondition::AllowGameRound),
        2 => Ok(RuntimeCondition::AllowSubGameRound),
        3 => Ok(RuntimeCondition::AllowReplayResume),
        4 => Ok(RuntimeCondition::InLockup),
        5 => Ok(RuntimeCondition::InOverlayLockup),
        6 => Ok(RuntimeCondition::ServiceRequested),
        7 => Ok(RuntimeCondition::ValidatingBillNote),
        8 => Ok(RuntimeCondition::AwaitingPlayerSelection),
        9 => Ok(RuntimeCondition::PlayTimeExpired),
        10 => Ok(RuntimeCondition::CashingOut),
        11 => Ok(RuntimeCondition::InPlayerMenu),
        12 => Ok(RuntimeCondition::FundsTransferring),
        13 => Ok(RuntimeCondition::StartGameRound),
        14 => Ok(RuntimeCondition::TimeRemaining),
        15 => Ok(RuntimeCondition::DisplayingTimeRemaining),
        16 => Ok(RuntimeCondition::Demonstration),
        17 => Ok(RuntimeCondition::GamePlaySuspended),
        other => Err(MappingError::new("RuntimeCondition", other)),
    }
}

pub fn button_mask_to_wire(mask: ButtonMask) -> u32 {
    match mask {
        ButtonMask::Enabled => 1,
        ButtonMask::Lamps => 2,
    }
}

pub fn button_state_to_wire(state: ButtonState) -> u32 {
    match state {
        ButtonState::Off => 1,
        ButtonState::On => 2,
        ButtonState::Blinking => 3,
    }
}

pub fn outcome_type_to_wire(kind: OutcomeType) -> u32 {
    match kind {
        OutcomeType::Standard => 1,
        OutcomeType::Progressive => 2,
        OutcomeType::Bonus => 3,
        OutcomeType::LinkedProgressive => 4,
    }
}

pub fn reel_state_to_wire(state: ReelState) -> u32 {
    match state {
        ReelState::Idle => 1,
        ReelState::Spinning => 2,
        ReelState::Stopping => 3,
        ReelState::Faulted => 4,
    }
}
