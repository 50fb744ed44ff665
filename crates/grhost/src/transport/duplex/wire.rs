//! Zero-based ordinals of the legacy duplex contract

use grhost_core::{
    ButtonMask, ButtonState, MappingError, OutcomeType, PresentationOverrideKind, ReelState,
    RuntimeCondition, RuntimeState,
};

pub fn state_to_wire(state: RuntimeState) -> u32 {
    match state {
        RuntimeState::Initialization => 0,
        RuntimeState::Configuration => 1,
        RuntimeState::Configured => 2,
        RuntimeState::Loading => 3,
        RuntimeState::Recovery => 4,
        RuntimeState::Replay => 5,
        RuntimeState::Pause => 6,
        RuntimeState::RenderOnly => 7,
        RuntimeState::Running => 8,
        RuntimeState::Reconfigure => 9,
        RuntimeState::Shutdown => 10,
        RuntimeState::Restart => 11,
        RuntimeState::Abort => 12,
        RuntimeState::Error => 13,
    }
}

pub fn state_from_wire(value: u32) -> Result<RuntimeState, MappingError> {
    match value {
        0 => Ok(RuntimeState::Initialization),
        1 => Ok(RuntimeState::Configuration),
        2 => Ok(RuntimeState::Configured),
        3 => Ok(RuntimeState::Loading),
        4 => Ok(RuntimeState::Recovery),
        5 => Ok(RuntimeState::Replay),
        6 => Ok(RuntimeState::Pause),
        7 => Ok(RuntimeState::RenderOnly),
        8 => Ok(RuntimeState::Running),
        9 => Ok(RuntimeState::Reconfigure),
        10 => Ok(RuntimeState::Shutdown),
        11 => Ok(RuntimeState::Restart),
        12 => Ok(RuntimeState::Abort),
        13 => Ok(RuntimeState::Error),
        other => Err(MappingError::new("RuntimeState", other)),
    }
}

pub fn condition_to_wire(condition: RuntimeCondition) -> u32 {
    match condition {
        RuntimeCondition::AllowGameRound => 0,
        RuntimeCondition::AllowSubGameRound => 1,
        RuntimeCondition::AllowReplayResume => 2,
        RuntimeCondition::InLockup => 3,
        RuntimeCondition::InOverlayLockup => 4,
        RuntimeCondition::ServiceRequested => 5,
        RuntimeCondition::ValidatingBillNote => 6,
        RuntimeCondition::AwaitingPlayerSelection => 7,
        RuntimeCondition::PlayTimeExpired => 8,
        RuntimeCondition::CashingOut => 9,
        RuntimeCondition::InPlayerMenu => 10,
        RuntimeCondition::FundsTransferring => 11,
        RuntimeCondition::StartGameRound => 12,
        RuntimeCondition::TimeRemaining => 13,
        RuntimeCondition::DisplayingTimeRemaining => 14,
        RuntimeCondition::Demonstration => 15,
        RuntimeCondition::GamePlaySuspended => 16,
    }
}

pub fn button_mask_to_wire(mask: ButtonMask) -> u32 {
    match mask {
        ButtonMask::Enabled => 0,
        ButtonMask::Lamps => 1,
    }
}

pub fn button_state_to_wire(state: ButtonState) -> u32 {
    match state {
        ButtonState::Off => 0,
        ButtonState::On => 1,
        ButtonState::Blinking => 2,
    }
}

pub fn outcome_type_to_wire(kind: OutcomeType) -> u32 {
    match kind {
        OutcomeType::Standard => 0,
        OutcomeType::Progressive => 1,
        OutcomeType::Bonus => 2,
        OutcomeType::LinkedProgressive => 3,
    }
}

pub fn reel_state_to_wire(state: ReelState) -> u32 {
    match state {
        ReelState::Idle => 0,
        ReelState::Spinning => 1,
        ReelState::Stopping => 2,
        ReelState::Faulted => 3,
    }
}

pub fn override_kind_to_wire(kind: PresentationOverrideKind) -> u32 {
    match kind {
        PresentationOverrideKind::PrintingCashoutTicket => 0,
        PresentationOverrideKind::PrintingCashwinTicket => 1,
        PresentationOverrideKind::TransferingInCredits => 2,
        PresentationOverrideKind::TransferingOutCredits => 3,
        PresentationOverrideKind::JackpotHandpay => 4,
        PresentationOverrideKind::BonusJackpot => 5,
        PresentationOverrideKind::CancelledCreditsHandpay => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_state_table_is_dense_and_reversible() {
        let ordinals: Vec<u32> = RuntimeState::ALL.iter().map(|s| state_to_wire(*s)).collect();
        let unique: HashSet<u32> = ordinals.iter().copied().collect();
        assert_eq!(unique.len(), RuntimeState::ALL.len());
        assert_eq!(unique, (0..RuntimeState::ALL.len() as u32).collect());

        for state in RuntimeState::ALL {
            assert_eq!(state_from_wire(state_to_wire(state)), Ok(state));
        }
        assert!(state_from_wire(14).is_err());
    }

    #[test]
    fn test_condition_ordinals_are_unique() {
        let unique: HashSet<u32> = RuntimeCondition::ALL
            .iter()
            .map(|c| condition_to_wire(*c))
            .collect();
        assert_eq!(unique.len(), RuntimeCondition::ALL.len());
    }
}
