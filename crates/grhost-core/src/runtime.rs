//! Values exchanged with the game render host over the runtime channel.

/// Macro lifecycle phase of the game process
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeState {
    #[default]
    Initialization,
    Configuration,
    Configured,
    Loading,
    Recovery,
    Replay,
    Pause,
    RenderOnly,
    Running,
    Reconfigure,
    Shutdown,
    Restart,
    Abort,
    Error,
}

impl RuntimeState {
    pub const ALL: [RuntimeState; 14] = [
        RuntimeState::Initialization,
        RuntimeState::Configuration,
        RuntimeState::Configured,
        RuntimeState::Loading,
        RuntimeState::Recovery,
        RuntimeState::Replay,
        RuntimeState::Pause,
        RuntimeState::RenderOnly,
        RuntimeState::Running,
        RuntimeState::Reconfigure,
        RuntimeState::Shutdown,
        RuntimeState::Restart,
        RuntimeState::Abort,
        RuntimeState::Error,
    ];
}

/// Named boolean conditions of the game process, independent of [`RuntimeState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeCondition {
    AllowGameRound,
    AllowSubGameRound,
    AllowReplayResume,
    InLockup,
    InOverlayLockup,
    ServiceRequested,
    ValidatingBillNote,
    AwaitingPlayerSelection,
    PlayTimeExpired,
    CashingOut,
    InPlayerMenu,
    FundsTransferring,
    StartGameRound,
    TimeRemaining,
    DisplayingTimeRemaining,
    Demonstration,
    GamePlaySuspended,
}

impl RuntimeCondition {
    pub const ALL: [RuntimeCondition; 17] = [
        RuntimeCondition::AllowGameRound,
        RuntimeCondition::AllowSubGameRound,
        RuntimeCondition::AllowReplayResume,
        RuntimeCondition::InLockup,
        RuntimeCondition::InOverlayLockup,
        RuntimeCondition::ServiceRequested,
        RuntimeCondition::ValidatingBillNote,
        RuntimeCondition::AwaitingPlayerSelection,
        RuntimeCondition::PlayTimeExpired,
        RuntimeCondition::CashingOut,
        RuntimeCondition::InPlayerMenu,
        RuntimeCondition::FundsTransferring,
        RuntimeCondition::StartGameRound,
        RuntimeCondition::TimeRemaining,
        RuntimeCondition::DisplayingTimeRemaining,
        RuntimeCondition::Demonstration,
        RuntimeCondition::GamePlaySuspended,
    ];
}

/// Which aspect of a physical button an update addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonMask {
    Enabled,
    Lamps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonState {
    Off,
    On,
    Blinking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeType {
    Standard,
    Progressive,
    Bonus,
    LinkedProgressive,
}

/// One central-determinant or local outcome handed to the game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: OutcomeType,
    /// Win amount in millicents
    pub value: u64,
    pub lookup_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JackpotNotice {
    pub pool_name: String,
    pub level_id: u32,
    /// Amount in millicents
    pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReelState {
    Idle,
    Spinning,
    Stopping,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentationOverrideKind {
    PrintingCashoutTicket,
    PrintingCashwinTicket,
    TransferingInCredits,
    TransferingOutCredits,
    JackpotHandpay,
    BonusJackpot,
    CancelledCreditsHandpay,
}

impl PresentationOverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresentationOverrideKind::PrintingCashoutTicket => "PrintingCashoutTicket",
            PresentationOverrideKind::PrintingCashwinTicket => "PrintingCashwinTicket",
            PresentationOverrideKind::TransferingInCredits => "TransferingInCredits",
            PresentationOverrideKind::TransferingOutCredits => "TransferingOutCredits",
            PresentationOverrideKind::JackpotHandpay => "JackpotHandpay",
            PresentationOverrideKind::BonusJackpot => "BonusJackpot",
            PresentationOverrideKind::CancelledCreditsHandpay => "CancelledCreditsHandpay",
        }
    }
}

/// Platform-driven message the game presents in place of its own content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationOverride {
    pub kind: PresentationOverrideKind,
    pub message: String,
}
