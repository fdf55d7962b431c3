use crate::{
    Result,
    constants::{
        CALLBACK_ACCEPT, CALLBACK_CHANGE_UNIT, CALLBACK_PHOTO, CALLBACK_REJECT, TEXT_BUTTON_ACCEPT,
        TEXT_BUTTON_CHANGE_UNIT, TEXT_BUTTON_PHOTO, TEXT_BUTTON_REJECT,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit (apartment) number announced by a visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitNumber(u32);

impl UnitNumber {
    /// Create a unit number from its numeric value.
    #[must_use]
    pub const fn new(number: u32) -> Self {
        UnitNumber(number)
    }

    /// Get the raw unit number.
    #[must_use]
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for UnitNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses the decimal digits sent by the device or typed by a reviewer.
///
/// Surrounding whitespace is ignored; signs, separators and empty input
/// are rejected.
impl std::str::FromStr for UnitNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidUnitNumber(s.to_string()));
        }
        digits
            .parse::<u32>()
            .map(UnitNumber)
            .map_err(|_| Error::InvalidUnitNumber(s.to_string()))
    }
}

impl From<UnitNumber> for i64 {
    fn from(unit: UnitNumber) -> Self {
        i64::from(unit.0)
    }
}

/// Messaging identity of a reviewer (the chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewerId(i64);

impl ReviewerId {
    #[must_use]
    pub const fn new(id: i64) -> Self {
        ReviewerId(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ReviewerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ReviewerId> for i64 {
    fn from(id: ReviewerId) -> Self {
        id.0
    }
}

/// A reviewer registered against a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: ReviewerId,
    pub unit: UnitNumber,
}

/// Reference to a message previously delivered to a reviewer.
///
/// Needed to strip the decision buttons once a reviewer acted on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub reviewer: ReviewerId,
    pub message_id: i64,
}

impl MessageRef {
    #[must_use]
    pub fn new(reviewer: ReviewerId, message_id: i64) -> Self {
        Self {
            reviewer,
            message_id,
        }
    }
}

/// Decision buttons a reviewer can press on an entry notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerAction {
    /// Ask the device for a fresh camera frame.
    Photo,

    /// Open the door.
    Accept,

    /// Refuse entry.
    Reject,
}

impl ReviewerAction {
    /// All decision actions, in the order they are shown.
    pub const ALL: [ReviewerAction; 3] = [
        ReviewerAction::Photo,
        ReviewerAction::Accept,
        ReviewerAction::Reject,
    ];

    /// Callback data carried by the button.
    #[must_use]
    pub fn callback_data(self) -> &'static str {
        match self {
            ReviewerAction::Photo => CALLBACK_PHOTO,
            ReviewerAction::Accept => CALLBACK_ACCEPT,
            ReviewerAction::Reject => CALLBACK_REJECT,
        }
    }

    /// Button label shown to the reviewer.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReviewerAction::Photo => TEXT_BUTTON_PHOTO,
            ReviewerAction::Accept => TEXT_BUTTON_ACCEPT,
            ReviewerAction::Reject => TEXT_BUTTON_REJECT,
        }
    }
}

impl fmt::Display for ReviewerAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.callback_data())
    }
}

/// Parsed callback data of any button this service renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackData {
    /// One of the entry decision buttons.
    Decision(ReviewerAction),

    /// The "Change unit" menu button.
    ChangeUnit,
}

impl std::str::FromStr for CallbackData {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            CALLBACK_PHOTO => Ok(CallbackData::Decision(ReviewerAction::Photo)),
            CALLBACK_ACCEPT => Ok(CallbackData::Decision(ReviewerAction::Accept)),
            CALLBACK_REJECT => Ok(CallbackData::Decision(ReviewerAction::Reject)),
            CALLBACK_CHANGE_UNIT => Ok(CallbackData::ChangeUnit),
            other => Err(Error::InvalidCallback(other.to_string())),
        }
    }
}

/// A single inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub data: String,
}

/// Row of inline buttons attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Keyboard {
    pub buttons: Vec<Button>,
}

impl Keyboard {
    /// Photo / Accept / Reject buttons attached to entry notifications.
    #[must_use]
    pub fn decision() -> Self {
        Self {
            buttons: ReviewerAction::ALL
                .iter()
                .map(|action| Button {
                    label: action.label().to_string(),
                    data: action.callback_data().to_string(),
                })
                .collect(),
        }
    }

    /// Menu shown to registered reviewers.
    #[must_use]
    pub fn change_unit() -> Self {
        Self {
            buttons: vec![Button {
                label: TEXT_BUTTON_CHANGE_UNIT.to_string(),
                data: CALLBACK_CHANGE_UNIT.to_string(),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}
