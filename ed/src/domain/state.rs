//! Elevator state vocabulary shared by the coordinator and the car peers

use serde::{Deserialize, Serialize};

/// Motion/door state of a car
///
/// A car reports the state it just finished. The coordinator answers with the state to
/// perform next. The same enum serves both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElevatorState {
    Start,
    Idle,
    MovingUp,
    MovingDown,
    Stop,
    OpenDoors,
    CloseDoors,
    ErrorDoorStuck,
    ErrorElevatorStuck,
    Reboot,
    Dead,
}

impl ElevatorState {
    /// Every state, in declaration order
    pub const ALL: [ElevatorState; 11] = [
        Self::Start,
        Self::Idle,
        Self::MovingUp,
        Self::MovingDown,
        Self::Stop,
        Self::OpenDoors,
        Self::CloseDoors,
        Self::ErrorDoorStuck,
        Self::ErrorElevatorStuck,
        Self::Reboot,
        Self::Dead,
    ];

    pub fn is_moving(self) -> bool {
        matches!(self, Self::MovingUp | Self::MovingDown)
    }

    /// Door states are the only ones a stuck door can interrupt
    pub fn is_door(self) -> bool {
        matches!(self, Self::OpenDoors | Self::CloseDoors)
    }

    /// States in which the car is handling a fault or is retired
    pub fn is_fault_handling(self) -> bool {
        matches!(
            self,
            Self::Dead | Self::Reboot | Self::ErrorElevatorStuck | Self::ErrorDoorStuck
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Idle => "IDLE",
            Self::MovingUp => "MOVING_UP",
            Self::MovingDown => "MOVING_DOWN",
            Self::Stop => "STOP",
            Self::OpenDoors => "OPEN_DOORS",
            Self::CloseDoors => "CLOSE_DOORS",
            Self::ErrorDoorStuck => "ERROR_DOOR_STUCK",
            Self::ErrorElevatorStuck => "ERROR_ELEVATOR_STUCK",
            Self::Reboot => "REBOOT",
            Self::Dead => "DEAD",
        }
    }
}

impl std::fmt::Display for ElevatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction a passenger wants to travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Self::Up, Self::Down];

    /// Direction implied by travelling from `origin` to `target`, if they differ
    pub fn between(origin: u32, target: u32) -> Option<Self> {
        match target.cmp(&origin) {
            std::cmp::Ordering::Greater => Some(Self::Up),
            std::cmp::Ordering::Less => Some(Self::Down),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(Self::Up),
            "DOWN" => Ok(Self::Down),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Simulated hardware fault attached to a passenger request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultKind {
    /// Soft fault, recovered by a reboot
    DoorStuck,
    /// Hard fault, the car is retired
    ElevatorStuck,
}

impl FaultKind {
    /// Whether a car commanded into `next` can exhibit this fault
    pub fn compatible_with(self, next: ElevatorState) -> bool {
        match self {
            Self::ElevatorStuck => matches!(
                next,
                ElevatorState::MovingUp | ElevatorState::MovingDown | ElevatorState::Stop
            ),
            Self::DoorStuck => next.is_door(),
        }
    }

    /// Error state a car reports when this fault fires
    pub fn error_state(self) -> ElevatorState {
        match self {
            Self::DoorStuck => ElevatorState::ErrorDoorStuck,
            Self::ElevatorStuck => ElevatorState::ErrorElevatorStuck,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::DoorStuck => "DOOR_STUCK",
            Self::ElevatorStuck => "ELEVATOR_STUCK",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
