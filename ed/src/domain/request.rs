//! Coordinator-side record of one passenger's travel intent

use serde::{Deserialize, Serialize};

use super::signal::{FloorRequest, RequestFault};
use super::state::{Direction, FaultKind};
use super::{CarId, Floor, RequestId};

/// A passenger request as tracked on the Master Sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RequestId,
    pub origin: Floor,
    pub target: Floor,
    pub direction: Direction,
    pub fault: Option<RequestFault>,
    /// Car serving this request, `None` while awaiting assignment
    pub car_id: Option<CarId>,
    pub picked_up: bool,
    pub completed: bool,
}

impl Request {
    pub fn new(id: RequestId, floor_request: &FloorRequest) -> Self {
        Self {
            id,
            origin: floor_request.origin_floor,
            target: floor_request.target_floor,
            direction: floor_request.direction,
            fault: floor_request.fault,
            car_id: None,
            picked_up: false,
            completed: false,
        }
    }

    /// Floor the serving car must visit next for this request
    ///
    /// The origin until the passenger boards, the target afterwards, nothing once complete.
    pub fn pending_stop(&self) -> Option<Floor> {
        if self.completed {
            None
        } else if self.picked_up {
            Some(self.target)
        } else {
            Some(self.origin)
        }
    }

    pub fn fault_kind(&self) -> Option<FaultKind> {
        self.fault.map(|f| f.kind)
    }

    /// The fault kind, if one is attached and has not fired yet
    pub fn unhandled_fault(&self) -> Option<FaultKind> {
        self.fault.filter(|f| !f.handled).map(|f| f.kind)
    }

    /// Mark an attached fault of `kind` as handled. Returns true if the flag flipped.
    pub fn mark_fault_handled(&mut self, kind: FaultKind) -> bool {
        match self.fault.as_mut() {
            Some(fault) if fault.kind == kind && !fault.handled => {
                fault.handled = true;
                true
            }
            _ => false,
        }
    }
}
