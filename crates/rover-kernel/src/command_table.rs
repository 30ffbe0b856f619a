//! [`CommandTable`] – declarative command → actuation mapping.
//!
//! The table is a `const` array indexed by the command's wire code.  Adding a
//! command means adding a [`CommandId`] variant and one row here; there is no
//! branching code to keep in sync.

use rover_types::{CommandId, DriveState, MotorState};

/// What a recognised command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Drive both motors to the given states.
    Drive(DriveState),
    /// Power the host off.  Motors keep their last state.
    Shutdown,
}

const STOP: MotorState = MotorState::Stopped;
const FWD: MotorState = MotorState::DrivingForward;
const BACK: MotorState = MotorState::DrivingBackward;

const fn drive(left: MotorState, right: MotorState) -> Action {
    Action::Drive(DriveState::new(left, right))
}

/// Fixed mapping from every [`CommandId`] to its [`Action`].
#[derive(Debug)]
pub struct CommandTable {
    rows: [(CommandId, Action); CommandId::ALL.len()],
}

/// The vehicle's command table.
pub static COMMAND_TABLE: CommandTable = CommandTable {
    rows: [
        (CommandId::Stop, drive(STOP, STOP)),
        (CommandId::Forward, drive(FWD, FWD)),
        (CommandId::TurnLeft, drive(STOP, FWD)),
        (CommandId::TurnRight, drive(FWD, STOP)),
        (CommandId::LeftBackward, drive(STOP, BACK)),
        (CommandId::RightBackward, drive(BACK, STOP)),
        (CommandId::Backward, drive(BACK, BACK)),
        (CommandId::PivotLeft, drive(FWD, BACK)),
        (CommandId::PivotRight, drive(BACK, FWD)),
        (CommandId::Shutdown, Action::Shutdown),
    ],
};

impl CommandTable {
    /// Look up the action for `id`.  Total over [`CommandId`].
    pub fn lookup(&self, id: CommandId) -> Action {
        let (row_id, action) = self.rows[usize::from(id.code())];
        debug_assert_eq!(row_id, id, "command table rows out of order");
        action
    }

    /// All rows in wire-code order.
    pub fn rows(&self) -> impl Iterator<Item = (CommandId, Action)> + '_ {
        self.rows.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rows_are_indexed_by_wire_code() {
        for (index, (id, _)) in COMMAND_TABLE.rows().enumerate() {
            assert_eq!(usize::from(id.code()), index, "{id} is in the wrong row");
        }
    }

    #[test]
    fn every_command_has_an_action() {
        for id in CommandId::ALL {
            let action = COMMAND_TABLE.lookup(id);
            assert_eq!(action == Action::Shutdown, id.is_shutdown(), "{id}");
        }
    }

    #[test]
    fn drive_states_are_distinct() {
        let states: Vec<DriveState> = COMMAND_TABLE
            .rows()
            .filter_map(|(_, action)| match action {
                Action::Drive(state) => Some(state),
                Action::Shutdown => None,
            })
            .collect();
        let unique: HashSet<DriveState> = states.iter().copied().collect();
        assert_eq!(states.len(), 9);
        assert_eq!(unique.len(), states.len());
    }

    #[test]
    fn turning_keeps_the_inner_wheel_still() {
        assert_eq!(COMMAND_TABLE.lookup(CommandId::TurnLeft), drive(STOP, FWD));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::TurnRight), drive(FWD, STOP));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::LeftBackward), drive(STOP, BACK));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::RightBackward), drive(BACK, STOP));
    }

    #[test]
    fn straight_and_pivot_rows() {
        assert_eq!(COMMAND_TABLE.lookup(CommandId::Stop), drive(STOP, STOP));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::Forward), drive(FWD, FWD));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::Backward), drive(BACK, BACK));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::PivotLeft), drive(FWD, BACK));
        assert_eq!(COMMAND_TABLE.lookup(CommandId::PivotRight), drive(BACK, FWD));
    }
}
