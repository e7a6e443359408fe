//! Defines the commands that change the state of the drivetrain and the table that maps operator
//! buttons to those commands.
//!
//! Commands are not applied when they are issued. They are queued on a channel and the
//! [crate::drive_elements::drive_coordinator::DriveCoordinator] drains the channel at the start of
//! every tick, so only the coordinator ever writes its own state.

use std::{
    fmt::Display,
    sync::atomic::{AtomicUsize, Ordering},
};

use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{geometry::Pose, Error};

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;

/// The GoalId counter value for the 'NONE' ID.
static NONE_GOAL_ID: usize = 0;

/// Atomic counter for GoalId instances
/// The counter starts at 1 because 0 is reserved for the 'NONE' ID.
static GOAL_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Defines a unique ID for a navigation goal.
///
/// - Can be copied safely
/// - Can be created safely across many threads
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct GoalId {
    /// The internal value that forms the actual ID.
    id: usize,
}

impl GoalId {
    /// Returns a value indicating if the given ID is the [GoalId::none()] ID.
    pub fn is_none(&self) -> bool {
        self.id == NONE_GOAL_ID
    }

    /// Create a new ID in a thread safe manner.
    pub fn new() -> Self {
        Self {
            id: GOAL_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
        }
    }

    /// Returns the GoalId that doesn't belong to any goal.
    pub fn none() -> Self {
        Self { id: NONE_GOAL_ID }
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::none()
    }
}

impl Display for GoalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GoalId [{}]", self.id)
    }
}

/// Defines the operations that can be requested from the drivetrain between ticks.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum DriveCommand {
    /// Start navigating to the given field pose. Replaces any active goal.
    GoToPose {
        /// The pose to drive to
        target: Pose,
    },

    /// Drop the active navigation goal and return to operator control.
    CancelNavigation,

    /// Switch traction control on when it is off and off when it is on.
    ToggleTractionControl,

    /// Switch traction control on or off.
    SetTractionControl(bool),

    /// Replace the odometry pose estimate.
    ResetOdometry {
        /// The new pose estimate
        pose: Pose,
    },

    /// Switch between field-centric and robot-centric operator control.
    ToggleCentricity,
}

/// Identifies a button on the operator controller.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Button {
    /// The A face button
    A,
    /// The B face button
    B,
    /// The X face button
    X,
    /// The Y face button
    Y,
    /// The start button
    Start,
    /// The back button
    Back,
    /// The left bumper
    LeftBumper,
    /// The right bumper
    RightBumper,
    /// Up on the directional pad
    PovUp,
    /// Down on the directional pad
    PovDown,
    /// Left on the directional pad
    PovLeft,
    /// Right on the directional pad
    PovRight,
}

/// Defines when a binding issues its command.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Trigger {
    /// Issue the command once when the button is pressed.
    OnPress,

    /// Issue the command when the button is pressed. A navigation command is cancelled again
    /// when the button is released, unless another command took over in the meantime.
    WhileHeld,
}

/// Describes a change in the state of a button.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ButtonEdge {
    /// The button went down.
    Pressed,
    /// The button went up.
    Released,
}

/// Maps a button and a trigger to a command.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Binding {
    /// The button that issues the command
    pub button: Button,
    /// When the command is issued
    pub trigger: Trigger,
    /// The command to issue
    pub command: DriveCommand,
}

impl Binding {
    /// Creates a new [Binding].
    pub fn new(button: Button, trigger: Trigger, command: DriveCommand) -> Self {
        Self {
            button,
            trigger,
            command,
        }
    }
}

/// Creates the channel on which drive commands are queued.
pub fn command_channel() -> (Sender<DriveCommand>, Receiver<DriveCommand>) {
    crossbeam_channel::unbounded()
}

/// Returns the default operator bindings.
///
/// * Start toggles traction control.
/// * A drives to the amp pose while held.
/// * B drives to the source pose while held.
/// * Left on the directional pad resets the odometry to the origin.
pub fn default_bindings(amp: Pose, source: Pose) -> Vec<Binding> {
    vec![
        Binding::new(
            Button::Start,
            Trigger::OnPress,
            DriveCommand::ToggleTractionControl,
        ),
        Binding::new(
            Button::A,
            Trigger::WhileHeld,
            DriveCommand::GoToPose { target: amp },
        ),
        Binding::new(
            Button::B,
            Trigger::WhileHeld,
            DriveCommand::GoToPose { target: source },
        ),
        Binding::new(
            Button::PovLeft,
            Trigger::OnPress,
            DriveCommand::ResetOdometry {
                pose: Pose::origin(),
            },
        ),
    ]
}

/// Translates button edges into queued [DriveCommand]s.
pub struct ButtonBindings {
    /// The binding table.
    bindings: Vec<Binding>,

    /// The sending side of the command channel.
    sender: Sender<DriveCommand>,

    /// The held button whose navigation command is the most recently issued one.
    held_navigation: Option<Button>,
}

impl ButtonBindings {
    /// Returns the binding table.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Queues the commands bound to the given button edge.
    ///
    /// Returns the number of commands that were queued.
    ///
    /// ## Errors
    ///
    /// * [Error::CommandQueueDisconnected] - Returned when the receiving side of the command
    ///   channel has been dropped.
    pub fn handle(&mut self, button: Button, edge: ButtonEdge) -> Result<usize, Error> {
        let mut queued = Vec::new();
        match edge {
            ButtonEdge::Pressed => {
                for binding in self.bindings.iter().filter(|b| b.button == button) {
                    queued.push(binding.command);
                    if matches!(binding.command, DriveCommand::GoToPose { .. }) {
                        self.held_navigation = match binding.trigger {
                            Trigger::WhileHeld => Some(button),
                            Trigger::OnPress => None,
                        };
                    }
                }
            }
            ButtonEdge::Released => {
                if self.held_navigation == Some(button) {
                    self.held_navigation = None;
                    queued.push(DriveCommand::CancelNavigation);
                }
            }
        }

        for command in queued.iter() {
            debug!(?button, ?edge, ?command, "Queueing drive command");
            self.sender
                .send(*command)
                .map_err(|_| Error::CommandQueueDisconnected)?;
        }

        Ok(queued.len())
    }

    /// Creates a new [ButtonBindings].
    ///
    /// ## Parameters
    ///
    /// * 'bindings' - The binding table. A button may be bound more than once.
    /// * 'sender' - The sending side of the command channel
    pub fn new(bindings: Vec<Binding>, sender: Sender<DriveCommand>) -> Self {
        Self {
            bindings,
            sender,
            held_navigation: None,
        }
    }
}
