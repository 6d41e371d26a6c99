//! Core trait definitions

mod engine;
mod terminal;

pub use engine::{
    exit_channel, AttachOptions, Attached, ExitNotification, ExitReporter, ExitSubscription,
    RemoteEngine, WaitCondition,
};
pub use terminal::LocalTerminal;
