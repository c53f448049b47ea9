//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                        |
//! |------------|---------------------------------------------------------|
//! | `project`  | `Init`, `Define`, `AddPhase`, `AddDependency`           |
//! | `phase`    | `Status`, `Plan`, `History`                             |
//! | `session`  | `Assign`, `Checkpoint`, `Handoff`, `Complete`           |
//! | `review`   | `Review`, `Reverify`, `Advance`, `Reopen`, `Abort`      |
//! | `config`   | `Config`                                                |

pub mod config;
pub mod phase;
pub mod project;
pub mod review;
pub mod session;

pub use config::cmd_config;
pub use phase::{cmd_history, cmd_plan, cmd_status};
pub use project::{cmd_add_dependency, cmd_add_phase, cmd_define, cmd_init};
pub use review::{cmd_abort, cmd_advance, cmd_reopen, cmd_review, cmd_reverify};
pub use session::{cmd_assign, cmd_checkpoint, cmd_complete, cmd_handoff};
