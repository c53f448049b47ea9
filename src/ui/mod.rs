pub mod icons;
pub mod status;

pub use status::{
    render_checkpoint, render_error, render_grant, render_history, render_log, render_review,
    render_status, render_waves, state_icon, styled_state,
};
