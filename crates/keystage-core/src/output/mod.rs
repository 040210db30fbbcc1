// Keystage Output Layer
// State of the keys held down on the output

mod state;

pub use state::{OutputDown, OutputState};
