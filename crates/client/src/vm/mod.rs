mod slide_vm;

pub use slide_vm::{Interaction, SlideVm, WAITING_FOR_FACILITATOR, map_slide};
