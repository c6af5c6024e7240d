//! Frame-level handling of the `data:<json>\n\n` event stream

mod assembler;
mod classifier;
mod emitter;
mod event;

pub use assembler::{FrameAssembler, FRAME_SEPARATOR};
pub use classifier::{classify, DATA_PREFIX};
pub use emitter::OutputEmitter;
pub use event::{ContentEvent, Event};
