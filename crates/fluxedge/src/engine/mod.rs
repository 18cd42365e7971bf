pub mod announcer;
pub mod responder;
pub mod runner;

pub use announcer::{build_announcement, AnnounceOutcome, Announcer, AnnouncerStats};
pub use responder::{classify_and_reply, reply_in_place, Verdict};
pub use runner::{EdgeEngine, EngineStats};
