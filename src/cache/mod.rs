pub mod clock;
pub mod meta_cache;

pub use clock::{Clock, FakeClock, SystemClock};
pub use meta_cache::MetaCache;
