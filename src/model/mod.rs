pub use follow::*;
pub use song::*;
pub use story::*;
pub use timestamp::*;
pub use user::*;
pub use view::*;

mod follow;
mod song;
mod story;
mod timestamp;
mod user;
mod view;
