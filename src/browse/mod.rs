//! Interactive browsing: the visible tree, row positions over it, and the
//! viewport controller that paints it.

mod node;
mod pos;
mod view;

pub use node::{NodeId, Tree};
pub use pos::RowPos;
pub use view::Browser;
