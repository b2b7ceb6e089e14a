mod common;
mod navis;
mod provor;
pub mod schema;

pub use common::{FieldRule, HexField};
pub use navis::NavisDecoder;
pub use provor::ProvorDecoder;
pub use schema::NavisLayout;
