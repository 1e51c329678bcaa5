//! Types shared by the store and the API layers.

mod id;
pub mod inputs;
mod table;

pub use id::{parse_id, InvalidId};
pub use inputs::{normalize_email, NewDog, NewDoggyDate, NewUser};
pub use table::{Table, UnknownTable};
