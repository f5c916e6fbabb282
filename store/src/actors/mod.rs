pub mod store;

pub use store::{StoreActor, StoreArguments, StoreMsg};
