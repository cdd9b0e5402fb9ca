pub mod category;
pub mod history;
pub mod numbering;
pub mod record;
pub mod time_serde;
