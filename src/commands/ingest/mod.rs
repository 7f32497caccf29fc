const DB_SCHEMA_VERSION: &str = "1.0.0";

mod db_setup;
mod run;
mod selection;
mod store;

pub use db_setup::count_rows;
pub use run::run;
