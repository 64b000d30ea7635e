pub mod agent;
pub mod checkpoint;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod routing;
pub mod state;
pub mod weather;
