pub mod utils;

mod materialize;
mod service;
