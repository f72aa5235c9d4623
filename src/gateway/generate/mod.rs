mod handler;
mod prompt;
mod response;
mod types;

pub use handler::handle_generate;
pub(crate) use handler::respond;
