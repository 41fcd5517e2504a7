pub mod dispatcher;
pub mod email;
