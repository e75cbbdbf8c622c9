pub mod epic;
pub mod feature;
pub mod history;
pub mod init;
pub mod migrate;
pub mod story;
pub mod validate;
