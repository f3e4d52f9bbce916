pub mod generate;
pub mod import;
pub mod init_db;
pub mod status;

mod run;
