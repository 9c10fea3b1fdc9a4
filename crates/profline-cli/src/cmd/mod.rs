pub mod drain;
pub mod inspect;
pub mod run;
