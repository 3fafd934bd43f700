pub mod fit;
pub mod inspect;
pub mod run;
