pub mod biodrying;
pub mod health;
