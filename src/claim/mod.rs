pub mod codes;
pub mod contact;
pub mod events;
pub mod model;
pub mod transition;
pub mod verification;
pub mod window;
