pub mod gemini;
pub mod media;
pub mod passport;

pub use passport::{analyze_passport_photo, enhance};
