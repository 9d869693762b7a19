pub mod events;
pub mod offer;
pub mod presence;
pub mod session;
pub mod wire;
