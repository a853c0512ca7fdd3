// Device access
//
// - lock.rs: exclusive, dismounted access with bounded retry
// - mount.rs: mount table matching and dismount
// - detection.rs: minimal probe used by the command line front end

pub mod detection;
pub mod lock;
pub mod mount;

pub use detection::DriveDetector;
pub use lock::{DeviceLock, LockHandle};
