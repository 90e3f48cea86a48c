pub mod claim;
pub mod payment;
pub mod submission;
pub mod subscription;
pub mod user;
pub mod venue;

pub use claim::*;
pub use payment::*;
pub use submission::*;
pub use subscription::*;
pub use user::*;
pub use venue::*;
