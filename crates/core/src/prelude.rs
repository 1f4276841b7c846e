pub use std::fmt::{Debug, Display};
pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;

pub use tracing::{debug, error, info, trace, warn};

pub use crate::strng;
pub use crate::strng::Strng;
