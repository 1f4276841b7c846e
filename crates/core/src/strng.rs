use std::fmt::{Error, Write};
use std::ops::Deref;

use arcstr::ArcStr;
use prometheus_client::encoding::{EncodeLabelValue, LabelValueEncoder};

/// 'Strng' provides a string type that has better properties for our use case:
/// * Cheap cloning (ref counting)
/// * Efficient storage (8 bytes vs 24 bytes)
/// * Immutable
///
/// This is mostly provided by a library, ArcStr, we just provide a very thin wrapper around it
/// for some flexibility.
pub type Strng = ArcStr;

pub const EMPTY: Strng = literal!("");

pub fn new<A: AsRef<str>>(s: A) -> Strng {
	Strng::from(s.as_ref())
}

pub use arcstr::{format, literal};

/// RichStrng wraps Strng to let us implement arbitrary methods. How annoying.
#[derive(Clone, Hash, Default, Debug, PartialEq, Eq)]
pub struct RichStrng(Strng);

impl EncodeLabelValue for RichStrng {
	fn encode(&self, encoder: &mut LabelValueEncoder) -> Result<(), Error> {
		encoder.write_str(self.0.as_ref())
	}
}

impl Deref for RichStrng {
	type Target = Strng;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<T> From<T> for RichStrng
where
	T: Into<Strng>,
{
	fn from(value: T) -> Self {
		RichStrng(value.into())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn interning() {
		// Mostly we just thinly wrap ArcStr, so just validate our assumptions about the library
		let a = new("cluster.example.com");
		let b = new("cluster.example.com");
		assert_eq!(std::mem::size_of::<Strng>(), 8);
		assert_eq!(std::format!("{a}"), "cluster.example.com");
		assert_eq!(ArcStr::strong_count(&a), Some(1));
		let c = a.clone();
		assert_eq!(ArcStr::strong_count(&a), ArcStr::strong_count(&c));
		assert_eq!(ArcStr::strong_count(&a), Some(2));
		assert_eq!("cluster.example.com", b.to_string());
	}
}
