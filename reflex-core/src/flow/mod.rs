//! Control Flow
//!
//! Combinators that create and destroy child scopes in response to signal
//! changes. They produce no output of their own beyond what the branch
//! functions return; what matters is *which* scopes are alive, and that
//! leaving a branch always tears it down before the next one is built.
//!
//! - [`Show`]: one scope for whichever side of a condition is active.
//! - [`For`]: one scope per list item, reconciled by item equality.
//!
//! Both wrap a single computation that reads the driving accessor. Branch
//! and item bodies run untracked inside their own scope, so reads inside a
//! body never re-trigger the combinator itself; bodies create their own
//! effects when they want to react.

mod each;
mod show;

pub use each::For;
pub use show::Show;

/// Values that can drive a [`Show`] condition.
pub trait Truthy {
    /// Whether the value selects the "true" branch.
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl<T> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.is_some()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for &str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

macro_rules! int_truthy {
    ($($ty:ty),*) => {
        $(impl Truthy for $ty {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

int_truthy!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_truthiness() {
        assert!(true.is_truthy());
        assert!(!false.is_truthy());
        assert!(!0_i32.is_truthy());
        assert!(3_u8.is_truthy());
        assert!(!f64::NAN.is_truthy());
        assert!(!"".is_truthy());
        assert!(Some(0).is_truthy());
        assert!(!None::<i32>.is_truthy());
    }
}
