//! Internal testing utilities for the tagwire crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

mod wire_builder;

pub use wire_builder::WireBuilder;

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Create a `Debug` struct, conventionally named `Case`, holding the data for
/// one test case, then call `test_each` on a collection of cases. All cases
/// are run, catching panics. If any case fails, `test_each` panics with the
/// number of failures and their debug representations.
///
/// ```
/// use tagwire_testing::TestCases;
///
/// #[derive(Debug)]
/// struct Case {
///     value: u64,
///     encoded_len: usize,
/// }
///
/// let cases = [
///     Case { value: 1, encoded_len: 1 },
///     Case { value: 300, encoded_len: 2 },
/// ];
///
/// cases.test_each(|&Case { value, encoded_len }| {
///     let bits = 64 - value.leading_zeros() as usize;
///     assert_eq!(bits.div_ceil(7).max(1), encoded_len);
/// });
/// ```
///
/// Test cases and values captured by the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Wrap them with [`AssertUnwindSafe`](std::panic::AssertUnwindSafe) if not.
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with a reference to each test case in
    /// `self`, catching any panics.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes test cases
    /// to the test function by value.
    ///
    /// Each case is formatted to a string before the test function is
    /// called, so it can be reported if the test fails.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            let test = &test;
            let case_str = format!("{:?}", case);
            if std::panic::catch_unwind(move || test(case)).is_err() {
                failures.push(case_str);
            }
        }
        report_failures(&failures);
    }
}

fn report_failures<T: Debug>(failures: &[T]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}
