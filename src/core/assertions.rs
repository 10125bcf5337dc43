//! # Assertions Module / 断言模块
//!
//! The assert-based evaluation mode. Every function returns an [`Outcome`] so a
//! failed check stops the test body with `?`. The resulting assertion failure
//! is translated by [`AssertionLayer`](crate::core::pipeline::AssertionLayer);
//! without that layer it surfaces as a code exception.
//!
//! 基于断言的求值模式。每个函数都返回 [`Outcome`]，因此失败的检查会通过 `?`
//! 终止测试体。由此产生的断言失败由 [`AssertionLayer`](crate::core::pipeline::AssertionLayer)
//! 转换；如果没有该层，它会作为代码异常出现。

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::core::raise::{Outcome, Raise};

const DEFAULT_MESSAGE: &str = "Failed assertion, no message given.";

#[track_caller]
pub fn assert(condition: bool) -> Outcome {
    assert_with(condition, DEFAULT_MESSAGE)
}

#[track_caller]
pub fn assert_with(condition: bool, message: impl Into<String>) -> Outcome {
    if condition {
        Ok(())
    } else {
        Err(Raise::assertion(message))
    }
}

/// Fails unless `expected == actual`. The message is exactly two lines:
/// `want: <expected:?>` and `got: <actual:?>`.
///
/// 除非 `expected == actual`，否则失败。消息恰好两行：
/// `want: <expected:?>` 和 `got: <actual:?>`。
#[track_caller]
pub fn assert_equal<T>(expected: &T, actual: &T) -> Outcome
where
    T: PartialEq + Debug + ?Sized,
{
    if expected == actual {
        Ok(())
    } else {
        Err(Raise::assertion(format!(
            "want: {expected:?}\ngot: {actual:?}"
        )))
    }
}

/// Fails unless `collection` includes `item`.
#[track_caller]
pub fn assert_include<C, T>(collection: &C, item: &T) -> Outcome
where
    C: Includes<T> + Debug + ?Sized,
    T: Debug + ?Sized,
{
    if collection.includes(item) {
        Ok(())
    } else {
        Err(Raise::assertion(format!(
            "expected {collection:?} to include {item:?}"
        )))
    }
}

/// Fails unconditionally.
#[track_caller]
pub fn fail<T>(message: impl Into<String>) -> Outcome<T> {
    Err(Raise::assertion(message))
}

/// Membership test used by [`assert_include`].
pub trait Includes<T: ?Sized> {
    fn includes(&self, item: &T) -> bool;
}

impl<T: PartialEq> Includes<T> for [T] {
    fn includes(&self, item: &T) -> bool {
        self.contains(item)
    }
}

impl<T: PartialEq> Includes<T> for Vec<T> {
    fn includes(&self, item: &T) -> bool {
        self.contains(item)
    }
}

impl<T: PartialEq, const N: usize> Includes<T> for [T; N] {
    fn includes(&self, item: &T) -> bool {
        self.contains(item)
    }
}

impl Includes<str> for str {
    fn includes(&self, item: &str) -> bool {
        self.contains(item)
    }
}

impl Includes<str> for String {
    fn includes(&self, item: &str) -> bool {
        self.contains(item)
    }
}

impl Includes<char> for str {
    fn includes(&self, item: &char) -> bool {
        self.contains(*item)
    }
}

impl Includes<char> for String {
    fn includes(&self, item: &char) -> bool {
        self.contains(*item)
    }
}

impl<T: Eq + Hash> Includes<T> for HashSet<T> {
    fn includes(&self, item: &T) -> bool {
        self.contains(item)
    }
}

impl<T: Ord> Includes<T> for BTreeSet<T> {
    fn includes(&self, item: &T) -> bool {
        self.contains(item)
    }
}

impl<K: Eq + Hash, V> Includes<K> for HashMap<K, V> {
    fn includes(&self, item: &K) -> bool {
        self.contains_key(item)
    }
}

impl<K: Ord, V> Includes<K> for BTreeMap<K, V> {
    fn includes(&self, item: &K) -> bool {
        self.contains_key(item)
    }
}
