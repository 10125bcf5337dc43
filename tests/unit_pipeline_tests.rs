//! # Evaluation Pipeline Unit Tests / 执行管道单元测试
//!
//! Tests for the fixed ends of the pipeline, layer composition and the
//! translation done by the assertion and matcher layers.
//!
//! 测试管道的固定端点、层的组合方式以及断言层和匹配器层所做的转换。

use std::io;
use std::sync::{Arc, Mutex};

use context_runner::core::models::{FailureKind, NestedUnitOfWork};
use context_runner::core::pipeline::{
    AssertionLayer, ErrorTypeAdapter, Evaluation, Layer, MatcherLayer, Next,
};
use context_runner::prelude::*;

fn only_unit(build: impl FnOnce(&mut Context)) -> NestedUnitOfWork {
    let mut root = Context::default();
    build(&mut root);
    Arc::new(root)
        .flatten()
        .next()
        .expect("one unit of work declared")
}

fn read_settings() -> Result<String, io::Error> {
    Err(io::Error::other("disk on fire"))
}

#[derive(Debug, thiserror::Error)]
#[error("expected {0} to be even")]
struct NotEven(i64);

fn check_even(n: i64) -> Result<(), NotEven> {
    if n % 2 == 0 { Ok(()) } else { Err(NotEven(n)) }
}

/// Records when it is entered and left.
struct Probe {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Layer for Probe {
    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, example: &Example, next: Next<'_>) -> Evaluation {
        self.log.lock().unwrap().push(format!("enter {}", self.name));
        let evaluation = next.run(example);
        self.log.lock().unwrap().push(format!("exit {}", self.name));
        evaluation
    }
}

#[cfg(test)]
mod bare_pipeline_tests {
    use super::*;

    #[test]
    fn test_generic_error_becomes_single_code_exception() {
        let unit = only_unit(|root| {
            root.add_test("reads settings", |_| {
                read_settings()?;
                Ok(())
            });
        });

        let failures = Pipeline::builder().build().execute(&unit).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), FailureKind::CodeException);
        assert_eq!(failures[0].message(), "disk on fire");
        assert_eq!(failures[0].unit(), &unit);
    }

    #[test]
    fn test_clean_body_yields_no_failures() {
        let unit = only_unit(|root| root.add_test("clean", |_| Ok(())));
        assert!(Pipeline::builder().build().execute(&unit).unwrap().is_empty());
    }

    #[test]
    fn test_assertion_without_assertion_layer_is_code_exception() {
        let unit = only_unit(|root| root.add_test("asserts", |_| fail("nope")));

        let failures = Pipeline::builder().build().execute(&unit).unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].is_code_exception());
        assert_eq!(failures[0].message(), "nope");
    }

    #[test]
    fn test_panic_is_captured_as_code_exception() {
        let unit = only_unit(|root| {
            root.add_test("panics", |_| panic!("boom"));
        });

        let failures = Pipeline::builder().build().execute(&unit).unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].is_code_exception());
        assert_eq!(failures[0].message(), "boom");
        let location = failures[0].trace().location().unwrap_or_default();
        assert!(location.contains("unit_pipeline_tests.rs"), "{location}");
    }

    #[test]
    fn test_raised_fatal_is_not_contained() {
        let unit = only_unit(|root| {
            root.add_test("halts", |_| Err(Raise::fatal("database vanished")));
        });

        let fatal = Pipeline::standard().execute(&unit).unwrap_err();
        assert_eq!(fatal.reason(), "database vanished");
    }

    #[test]
    fn test_fatal_wrapped_in_error_keeps_classification() {
        let unit = only_unit(|root| {
            root.add_test("halts", |_| Err(Raise::code(Fatal::new("out of disk"))));
        });

        let fatal = Pipeline::standard().execute(&unit).unwrap_err();
        assert_eq!(fatal.reason(), "out of disk");
    }
}

#[cfg(test)]
mod assertion_layer_tests {
    use super::*;

    #[test]
    fn test_assert_equal_message_has_want_and_got_lines() {
        let unit = only_unit(|root| {
            root.add_test("compares", |_| assert_equal(&1, &2));
        });

        let failures = Pipeline::standard().execute(&unit).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), FailureKind::Assertion);
        assert_eq!(failures[0].message(), "want: 1\ngot: 2");
        let location = failures[0].trace().location().unwrap_or_default();
        assert!(location.contains("unit_pipeline_tests.rs"), "{location}");
    }

    #[test]
    fn test_plain_assert_has_default_message() {
        let unit = only_unit(|root| root.add_test("asserts", |_| assert(false)));

        let failures = Pipeline::standard().execute(&unit).unwrap();
        assert_eq!(failures[0].message(), "Failed assertion, no message given.");
    }

    #[test]
    fn test_assert_include_over_collections_and_strings() {
        let unit = only_unit(|root| {
            root.add_test("includes", |_| {
                assert_include(&vec![1, 2, 3], &2)?;
                assert_include("haystack", "st")?;
                assert_include(&["a", "b"], &"c")
            });
        });

        let failures = Pipeline::standard().execute(&unit).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message(), "expected [\"a\", \"b\"] to include \"c\"");
    }

    #[test]
    fn test_code_errors_pass_through_assertion_layer() {
        let unit = only_unit(|root| {
            root.add_test("reads settings", |_| {
                read_settings()?;
                Ok(())
            });
        });

        let pipeline = Pipeline::builder().wrap(AssertionLayer).build();
        let failures = pipeline.execute(&unit).unwrap();
        assert!(failures[0].is_code_exception());
    }
}

#[cfg(test)]
mod composition_tests {
    use super::*;

    #[test]
    fn test_standard_layer_names() {
        assert_eq!(
            Pipeline::standard().layer_names(),
            vec!["top", "assertions", "doubles", "bottom"]
        );
        assert_eq!(Pipeline::builder().build().layer_names(), vec!["top", "bottom"]);
    }

    #[test]
    fn test_first_wrapped_layer_is_innermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .wrap(Probe {
                name: "inner",
                log: Arc::clone(&log),
            })
            .wrap(Probe {
                name: "outer",
                log: Arc::clone(&log),
            })
            .build();
        let unit = only_unit(|root| root.add_test("t", |_| Ok(())));

        pipeline.execute(&unit).unwrap();
        assert_eq!(pipeline.layer_names(), vec!["top", "outer", "inner", "bottom"]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter outer", "enter inner", "exit inner", "exit outer"]
        );
    }

    #[test]
    fn test_context_pipeline_overrides_default() {
        let mut root = Context::default();
        root.add_child("bare", |bare| {
            bare.set_pipeline(Arc::new(Pipeline::builder().build()));
            bare.add_test("asserts", |_| fail("no assertion layer here"));
        });
        root.add_test("asserts", |_| fail("translated"));

        let units: Vec<_> = Arc::new(root).flatten().collect();
        let default = Pipeline::standard();
        let effective =
            |unit: &NestedUnitOfWork| unit.pipeline().cloned().unwrap_or_else(|| Arc::new(Pipeline::standard()));

        assert!(units[0].pipeline().is_some());
        assert!(units[1].pipeline().is_none());
        assert!(effective(&units[0]).execute(&units[0]).unwrap()[0].is_code_exception());
        assert!(!default.execute(&units[1]).unwrap()[0].is_code_exception());
    }
}

#[cfg(test)]
mod matcher_layer_tests {
    use super::*;

    fn evenness_pipeline() -> Pipeline {
        Pipeline::builder()
            .wrap(MatcherLayer::new(ErrorTypeAdapter::<NotEven>::new("evenness")))
            .wrap(AssertionLayer)
            .build()
    }

    #[test]
    fn test_recognized_mismatch_becomes_assertion_failure() {
        let unit = only_unit(|root| {
            root.add_test("is even", |_| {
                check_even(4)?;
                check_even(3)?;
                Ok(())
            });
        });

        let failures = evenness_pipeline().execute(&unit).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind(), FailureKind::Assertion);
        assert_eq!(failures[0].message(), "expected 3 to be even");
    }

    #[test]
    fn test_unrecognized_error_stays_code_exception() {
        let unit = only_unit(|root| {
            root.add_test("reads settings", |_| {
                read_settings()?;
                Ok(())
            });
        });

        let failures = evenness_pipeline().execute(&unit).unwrap();
        assert!(failures[0].is_code_exception());
        assert_eq!(failures[0].message(), "disk on fire");
    }

    #[test]
    fn test_matcher_layer_is_named_after_library() {
        assert_eq!(
            evenness_pipeline().layer_names(),
            vec!["top", "assertions", "evenness", "bottom"]
        );
    }
}
