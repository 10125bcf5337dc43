//! # Double Engine Unit Tests / 替身引擎单元测试
//!
//! Tests for stubs, one-shot expectations, verify-after, type validation
//! against the registry and the double layer's auto-verification.
//!
//! 测试桩、一次性期望、事后验证、基于注册表的类型校验以及替身层的自动验证。

mod common;

use std::sync::Arc;

use common::run_recorded;
use context_runner::core::config::Config;
use context_runner::core::double::{DoubleFailure, DoubleKind, DoubleSpace, Reference, TypeSurface};
use context_runner::core::pipeline::DoubleOptions;
use context_runner::core::raise::RaiseKind;
use context_runner::core::scheduler::SerialScheduler;
use context_runner::prelude::*;

struct Mailer;

impl Doubleable for Mailer {
    const TYPE_NAME: &'static str = "Mailer";
    const INSTANCE_METHODS: &'static [&'static str] = &["deliver", "queue"];
    const TYPE_METHODS: &'static [&'static str] = &["connect"];
}

fn unresolved_double() -> Double {
    Double::new(Reference::Unresolved("Anything".to_string()), DoubleKind::Instance)
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register::<Mailer>();
    registry
}

fn double_message(raise: Raise) -> String {
    match raise.kind {
        RaiseKind::Double(failure) => failure.to_string(),
        other => panic!("expected a double failure, got {other:?}"),
    }
}

#[cfg(test)]
mod stub_tests {
    use super::*;

    #[test]
    fn test_stub_answers_every_matching_call() {
        let double = unresolved_double();
        double.stub("foo").with(args!["a"]).returns(1).unwrap();

        assert_eq!(double.invoke("foo", args!["a"]).unwrap(), json!(1));
        assert_eq!(double.invoke("foo", args!["a"]).unwrap(), json!(1));
    }

    #[test]
    fn test_unmatched_call_on_stub_only_double_returns_null() {
        let double = unresolved_double();
        double.stub("foo").with(args!["a"]).returns(1).unwrap();

        assert_eq!(double.invoke("foo", args!["b"]).unwrap(), Value::Null);
        assert_eq!(double.invoke("bar", args![]).unwrap(), Value::Null);
    }

    #[test]
    fn test_latest_matching_stub_wins() {
        let double = unresolved_double();
        double.stub("size").returns(1).unwrap();
        double.stub("size").returns(2).unwrap();

        assert_eq!(double.invoke("size", args![]).unwrap(), json!(2));
    }

    #[test]
    fn test_returns_with_computes_from_arguments() {
        let double = unresolved_double();
        double
            .stub("add")
            .with(args![2, 3])
            .returns_with(|args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                json!(sum)
            })
            .unwrap();

        assert_eq!(double.invoke("add", args![2, 3]).unwrap(), json!(5));
    }

    #[test]
    fn test_received_logs_calls_in_order() {
        let double = unresolved_double();
        double.invoke("first", args![1]).unwrap();
        double.invoke("second", args!["x", false]).unwrap();

        let received: Vec<String> = double.received().iter().map(ToString::to_string).collect();
        assert_eq!(received, vec!["first(1)", "second(\"x\", false)"]);
    }
}

#[cfg(test)]
mod expectation_tests {
    use super::*;

    #[test]
    fn test_unexpected_call_fails_immediately() {
        let double = unresolved_double();
        double.expect("foo").with(args!["a"]).register().unwrap();

        let message = double_message(double.invoke("foo", args!["b"]).unwrap_err());
        assert!(message.contains("Unexpectedly received"), "{message}");
        assert!(message.contains("foo(\"b\")"), "{message}");
        assert!(message.contains("still expects:\n  foo(\"a\")"), "{message}");
    }

    #[test]
    fn test_expectation_is_consumed_once() {
        let double = unresolved_double();
        double.expect("next").returns("value").unwrap();

        assert_eq!(double.invoke("next", args![]).unwrap(), json!("value"));
        let message = double_message(double.invoke("next", args![]).unwrap_err());
        assert!(message.contains("has no remaining expectations"), "{message}");
    }

    #[test]
    fn test_assert_exhausted_lists_unmet_expectations() {
        let double = unresolved_double();
        double.expect("open").with(args!["inbox"]).register().unwrap();
        double.expect("close").register().unwrap();
        double.invoke("close", args![]).unwrap();

        let message = double_message(double.assert_exhausted().unwrap_err());
        assert_eq!(
            message,
            "instance double of Anything did not receive:\n  open(\"inbox\")"
        );
    }

    #[test]
    fn test_assert_exhausted_reports_rejected_call() {
        let double = unresolved_double();
        double.expect("foo").with(args!["a"]).register().unwrap();
        assert!(double.invoke("foo", args!["b"]).is_err());
        double.invoke("foo", args!["a"]).unwrap();

        let message = double_message(double.assert_exhausted().unwrap_err());
        assert!(message.starts_with("Unexpectedly received: foo(\"b\")"), "{message}");
    }

    #[test]
    fn test_expectations_match_out_of_order() {
        let double = unresolved_double();
        double.expect("a").returns(1).unwrap();
        double.expect("b").returns(2).unwrap();

        assert_eq!(double.invoke("b", args![]).unwrap(), json!(2));
        assert_eq!(double.invoke("a", args![]).unwrap(), json!(1));
        assert!(double.assert_exhausted().is_ok());
    }
}

#[cfg(test)]
mod verify_tests {
    use super::*;

    #[test]
    fn test_verify_consumes_one_logged_call() {
        let double = unresolved_double();
        double.invoke("ping", args![]).unwrap();

        assert!(double.verify("ping", args![]).is_ok());
        let message = double_message(double.verify("ping", args![]).unwrap_err());
        assert!(message.contains("was expected to receive: ping()"), "{message}");
        assert!(message.contains("but received nothing"), "{message}");
    }

    #[test]
    fn test_rejected_call_cannot_be_verified() {
        let double = unresolved_double();
        double.expect("send").with(args!["alice"]).register().unwrap();
        assert!(double.invoke("send", args!["mallory"]).is_err());

        assert!(double.received().is_empty());
        let message = double_message(double.verify("send", args!["mallory"]).unwrap_err());
        assert!(message.contains("but received nothing"), "{message}");
    }

    #[test]
    fn test_verify_failure_lists_unverified_calls() {
        let double = unresolved_double();
        double.invoke("send", args!["alice"]).unwrap();

        let message = double_message(double.verify("send", args!["bob"]).unwrap_err());
        assert!(message.contains("but received:\n  send(\"alice\")"), "{message}");
    }
}

#[cfg(test)]
mod type_validation_tests {
    use super::*;

    #[test]
    fn test_stubbing_unknown_method_names_type_and_method() {
        let mut registry = TypeRegistry::new();
        registry.insert(
            "TypeName",
            TypeSurface::new().instance_methods(["realMethod"]),
        );
        let double = Double::new(registry.resolve("TypeName"), DoubleKind::Instance);

        let message = double_message(double.stub("methodName").returns(1).unwrap_err());
        assert!(message.contains("TypeName#methodName"), "{message}");
    }

    #[test]
    fn test_type_double_uses_dot_separator_and_type_methods() {
        let registry = registry();
        let double = Double::new(registry.resolve("Mailer"), DoubleKind::Type);

        assert!(double.stub("connect").returns(true).is_ok());
        let message = double_message(double.stub("deliver").register().unwrap_err());
        assert_eq!(message, "Mailer.deliver is not a method of Mailer");
    }

    #[test]
    fn test_invoking_unknown_method_fails() {
        let registry = registry();
        let double = Double::new(registry.resolve("Mailer"), DoubleKind::Instance);

        let message = double_message(double.invoke("explode", args![]).unwrap_err());
        assert_eq!(message, "Mailer#explode is not a method of Mailer");
        assert!(double.invoke("deliver", args!["hi"]).is_ok());
    }

    #[test]
    fn test_unresolved_reference_is_not_validated() {
        let registry = registry();
        let reference = registry.resolve("Unknown");
        assert!(!reference.is_resolved());

        let double = Double::new(reference, DoubleKind::Instance);
        assert!(double.stub("whatever").returns(1).is_ok());
    }

    #[test]
    fn test_strict_space_refuses_unresolved_types() {
        let space = DoubleSpace::new(Arc::new(registry()), true);

        assert!(space.instance_double("Mailer").is_ok());
        let error = space.instance_double("Ghost").unwrap_err();
        match error.kind {
            RaiseKind::Double(DoubleFailure::UnresolvedType { type_name }) => {
                assert_eq!(type_name, "Ghost")
            }
            other => panic!("unexpected raise {other:?}"),
        }
        assert_eq!(space.doubles().len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let double = unresolved_double();
        let clone = double.clone();
        clone.stub("shared").returns(7).unwrap();

        assert_eq!(double.invoke("shared", args![]).unwrap(), json!(7));
        assert_eq!(clone.received().len(), 1);
    }
}

#[cfg(test)]
mod double_layer_tests {
    use super::*;

    fn run_with_doubles(root: Context, options: DoubleOptions) -> common::Recorder {
        let recorder = common::Recorder::default();
        let config = Config::new()
            .notifier(recorder.clone())
            .scheduler(SerialScheduler)
            .pipeline(Pipeline::with_doubles(options));
        context_runner::run(root, config).unwrap();
        recorder
    }

    #[test]
    fn test_unmet_expectation_is_reported_by_auto_verify() {
        let mut root = Context::default();
        root.add_test("forgets to call", |example| {
            let mailer = example.instance_double("Mailer")?;
            mailer.expect("deliver").with(args!["hello"]).register()?;
            Ok(())
        });

        let recorder = run_with_doubles(
            root,
            DoubleOptions {
                registry: Arc::new(registry()),
                ..DoubleOptions::default()
            },
        );

        let failures = recorder.failures_of("forgets to call");
        assert_eq!(failures.len(), 1);
        assert!(!failures[0].is_code_exception());
        assert!(failures[0].message().contains("did not receive"));
        assert!(failures[0].message().contains("deliver(\"hello\")"));
        assert!(failures[0].trace().location().unwrap().contains("unit_double_tests.rs"));
    }

    #[test]
    fn test_auto_verify_can_be_disabled() {
        let mut root = Context::default();
        root.add_test("forgets to call", |example| {
            let double = example.instance_double("Anything")?;
            double.expect("call").register()
        });

        let recorder = run_with_doubles(
            root,
            DoubleOptions {
                auto_verify: false,
                ..DoubleOptions::default()
            },
        );
        assert!(recorder.failures_of("forgets to call").is_empty());
    }

    #[test]
    fn test_double_failure_in_body_becomes_assertion_failure() {
        let mut root = Context::default();
        root.add_test("calls wrong thing", |example| {
            let double = example.instance_double("Anything")?;
            double.expect("foo").with(args!["a"]).register()?;
            double.invoke("foo", args!["b"])?;
            Ok(())
        });

        let recorder = run_with_doubles(root, DoubleOptions::default());
        let failures = recorder.failures_of("calls wrong thing");
        assert_eq!(failures.len(), 1);
        assert!(!failures[0].is_code_exception());
        assert!(failures[0].message().starts_with("Unexpectedly received: foo(\"b\")"));
    }

    #[test]
    fn test_swallowed_unexpected_call_is_still_reported() {
        let mut root = Context::default();
        root.add_test("recovers from double error", |example| {
            let ledger = example.instance_double("Anything")?;
            ledger.expect("total").with(args!["a"]).register()?;
            ledger.invoke("total", args!["a"])?;
            let fallback = ledger.invoke("total", args!["b"]).unwrap_or(json!(0));
            assert_equal(&json!(0), &fallback)
        });

        let recorder = run_with_doubles(root, DoubleOptions::default());
        let failures = recorder.failures_of("recovers from double error");
        assert_eq!(failures.len(), 1);
        assert!(!failures[0].is_code_exception());
        assert!(failures[0].message().starts_with("Unexpectedly received: total(\"b\")"));
        assert!(failures[0].trace().location().unwrap().contains("unit_double_tests.rs"));
    }

    #[test]
    fn test_swallowed_invalid_method_is_reported_without_auto_verify() {
        let mut root = Context::default();
        root.add_test("ignores invalid method", |example| {
            let mailer = example.instance_double("Mailer")?;
            let _ = mailer.invoke("explode", args![]);
            Ok(())
        });

        let recorder = run_with_doubles(
            root,
            DoubleOptions {
                registry: Arc::new(registry()),
                auto_verify: false,
                ..DoubleOptions::default()
            },
        );
        let failures = recorder.failures_of("ignores invalid method");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].message(), "Mailer#explode is not a method of Mailer");
    }

    #[test]
    fn test_strict_option_reaches_the_space() {
        let mut root = Context::default();
        root.add_test("ghost", |example| {
            example.instance_double("Ghost")?;
            Ok(())
        });

        let recorder = run_with_doubles(
            root,
            DoubleOptions {
                strict: true,
                ..DoubleOptions::default()
            },
        );
        let failures = recorder.failures_of("ghost");
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message().contains("could not resolve type `Ghost`"));
    }

    #[test]
    fn test_doubles_are_unavailable_without_the_layer() {
        let mut root = Context::root(Arc::new(Pipeline::builder().build()));
        root.add_test("no doubles", |example| {
            example.instance_double("Anything")?;
            Ok(())
        });

        let (verdict, recorder) = run_recorded(root, SerialScheduler);
        assert!(!verdict.unwrap());
        let failures = recorder.failures_of("no doubles");
        assert!(failures[0].is_code_exception());
        assert!(failures[0].message().contains("doubles are not enabled"));
    }
}
