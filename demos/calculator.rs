//! A small test binary built on context-runner.
//!
//! ```text
//! cargo run --example calculator -- --jobs 2 --json target/calculator.json
//! ```

use context_runner::prelude::*;
use std::process::ExitCode;

/// Persists calculation results somewhere.
trait Ledger {
    fn record(&self, entry: &str) -> Outcome;
    fn total(&self) -> Outcome<i64>;
}

struct SqlLedger;

impl Doubleable for SqlLedger {
    const TYPE_NAME: &'static str = "SqlLedger";
    const INSTANCE_METHODS: &'static [&'static str] = &["record", "total"];
    const TYPE_METHODS: &'static [&'static str] = &["connect"];
}

/// Forwards the ledger trait to a double.
struct LedgerDouble(Double);

impl Ledger for LedgerDouble {
    fn record(&self, entry: &str) -> Outcome {
        self.0.invoke("record", args![entry])?;
        Ok(())
    }

    fn total(&self) -> Outcome<i64> {
        let total = self.0.invoke("total", args![])?;
        Ok(total.as_i64().unwrap_or_default())
    }
}

struct Calculator<'a> {
    ledger: &'a dyn Ledger,
}

impl Calculator<'_> {
    fn add(&self, a: i64, b: i64) -> Outcome<i64> {
        let sum = a + b;
        self.ledger.record(&format!("{a} + {b} = {sum}"))?;
        Ok(sum)
    }

    fn divide(&self, a: i64, b: i64) -> Outcome<i64> {
        if b == 0 {
            return Err(Raise::code(anyhow::anyhow!("division by zero")));
        }
        Ok(a / b)
    }

    fn running_total(&self) -> Outcome<i64> {
        self.ledger.total()
    }
}

fn calculator_tests(root: &mut Context) {
    root.add_child("Calculator", |calculator| {
        calculator.add_memoized("ledger", |example| {
            Ok(LedgerDouble(example.instance_double("SqlLedger")?))
        });

        calculator.add_child("add", |add| {
            add.add_test("sums two numbers", |example| {
                let ledger = example.get::<LedgerDouble>("ledger")?;
                ledger.0.stub("record").with(args!["2 + 3 = 5"]).register()?;
                let calculator = Calculator { ledger: &*ledger };
                assert_equal(&5, &calculator.add(2, 3)?)
            });

            add.add_test("records every sum", |example| {
                let ledger = example.get::<LedgerDouble>("ledger")?;
                ledger.0.expect("record").with(args!["1 + 1 = 2"]).register()?;
                Calculator { ledger: &*ledger }.add(1, 1)?;
                Ok(())
            });
        });

        calculator.add_child("divide", |divide| {
            divide.add_helper("quotient", |example, args| {
                let ledger = example.get::<LedgerDouble>("ledger")?;
                let calculator = Calculator { ledger: &*ledger };
                let a = args[0].as_i64().unwrap_or_default();
                let b = args[1].as_i64().unwrap_or_default();
                Ok(json!(calculator.divide(a, b)?))
            });

            divide.add_test("divides evenly", |example| {
                assert_equal(&json!(4), &example.call("quotient", &args![12, 3])?)
            });

            divide.add_test("refuses zero", |example| {
                let refused = example.call("quotient", &args![1, 0]).is_err();
                assert_with(refused, "dividing by zero must fail")
            });
        });

        calculator.add_test("reports the running total", |example| {
            let ledger = example.get::<LedgerDouble>("ledger")?;
            ledger.0.stub("total").returns(42)?;
            let calculator = Calculator { ledger: &*ledger };
            assert_equal(&42, &calculator.running_total()?)?;
            ledger.0.verify("total", args![])
        });
    });
}

fn main() -> ExitCode {
    let mut registry = TypeRegistry::new();
    registry.register::<SqlLedger>();

    let mut root = Context::default();
    calculator_tests(&mut root);
    context_runner::cli::run_with(root, registry)
}
