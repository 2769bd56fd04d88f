use super::*;
use crate::constants::ErrorHandler;
use crate::constants::PreprocStepType;
use crate::constants::ValueType;
use crate::utils::time::Timespec;

fn run(
    value_type: ValueType,
    value: &str,
    ops: &[PreprocOp],
) -> Variant {
    execute_steps(value_type, Variant::Str(value.to_string()), Timespec::new(100, 0), ops, &[]).value
}

fn op(
    step_type: PreprocStepType,
    params: &str,
) -> PreprocOp {
    PreprocOp::new(step_type, params)
}

#[test]
fn test_multiplier() {
    assert_eq!(run(ValueType::Uint64, "10", &[op(PreprocStepType::Multiplier, "2")]), Variant::Ui64(20));
    assert_eq!(run(ValueType::Float, "1.5", &[op(PreprocStepType::Multiplier, "2")]), Variant::Dbl(3.0));
    assert_eq!(
        run(ValueType::Uint64, "10", &[op(PreprocStepType::Multiplier, "abc")]),
        Variant::Error(
            "cannot apply multiplier \"abc\" to value \"10\" of type \"str\": invalid multiplier value".to_string()
        )
    );
    assert!(run(ValueType::Uint64, "ten", &[op(PreprocStepType::Multiplier, "2")]).is_error());
}

#[test]
fn test_trims_accept_escaped_whitespace() {
    assert_eq!(
        run(ValueType::Str, "  hello\n", &[op(PreprocStepType::Trim, "\\s\\n")]),
        Variant::Str("hello".to_string())
    );
    assert_eq!(
        run(ValueType::Str, "xxvaluexx", &[op(PreprocStepType::Ltrim, "x")]),
        Variant::Str("valuexx".to_string())
    );
    assert_eq!(
        run(ValueType::Str, "xxvaluexx", &[op(PreprocStepType::Rtrim, "x")]),
        Variant::Str("xxvalue".to_string())
    );
}

#[test]
fn test_conversions_to_decimal() {
    assert_eq!(run(ValueType::Uint64, "ff", &[op(PreprocStepType::Hex2Dec, "")]), Variant::Ui64(255));
    assert_eq!(run(ValueType::Uint64, " \"1a 2b\"\r\n", &[op(PreprocStepType::Hex2Dec, "")]), Variant::Ui64(0x1a2b));
    assert_eq!(run(ValueType::Uint64, "17", &[op(PreprocStepType::Oct2Dec, "")]), Variant::Ui64(15));
    assert_eq!(run(ValueType::Uint64, "Up", &[op(PreprocStepType::Bool2Dec, "")]), Variant::Ui64(1));
    assert_eq!(run(ValueType::Uint64, "off", &[op(PreprocStepType::Bool2Dec, "")]), Variant::Ui64(0));
    assert_eq!(
        run(ValueType::Uint64, "zz", &[op(PreprocStepType::Hex2Dec, "")]),
        Variant::Error("cannot convert value \"zz\" of type \"str\" from hexadecimal format: invalid value format".to_string())
    );
    assert!(run(ValueType::Uint64, "18", &[op(PreprocStepType::Oct2Dec, "")]).is_error());
}

#[test]
fn test_regsub() {
    assert_eq!(
        run(ValueType::Str, "took 150 ms", &[op(PreprocStepType::Regsub, "([0-9]+) ms\n\\1")]),
        Variant::Str("150".to_string())
    );
    assert_eq!(
        run(ValueType::Str, "a=1 b=2", &[op(PreprocStepType::Regsub, "a=(\\d) b=(\\d)\n\\2-\\1 [\\0]")]),
        Variant::Str("2-1 [a=1 b=2]".to_string())
    );
    assert!(run(ValueType::Str, "no digits", &[op(PreprocStepType::Regsub, "([0-9]+)\n\\1")]).is_error());
    assert!(run(ValueType::Str, "abc", &[op(PreprocStepType::Regsub, "missing output")]).is_error());
}

/// # Case 1: first value only seeds history
/// # Case 2: growth since the previous value
/// # Case 3: counter reset drops the value but still replaces history
#[test]
fn test_delta_value() {
    let ops = [op(PreprocStepType::DeltaValue, "")];

    // Case 1
    let first = execute_steps(ValueType::Uint64, Variant::Str("100".into()), Timespec::new(10, 0), &ops, &[]);
    assert_eq!(first.value, Variant::None);
    assert_eq!(
        first.history,
        vec![HistoryValue {
            step: 0,
            value: Variant::Ui64(100),
            ts: Timespec::new(10, 0),
        }]
    );

    // Case 2
    let second = execute_steps(ValueType::Uint64, Variant::Str("150".into()), Timespec::new(20, 0), &ops, &first.history);
    assert_eq!(second.value, Variant::Ui64(50));
    assert_eq!(second.history[0].value, Variant::Ui64(150));

    // Case 3
    let reset = execute_steps(ValueType::Uint64, Variant::Str("90".into()), Timespec::new(30, 0), &ops, &second.history);
    assert_eq!(reset.value, Variant::None);
    assert_eq!(reset.history[0].value, Variant::Ui64(90));
}

#[test]
fn test_delta_speed() {
    let ops = [op(PreprocStepType::DeltaSpeed, "")];
    let history = vec![HistoryValue {
        step: 0,
        value: Variant::Dbl(1.0),
        ts: Timespec::new(10, 0),
    }];

    let outcome = execute_steps(ValueType::Float, Variant::Str("3".into()), Timespec::new(12, 0), &ops, &history);
    assert_eq!(outcome.value, Variant::Dbl(1.0));

    let half_second = execute_steps(ValueType::Float, Variant::Str("2".into()), Timespec::new(10, 500_000_000), &ops, &history);
    assert_eq!(half_second.value, Variant::Dbl(2.0));

    let not_newer = execute_steps(ValueType::Float, Variant::Str("3".into()), Timespec::new(10, 0), &ops, &history);
    assert_eq!(not_newer.value, Variant::None);
}

#[test]
fn test_error_handlers() {
    let failing = op(PreprocStepType::Multiplier, "x");
    let double = op(PreprocStepType::Multiplier, "2");

    let outcome = execute_steps(
        ValueType::Uint64,
        Variant::Str("10".into()),
        Timespec::new(1, 0),
        &[failing.clone().with_error_handler(ErrorHandler::SetValue, "7"), double.clone()],
        &[],
    );
    assert_eq!(outcome.results, vec![Variant::Str("7".into()), Variant::Ui64(14)]);
    assert_eq!(outcome.value, Variant::Ui64(14));

    let discarded = execute_steps(
        ValueType::Uint64,
        Variant::Str("10".into()),
        Timespec::new(1, 0),
        &[failing.clone().with_error_handler(ErrorHandler::Discard, ""), double.clone()],
        &[],
    );
    assert_eq!(discarded.results, vec![Variant::None]);

    let custom = execute_steps(
        ValueType::Uint64,
        Variant::Str("10".into()),
        Timespec::new(1, 0),
        &[failing.with_error_handler(ErrorHandler::SetError, "bad input"), double],
        &[],
    );
    assert_eq!(custom.value, Variant::Error("bad input".into()));
    assert_eq!(custom.results.len(), 1);
}

#[test]
fn test_jsonpath() {
    let document = r#"{"a":{"b":[1,{"c":"x"}]},"name":"web"}"#;

    assert_eq!(run(ValueType::Str, document, &[op(PreprocStepType::JsonPath, "$.a.b[1].c")]), Variant::Str("x".into()));
    assert_eq!(run(ValueType::Str, document, &[op(PreprocStepType::JsonPath, "$.a.b[0]")]), Variant::Str("1".into()));
    assert_eq!(
        run(ValueType::Str, document, &[op(PreprocStepType::JsonPath, "$['a']['b'][1]")]),
        Variant::Str(r#"{"c":"x"}"#.into())
    );
    assert_eq!(run(ValueType::Str, document, &[op(PreprocStepType::JsonPath, "$.name")]), Variant::Str("web".into()));
    assert!(run(ValueType::Str, document, &[op(PreprocStepType::JsonPath, "$.missing")]).is_error());
    assert!(run(ValueType::Str, "not json", &[op(PreprocStepType::JsonPath, "$.a")]).is_error());
}

#[test]
fn test_xpath_is_reported_unsupported() {
    let value = run(ValueType::Str, "<a>1</a>", &[op(PreprocStepType::Xpath, "/a")]);
    match value {
        Variant::Error(message) => assert!(message.contains("XML support is not available")),
        other => panic!("expected error, got {:?}", other),
    }
}
