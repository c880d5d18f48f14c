//! Integration tests for the core memoizing wrapper
//!
//! These tests exercise the caching contract end to end: hits skip the
//! wrapped function, signatures separate calls that differ, and failures are
//! never remembered.

use fnmemo::prelude::*;
use fnmemo::{CallSignature, FnId};
use rand::seq::SliceRandom;
use serde::ser::{Error as _, Serializer};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Query {
    table: String,
    limit: u32,
}

/// An argument whose encoding always fails
struct Opaque;

impl Serialize for Opaque {
    fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Err(S::Error::custom("opaque handle cannot be encoded"))
    }
}

/// The square scenario: 5, 6, 5 runs the function twice
#[test]
fn test_square_runs_twice_for_three_calls() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut square = fnmemo::wrap(move |args: &Args| {
        counter.set(counter.get() + 1);
        let x = *args.get::<i64>(0).unwrap();
        x.pow(2)
    });

    assert_eq!(square.call(args!(5_i64)).unwrap(), 25);
    assert_eq!(runs.get(), 1);
    assert_eq!(square.call(args!(6_i64)).unwrap(), 36);
    assert_eq!(runs.get(), 2);
    assert_eq!(square.call(args!(5_i64)).unwrap(), 25);
    assert_eq!(runs.get(), 2);
}

/// Side effects of the wrapped function are suppressed on a hit
#[test]
fn test_hits_suppress_side_effects() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let mut greet = Memoized::named("greet", move |args: &Args| {
        let name = args.get::<String>(0).unwrap().clone();
        sink.borrow_mut().push(format!("computing greeting for {}", name));
        format!("hello, {}", name)
    });

    for _ in 0..3 {
        assert_eq!(greet.call(args!("ada".to_string())).unwrap(), "hello, ada");
    }
    assert_eq!(log.borrow().len(), 1);
}

/// Keyword arguments given in any order hit the same entry
#[test]
fn test_keyword_order_invariance() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut area = Memoized::named("area", move |args: &Args| {
        counter.set(counter.get() + 1);
        args.get_kw::<u32>("w").unwrap() * args.get_kw::<u32>("h").unwrap()
    });

    assert_eq!(area.call(args!(; w = 3_u32, h = 4_u32)).unwrap(), 12);
    assert_eq!(area.call(args!(; h = 4_u32, w = 3_u32)).unwrap(), 12);
    assert_eq!(runs.get(), 1);
    assert_eq!(area.len(), 1);
}

/// Shuffled keyword orders all derive one signature
#[test]
fn test_shuffled_keywords_derive_one_signature() {
    let id = FnId::new("report");
    let mut names = vec!["alpha", "beta", "gamma", "delta", "epsilon"];
    let mut rng = rand::thread_rng();

    let build = |names: &[&'static str]| {
        names
            .iter()
            .fold(Args::new(), |args, name| args.kwarg(*name, name.len()))
    };
    let expected = CallSignature::derive(&id, &build(&names)).unwrap();

    for _ in 0..20 {
        names.shuffle(&mut rng);
        assert_eq!(CallSignature::derive(&id, &build(&names)).unwrap(), expected);
    }
}

/// Swapping positional arguments gives a new signature
#[test]
fn test_positional_order_sensitivity() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut minus = Memoized::named("minus", move |args: &Args| {
        counter.set(counter.get() + 1);
        args.get::<i32>(0).unwrap() - args.get::<i32>(1).unwrap()
    });

    assert_eq!(minus.call(args!(1, 2)).unwrap(), -1);
    assert_eq!(minus.call(args!(2, 1)).unwrap(), 1);
    assert_eq!(runs.get(), 2);
}

/// Different values, whether positional or keyword, are independent
#[test]
fn test_signature_independence() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut lookup = Memoized::named("lookup", move |args: &Args| {
        counter.set(counter.get() + 1);
        let query = args.get::<Query>(0).unwrap();
        let verbose = args.get_kw::<bool>("verbose").copied().unwrap_or(false);
        format!("{}:{}:{}", query.table, query.limit, verbose)
    });

    let q = |limit| Query {
        table: "users".to_string(),
        limit,
    };

    lookup.call(args!(q(10))).unwrap();
    lookup.call(args!(q(20))).unwrap();
    lookup.call(args!(q(10); verbose = true)).unwrap();
    lookup.call(args!(q(10); verbose = false)).unwrap();
    assert_eq!(runs.get(), 4);

    lookup.call(args!(q(10); verbose = true)).unwrap();
    assert_eq!(runs.get(), 4);
    assert_eq!(lookup.metrics().hit_rate(), 0.2);
}

/// A failing call is retried and never replays the error
#[test]
fn test_failure_is_not_cached() {
    let attempts = Rc::new(Cell::new(0));
    let counter = attempts.clone();
    let mut divide = Memoized::named_fallible("divide", move |args: &Args| {
        counter.set(counter.get() + 1);
        let a = *args.get::<i32>(0).unwrap();
        let b = *args.get::<i32>(1).unwrap();
        a.checked_div(b).ok_or("division by zero")
    });

    for expected_attempts in 1..=3 {
        let err = divide.try_call(args!(1, 0)).unwrap_err();
        assert_eq!(err, CallError::Failed("division by zero"));
        assert_eq!(attempts.get(), expected_attempts);
    }
    assert!(divide.is_empty());

    assert_eq!(divide.try_call(args!(9, 3)).unwrap(), 3);
    assert_eq!(divide.try_call(args!(9, 3)).unwrap(), 3);
    assert_eq!(attempts.get(), 4);
    assert_eq!(divide.metrics().failures(), 3);
}

/// A flaky function succeeds on retry and is cached from then on
#[test]
fn test_retry_after_failure_caches_success() {
    let attempts = Rc::new(Cell::new(0));
    let counter = attempts.clone();
    let mut fetch = Memoized::named_fallible("fetch", move |_: &Args| {
        counter.set(counter.get() + 1);
        if counter.get() < 3 {
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"))
        } else {
            Ok(vec![1_u8, 2, 3])
        }
    });

    assert!(fetch.try_call(args!("a")).unwrap_err().is_failure());
    assert!(fetch.try_call(args!("a")).unwrap_err().is_failure());
    assert_eq!(fetch.try_call(args!("a")).unwrap(), vec![1, 2, 3]);
    assert_eq!(fetch.try_call(args!("a")).unwrap(), vec![1, 2, 3]);
    assert_eq!(attempts.get(), 3);
}

/// Invalid keys are reported and never reach the function
#[test]
fn test_invalid_key_failure() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut memo = Memoized::named_fallible("strict", move |_: &Args| {
        counter.set(counter.get() + 1);
        Ok::<_, String>(1)
    });

    let args = Args::new().kwarg("x", 1).kwarg("x", 1);
    match memo.try_call(args) {
        Err(CallError::InvalidKey(Error::InvalidKey(reason))) => {
            assert!(reason.contains("more than once"));
        }
        other => panic!("expected an invalid key error, got {:?}", other),
    }
    assert_eq!(runs.get(), 0);
}

/// An argument that cannot be encoded is an invalid key, not a call
#[test]
fn test_unencodable_argument_is_invalid_key() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut memo = Memoized::named("inspect", move |_: &Args| {
        counter.set(counter.get() + 1);
        0_u8
    });

    let args = Args::new().arg(1_u8).arg(Opaque);
    assert!(!memo.contains(&args));
    match memo.call(args) {
        Err(Error::InvalidKey(reason)) => assert!(reason.contains("opaque handle")),
        other => panic!("expected an invalid key error, got {:?}", other),
    }
    assert_eq!(runs.get(), 0);
    assert!(memo.is_empty());
    assert_eq!(memo.metrics().insertions(), 0);
}

/// The thread-safe wrapper rejects unencodable arguments the same way
#[cfg(feature = "sync")]
#[test]
fn test_unencodable_argument_is_invalid_key_sync() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let runs = AtomicUsize::new(0);
    let memo = SyncMemoized::named("inspect", |_: &Args| {
        runs.fetch_add(1, Ordering::SeqCst);
        0_u8
    });

    let result = memo.call(Args::new().kwarg("handle", Opaque));
    assert!(matches!(result, Err(Error::InvalidKey(_))));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(memo.is_empty());
}

/// Wrapping the same function twice gives two private caches
#[test]
fn test_each_wrapper_owns_its_cache() {
    fn cube(args: &Args) -> i64 {
        args.get::<i64>(0).unwrap().pow(3)
    }

    let mut first = Memoized::wrap(cube);
    let mut second = Memoized::wrap(cube);
    assert_eq!(first.name(), second.name());

    first.call(args!(2_i64)).unwrap();
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());

    second.call(args!(2_i64)).unwrap();
    assert_eq!(second.metrics().misses(), 1);
}

/// Zero-argument functions cache a single result
#[test]
fn test_zero_arguments() {
    let runs = Rc::new(Cell::new(0));
    let counter = runs.clone();
    let mut answer = Memoized::named("answer", move |_: &Args| {
        counter.set(counter.get() + 1);
        42
    });

    assert_eq!(answer.call(args!()).unwrap(), 42);
    assert_eq!(answer.call(Args::new()).unwrap(), 42);
    assert_eq!(runs.get(), 1);
}
